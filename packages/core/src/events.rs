//! Events emitted by state transitions.

use ibc_classic_types::{
    identifier::{ChannelId, ClientId, ConnectionId, PortId},
    packet::Packet,
    Height,
};

/// Attributes shared by connection handshake events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionAttributes {
    /// The local connection
    pub connection_id: ConnectionId,
    /// The local client
    pub client_id: ClientId,
    /// The counterparty client
    pub counterparty_client_id: ClientId,
    /// The counterparty connection, once known
    pub counterparty_connection_id: Option<ConnectionId>,
}

/// Attributes shared by channel handshake events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelAttributes {
    /// The local port
    pub port_id: PortId,
    /// The local channel
    pub channel_id: ChannelId,
    /// The counterparty port
    pub counterparty_port_id: PortId,
    /// The counterparty channel, once known
    pub counterparty_channel_id: Option<ChannelId>,
    /// The connection the channel runs over
    pub connection_id: ConnectionId,
}

/// An event appended to an operation's [`crate::Response`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IbcEvent {
    /// A client was created
    CreateClient {
        /// The new client
        client_id: ClientId,
        /// Its client type
        client_type: String,
        /// Height of the initial consensus state
        consensus_height: Height,
    },
    /// A client was updated
    UpdateClient {
        /// The client
        client_id: ClientId,
        /// Heights of the stored consensus states
        consensus_heights: Vec<Height>,
    },
    /// A client was frozen after misbehaviour
    ClientMisbehaviour {
        /// The frozen client
        client_id: ClientId,
    },
    /// `ConnOpenInit` succeeded
    OpenInitConnection(ConnectionAttributes),
    /// `ConnOpenTry` succeeded
    OpenTryConnection(ConnectionAttributes),
    /// `ConnOpenAck` succeeded
    OpenAckConnection(ConnectionAttributes),
    /// `ConnOpenConfirm` succeeded
    OpenConfirmConnection(ConnectionAttributes),
    /// `ChanOpenInit` succeeded
    OpenInitChannel {
        /// Channel attributes
        attributes: ChannelAttributes,
        /// The proposed version
        version: String,
    },
    /// `ChanOpenTry` succeeded
    OpenTryChannel {
        /// Channel attributes
        attributes: ChannelAttributes,
        /// The version chosen by the application
        version: String,
    },
    /// `ChanOpenAck` succeeded
    OpenAckChannel(ChannelAttributes),
    /// `ChanOpenConfirm` succeeded
    OpenConfirmChannel(ChannelAttributes),
    /// `ChanCloseInit` succeeded
    CloseInitChannel(ChannelAttributes),
    /// `ChanCloseConfirm` succeeded
    CloseConfirmChannel(ChannelAttributes),
    /// A packet was committed for sending
    SendPacket(Packet),
    /// A packet was received
    RecvPacket(Packet),
    /// An acknowledgement was written for a received packet
    WriteAcknowledgement {
        /// The received packet
        packet: Packet,
        /// The acknowledgement bytes
        acknowledgement: Vec<u8>,
    },
    /// A packet's acknowledgement was processed
    AcknowledgePacket(Packet),
    /// A packet timed out
    TimeoutPacket(Packet),
    /// An ordered channel was closed by a packet timeout
    ChannelClosed {
        /// The port
        port_id: PortId,
        /// The closed channel
        channel_id: ChannelId,
    },
}
