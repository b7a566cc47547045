//! This module defines [`IbcError`].

use ibc_classic_light_client::{LightClientError, Status};
use ibc_classic_types::{
    channel::State as ChannelState,
    connection::State as ConnectionState,
    error::IdentifierError,
    identifier::{ChannelId, ClientId, ConnectionId, PortId},
    Height, TypesError,
};

use crate::router::ModuleError;

/// The class of an [`IbcError`], telling a caller how to react.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input or unknown identifiers; never succeeds on resubmission
    Structural,
    /// A proof or header failed verification; may succeed with fresher proof material
    Verification,
    /// The operation is invalid for the current handshake or channel state
    State,
    /// An application callback rejected the operation
    Application,
}

/// Errors returned by the protocol engine.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IbcError {
    /// Malformed record or identifier
    #[error(transparent)]
    Types(#[from] TypesError),

    /// No light client implementation is registered for the client type
    #[error("unsupported client type: {0}")]
    UnsupportedClientType(String),

    /// The client does not exist
    #[error("client not found: {0}")]
    ClientNotFound(ClientId),

    /// The client is frozen after misbehaviour; all traffic over it is halted
    #[error("client {client_id} is frozen")]
    ClientFrozen {
        /// The frozen client
        client_id: ClientId,
    },

    /// The client is expired or its status cannot be determined
    #[error("client {client_id} is not active: {status}")]
    ClientNotActive {
        /// The client
        client_id: ClientId,
        /// Its current status
        status: Status,
    },

    /// The light client rejected a client state, consensus state or client message
    #[error("light client {client_id} error: {source}")]
    LightClient {
        /// The client
        client_id: ClientId,
        /// The light client error
        #[source]
        source: LightClientError,
    },

    /// No consensus state is stored at the proof height
    #[error("consensus state of client {client_id} not found at height {height}")]
    ConsensusStateNotFound {
        /// The client
        client_id: ClientId,
        /// The requested height
        height: Height,
    },

    /// A membership or non-membership proof failed verification
    #[error("verification of {path} failed: {source}")]
    VerificationFailed {
        /// The proven path
        path: String,
        /// The light client error
        #[source]
        source: LightClientError,
    },

    /// The connection delay period has not elapsed for the proof height
    #[error("delay period has not passed for proof height {proof_height}: {reason}")]
    DelayPeriodNotPassed {
        /// The proof height
        proof_height: Height,
        /// Which bound was not reached
        reason: String,
    },

    /// The consensus height the counterparty claims to track is in this chain's future
    #[error("consensus height {height} is not below the host height {host_height}")]
    InvalidConsensusHeight {
        /// The claimed height
        height: Height,
        /// The current host height
        host_height: Height,
    },

    /// The counterparty's client of this chain is invalid
    #[error("invalid client of this chain: {reason}")]
    InvalidSelfClient {
        /// Reason for error
        reason: String,
    },

    /// The connection does not exist
    #[error("connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// The connection is not in a state allowing the operation
    #[error("connection {connection_id} is {actual}, expected {expected}")]
    InvalidConnectionState {
        /// The connection
        connection_id: ConnectionId,
        /// The accepted states
        expected: String,
        /// The stored state
        actual: ConnectionState,
    },

    /// Version negotiation failed
    #[error("invalid version: {reason}")]
    InvalidVersion {
        /// Reason for error
        reason: String,
    },

    /// The counterparty of a handshake message is inconsistent with the stored record
    #[error("invalid counterparty: {reason}")]
    InvalidCounterparty {
        /// Reason for error
        reason: String,
    },

    /// The channel does not exist
    #[error("channel not found: {port_id}/{channel_id}")]
    ChannelNotFound {
        /// The port
        port_id: PortId,
        /// The channel
        channel_id: ChannelId,
    },

    /// The channel is closed
    #[error("channel {port_id}/{channel_id} is closed")]
    ChannelClosed {
        /// The port
        port_id: PortId,
        /// The channel
        channel_id: ChannelId,
    },

    /// The channel is not open for packets
    #[error("channel {port_id}/{channel_id} is {state}, not open")]
    ChannelNotOpen {
        /// The port
        port_id: PortId,
        /// The channel
        channel_id: ChannelId,
        /// The stored state
        state: ChannelState,
    },

    /// The channel is not in a state allowing the handshake step
    #[error("channel {port_id}/{channel_id} is {actual}, expected {expected}")]
    InvalidChannelState {
        /// The port
        port_id: PortId,
        /// The channel
        channel_id: ChannelId,
        /// The accepted states
        expected: String,
        /// The stored state
        actual: ChannelState,
    },

    /// The ordering is not supported or does not match the counterparty
    #[error("invalid channel ordering: {reason}")]
    InvalidChannelOrdering {
        /// Reason for error
        reason: String,
    },

    /// Connection hops other than a single direct hop
    #[error("invalid connection hops: {reason}")]
    InvalidConnectionHops {
        /// Reason for error
        reason: String,
    },

    /// No module is routed to the port
    #[error("no module is bound to port {0}")]
    PortNotBound(PortId),

    /// The port capability was already created
    #[error("port {0} is already bound")]
    PortAlreadyBound(PortId),

    /// No capability is stored under the name
    #[error("capability not found: {0}")]
    CapabilityNotFound(String),

    /// The capability does not authenticate for the name
    #[error("capability does not authenticate for {0}")]
    InvalidCapability(String),

    /// The name is already bound to a capability
    #[error("capability already claimed: {0}")]
    CapabilityAlreadyClaimed(String),

    /// The packet does not match the channel or is malformed
    #[error("invalid packet: {reason}")]
    InvalidPacket {
        /// Reason for error
        reason: String,
    },

    /// The packet timeout is unset or already elapsed
    #[error("invalid timeout: {reason}")]
    InvalidTimeout {
        /// Reason for error
        reason: String,
    },

    /// The packet expired before it was received
    #[error("packet {sequence} timed out at the receiving chain")]
    PacketTimedOut {
        /// Packet sequence
        sequence: u64,
    },

    /// The counterparty has not yet passed the packet's timeout
    #[error("packet {sequence} has not timed out at the proof height")]
    PacketTimeoutNotReached {
        /// Packet sequence
        sequence: u64,
    },

    /// An ordered channel received a packet out of sequence
    #[error("packet sequence out of order: expected {expected}, got {actual}")]
    PacketSequenceOutOfOrder {
        /// Next expected sequence
        expected: u64,
        /// Submitted sequence
        actual: u64,
    },

    /// The packet was already received on an unordered channel
    #[error("packet {sequence} was already received")]
    PacketAlreadyReceived {
        /// Packet sequence
        sequence: u64,
    },

    /// No commitment is stored for the packet: already acknowledged or timed out
    #[error("packet commitment {sequence} not found")]
    PacketCommitmentNotFound {
        /// Packet sequence
        sequence: u64,
    },

    /// The stored commitment was made for a different packet
    #[error("packet commitment {sequence} does not match the submitted packet")]
    PacketCommitmentMismatch {
        /// Packet sequence
        sequence: u64,
    },

    /// An acknowledgement was already written for the packet
    #[error("acknowledgement for packet {sequence} was already written")]
    AcknowledgementAlreadyWritten {
        /// Packet sequence
        sequence: u64,
    },

    /// A stored record could not be decoded
    #[error("corrupted state at {key}: {reason}")]
    CorruptedState {
        /// The store key
        key: String,
        /// Reason for error
        reason: String,
    },

    /// An application callback failed
    #[error("module on port {port_id} failed: {source}")]
    Module {
        /// The port of the module
        port_id: PortId,
        /// The callback error
        #[source]
        source: ModuleError,
    },
}

impl From<IdentifierError> for IbcError {
    fn from(err: IdentifierError) -> Self {
        Self::Types(err.into())
    }
}

impl IbcError {
    /// Returns the class of the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Types(_)
            | Self::UnsupportedClientType(_)
            | Self::ClientNotFound(_)
            | Self::ConnectionNotFound(_)
            | Self::InvalidVersion { .. }
            | Self::InvalidCounterparty { .. }
            | Self::ChannelNotFound { .. }
            | Self::InvalidChannelOrdering { .. }
            | Self::InvalidConnectionHops { .. }
            | Self::PortNotBound(_)
            | Self::CapabilityNotFound(_)
            | Self::InvalidCapability(_)
            | Self::InvalidPacket { .. }
            | Self::InvalidTimeout { .. } => ErrorKind::Structural,
            Self::LightClient { .. }
            | Self::ConsensusStateNotFound { .. }
            | Self::VerificationFailed { .. }
            | Self::DelayPeriodNotPassed { .. }
            | Self::InvalidConsensusHeight { .. }
            | Self::InvalidSelfClient { .. } => ErrorKind::Verification,
            Self::ClientFrozen { .. }
            | Self::ClientNotActive { .. }
            | Self::InvalidConnectionState { .. }
            | Self::ChannelClosed { .. }
            | Self::ChannelNotOpen { .. }
            | Self::InvalidChannelState { .. }
            | Self::PortAlreadyBound(_)
            | Self::CapabilityAlreadyClaimed(_)
            | Self::PacketTimedOut { .. }
            | Self::PacketTimeoutNotReached { .. }
            | Self::PacketSequenceOutOfOrder { .. }
            | Self::PacketAlreadyReceived { .. }
            | Self::PacketCommitmentNotFound { .. }
            | Self::PacketCommitmentMismatch { .. }
            | Self::AcknowledgementAlreadyWritten { .. }
            | Self::CorruptedState { .. } => ErrorKind::State,
            Self::Module { .. } => ErrorKind::Application,
        }
    }

    /// Returns true if the error only signals that a relayer submitted a message that was
    /// already processed. Relayers may treat it as success.
    #[must_use]
    pub const fn is_redundant_relay(&self) -> bool {
        matches!(
            self,
            Self::PacketCommitmentNotFound { .. } | Self::PacketAlreadyReceived { .. }
        )
    }

    /// Returns true if the error is caused by a frozen client.
    #[must_use]
    pub const fn is_client_frozen(&self) -> bool {
        matches!(
            self,
            Self::ClientFrozen { .. }
                | Self::LightClient {
                    source: LightClientError::ClientFrozen,
                    ..
                }
                | Self::VerificationFailed {
                    source: LightClientError::ClientFrozen,
                    ..
                }
        )
    }

    pub(crate) fn corrupted(key: impl ToString, reason: impl ToString) -> Self {
        Self::CorruptedState {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}
