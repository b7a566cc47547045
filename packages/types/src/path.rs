//! ICS-24 store paths.
//!
//! Every record the engine persists, and every record it proves on a counterparty, lives under
//! one of these paths. The string layout must be identical on both chains since the
//! counterparty proves membership of the exact key bytes.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    height::Height,
    identifier::{ChannelId, ClientId, ConnectionId, PortId},
};

/// Key of the persisted client identifier counter.
pub const NEXT_CLIENT_SEQUENCE: &str = "nextClientSequence";
/// Key of the persisted connection identifier counter.
pub const NEXT_CONNECTION_SEQUENCE: &str = "nextConnectionSequence";
/// Key of the persisted channel identifier counter.
pub const NEXT_CHANNEL_SEQUENCE: &str = "nextChannelSequence";

/// A typed ICS-24 path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Path {
    /// `clients/{client_id}/clientType`
    ClientType(ClientId),
    /// `clients/{client_id}/clientState`
    ClientState(ClientId),
    /// `clients/{client_id}/consensusStates/{height}`
    ConsensusState(ClientId, Height),
    /// `clients/{client_id}/processedTimes/{height}`
    ProcessedTime(ClientId, Height),
    /// `clients/{client_id}/processedHeights/{height}`
    ProcessedHeight(ClientId, Height),
    /// `clients/{client_id}/connections`
    ClientConnections(ClientId),
    /// `connections/{connection_id}`
    Connection(ConnectionId),
    /// `ports/{port_id}`
    Port(PortId),
    /// `channelEnds/ports/{port_id}/channels/{channel_id}`
    ChannelEnd(PortId, ChannelId),
    /// `capabilities/ports/{port_id}/channels/{channel_id}`
    ChannelCapability(PortId, ChannelId),
    /// `nextSequenceSend/ports/{port_id}/channels/{channel_id}`
    NextSequenceSend(PortId, ChannelId),
    /// `nextSequenceRecv/ports/{port_id}/channels/{channel_id}`
    NextSequenceRecv(PortId, ChannelId),
    /// `nextSequenceAck/ports/{port_id}/channels/{channel_id}`
    NextSequenceAck(PortId, ChannelId),
    /// `commitments/ports/{port_id}/channels/{channel_id}/sequences/{sequence}`
    Commitment(PortId, ChannelId, u64),
    /// `receipts/ports/{port_id}/channels/{channel_id}/sequences/{sequence}`
    Receipt(PortId, ChannelId, u64),
    /// `acks/ports/{port_id}/channels/{channel_id}/sequences/{sequence}`
    Ack(PortId, ChannelId, u64),
}

impl Path {
    /// Returns the path as store key bytes.
    #[must_use]
    pub fn to_key(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientType(client) => write!(f, "clients/{client}/clientType"),
            Self::ClientState(client) => write!(f, "clients/{client}/clientState"),
            Self::ConsensusState(client, height) => {
                write!(f, "clients/{client}/consensusStates/{height}")
            }
            Self::ProcessedTime(client, height) => {
                write!(f, "clients/{client}/processedTimes/{height}")
            }
            Self::ProcessedHeight(client, height) => {
                write!(f, "clients/{client}/processedHeights/{height}")
            }
            Self::ClientConnections(client) => write!(f, "clients/{client}/connections"),
            Self::Connection(connection) => write!(f, "connections/{connection}"),
            Self::Port(port) => write!(f, "ports/{port}"),
            Self::ChannelEnd(port, channel) => {
                write!(f, "channelEnds/ports/{port}/channels/{channel}")
            }
            Self::ChannelCapability(port, channel) => {
                write!(f, "capabilities/ports/{port}/channels/{channel}")
            }
            Self::NextSequenceSend(port, channel) => {
                write!(f, "nextSequenceSend/ports/{port}/channels/{channel}")
            }
            Self::NextSequenceRecv(port, channel) => {
                write!(f, "nextSequenceRecv/ports/{port}/channels/{channel}")
            }
            Self::NextSequenceAck(port, channel) => {
                write!(f, "nextSequenceAck/ports/{port}/channels/{channel}")
            }
            Self::Commitment(port, channel, sequence) => write!(
                f,
                "commitments/ports/{port}/channels/{channel}/sequences/{sequence}"
            ),
            Self::Receipt(port, channel, sequence) => write!(
                f,
                "receipts/ports/{port}/channels/{channel}/sequences/{sequence}"
            ),
            Self::Ack(port, channel, sequence) => {
                write!(f, "acks/ports/{port}/channels/{channel}/sequences/{sequence}")
            }
        }
    }
}

/// The store prefix under which a chain commits its IBC state, e.g. `ibc`.
///
/// A counterparty proves a path by checking the key `{prefix}/{path}` under its commitment
/// root.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CommitmentPrefix(String);

impl CommitmentPrefix {
    /// Creates a new prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    /// Returns true if the prefix is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the prefix as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Applies the prefix to `path`, producing the key bytes proven under the commitment root.
    #[must_use]
    pub fn apply(&self, path: &Path) -> Vec<u8> {
        format!("{}/{path}", self.0).into_bytes()
    }
}

impl Default for CommitmentPrefix {
    fn default() -> Self {
        Self::new("ibc")
    }
}
