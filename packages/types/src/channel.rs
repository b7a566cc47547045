//! Channel ends.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::identifier::{ChannelId, ConnectionId, PortId};

/// Handshake state of a channel end. `Closed` is terminal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// The handshake was started on this chain
    Init,
    /// The counterparty's init was verified and this end replied
    TryOpen,
    /// The channel is open for packets
    Open,
    /// The channel was closed and can never be reopened
    Closed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "INIT",
            Self::TryOpen => "TRYOPEN",
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

/// Delivery ordering of a channel.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Order {
    /// Packets are delivered in strict sequence order without gaps
    Ordered,
    /// Packets may be delivered in any order, each at most once
    Unordered,
}

impl Order {
    /// Returns the other ordering.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Ordered => Self::Unordered,
            Self::Unordered => Self::Ordered,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ordered => "ORDERED",
            Self::Unordered => "UNORDERED",
        };
        f.write_str(s)
    }
}

/// The counterparty side of a channel end.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Counterparty {
    /// The counterparty port
    pub port_id: PortId,
    /// The counterparty channel, unknown until the counterparty replies
    pub channel_id: Option<ChannelId>,
}

impl Counterparty {
    /// Creates a new counterparty.
    #[must_use]
    pub const fn new(port_id: PortId, channel_id: Option<ChannelId>) -> Self {
        Self {
            port_id,
            channel_id,
        }
    }
}

/// A channel end as stored under `channelEnds/ports/{port_id}/channels/{channel_id}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChannelEnd {
    /// Handshake state
    pub state: State,
    /// Delivery ordering
    pub ordering: Order,
    /// The counterparty end
    pub counterparty: Counterparty,
    /// The connections the channel runs over, exactly one for direct channels
    pub connection_hops: Vec<ConnectionId>,
    /// The application version
    pub version: String,
}

impl ChannelEnd {
    /// Returns true if the channel is OPEN.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    /// Returns true if the channel is CLOSED.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    /// Returns the first connection hop.
    #[must_use]
    pub fn connection_id(&self) -> Option<&ConnectionId> {
        self.connection_hops.first()
    }

    /// Returns the canonical bytes that are stored and proven for this end.
    ///
    /// # Errors
    /// Returns an error if the record cannot be serialized.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
