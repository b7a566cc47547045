//! Packets and acknowledgements.

use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

use crate::{
    error::TypesError,
    height::Height,
    identifier::{ChannelId, PortId},
};

/// A packet travelling from a source channel end to a destination channel end.
///
/// Packets are never persisted whole; only their commitment is stored by the sender.
#[serde_as]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Sequence allocated by the sending channel end
    pub sequence: u64,
    /// Source port
    pub source_port: PortId,
    /// Source channel
    pub source_channel: ChannelId,
    /// Destination port
    pub destination_port: PortId,
    /// Destination channel
    pub destination_channel: ChannelId,
    /// Opaque application data
    #[serde_as(as = "Base64")]
    pub data: Vec<u8>,
    /// Destination height at which the packet expires, zero if disabled
    pub timeout_height: Height,
    /// Destination timestamp (nanoseconds) at which the packet expires, zero if disabled
    pub timeout_timestamp: u64,
}

impl Packet {
    /// Returns true if at least one timeout is set.
    #[must_use]
    pub const fn has_timeout(&self) -> bool {
        !self.timeout_height.is_zero() || self.timeout_timestamp != 0
    }

    /// Returns true if the packet has expired at the given destination height and timestamp.
    #[must_use]
    pub fn timed_out(&self, height: Height, timestamp: u64) -> bool {
        let height_elapsed = !self.timeout_height.is_zero() && height >= self.timeout_height;
        let timestamp_elapsed = self.timeout_timestamp != 0 && timestamp >= self.timeout_timestamp;
        height_elapsed || timestamp_elapsed
    }

    /// Validates the structural fields of the packet.
    ///
    /// # Errors
    /// Returns an error if the sequence is zero, or no timeout is set.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.sequence == 0 {
            return Err(TypesError::InvalidPacket {
                reason: "packet sequence cannot be 0".into(),
            });
        }
        if !self.has_timeout() {
            return Err(TypesError::InvalidPacket {
                reason: "packet timeout height and timeout timestamp cannot both be 0".into(),
            });
        }
        Ok(())
    }
}

/// The acknowledgement envelope written by the receiving chain.
///
/// Encoded as `{"result": "<base64>"}` on success or `{"error": "<reason>"}` on failure.
#[serde_as]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Acknowledgement {
    /// The application processed the packet
    Result(#[serde_as(as = "Base64")] Vec<u8>),
    /// The application rejected the packet
    Error(String),
}

impl Acknowledgement {
    /// Creates a success acknowledgement.
    #[must_use]
    pub fn success(result: impl Into<Vec<u8>>) -> Self {
        Self::Result(result.into())
    }

    /// Creates an error acknowledgement.
    #[must_use]
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error(reason.into())
    }

    /// Returns true for a success acknowledgement.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    /// Returns the bytes that are written to the store and relayed to the sender.
    ///
    /// # Errors
    /// Returns an error if the envelope cannot be serialized.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypesError> {
        serde_json::to_vec(self).map_err(|e| TypesError::InvalidAcknowledgement {
            reason: e.to_string(),
        })
    }

    /// Decodes an envelope relayed from the receiving chain.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid envelope.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        serde_json::from_slice(bytes).map_err(|e| TypesError::InvalidAcknowledgement {
            reason: e.to_string(),
        })
    }
}
