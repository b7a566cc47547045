//! Attested consensus state

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::error::AttestedClientError;

/// Consensus state of the attested light client at one height
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusState {
    /// Root of the counterparty's commitment tree
    #[serde_as(as = "Hex")]
    pub root: [u8; 32],
    /// Block timestamp in nanoseconds
    pub timestamp: u64,
}

impl ConsensusState {
    /// Decodes a consensus state.
    ///
    /// # Errors
    /// Returns [`AttestedClientError::Decode`] if the bytes are not a consensus state.
    pub fn decode(bytes: &[u8]) -> Result<Self, AttestedClientError> {
        serde_json::from_slice(bytes)
            .map_err(|e| AttestedClientError::decode("consensus state", &e))
    }

    /// Encodes the consensus state.
    ///
    /// # Errors
    /// Returns [`AttestedClientError::Encode`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, AttestedClientError> {
        serde_json::to_vec(self).map_err(|e| AttestedClientError::encode("consensus state", &e))
    }
}
