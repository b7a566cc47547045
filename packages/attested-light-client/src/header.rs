//! Attested header and client message types

use ibc_classic_types::Height;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use sha2::{Digest, Sha256};

use crate::{consensus_state::ConsensusState, error::AttestedClientError};

/// Domain tag prepended to every signed header digest.
pub const SIGN_DOMAIN: &[u8] = b"ibc-classic/attested-header/v1";

/// One attestor's signature over a header
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestorSignature {
    /// Ed25519 public key of the attestor
    #[serde_as(as = "Hex")]
    pub attestor: [u8; 32],
    /// Ed25519 signature over [`Header::sign_bytes`]
    #[serde_as(as = "Hex")]
    pub signature: [u8; 64],
}

/// Header attesting to the counterparty's commitment root at one height
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// The attested height
    pub height: Height,
    /// Block timestamp at `height` in nanoseconds
    pub timestamp: u64,
    /// Commitment root at `height`
    #[serde_as(as = "Hex")]
    pub root: [u8; 32],
    /// Attestor signatures over the header
    pub signatures: Vec<AttestorSignature>,
}

impl Header {
    /// The digest signed by attestors.
    /// Format: `sha256(domain || len(chain_id) || chain_id || revision_number ||
    /// revision_height || timestamp || root)`, integers big-endian.
    #[must_use]
    pub fn sign_bytes(&self, chain_id: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(SIGN_DOMAIN);
        hasher.update((chain_id.len() as u64).to_be_bytes());
        hasher.update(chain_id.as_bytes());
        hasher.update(self.height.revision_number.to_be_bytes());
        hasher.update(self.height.revision_height.to_be_bytes());
        hasher.update(self.timestamp.to_be_bytes());
        hasher.update(self.root);
        hasher.finalize().into()
    }

    /// The consensus state this header attests to.
    #[must_use]
    pub const fn consensus_state(&self) -> ConsensusState {
        ConsensusState {
            root: self.root,
            timestamp: self.timestamp,
        }
    }
}

/// Evidence of two conflicting headers signed by the attestor quorum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Misbehaviour {
    /// First header
    pub header_1: Header,
    /// Second header
    pub header_2: Header,
}

impl Misbehaviour {
    /// Returns true if the headers contradict each other: same height with a different
    /// consensus state, or timestamps that do not increase with height.
    #[must_use]
    pub fn is_conflicting(&self) -> bool {
        let (h1, h2) = (&self.header_1, &self.header_2);
        match h1.height.cmp(&h2.height) {
            core::cmp::Ordering::Equal => h1.consensus_state() != h2.consensus_state(),
            core::cmp::Ordering::Less => h1.timestamp >= h2.timestamp,
            core::cmp::Ordering::Greater => h1.timestamp <= h2.timestamp,
        }
    }
}

/// The messages accepted by the attested client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientMessage {
    /// A new header
    Header(Header),
    /// Conflicting headers
    Misbehaviour(Misbehaviour),
}

impl ClientMessage {
    /// Decodes a client message.
    ///
    /// # Errors
    /// Returns [`AttestedClientError::Decode`] if the bytes are neither a header nor misbehaviour.
    pub fn decode(bytes: &[u8]) -> Result<Self, AttestedClientError> {
        serde_json::from_slice(bytes)
            .map_err(|e| AttestedClientError::decode("client message", &e))
    }

    /// Encodes the client message.
    ///
    /// # Errors
    /// Returns [`AttestedClientError::Encode`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, AttestedClientError> {
        serde_json::to_vec(self).map_err(|e| AttestedClientError::encode("client message", &e))
    }
}
