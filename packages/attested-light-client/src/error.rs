//! This module defines [`AttestedClientError`] and [`MerkleError`].

use ibc_classic_light_client::LightClientError;
use ibc_classic_types::Height;

/// Errors of the sorted binary Merkle commitment scheme.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    /// The proof is for a different key
    #[error("proof key ({found}) does not match the requested key ({expected})",
        expected = hex_string(expected),
        found = hex_string(found)
    )]
    KeyMismatch {
        /// Requested key
        expected: Vec<u8>,
        /// Key carried by the proof
        found: Vec<u8>,
    },

    /// The proven value differs from the expected value
    #[error("proven value does not match the expected value")]
    ValueMismatch,

    /// The root computed from the proof differs from the trusted root
    #[error("computed root does not match the trusted root")]
    RootMismatch,

    /// The proof is structurally invalid
    #[error("malformed proof: {0}")]
    MalformedProof(&'static str),

    /// An existence proof was supplied where absence must be proven, or vice versa
    #[error("unexpected proof type, expected {expected} proof")]
    UnexpectedProofType {
        /// The expected proof type
        expected: &'static str,
    },
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Main error type for attested light client operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AttestedClientError {
    /// Client is frozen
    #[error("client is frozen")]
    ClientFrozen,

    /// Invalid client state parameters
    #[error("invalid client state: {reason}")]
    InvalidClientState {
        /// Reason for error
        reason: String,
    },

    /// Invalid consensus state
    #[error("invalid consensus state: {reason}")]
    InvalidConsensusState {
        /// Reason for error
        reason: String,
    },

    /// Invalid header
    #[error("invalid header: {reason}")]
    InvalidHeader {
        /// Reason for error
        reason: String,
    },

    /// Invalid misbehaviour evidence
    #[error("invalid misbehaviour: {reason}")]
    InvalidMisbehaviour {
        /// Reason for error
        reason: String,
    },

    /// Not enough signatures
    #[error("too few signatures: {found} found but {required} required")]
    TooFewSignatures {
        /// Signatures found
        found: usize,
        /// Signatures required
        required: usize,
    },

    /// The same attestor signed twice
    #[error("duplicate signature from attestor {}", hex_string(.0))]
    DuplicateSigner([u8; 32]),

    /// The signer is not in the trusted attestor set
    #[error("unknown attestor {}", hex_string(.0))]
    UnknownSigner([u8; 32]),

    /// Signature verification failed
    #[error("signature verification failed for attestor {}", hex_string(.0))]
    InvalidSignature([u8; 32]),

    /// A conflicting consensus state already exists
    #[error("a conflicting consensus state already exists at height {0}")]
    DuplicateConsensusState(Height),

    /// Merkle proof verification failed
    #[error("merkle proof verification failed: {0}")]
    Merkle(#[from] MerkleError),

    /// Serializing a state failed
    #[error("serializing {what} failed: {reason}")]
    Encode {
        /// What was being encoded
        what: &'static str,
        /// Reason for error
        reason: String,
    },

    /// Deserializing an input failed
    #[error("deserializing {what} failed: {reason}")]
    Decode {
        /// What was being decoded
        what: &'static str,
        /// Reason for error
        reason: String,
    },
}

impl AttestedClientError {
    /// Builds a [`AttestedClientError::Decode`] error from a serde error.
    #[must_use]
    pub fn decode(what: &'static str, err: &serde_json::Error) -> Self {
        Self::Decode {
            what,
            reason: err.to_string(),
        }
    }

    /// Builds a [`AttestedClientError::Encode`] error from a serde error.
    #[must_use]
    pub fn encode(what: &'static str, err: &serde_json::Error) -> Self {
        Self::Encode {
            what,
            reason: err.to_string(),
        }
    }
}

impl From<AttestedClientError> for LightClientError {
    fn from(err: AttestedClientError) -> Self {
        match err {
            AttestedClientError::ClientFrozen => Self::ClientFrozen,
            AttestedClientError::InvalidClientState { reason } => {
                Self::InvalidClientState { reason }
            }
            AttestedClientError::InvalidConsensusState { reason } => {
                Self::InvalidConsensusState { reason }
            }
            AttestedClientError::InvalidHeader { reason } => Self::InvalidHeader { reason },
            AttestedClientError::InvalidMisbehaviour { reason } => {
                Self::InvalidMisbehaviour { reason }
            }
            AttestedClientError::DuplicateConsensusState(height) => {
                Self::DuplicateConsensusState(height)
            }
            AttestedClientError::Merkle(err) => Self::ProofVerificationFailed {
                reason: err.to_string(),
            },
            AttestedClientError::Decode { what, reason } if what == "proof" => {
                Self::InvalidProof { reason }
            }
            AttestedClientError::Decode { what, reason } if what == "client message" => {
                Self::UnsupportedClientMessage { reason }
            }
            AttestedClientError::Decode { what, reason } if what == "client state" => {
                Self::InvalidClientState { reason }
            }
            AttestedClientError::Decode { what, reason } if what == "consensus state" => {
                Self::InvalidConsensusState { reason }
            }
            AttestedClientError::Encode { what, reason } if what == "consensus state" => {
                Self::InvalidConsensusState { reason }
            }
            AttestedClientError::Encode { reason, .. } => Self::InvalidClientState { reason },
            other @ (AttestedClientError::TooFewSignatures { .. }
            | AttestedClientError::DuplicateSigner(_)
            | AttestedClientError::UnknownSigner(_)
            | AttestedClientError::InvalidSignature(_)
            | AttestedClientError::Decode { .. }) => Self::InvalidHeader {
                reason: other.to_string(),
            },
        }
    }
}
