//! This module defines [`LightClientError`].

use ibc_classic_types::Height;

/// Errors returned by light client implementations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LightClientError {
    /// The client state parameters are malformed
    #[error("invalid client state: {reason}")]
    InvalidClientState {
        /// Reason for error
        reason: String,
    },

    /// The consensus state is malformed
    #[error("invalid consensus state: {reason}")]
    InvalidConsensusState {
        /// Reason for error
        reason: String,
    },

    /// A header failed verification
    #[error("invalid header: {reason}")]
    InvalidHeader {
        /// Reason for error
        reason: String,
    },

    /// Misbehaviour evidence failed verification
    #[error("invalid misbehaviour: {reason}")]
    InvalidMisbehaviour {
        /// Reason for error
        reason: String,
    },

    /// The client message is neither a header nor misbehaviour evidence
    #[error("unsupported client message: {reason}")]
    UnsupportedClientMessage {
        /// Reason for error
        reason: String,
    },

    /// The client is frozen and refuses every verification
    #[error("client is frozen")]
    ClientFrozen,

    /// A different consensus state is already stored at the height
    #[error("a conflicting consensus state already exists at height {0}")]
    DuplicateConsensusState(Height),

    /// No consensus state is stored at the height
    #[error("consensus state not found at height {0}")]
    ConsensusStateNotFound(Height),

    /// A membership or non-membership proof failed verification
    #[error("proof verification failed: {reason}")]
    ProofVerificationFailed {
        /// Reason for error
        reason: String,
    },

    /// The proof bytes could not be decoded
    #[error("invalid proof encoding: {reason}")]
    InvalidProof {
        /// Reason for error
        reason: String,
    },
}
