//! This module defines the [`LightClient`] capability set.

use core::fmt;

use ibc_classic_types::Height;

use crate::error::LightClientError;

/// Status of a light client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// The client verifies headers and proofs
    Active,
    /// Misbehaviour was detected; the client refuses every verification
    Frozen,
    /// The latest consensus state is older than the trusting period
    Expired,
    /// The status cannot be determined, e.g. no consensus state is stored
    Unknown,
}

impl Status {
    /// Returns true if the client is active.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "Active",
            Self::Frozen => "Frozen",
            Self::Expired => "Expired",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Read-only access to the consensus states a client has stored, keyed by height.
///
/// Implemented by the host over its store so light clients never touch storage directly.
pub trait ConsensusStateView {
    /// Returns the consensus state stored at exactly `height`.
    fn consensus_state(&self, height: Height) -> Option<Vec<u8>>;

    /// Returns the closest consensus state stored strictly below `height`.
    fn prev_consensus_state(&self, height: Height) -> Option<(Height, Vec<u8>)>;

    /// Returns the closest consensus state stored strictly above `height`.
    fn next_consensus_state(&self, height: Height) -> Option<(Height, Vec<u8>)>;
}

/// The result of applying a verified header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdatedState {
    /// The new client state
    pub client_state: Vec<u8>,
    /// The consensus states to store, keyed by height. Empty when the header was already
    /// applied, which makes replays idempotent.
    pub consensus_states: Vec<(Height, Vec<u8>)>,
}

/// The capability set every supported consensus type implements.
///
/// Verification and application are separate steps: `verify_*` and `check_for_misbehaviour`
/// never produce new state, so a message can be inspected before it is applied. Every method
/// is deterministic; times and heights are explicit inputs.
pub trait LightClient: Send + Sync {
    /// The client type, used as the prefix of generated client identifiers.
    fn client_type(&self) -> &'static str;

    /// Validates the initial client and consensus states and returns the latest height.
    ///
    /// # Errors
    /// Returns [`LightClientError::InvalidClientState`] or
    /// [`LightClientError::InvalidConsensusState`] if the parameters are malformed.
    fn initialize(&self, client_state: &[u8], consensus_state: &[u8])
        -> Result<Height, LightClientError>;

    /// Returns the latest height tracked by the client.
    ///
    /// # Errors
    /// Returns an error if the client state cannot be decoded.
    fn latest_height(&self, client_state: &[u8]) -> Result<Height, LightClientError>;

    /// Returns the timestamp (nanoseconds) of a consensus state.
    ///
    /// # Errors
    /// Returns an error if the consensus state cannot be decoded.
    fn consensus_timestamp(&self, consensus_state: &[u8]) -> Result<u64, LightClientError>;

    /// Returns the status of the client at host time `now`.
    ///
    /// # Errors
    /// Returns an error if the client state cannot be decoded.
    fn status(
        &self,
        client_state: &[u8],
        consensus_states: &dyn ConsensusStateView,
        now: u64,
    ) -> Result<Status, LightClientError>;

    /// Verifies a header or misbehaviour evidence against the trusted state.
    ///
    /// # Errors
    /// Returns [`LightClientError::InvalidHeader`], [`LightClientError::InvalidMisbehaviour`]
    /// or [`LightClientError::ClientFrozen`] if verification fails.
    fn verify_client_message(
        &self,
        client_state: &[u8],
        consensus_states: &dyn ConsensusStateView,
        client_message: &[u8],
    ) -> Result<(), LightClientError>;

    /// Returns true if a verified message is evidence of misbehaviour: conflicting headers at
    /// one height, or timestamps violating height monotonicity.
    ///
    /// # Errors
    /// Returns an error if the message cannot be decoded.
    fn check_for_misbehaviour(
        &self,
        client_state: &[u8],
        consensus_states: &dyn ConsensusStateView,
        client_message: &[u8],
    ) -> Result<bool, LightClientError>;

    /// Applies a verified header.
    ///
    /// # Errors
    /// Returns [`LightClientError::DuplicateConsensusState`] if an inconsistent consensus state
    /// already exists at the header's height.
    fn update_state(
        &self,
        client_state: &[u8],
        consensus_states: &dyn ConsensusStateView,
        client_message: &[u8],
    ) -> Result<UpdatedState, LightClientError>;

    /// Freezes the client after confirmed misbehaviour and returns the new client state.
    ///
    /// # Errors
    /// Returns an error if the client state cannot be decoded.
    fn update_state_on_misbehaviour(
        &self,
        client_state: &[u8],
        client_message: &[u8],
    ) -> Result<Vec<u8>, LightClientError>;

    /// Verifies that `value` is stored at `path` under the root of `consensus_state`.
    ///
    /// # Errors
    /// Returns [`LightClientError::ClientFrozen`] for a frozen client, or
    /// [`LightClientError::ProofVerificationFailed`] if the proof does not hold.
    fn verify_membership(
        &self,
        client_state: &[u8],
        consensus_state: &[u8],
        proof: &[u8],
        path: &[u8],
        value: &[u8],
    ) -> Result<(), LightClientError>;

    /// Verifies that nothing is stored at `path` under the root of `consensus_state`.
    ///
    /// # Errors
    /// Returns [`LightClientError::ClientFrozen`] for a frozen client, or
    /// [`LightClientError::ProofVerificationFailed`] if the proof does not hold.
    fn verify_non_membership(
        &self,
        client_state: &[u8],
        consensus_state: &[u8],
        proof: &[u8],
        path: &[u8],
    ) -> Result<(), LightClientError>;
}
