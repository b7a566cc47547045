//! This module defines [`HostInfo`] and [`SelfClientValidator`].

use ibc_classic_types::Height;

/// The host chain's current height and block time, supplied with every operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HostInfo {
    /// Current height of the host chain
    pub height: Height,
    /// Current block timestamp in nanoseconds
    pub timestamp: u64,
}

impl HostInfo {
    /// Creates a new host info.
    #[must_use]
    pub const fn new(height: Height, timestamp: u64) -> Self {
        Self { height, timestamp }
    }
}

/// Host-supplied introspection of the host chain's own consensus.
///
/// During the connection handshake each side proves the client it holds of the other. The
/// host knows how its own consensus is tracked by counterparty clients, so it validates those
/// proofs' expected values.
pub trait SelfClientValidator: Send + Sync {
    /// Validates the client state a counterparty keeps of this chain.
    ///
    /// # Errors
    /// Returns a reason if the client state does not track this chain correctly.
    fn validate_self_client(&self, client_state: &[u8], host: &HostInfo) -> Result<(), String>;

    /// Returns this chain's consensus state at `height`, encoded the way a counterparty
    /// client stores it.
    fn self_consensus_state(&self, height: Height) -> Option<Vec<u8>>;
}
