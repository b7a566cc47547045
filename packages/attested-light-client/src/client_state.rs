//! Attested client state

use std::collections::BTreeSet;

use ibc_classic_types::{ensure, Height};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::error::AttestedClientError;

/// The height a client is frozen at after misbehaviour was confirmed.
pub const FROZEN_HEIGHT: Height = Height::new(0, 1);

/// Client state of the attested light client
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    /// Chain id of the counterparty; bound into every signed header
    pub chain_id: String,
    /// Ed25519 public keys of the trusted attestors
    #[serde_as(as = "Vec<Hex>")]
    pub attestors: Vec<[u8; 32]>,
    /// Minimum number of distinct attestor signatures on a header
    pub min_required_sigs: u8,
    /// Nanoseconds after the latest consensus timestamp before the client expires
    pub trusting_period: u64,
    /// Latest height the client has a consensus state for
    pub latest_height: Height,
    /// Set once misbehaviour was confirmed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen_height: Option<Height>,
}

impl ClientState {
    /// Returns true if the client was frozen by misbehaviour.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen_height.is_some()
    }

    /// Returns true if `attestor` is in the trusted set.
    #[must_use]
    pub fn is_attestor(&self, attestor: &[u8; 32]) -> bool {
        self.attestors.contains(attestor)
    }

    /// Checks the parameters of a client state.
    ///
    /// # Errors
    /// Returns [`AttestedClientError::InvalidClientState`] if a parameter is out of range.
    pub fn validate(&self) -> Result<(), AttestedClientError> {
        let invalid = |reason: &str| AttestedClientError::InvalidClientState {
            reason: reason.to_string(),
        };

        ensure!(!self.chain_id.is_empty(), invalid("chain id is empty"));
        ensure!(!self.attestors.is_empty(), invalid("attestor set is empty"));
        ensure!(
            self.attestors.iter().collect::<BTreeSet<_>>().len() == self.attestors.len(),
            invalid("attestor set contains duplicates")
        );
        ensure!(
            self.min_required_sigs > 0
                && usize::from(self.min_required_sigs) <= self.attestors.len(),
            invalid("min_required_sigs must be between 1 and the number of attestors")
        );
        ensure!(
            self.trusting_period > 0,
            invalid("trusting period must be positive")
        );
        ensure!(
            !self.latest_height.is_zero(),
            invalid("latest height must be non-zero")
        );

        Ok(())
    }

    /// Decodes a client state.
    ///
    /// # Errors
    /// Returns [`AttestedClientError::Decode`] if the bytes are not a client state.
    pub fn decode(bytes: &[u8]) -> Result<Self, AttestedClientError> {
        serde_json::from_slice(bytes).map_err(|e| AttestedClientError::decode("client state", &e))
    }

    /// Encodes the client state.
    ///
    /// # Errors
    /// Returns [`AttestedClientError::Encode`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, AttestedClientError> {
        serde_json::to_vec(self).map_err(|e| AttestedClientError::encode("client state", &e))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn client_state() -> ClientState {
        ClientState {
            chain_id: "chain-b".to_string(),
            attestors: vec![[1; 32], [2; 32], [3; 32]],
            min_required_sigs: 2,
            trusting_period: 1_000,
            latest_height: Height::new(0, 10),
            frozen_height: None,
        }
    }

    #[test]
    fn valid_client_state() {
        client_state().validate().unwrap();
    }

    #[rstest]
    #[case::empty_chain_id(|cs: &mut ClientState| cs.chain_id.clear(), "chain id")]
    #[case::no_attestors(|cs: &mut ClientState| cs.attestors.clear(), "empty")]
    #[case::duplicate_attestors(|cs: &mut ClientState| cs.attestors[1] = [1; 32], "duplicates")]
    #[case::zero_threshold(|cs: &mut ClientState| cs.min_required_sigs = 0, "min_required_sigs")]
    #[case::threshold_above_set(|cs: &mut ClientState| cs.min_required_sigs = 4, "min_required_sigs")]
    #[case::zero_trusting_period(|cs: &mut ClientState| cs.trusting_period = 0, "trusting period")]
    #[case::zero_height(|cs: &mut ClientState| cs.latest_height = Height::ZERO, "latest height")]
    fn rejects_invalid_parameters(#[case] mutate: fn(&mut ClientState), #[case] expected: &str) {
        let mut cs = client_state();
        mutate(&mut cs);
        assert!(
            matches!(cs.validate(), Err(AttestedClientError::InvalidClientState { reason }) if reason.contains(expected))
        );
    }

    #[test]
    fn encoding_omits_unfrozen_height() {
        let encoded = client_state().encode().unwrap();
        let json = String::from_utf8(encoded.clone()).unwrap();
        assert!(!json.contains("frozen_height"));
        assert_eq!(ClientState::decode(&encoded).unwrap(), client_state());
    }
}
