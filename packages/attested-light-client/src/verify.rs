//! Attested light client verification logic

use std::collections::BTreeSet;

use ed25519_dalek::{Signature, VerifyingKey};
use ibc_classic_types::ensure;

use crate::{
    client_state::ClientState,
    error::AttestedClientError,
    header::{Header, Misbehaviour},
};

/// Verifies that a quorum of distinct trusted attestors signed the header.
///
/// # Errors
/// Returns an error if:
/// - Fewer than `min_required_sigs` signatures are present
/// - An attestor signed more than once
/// - A signer is not in the attestor set
/// - A signature does not verify against the header digest
pub fn verify_signatures(
    client_state: &ClientState,
    header: &Header,
) -> Result<(), AttestedClientError> {
    let required = usize::from(client_state.min_required_sigs);
    ensure!(
        header.signatures.len() >= required,
        AttestedClientError::TooFewSignatures {
            found: header.signatures.len(),
            required,
        }
    );

    let digest = header.sign_bytes(&client_state.chain_id);
    let mut seen = BTreeSet::new();
    for sig in &header.signatures {
        ensure!(
            seen.insert(sig.attestor),
            AttestedClientError::DuplicateSigner(sig.attestor)
        );
        ensure!(
            client_state.is_attestor(&sig.attestor),
            AttestedClientError::UnknownSigner(sig.attestor)
        );

        let key = VerifyingKey::from_bytes(&sig.attestor)
            .map_err(|_| AttestedClientError::InvalidSignature(sig.attestor))?;
        key.verify_strict(&digest, &Signature::from_bytes(&sig.signature))
            .map_err(|_| AttestedClientError::InvalidSignature(sig.attestor))?;
    }

    Ok(())
}

/// Verifies a header against the client state.
///
/// Conflicts with stored consensus states are not rejected here; they are reported by
/// [`crate::misbehaviour::check_for_misbehaviour`] so the client can be frozen.
///
/// # Errors
/// Returns an error if:
/// - The client is frozen
/// - The header height is zero or on another revision
/// - The header timestamp is zero
/// - The signatures do not form a quorum. see [`verify_signatures`]
pub fn verify_header(
    client_state: &ClientState,
    header: &Header,
) -> Result<(), AttestedClientError> {
    ensure!(!client_state.is_frozen(), AttestedClientError::ClientFrozen);
    ensure!(
        !header.height.is_zero(),
        AttestedClientError::InvalidHeader {
            reason: "height must be non-zero".into(),
        }
    );
    ensure!(
        header.height.revision_number == client_state.latest_height.revision_number,
        AttestedClientError::InvalidHeader {
            reason: format!(
                "revision number {} does not match the client revision {}",
                header.height.revision_number, client_state.latest_height.revision_number
            ),
        }
    );
    ensure!(
        header.timestamp > 0,
        AttestedClientError::InvalidHeader {
            reason: "timestamp must be non-zero".into(),
        }
    );

    verify_signatures(client_state, header)
}

/// Verifies misbehaviour evidence: both headers carry a valid quorum and contradict each other.
///
/// # Errors
/// Returns [`AttestedClientError::ClientFrozen`] if the client is already frozen,
/// [`AttestedClientError::InvalidMisbehaviour`] if the headers do not conflict, or the
/// signature error of the first header that fails verification.
pub fn verify_misbehaviour(
    client_state: &ClientState,
    misbehaviour: &Misbehaviour,
) -> Result<(), AttestedClientError> {
    ensure!(!client_state.is_frozen(), AttestedClientError::ClientFrozen);
    ensure!(
        misbehaviour.is_conflicting(),
        AttestedClientError::InvalidMisbehaviour {
            reason: "headers do not conflict".into(),
        }
    );

    verify_header(client_state, &misbehaviour.header_1)?;
    verify_header(client_state, &misbehaviour.header_2)
}

#[cfg(test)]
mod tests {
    use ibc_classic_types::Height;
    use rstest::rstest;

    use super::*;
    use crate::{
        consensus_state::ConsensusState,
        test_utils::{attestor_keys, client_state, signed_header},
    };

    const CHAIN_ID: &str = "chain-b";

    fn consensus(timestamp: u64, root: u8) -> ConsensusState {
        ConsensusState {
            root: [root; 32],
            timestamp,
        }
    }

    #[test]
    fn accepts_quorum() {
        let keys = attestor_keys(3);
        let cs = client_state(CHAIN_ID, &keys, 2, Height::new(0, 1));
        let header = signed_header(CHAIN_ID, &keys[..2], Height::new(0, 5), consensus(10, 1));

        verify_header(&cs, &header).unwrap();
    }

    #[test]
    fn fails_on_frozen() {
        let keys = attestor_keys(3);
        let mut cs = client_state(CHAIN_ID, &keys, 2, Height::new(0, 1));
        cs.frozen_height = Some(Height::new(0, 1));
        let header = signed_header(CHAIN_ID, &keys, Height::new(0, 5), consensus(10, 1));

        assert_eq!(
            verify_header(&cs, &header),
            Err(AttestedClientError::ClientFrozen)
        );
    }

    #[test]
    fn fails_on_too_few_sigs() {
        let keys = attestor_keys(3);
        let cs = client_state(CHAIN_ID, &keys, 3, Height::new(0, 1));
        let header = signed_header(CHAIN_ID, &keys[..2], Height::new(0, 5), consensus(10, 1));

        assert_eq!(
            verify_header(&cs, &header),
            Err(AttestedClientError::TooFewSignatures {
                found: 2,
                required: 3
            })
        );
    }

    #[test]
    fn fails_on_duplicate_signer() {
        let keys = attestor_keys(3);
        let cs = client_state(CHAIN_ID, &keys, 2, Height::new(0, 1));
        let mut header = signed_header(CHAIN_ID, &keys[..1], Height::new(0, 5), consensus(10, 1));
        header.signatures.push(header.signatures[0].clone());

        assert_eq!(
            verify_header(&cs, &header),
            Err(AttestedClientError::DuplicateSigner(
                keys[0].verifying_key().to_bytes()
            ))
        );
    }

    #[test]
    fn fails_on_rogue_signer() {
        let keys = attestor_keys(4);
        let cs = client_state(CHAIN_ID, &keys[..3], 2, Height::new(0, 1));
        let header = signed_header(CHAIN_ID, &keys[2..], Height::new(0, 5), consensus(10, 1));

        assert_eq!(
            verify_header(&cs, &header),
            Err(AttestedClientError::UnknownSigner(
                keys[3].verifying_key().to_bytes()
            ))
        );
    }

    #[test]
    fn fails_on_signature_for_other_chain() {
        let keys = attestor_keys(3);
        let cs = client_state(CHAIN_ID, &keys, 2, Height::new(0, 1));
        let header = signed_header("chain-c", &keys, Height::new(0, 5), consensus(10, 1));

        assert!(matches!(
            verify_header(&cs, &header),
            Err(AttestedClientError::InvalidSignature(_))
        ));
    }

    #[test]
    fn fails_on_tampered_root() {
        let keys = attestor_keys(3);
        let cs = client_state(CHAIN_ID, &keys, 2, Height::new(0, 1));
        let mut header = signed_header(CHAIN_ID, &keys, Height::new(0, 5), consensus(10, 1));
        header.root = [9; 32];

        assert!(matches!(
            verify_header(&cs, &header),
            Err(AttestedClientError::InvalidSignature(_))
        ));
    }

    #[rstest]
    #[case::zero_height(Height::ZERO, 10, "height")]
    #[case::other_revision(Height::new(1, 5), 10, "revision")]
    #[case::zero_timestamp(Height::new(0, 5), 0, "timestamp")]
    fn fails_on_malformed_header(
        #[case] height: Height,
        #[case] timestamp: u64,
        #[case] expected: &str,
    ) {
        let keys = attestor_keys(3);
        let cs = client_state(CHAIN_ID, &keys, 2, Height::new(0, 1));
        let header = signed_header(CHAIN_ID, &keys, height, consensus(timestamp, 1));

        assert!(
            matches!(verify_header(&cs, &header), Err(AttestedClientError::InvalidHeader { reason }) if reason.contains(expected))
        );
    }

    #[test]
    fn misbehaviour_requires_conflict() {
        let keys = attestor_keys(3);
        let cs = client_state(CHAIN_ID, &keys, 2, Height::new(0, 1));
        let header = signed_header(CHAIN_ID, &keys, Height::new(0, 5), consensus(10, 1));
        let same = Misbehaviour {
            header_1: header.clone(),
            header_2: header.clone(),
        };
        assert!(matches!(
            verify_misbehaviour(&cs, &same),
            Err(AttestedClientError::InvalidMisbehaviour { .. })
        ));

        let fork = Misbehaviour {
            header_1: header,
            header_2: signed_header(CHAIN_ID, &keys, Height::new(0, 5), consensus(10, 2)),
        };
        verify_misbehaviour(&cs, &fork).unwrap();
    }

    #[test]
    fn misbehaviour_requires_quorum_on_both_headers() {
        let keys = attestor_keys(3);
        let cs = client_state(CHAIN_ID, &keys, 2, Height::new(0, 1));
        let fork = Misbehaviour {
            header_1: signed_header(CHAIN_ID, &keys, Height::new(0, 5), consensus(10, 1)),
            header_2: signed_header(CHAIN_ID, &keys[..1], Height::new(0, 5), consensus(10, 2)),
        };

        assert!(matches!(
            verify_misbehaviour(&cs, &fork),
            Err(AttestedClientError::TooFewSignatures { .. })
        ));
    }
}
