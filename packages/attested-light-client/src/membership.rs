//! Membership proof verification for the attested client

use ibc_classic_types::ensure;

use crate::{
    client_state::ClientState,
    consensus_state::ConsensusState,
    error::AttestedClientError,
    merkle::{self, CommitmentProof},
};

fn decode_proof(proof: &[u8]) -> Result<CommitmentProof, AttestedClientError> {
    serde_json::from_slice(proof).map_err(|e| AttestedClientError::decode("proof", &e))
}

/// Verifies that `value` is stored at `path` under the consensus state's root.
///
/// # Errors
/// Returns an error if the client is frozen, the proof cannot be decoded, or the proof does not
/// commit `value` at `path` under the root.
pub fn verify_membership(
    client_state: &ClientState,
    consensus_state: &ConsensusState,
    proof: &[u8],
    path: &[u8],
    value: &[u8],
) -> Result<(), AttestedClientError> {
    ensure!(!client_state.is_frozen(), AttestedClientError::ClientFrozen);

    let proof = decode_proof(proof)?;
    merkle::verify_membership(&consensus_state.root, &proof, path, value)?;
    Ok(())
}

/// Verifies that nothing is stored at `path` under the consensus state's root.
///
/// # Errors
/// Returns an error if the client is frozen, the proof cannot be decoded, or the proof does not
/// establish the absence of `path` under the root.
pub fn verify_non_membership(
    client_state: &ClientState,
    consensus_state: &ConsensusState,
    proof: &[u8],
    path: &[u8],
) -> Result<(), AttestedClientError> {
    ensure!(!client_state.is_frozen(), AttestedClientError::ClientFrozen);

    let proof = decode_proof(proof)?;
    merkle::verify_non_membership(&consensus_state.root, &proof, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use ibc_classic_types::Height;

    use super::*;
    use crate::{error::MerkleError, merkle::MerkleTree};

    fn client_state() -> ClientState {
        ClientState {
            chain_id: "chain-b".to_string(),
            attestors: vec![[1; 32]],
            min_required_sigs: 1,
            trusting_period: 1_000,
            latest_height: Height::new(0, 10),
            frozen_height: None,
        }
    }

    fn committed() -> (MerkleTree, ConsensusState) {
        let tree = MerkleTree::new([
            ("ibc/commitments/ports/transfer/channels/channel-0/sequences/1", "c1"),
            ("ibc/connections/connection-0", "conn"),
        ]);
        let cons = ConsensusState {
            root: tree.root(),
            timestamp: 100,
        };
        (tree, cons)
    }

    #[test]
    fn succeeds() {
        let (tree, cons) = committed();
        let path = b"ibc/connections/connection-0";
        let proof = serde_json::to_vec(&tree.prove(path)).unwrap();

        verify_membership(&client_state(), &cons, &proof, path, b"conn").unwrap();
    }

    #[test]
    fn proves_absence() {
        let (tree, cons) = committed();
        let path = b"ibc/receipts/ports/transfer/channels/channel-0/sequences/1";
        let proof = serde_json::to_vec(&tree.prove(path)).unwrap();

        verify_non_membership(&client_state(), &cons, &proof, path).unwrap();
        assert!(matches!(
            verify_membership(&client_state(), &cons, &proof, path, b"\x01"),
            Err(AttestedClientError::Merkle(MerkleError::UnexpectedProofType { .. }))
        ));
    }

    #[test]
    fn fails_on_frozen() {
        let (tree, cons) = committed();
        let path = b"ibc/connections/connection-0";
        let proof = serde_json::to_vec(&tree.prove(path)).unwrap();
        let mut cs = client_state();
        cs.frozen_height = Some(Height::new(0, 1));

        assert_eq!(
            verify_membership(&cs, &cons, &proof, path, b"conn"),
            Err(AttestedClientError::ClientFrozen)
        );
        assert_eq!(
            verify_non_membership(&cs, &cons, &proof, path),
            Err(AttestedClientError::ClientFrozen)
        );
    }

    #[test]
    fn fails_on_undecodable_proof() {
        let (_, cons) = committed();
        assert!(matches!(
            verify_membership(&client_state(), &cons, b"not json", b"k", b"v"),
            Err(AttestedClientError::Decode { what: "proof", .. })
        ));
    }
}
