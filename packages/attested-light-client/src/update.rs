//! Attested light client update logic

use crate::{
    client_state::ClientState, consensus_state::ConsensusState, error::AttestedClientError,
    header::Header,
};

/// Applies a verified header.
///
/// Returns the new client state and the consensus state to store. The consensus state is `None`
/// when an identical one is already stored, which makes replays idempotent.
///
/// # Errors
/// Returns [`AttestedClientError::DuplicateConsensusState`] if a different consensus state is
/// already stored at the header's height.
pub fn update_consensus_state(
    current_client_state: ClientState,
    existing: Option<&ConsensusState>,
    header: &Header,
) -> Result<(ClientState, Option<ConsensusState>), AttestedClientError> {
    let new_consensus_state = header.consensus_state();

    if let Some(existing) = existing {
        if *existing != new_consensus_state {
            return Err(AttestedClientError::DuplicateConsensusState(header.height));
        }
        return Ok((current_client_state, None));
    }

    let latest_height = current_client_state.latest_height.max(header.height);
    let new_client_state = ClientState {
        latest_height,
        ..current_client_state
    };

    Ok((new_client_state, Some(new_consensus_state)))
}
