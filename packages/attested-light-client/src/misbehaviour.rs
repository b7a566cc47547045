//! Misbehaviour detection and freezing

use crate::{
    client_state::{ClientState, FROZEN_HEIGHT},
    consensus_state::ConsensusState,
    header::Header,
};

/// Returns true if a verified header contradicts the stored consensus states.
///
/// The header conflicts when a different consensus state is stored at its height, or when its
/// timestamp does not lie strictly between the closest stored neighbours.
#[must_use]
pub fn check_for_misbehaviour(
    existing: Option<&ConsensusState>,
    prev: Option<&ConsensusState>,
    next: Option<&ConsensusState>,
    header: &Header,
) -> bool {
    if let Some(existing) = existing {
        return *existing != header.consensus_state();
    }

    prev.is_some_and(|prev| header.timestamp <= prev.timestamp)
        || next.is_some_and(|next| header.timestamp >= next.timestamp)
}

/// Freezes the client.
#[must_use]
pub fn freeze(client_state: ClientState) -> ClientState {
    ClientState {
        frozen_height: Some(FROZEN_HEIGHT),
        ..client_state
    }
}
