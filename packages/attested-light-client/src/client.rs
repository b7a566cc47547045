//! [`LightClient`] implementation of the attested client.

use ibc_classic_light_client::{
    ConsensusStateView, LightClient, LightClientError, Status, UpdatedState,
};
use ibc_classic_types::{ensure, Height};

use crate::{
    client_state::ClientState,
    consensus_state::ConsensusState,
    error::AttestedClientError,
    header::{ClientMessage, Header},
    membership, misbehaviour, update, verify,
};

/// Default client type of the attested client.
pub const CLIENT_TYPE: &str = "10-attested";

/// Light client trusting a quorum of ed25519 attestors to sign the counterparty's
/// commitment roots.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttestedLightClient;

fn stored(
    view: &dyn ConsensusStateView,
    height: Height,
) -> Result<Option<ConsensusState>, AttestedClientError> {
    view.consensus_state(height)
        .map(|bytes| ConsensusState::decode(&bytes))
        .transpose()
}

fn neighbours(
    view: &dyn ConsensusStateView,
    height: Height,
) -> Result<(Option<ConsensusState>, Option<ConsensusState>), AttestedClientError> {
    let prev = view
        .prev_consensus_state(height)
        .map(|(_, bytes)| ConsensusState::decode(&bytes))
        .transpose()?;
    let next = view
        .next_consensus_state(height)
        .map(|(_, bytes)| ConsensusState::decode(&bytes))
        .transpose()?;
    Ok((prev, next))
}

fn header_misbehaves(
    view: &dyn ConsensusStateView,
    header: &Header,
) -> Result<bool, AttestedClientError> {
    let existing = stored(view, header.height)?;
    let (prev, next) = neighbours(view, header.height)?;
    Ok(misbehaviour::check_for_misbehaviour(
        existing.as_ref(),
        prev.as_ref(),
        next.as_ref(),
        header,
    ))
}

impl LightClient for AttestedLightClient {
    fn client_type(&self) -> &'static str {
        CLIENT_TYPE
    }

    fn initialize(
        &self,
        client_state: &[u8],
        consensus_state: &[u8],
    ) -> Result<Height, LightClientError> {
        let client_state = ClientState::decode(client_state)?;
        client_state.validate()?;
        ensure!(
            !client_state.is_frozen(),
            LightClientError::InvalidClientState {
                reason: "client must not be frozen".into(),
            }
        );

        let consensus_state = ConsensusState::decode(consensus_state)?;
        ensure!(
            consensus_state.timestamp > 0,
            LightClientError::InvalidConsensusState {
                reason: "timestamp must be non-zero".into(),
            }
        );

        Ok(client_state.latest_height)
    }

    fn latest_height(&self, client_state: &[u8]) -> Result<Height, LightClientError> {
        Ok(ClientState::decode(client_state)?.latest_height)
    }

    fn consensus_timestamp(&self, consensus_state: &[u8]) -> Result<u64, LightClientError> {
        Ok(ConsensusState::decode(consensus_state)?.timestamp)
    }

    fn status(
        &self,
        client_state: &[u8],
        consensus_states: &dyn ConsensusStateView,
        now: u64,
    ) -> Result<Status, LightClientError> {
        let client_state = ClientState::decode(client_state)?;
        if client_state.is_frozen() {
            return Ok(Status::Frozen);
        }

        let Some(latest) = stored(consensus_states, client_state.latest_height)? else {
            return Ok(Status::Unknown);
        };

        if latest.timestamp.saturating_add(client_state.trusting_period) <= now {
            return Ok(Status::Expired);
        }

        Ok(Status::Active)
    }

    fn verify_client_message(
        &self,
        client_state: &[u8],
        _consensus_states: &dyn ConsensusStateView,
        client_message: &[u8],
    ) -> Result<(), LightClientError> {
        let client_state = ClientState::decode(client_state)?;
        match ClientMessage::decode(client_message)? {
            ClientMessage::Header(header) => verify::verify_header(&client_state, &header)?,
            ClientMessage::Misbehaviour(misbehaviour) => {
                verify::verify_misbehaviour(&client_state, &misbehaviour)?;
            }
        }
        Ok(())
    }

    fn check_for_misbehaviour(
        &self,
        _client_state: &[u8],
        consensus_states: &dyn ConsensusStateView,
        client_message: &[u8],
    ) -> Result<bool, LightClientError> {
        match ClientMessage::decode(client_message)? {
            ClientMessage::Header(header) => Ok(header_misbehaves(consensus_states, &header)?),
            // verified evidence is always misbehaviour
            ClientMessage::Misbehaviour(_) => Ok(true),
        }
    }

    fn update_state(
        &self,
        client_state: &[u8],
        consensus_states: &dyn ConsensusStateView,
        client_message: &[u8],
    ) -> Result<UpdatedState, LightClientError> {
        let ClientMessage::Header(header) = ClientMessage::decode(client_message)? else {
            return Err(LightClientError::UnsupportedClientMessage {
                reason: "misbehaviour cannot update the client state".into(),
            });
        };

        let client_state = ClientState::decode(client_state)?;
        let existing = stored(consensus_states, header.height)?;
        let (client_state, consensus_state) =
            update::update_consensus_state(client_state, existing.as_ref(), &header)?;

        let consensus_states = match consensus_state {
            Some(cons) => vec![(header.height, cons.encode()?)],
            None => vec![],
        };

        Ok(UpdatedState {
            client_state: client_state.encode()?,
            consensus_states,
        })
    }

    fn update_state_on_misbehaviour(
        &self,
        client_state: &[u8],
        _client_message: &[u8],
    ) -> Result<Vec<u8>, LightClientError> {
        let client_state = ClientState::decode(client_state)?;
        Ok(misbehaviour::freeze(client_state).encode()?)
    }

    fn verify_membership(
        &self,
        client_state: &[u8],
        consensus_state: &[u8],
        proof: &[u8],
        path: &[u8],
        value: &[u8],
    ) -> Result<(), LightClientError> {
        let client_state = ClientState::decode(client_state)?;
        let consensus_state = ConsensusState::decode(consensus_state)?;
        membership::verify_membership(&client_state, &consensus_state, proof, path, value)?;
        Ok(())
    }

    fn verify_non_membership(
        &self,
        client_state: &[u8],
        consensus_state: &[u8],
        proof: &[u8],
        path: &[u8],
    ) -> Result<(), LightClientError> {
        let client_state = ClientState::decode(client_state)?;
        let consensus_state = ConsensusState::decode(consensus_state)?;
        membership::verify_non_membership(&client_state, &consensus_state, proof, path)?;
        Ok(())
    }
}
