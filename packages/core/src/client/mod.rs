//! The client keeper: creation, updates, misbehaviour and status of light clients.

mod verify;

use std::sync::Arc;

use ibc_classic_light_client::{
    ConsensusStateView, LightClient, LightClientError, Status, UpdatedState,
};
use ibc_classic_types::{
    identifier::ClientId,
    path::{Path, NEXT_CLIENT_SEQUENCE},
    Height,
};

pub(crate) use verify::ProofTarget;

use crate::{
    engine::{IbcCore, Response},
    error::IbcError,
    events::IbcEvent,
    host::HostInfo,
    store::{next_counter, read_json, write_json, write_u64, Store},
};

/// Message creating a new light client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgCreateClient {
    /// The registered client type, e.g. `07-tendermint`
    pub client_type: String,
    /// Encoded initial client state
    pub client_state: Vec<u8>,
    /// Encoded initial consensus state
    pub consensus_state: Vec<u8>,
}

/// Message updating a light client with a header or misbehaviour evidence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgUpdateClient {
    /// The client to update
    pub client_id: ClientId,
    /// Encoded client message
    pub client_message: Vec<u8>,
}

/// Outcome of a client update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Consensus states were stored at the listed heights
    Updated(Vec<Height>),
    /// Misbehaviour was detected and the client is now frozen
    Frozen,
}

enum Transition {
    Update(UpdatedState),
    Freeze(Vec<u8>),
}

/// The consensus states of one client as stored under `clients/{client_id}/consensusStates/`.
pub(crate) struct StoredConsensusStates<'a> {
    store: &'a dyn Store,
    client_id: &'a ClientId,
}

impl<'a> StoredConsensusStates<'a> {
    pub(crate) const fn new(store: &'a dyn Store, client_id: &'a ClientId) -> Self {
        Self { store, client_id }
    }

    fn heights(&self) -> impl Iterator<Item = (Height, Vec<u8>)> {
        let prefix = format!("clients/{}/consensusStates/", self.client_id);
        self.store
            .range_prefix(prefix.as_bytes())
            .into_iter()
            .filter_map(move |(key, value)| {
                let height: Height = std::str::from_utf8(&key[prefix.len()..])
                    .ok()?
                    .parse()
                    .ok()?;
                Some((height, value))
            })
    }
}

impl ConsensusStateView for StoredConsensusStates<'_> {
    fn consensus_state(&self, height: Height) -> Option<Vec<u8>> {
        self.store
            .get(&Path::ConsensusState(self.client_id.clone(), height).to_key())
    }

    fn prev_consensus_state(&self, height: Height) -> Option<(Height, Vec<u8>)> {
        self.heights()
            .filter(|(h, _)| *h < height)
            .max_by_key(|(h, _)| *h)
    }

    fn next_consensus_state(&self, height: Height) -> Option<(Height, Vec<u8>)> {
        self.heights()
            .filter(|(h, _)| *h > height)
            .min_by_key(|(h, _)| *h)
    }
}

impl IbcCore {
    /// Creates a light client of a registered type. Returns the generated identifier
    /// `{client_type}-{n}`.
    ///
    /// # Errors
    /// Returns an error if the client type is unknown or the light client rejects the initial
    /// states.
    #[tracing::instrument(skip_all, fields(client_type = %msg.client_type))]
    pub fn create_client(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgCreateClient,
    ) -> Result<Response<ClientId>, IbcError> {
        let client = self
            .clients()
            .get(&msg.client_type)
            .ok_or_else(|| IbcError::UnsupportedClientType(msg.client_type.clone()))?;

        Self::execute(store, |store, events| {
            let sequence = next_counter(store, NEXT_CLIENT_SEQUENCE)?;
            let client_id = ClientId::new(&msg.client_type, sequence)?;
            let height = client
                .initialize(&msg.client_state, &msg.consensus_state)
                .map_err(|source| IbcError::LightClient {
                    client_id: client_id.clone(),
                    source,
                })?;

            store.set(
                Path::ClientType(client_id.clone()).to_key(),
                msg.client_type.clone().into_bytes(),
            );
            store.set(Path::ClientState(client_id.clone()).to_key(), msg.client_state);
            store_consensus_state(store, host, &client_id, height, msg.consensus_state)?;

            tracing::info!(%client_id, %height, "created client");
            events.push(IbcEvent::CreateClient {
                client_id: client_id.clone(),
                client_type: msg.client_type,
                consensus_height: height,
            });
            Ok(client_id)
        })
    }

    /// Updates a client with a header, or freezes it if the message proves misbehaviour.
    ///
    /// # Errors
    /// Returns an error if the client is unknown or not active, or the message fails
    /// verification.
    #[tracing::instrument(skip_all, fields(client_id = %msg.client_id))]
    pub fn update_client(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgUpdateClient,
    ) -> Result<Response<UpdateOutcome>, IbcError> {
        Self::execute(store, |store, events| {
            self.process_client_message(store, host, events, &msg.client_id, &msg.client_message)
        })
    }

    /// Freezes a client with misbehaviour evidence.
    ///
    /// # Errors
    /// Returns an error if the client is unknown or not active, the evidence fails
    /// verification, or it does not prove misbehaviour.
    #[tracing::instrument(skip_all, fields(client_id = %msg.client_id))]
    pub fn submit_misbehaviour(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgUpdateClient,
    ) -> Result<Response<()>, IbcError> {
        Self::execute(store, |store, events| {
            match self.process_client_message(
                store,
                host,
                events,
                &msg.client_id,
                &msg.client_message,
            )? {
                UpdateOutcome::Frozen => Ok(()),
                UpdateOutcome::Updated(_) => Err(IbcError::LightClient {
                    client_id: msg.client_id.clone(),
                    source: LightClientError::InvalidMisbehaviour {
                        reason: "client message does not prove misbehaviour".into(),
                    },
                }),
            }
        })
    }

    /// Returns the status of a client at the host time.
    ///
    /// # Errors
    /// Returns an error if the client is unknown or its state cannot be decoded.
    pub fn client_status(
        &self,
        store: &dyn Store,
        host: &HostInfo,
        client_id: &ClientId,
    ) -> Result<Status, IbcError> {
        let client = self.light_client(store, client_id)?;
        let client_state = self.client_state(store, client_id)?;
        client
            .status(
                &client_state,
                &StoredConsensusStates::new(store, client_id),
                host.timestamp,
            )
            .map_err(|source| IbcError::LightClient {
                client_id: client_id.clone(),
                source,
            })
    }

    /// Returns the encoded client state.
    ///
    /// # Errors
    /// Returns [`IbcError::ClientNotFound`] if the client does not exist.
    pub fn client_state(
        &self,
        store: &dyn Store,
        client_id: &ClientId,
    ) -> Result<Vec<u8>, IbcError> {
        store
            .get(&Path::ClientState(client_id.clone()).to_key())
            .ok_or_else(|| IbcError::ClientNotFound(client_id.clone()))
    }

    /// Returns the encoded consensus state at `height`.
    ///
    /// # Errors
    /// Returns [`IbcError::ConsensusStateNotFound`] if none is stored at the height.
    pub fn consensus_state(
        &self,
        store: &dyn Store,
        client_id: &ClientId,
        height: Height,
    ) -> Result<Vec<u8>, IbcError> {
        store
            .get(&Path::ConsensusState(client_id.clone(), height).to_key())
            .ok_or_else(|| IbcError::ConsensusStateNotFound {
                client_id: client_id.clone(),
                height,
            })
    }

    /// Returns the latest height tracked by a client.
    ///
    /// # Errors
    /// Returns an error if the client is unknown or its state cannot be decoded.
    pub fn client_latest_height(
        &self,
        store: &dyn Store,
        client_id: &ClientId,
    ) -> Result<Height, IbcError> {
        let client = self.light_client(store, client_id)?;
        client
            .latest_height(&self.client_state(store, client_id)?)
            .map_err(|source| IbcError::LightClient {
                client_id: client_id.clone(),
                source,
            })
    }

    pub(crate) fn light_client(
        &self,
        store: &dyn Store,
        client_id: &ClientId,
    ) -> Result<&Arc<dyn LightClient>, IbcError> {
        let client_type = store
            .get(&Path::ClientType(client_id.clone()).to_key())
            .ok_or_else(|| IbcError::ClientNotFound(client_id.clone()))?;
        let client_type = String::from_utf8(client_type)
            .map_err(|e| IbcError::corrupted(Path::ClientType(client_id.clone()), e))?;
        self.clients()
            .get(&client_type)
            .ok_or(IbcError::UnsupportedClientType(client_type))
    }

    /// Fails unless the client is active. A frozen client is reported loudly.
    pub(crate) fn ensure_client_active(
        &self,
        store: &dyn Store,
        host: &HostInfo,
        client_id: &ClientId,
    ) -> Result<(), IbcError> {
        match self.client_status(store, host, client_id)? {
            Status::Active => Ok(()),
            Status::Frozen => {
                tracing::error!(%client_id, "client is frozen, refusing traffic");
                Err(IbcError::ClientFrozen {
                    client_id: client_id.clone(),
                })
            }
            status => Err(IbcError::ClientNotActive {
                client_id: client_id.clone(),
                status,
            }),
        }
    }

    fn process_client_message(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        events: &mut Vec<IbcEvent>,
        client_id: &ClientId,
        client_message: &[u8],
    ) -> Result<UpdateOutcome, IbcError> {
        let client = self.light_client(store, client_id)?;
        self.ensure_client_active(store, host, client_id)?;
        let client_state = self.client_state(store, client_id)?;
        let light_client_err = |source| IbcError::LightClient {
            client_id: client_id.clone(),
            source,
        };

        let transition = {
            let view = StoredConsensusStates::new(store, client_id);
            client
                .verify_client_message(&client_state, &view, client_message)
                .map_err(light_client_err)?;
            if client
                .check_for_misbehaviour(&client_state, &view, client_message)
                .map_err(light_client_err)?
            {
                Transition::Freeze(
                    client
                        .update_state_on_misbehaviour(&client_state, client_message)
                        .map_err(light_client_err)?,
                )
            } else {
                Transition::Update(
                    client
                        .update_state(&client_state, &view, client_message)
                        .map_err(light_client_err)?,
                )
            }
        };

        match transition {
            Transition::Freeze(frozen) => {
                store.set(Path::ClientState(client_id.clone()).to_key(), frozen);
                tracing::error!(%client_id, "misbehaviour detected, client frozen");
                events.push(IbcEvent::ClientMisbehaviour {
                    client_id: client_id.clone(),
                });
                Ok(UpdateOutcome::Frozen)
            }
            Transition::Update(updated) => {
                store.set(
                    Path::ClientState(client_id.clone()).to_key(),
                    updated.client_state,
                );
                let mut heights = Vec::with_capacity(updated.consensus_states.len());
                for (height, consensus_state) in updated.consensus_states {
                    store_consensus_state(store, host, client_id, height, consensus_state)?;
                    heights.push(height);
                }
                tracing::info!(%client_id, ?heights, "updated client");
                events.push(IbcEvent::UpdateClient {
                    client_id: client_id.clone(),
                    consensus_heights: heights.clone(),
                });
                Ok(UpdateOutcome::Updated(heights))
            }
        }
    }
}

/// Stores a consensus state together with the host time and height it was processed at.
fn store_consensus_state(
    store: &mut dyn Store,
    host: &HostInfo,
    client_id: &ClientId,
    height: Height,
    consensus_state: Vec<u8>,
) -> Result<(), IbcError> {
    store.set(
        Path::ConsensusState(client_id.clone(), height).to_key(),
        consensus_state,
    );
    write_u64(
        store,
        &Path::ProcessedTime(client_id.clone(), height).to_key(),
        host.timestamp,
    );
    write_json(
        store,
        &Path::ProcessedHeight(client_id.clone(), height),
        &host.height,
    )
}

/// Returns the host height at which the consensus state at `height` was stored.
pub(crate) fn processed_height(
    store: &dyn Store,
    client_id: &ClientId,
    height: Height,
) -> Result<Option<Height>, IbcError> {
    read_json(store, &Path::ProcessedHeight(client_id.clone(), height))
}
