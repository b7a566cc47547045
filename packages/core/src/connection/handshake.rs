//! `ConnOpenInit`, `ConnOpenTry`, `ConnOpenAck` and `ConnOpenConfirm`.

use ibc_classic_types::{
    connection::{is_supported_version, pick_version, ConnectionEnd, Counterparty, State},
    ensure,
    identifier::{ClientId, ConnectionId},
    path::{Path, NEXT_CONNECTION_SEQUENCE},
    Height,
};

use super::{
    add_client_connection, attributes, ensure_connection_state, load_connection,
    store_connection, MsgConnectionOpenAck, MsgConnectionOpenConfirm, MsgConnectionOpenInit,
    MsgConnectionOpenTry,
};
use crate::{
    client::ProofTarget,
    engine::{IbcCore, Response},
    error::IbcError,
    events::IbcEvent,
    host::HostInfo,
    store::{next_counter, Store},
};

/// The counterparty's view of this chain, proven during `ConnOpenTry` and `ConnOpenAck`.
struct SelfClientProof<'a> {
    client_state: &'a [u8],
    proof_client: &'a [u8],
    consensus_height: Height,
    consensus_state: Vec<u8>,
    proof_consensus: &'a [u8],
}

impl IbcCore {
    /// Starts a connection handshake. Returns the new connection identifier.
    ///
    /// # Errors
    /// Returns an error if the client does not exist or is not active, the counterparty
    /// connection id is set, or a proposed version is not supported.
    #[tracing::instrument(skip_all, fields(client_id = %msg.client_id))]
    pub fn conn_open_init(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgConnectionOpenInit,
    ) -> Result<Response<ConnectionId>, IbcError> {
        ensure!(
            msg.counterparty.connection_id.is_none(),
            IbcError::InvalidCounterparty {
                reason: "counterparty connection id must be empty on init".into(),
            }
        );
        let supported = &self.config().connection_versions;
        let versions = if msg.versions.is_empty() {
            supported.clone()
        } else {
            if let Some(version) = msg
                .versions
                .iter()
                .find(|v| !is_supported_version(supported, v))
            {
                return Err(IbcError::InvalidVersion {
                    reason: format!("proposed version {version:?} is not supported"),
                });
            }
            msg.versions
        };

        Self::execute(store, |store, events| {
            self.ensure_client_active(store, host, &msg.client_id)?;

            let connection_id = ConnectionId::new(next_counter(store, NEXT_CONNECTION_SEQUENCE)?);
            let connection = ConnectionEnd {
                state: State::Init,
                client_id: msg.client_id,
                counterparty: msg.counterparty,
                versions,
                delay_period: msg.delay_period,
            };
            store_connection(store, &connection_id, &connection)?;
            add_client_connection(store, &connection.client_id, &connection_id)?;

            tracing::info!(%connection_id, "connection open init");
            events.push(IbcEvent::OpenInitConnection(attributes(
                &connection_id,
                &connection,
            )));
            Ok(connection_id)
        })
    }

    /// Answers a counterparty `ConnOpenInit`. Returns the TRYOPEN connection identifier.
    ///
    /// # Errors
    /// Returns an error if the counterparty's client of this chain is invalid, no version is
    /// compatible, a crossing-hello connection does not match, or a proof fails.
    #[tracing::instrument(skip_all, fields(client_id = %msg.client_id))]
    pub fn conn_open_try(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgConnectionOpenTry,
    ) -> Result<Response<ConnectionId>, IbcError> {
        let counterparty_connection_id = msg.counterparty.connection_id.clone().ok_or_else(|| {
            IbcError::InvalidCounterparty {
                reason: "counterparty connection id must be set on try".into(),
            }
        })?;
        let self_proof = SelfClientProof {
            client_state: &msg.client_state,
            proof_client: &msg.proof_client,
            consensus_height: msg.consensus_height,
            consensus_state: self.expected_self_consensus(
                host,
                &msg.client_state,
                msg.consensus_height,
            )?,
            proof_consensus: &msg.proof_consensus,
        };
        let version = pick_version(
            &self.config().connection_versions,
            &msg.counterparty_versions,
        )
        .map_err(|e| IbcError::InvalidVersion {
            reason: e.to_string(),
        })?;

        Self::execute(store, |store, events| {
            let connection_id = match &msg.previous_connection_id {
                Some(previous_id) => {
                    let previous = load_connection(store, previous_id)?;
                    ensure_connection_state(previous_id, &previous, &[State::Init])?;
                    ensure!(
                        previous.client_id == msg.client_id
                            && previous.counterparty.client_id == msg.counterparty.client_id
                            && previous.counterparty.prefix == msg.counterparty.prefix
                            && previous.delay_period == msg.delay_period,
                        IbcError::InvalidCounterparty {
                            reason: format!("connection {previous_id} does not match the message"),
                        }
                    );
                    previous_id.clone()
                }
                None => ConnectionId::new(next_counter(store, NEXT_CONNECTION_SEQUENCE)?),
            };

            let target = ProofTarget {
                client_id: &msg.client_id,
                prefix: &msg.counterparty.prefix,
                height: msg.proof_height,
                delay_period: 0,
            };
            let expected = ConnectionEnd {
                state: State::Init,
                client_id: msg.counterparty.client_id.clone(),
                counterparty: Counterparty {
                    client_id: msg.client_id.clone(),
                    connection_id: None,
                    prefix: self.config().commitment_prefix.clone(),
                },
                versions: msg.counterparty_versions.clone(),
                delay_period: msg.delay_period,
            };
            self.verify_membership(
                store,
                host,
                &target,
                &msg.proof_init,
                &Path::Connection(counterparty_connection_id.clone()),
                &encode(&counterparty_connection_id, &expected)?,
            )?;
            self.verify_self_client_proof(
                store,
                host,
                &target,
                &msg.counterparty.client_id,
                &self_proof,
            )?;

            let connection = ConnectionEnd {
                state: State::TryOpen,
                client_id: msg.client_id.clone(),
                counterparty: msg.counterparty.clone(),
                versions: vec![version],
                delay_period: msg.delay_period,
            };
            store_connection(store, &connection_id, &connection)?;
            add_client_connection(store, &connection.client_id, &connection_id)?;

            tracing::info!(%connection_id, %counterparty_connection_id, "connection open try");
            events.push(IbcEvent::OpenTryConnection(attributes(
                &connection_id,
                &connection,
            )));
            Ok(connection_id)
        })
    }

    /// Acknowledges a counterparty `ConnOpenTry`, opening the connection.
    ///
    /// # Errors
    /// Returns an error if the connection is not INIT or TRYOPEN, the version was not
    /// proposed, or a proof fails.
    #[tracing::instrument(skip_all, fields(connection_id = %msg.connection_id))]
    pub fn conn_open_ack(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgConnectionOpenAck,
    ) -> Result<Response<()>, IbcError> {
        let self_proof = SelfClientProof {
            client_state: &msg.client_state,
            proof_client: &msg.proof_client,
            consensus_height: msg.consensus_height,
            consensus_state: self.expected_self_consensus(
                host,
                &msg.client_state,
                msg.consensus_height,
            )?,
            proof_consensus: &msg.proof_consensus,
        };

        Self::execute(store, |store, events| {
            let mut connection = load_connection(store, &msg.connection_id)?;
            ensure_connection_state(
                &msg.connection_id,
                &connection,
                &[State::Init, State::TryOpen],
            )?;

            let proposed = match connection.state {
                State::Init => is_supported_version(&connection.versions, &msg.version),
                _ => connection.versions.as_slice() == std::slice::from_ref(&msg.version),
            };
            ensure!(
                proposed && is_supported_version(&self.config().connection_versions, &msg.version),
                IbcError::InvalidVersion {
                    reason: format!(
                        "version {:?} was not proposed on connection {}",
                        msg.version, msg.connection_id
                    ),
                }
            );
            if let Some(known) = &connection.counterparty.connection_id {
                ensure!(
                    *known == msg.counterparty_connection_id,
                    IbcError::InvalidCounterparty {
                        reason: format!(
                            "counterparty connection is {known}, got {}",
                            msg.counterparty_connection_id
                        ),
                    }
                );
            }

            {
                let target = ProofTarget::handshake(&connection, msg.proof_height);
                let expected = ConnectionEnd {
                    state: State::TryOpen,
                    client_id: connection.counterparty.client_id.clone(),
                    counterparty: Counterparty {
                        client_id: connection.client_id.clone(),
                        connection_id: Some(msg.connection_id.clone()),
                        prefix: self.config().commitment_prefix.clone(),
                    },
                    versions: vec![msg.version.clone()],
                    delay_period: connection.delay_period,
                };
                self.verify_membership(
                    store,
                    host,
                    &target,
                    &msg.proof_try,
                    &Path::Connection(msg.counterparty_connection_id.clone()),
                    &encode(&msg.counterparty_connection_id, &expected)?,
                )?;
                self.verify_self_client_proof(
                    store,
                    host,
                    &target,
                    &connection.counterparty.client_id,
                    &self_proof,
                )?;
            }

            connection.state = State::Open;
            connection.versions = vec![msg.version.clone()];
            connection.counterparty.connection_id = Some(msg.counterparty_connection_id.clone());
            store_connection(store, &msg.connection_id, &connection)?;

            tracing::info!(connection_id = %msg.connection_id, "connection open ack");
            events.push(IbcEvent::OpenAckConnection(attributes(
                &msg.connection_id,
                &connection,
            )));
            Ok(())
        })
    }

    /// Confirms a counterparty `ConnOpenAck`, opening the connection.
    ///
    /// # Errors
    /// Returns an error if the connection is not TRYOPEN or the proof fails.
    #[tracing::instrument(skip_all, fields(connection_id = %msg.connection_id))]
    pub fn conn_open_confirm(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgConnectionOpenConfirm,
    ) -> Result<Response<()>, IbcError> {
        Self::execute(store, |store, events| {
            let mut connection = load_connection(store, &msg.connection_id)?;
            ensure_connection_state(&msg.connection_id, &connection, &[State::TryOpen])?;
            let counterparty_connection_id =
                connection.counterparty.connection_id.clone().ok_or_else(|| {
                    IbcError::corrupted(
                        Path::Connection(msg.connection_id.clone()),
                        "TRYOPEN connection without counterparty connection id",
                    )
                })?;

            let expected = ConnectionEnd {
                state: State::Open,
                client_id: connection.counterparty.client_id.clone(),
                counterparty: Counterparty {
                    client_id: connection.client_id.clone(),
                    connection_id: Some(msg.connection_id.clone()),
                    prefix: self.config().commitment_prefix.clone(),
                },
                versions: connection.versions.clone(),
                delay_period: connection.delay_period,
            };
            self.verify_membership(
                store,
                host,
                &ProofTarget::handshake(&connection, msg.proof_height),
                &msg.proof_ack,
                &Path::Connection(counterparty_connection_id.clone()),
                &encode(&counterparty_connection_id, &expected)?,
            )?;

            connection.state = State::Open;
            store_connection(store, &msg.connection_id, &connection)?;

            tracing::info!(connection_id = %msg.connection_id, "connection open confirm");
            events.push(IbcEvent::OpenConfirmConnection(attributes(
                &msg.connection_id,
                &connection,
            )));
            Ok(())
        })
    }

    /// Validates the counterparty's client of this chain and returns the consensus state it
    /// must hold at `consensus_height`.
    fn expected_self_consensus(
        &self,
        host: &HostInfo,
        client_state: &[u8],
        consensus_height: Height,
    ) -> Result<Vec<u8>, IbcError> {
        ensure!(
            consensus_height < host.height,
            IbcError::InvalidConsensusHeight {
                height: consensus_height,
                host_height: host.height,
            }
        );
        self.self_client()
            .validate_self_client(client_state, host)
            .map_err(|reason| IbcError::InvalidSelfClient { reason })?;
        self.self_client()
            .self_consensus_state(consensus_height)
            .ok_or_else(|| IbcError::InvalidSelfClient {
                reason: format!("no consensus state of this chain at {consensus_height}"),
            })
    }

    fn verify_self_client_proof(
        &self,
        store: &dyn Store,
        host: &HostInfo,
        target: &ProofTarget<'_>,
        counterparty_client_id: &ClientId,
        proof: &SelfClientProof<'_>,
    ) -> Result<(), IbcError> {
        self.verify_membership(
            store,
            host,
            target,
            proof.proof_client,
            &Path::ClientState(counterparty_client_id.clone()),
            proof.client_state,
        )?;
        self.verify_membership(
            store,
            host,
            target,
            proof.proof_consensus,
            &Path::ConsensusState(counterparty_client_id.clone(), proof.consensus_height),
            &proof.consensus_state,
        )
    }
}

fn encode(connection_id: &ConnectionId, connection: &ConnectionEnd) -> Result<Vec<u8>, IbcError> {
    connection
        .encode()
        .map_err(|e| IbcError::corrupted(Path::Connection(connection_id.clone()), e))
}
