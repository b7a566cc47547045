//! The connection handshake between two light clients.

mod handshake;

use ibc_classic_types::{
    connection::{ConnectionEnd, Counterparty, State, Version},
    identifier::{ClientId, ConnectionId},
    path::Path,
    Height,
};

use crate::{
    engine::IbcCore,
    error::IbcError,
    events::ConnectionAttributes,
    store::{read_json, write_json, Store},
};

/// Message starting a connection handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgConnectionOpenInit {
    /// The local client tracking the counterparty
    pub client_id: ClientId,
    /// The counterparty client and prefix; the connection id must be unset
    pub counterparty: Counterparty,
    /// Proposed versions; empty proposes every supported version
    pub versions: Vec<Version>,
    /// Delay period in nanoseconds
    pub delay_period: u64,
}

/// Message answering a counterparty `ConnOpenInit`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgConnectionOpenTry {
    /// An INIT connection to upgrade in place on crossing hellos
    pub previous_connection_id: Option<ConnectionId>,
    /// The local client tracking the counterparty
    pub client_id: ClientId,
    /// The counterparty's client of this chain
    pub client_state: Vec<u8>,
    /// The counterparty end, including its INIT connection id
    pub counterparty: Counterparty,
    /// Delay period in nanoseconds
    pub delay_period: u64,
    /// Versions proposed by the counterparty
    pub counterparty_versions: Vec<Version>,
    /// Proof of the counterparty INIT connection
    pub proof_init: Vec<u8>,
    /// Proof of the counterparty's client of this chain
    pub proof_client: Vec<u8>,
    /// Proof of the counterparty's consensus state of this chain at `consensus_height`
    pub proof_consensus: Vec<u8>,
    /// Counterparty height the proofs were produced at
    pub proof_height: Height,
    /// Height of this chain the counterparty's client tracks
    pub consensus_height: Height,
}

/// Message acknowledging a counterparty `ConnOpenTry`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgConnectionOpenAck {
    /// The local connection
    pub connection_id: ConnectionId,
    /// The counterparty TRYOPEN connection
    pub counterparty_connection_id: ConnectionId,
    /// The version chosen by the counterparty
    pub version: Version,
    /// The counterparty's client of this chain
    pub client_state: Vec<u8>,
    /// Proof of the counterparty TRYOPEN connection
    pub proof_try: Vec<u8>,
    /// Proof of the counterparty's client of this chain
    pub proof_client: Vec<u8>,
    /// Proof of the counterparty's consensus state of this chain at `consensus_height`
    pub proof_consensus: Vec<u8>,
    /// Counterparty height the proofs were produced at
    pub proof_height: Height,
    /// Height of this chain the counterparty's client tracks
    pub consensus_height: Height,
}

/// Message confirming a counterparty `ConnOpenAck`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgConnectionOpenConfirm {
    /// The local connection
    pub connection_id: ConnectionId,
    /// Proof of the counterparty OPEN connection
    pub proof_ack: Vec<u8>,
    /// Counterparty height the proof was produced at
    pub proof_height: Height,
}

impl IbcCore {
    /// Returns the stored connection end.
    ///
    /// # Errors
    /// Returns [`IbcError::ConnectionNotFound`] if the connection does not exist.
    pub fn connection_end(
        &self,
        store: &dyn Store,
        connection_id: &ConnectionId,
    ) -> Result<ConnectionEnd, IbcError> {
        load_connection(store, connection_id)
    }

    /// Returns the connections opened over a client.
    ///
    /// # Errors
    /// Returns an error if the stored index is corrupted.
    pub fn client_connections(
        &self,
        store: &dyn Store,
        client_id: &ClientId,
    ) -> Result<Vec<ConnectionId>, IbcError> {
        Ok(read_json(store, &Path::ClientConnections(client_id.clone()))?.unwrap_or_default())
    }
}

pub(crate) fn load_connection(
    store: &dyn Store,
    connection_id: &ConnectionId,
) -> Result<ConnectionEnd, IbcError> {
    read_json(store, &Path::Connection(connection_id.clone()))?
        .ok_or_else(|| IbcError::ConnectionNotFound(connection_id.clone()))
}

/// Loads a connection and checks it is OPEN.
pub(crate) fn load_open_connection(
    store: &dyn Store,
    connection_id: &ConnectionId,
) -> Result<ConnectionEnd, IbcError> {
    let connection = load_connection(store, connection_id)?;
    ensure_connection_state(connection_id, &connection, &[State::Open])?;
    Ok(connection)
}

pub(crate) fn ensure_connection_state(
    connection_id: &ConnectionId,
    connection: &ConnectionEnd,
    expected: &[State],
) -> Result<(), IbcError> {
    if expected.contains(&connection.state) {
        return Ok(());
    }
    Err(IbcError::InvalidConnectionState {
        connection_id: connection_id.clone(),
        expected: expected
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" or "),
        actual: connection.state,
    })
}

fn store_connection(
    store: &mut dyn Store,
    connection_id: &ConnectionId,
    connection: &ConnectionEnd,
) -> Result<(), IbcError> {
    write_json(store, &Path::Connection(connection_id.clone()), connection)
}

fn add_client_connection(
    store: &mut dyn Store,
    client_id: &ClientId,
    connection_id: &ConnectionId,
) -> Result<(), IbcError> {
    let path = Path::ClientConnections(client_id.clone());
    let mut connections: Vec<ConnectionId> = read_json(store, &path)?.unwrap_or_default();
    if !connections.contains(connection_id) {
        connections.push(connection_id.clone());
    }
    write_json(store, &path, &connections)
}

fn attributes(connection_id: &ConnectionId, connection: &ConnectionEnd) -> ConnectionAttributes {
    ConnectionAttributes {
        connection_id: connection_id.clone(),
        client_id: connection.client_id.clone(),
        counterparty_client_id: connection.counterparty.client_id.clone(),
        counterparty_connection_id: connection.counterparty.connection_id.clone(),
    }
}
