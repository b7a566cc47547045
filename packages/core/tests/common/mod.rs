//! Two-chain test harness.
//!
//! Each [`Chain`] runs an [`IbcCore`] over a [`MemoryStore`]. Committing a block snapshots the
//! store into a Merkle tree whose root is attested by the chain's signers, so the other chain's
//! attested client can be updated to it and verify proofs against it. The relaying steps of
//! the handshakes and the packet lifecycle are methods on [`Chain`].

#![allow(dead_code, clippy::missing_panics_doc)]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use attested_light_client::{
    client_state::ClientState,
    consensus_state::ConsensusState,
    header::Header,
    merkle::MerkleTree,
    test_utils::{attestor_keys, client_state, header_message, signed_header},
    AttestedLightClient, CLIENT_TYPE,
};
use ed25519_dalek::SigningKey;
use ibc_classic_core::{
    channel::{
        MsgAcknowledgement, MsgChannelCloseConfirm, MsgChannelOpenAck, MsgChannelOpenConfirm,
        MsgChannelOpenInit, MsgChannelOpenTry, MsgRecvPacket, MsgSendPacket, MsgTimeout,
        MsgTimeoutOnClose,
    },
    client::{MsgCreateClient, MsgUpdateClient, UpdateOutcome},
    connection::{
        MsgConnectionOpenAck, MsgConnectionOpenConfirm, MsgConnectionOpenInit,
        MsgConnectionOpenTry,
    },
    Capability, CoreConfig, HostInfo, IbcCore, IbcError, MemoryStore, Module, ModuleCtx,
    ModuleError, Response, Router, SelfClientValidator, Store,
};
use ibc_classic_light_client::ClientRegistry;
use ibc_classic_types::{
    channel::{ChannelEnd, Counterparty as ChannelCounterparty, Order},
    connection::{ConnectionEnd, Counterparty},
    identifier::{ChannelId, ClientId, ConnectionId, PortId},
    packet::{Acknowledgement, Packet},
    path::{CommitmentPrefix, Path},
    Height,
};

pub const PORT: &str = "transfer";
pub const APP_VERSION: &str = "ics20-1";
pub const BLOCK_TIME: u64 = 5_000_000_000;
const GENESIS_TIME: u64 = 1_700_000_000_000_000_000;
const REVISION: u64 = 1;
const QUORUM: u8 = 2;

pub fn port() -> PortId {
    PORT.parse().unwrap()
}

pub const fn height(revision_height: u64) -> Height {
    Height::new(REVISION, revision_height)
}

/// What the mock application answers on `on_recv_packet`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AckMode {
    #[default]
    Success,
    Error,
    Deferred,
}

#[derive(Debug, Default)]
pub struct AppState {
    pub capabilities: BTreeMap<ChannelId, Capability>,
    pub ack_mode: AckMode,
    pub reject_open: bool,
    pub received: Vec<u64>,
    pub acknowledged: Vec<(u64, Vec<u8>)>,
    pub timed_out: Vec<u64>,
    pub timed_out_on_close: Vec<u64>,
    pub closed: Vec<ChannelId>,
}

/// Application bound to [`PORT`] that records every callback.
#[derive(Clone, Default)]
pub struct MockApp(Arc<Mutex<AppState>>);

impl MockApp {
    pub fn state(&self) -> MutexGuard<'_, AppState> {
        self.0.lock().unwrap()
    }

    pub fn capability(&self, channel_id: &ChannelId) -> Capability {
        self.state().capabilities[channel_id].clone()
    }

    fn open(&self, channel_id: &ChannelId, capability: &Capability) -> Result<(), ModuleError> {
        let mut state = self.state();
        if state.reject_open {
            return Err(ModuleError::new("channel rejected by application"));
        }
        state
            .capabilities
            .insert(channel_id.clone(), capability.clone());
        Ok(())
    }
}

impl Module for MockApp {
    fn on_chan_open_init(
        &self,
        _ctx: &mut ModuleCtx<'_>,
        _port_id: &PortId,
        channel_id: &ChannelId,
        channel: &ChannelEnd,
        capability: &Capability,
    ) -> Result<String, ModuleError> {
        self.open(channel_id, capability)?;
        if channel.version.is_empty() {
            return Ok(APP_VERSION.to_string());
        }
        Ok(channel.version.clone())
    }

    fn on_chan_open_try(
        &self,
        _ctx: &mut ModuleCtx<'_>,
        _port_id: &PortId,
        channel_id: &ChannelId,
        _channel: &ChannelEnd,
        capability: &Capability,
        counterparty_version: &str,
    ) -> Result<String, ModuleError> {
        self.open(channel_id, capability)?;
        Ok(counterparty_version.to_string())
    }

    fn on_chan_open_ack(
        &self,
        _ctx: &mut ModuleCtx<'_>,
        _port_id: &PortId,
        _channel_id: &ChannelId,
        _counterparty_channel_id: &ChannelId,
        counterparty_version: &str,
    ) -> Result<(), ModuleError> {
        if counterparty_version != APP_VERSION {
            return Err(ModuleError::new(format!(
                "unsupported version {counterparty_version}"
            )));
        }
        Ok(())
    }

    fn on_chan_open_confirm(
        &self,
        _ctx: &mut ModuleCtx<'_>,
        _port_id: &PortId,
        _channel_id: &ChannelId,
    ) -> Result<(), ModuleError> {
        Ok(())
    }

    fn on_chan_close_init(
        &self,
        _ctx: &mut ModuleCtx<'_>,
        _port_id: &PortId,
        channel_id: &ChannelId,
    ) -> Result<(), ModuleError> {
        self.state().closed.push(channel_id.clone());
        Ok(())
    }

    fn on_chan_close_confirm(
        &self,
        _ctx: &mut ModuleCtx<'_>,
        _port_id: &PortId,
        channel_id: &ChannelId,
    ) -> Result<(), ModuleError> {
        self.state().closed.push(channel_id.clone());
        Ok(())
    }

    fn on_recv_packet(
        &self,
        ctx: &mut ModuleCtx<'_>,
        packet: &Packet,
    ) -> Option<Acknowledgement> {
        ctx.store().set(
            format!("received/{}", packet.sequence).into_bytes(),
            packet.data.clone(),
        );
        let mut state = self.state();
        state.received.push(packet.sequence);
        match state.ack_mode {
            AckMode::Success => Some(Acknowledgement::success(b"ok".to_vec())),
            AckMode::Error => Some(Acknowledgement::error("insufficient funds")),
            AckMode::Deferred => None,
        }
    }

    fn on_acknowledgement_packet(
        &self,
        _ctx: &mut ModuleCtx<'_>,
        packet: &Packet,
        acknowledgement: &[u8],
    ) -> Result<(), ModuleError> {
        self.state()
            .acknowledged
            .push((packet.sequence, acknowledgement.to_vec()));
        Ok(())
    }

    fn on_timeout_packet(
        &self,
        _ctx: &mut ModuleCtx<'_>,
        packet: &Packet,
    ) -> Result<(), ModuleError> {
        self.state().timed_out.push(packet.sequence);
        Ok(())
    }

    fn on_timeout_packet_close(
        &self,
        _ctx: &mut ModuleCtx<'_>,
        packet: &Packet,
    ) -> Result<(), ModuleError> {
        self.state().timed_out_on_close.push(packet.sequence);
        Ok(())
    }
}

type History = Arc<Mutex<BTreeMap<Height, ConsensusState>>>;

/// Validates the attested clients counterparties keep of one chain against its history.
struct SelfClient {
    chain_id: String,
    history: History,
}

impl SelfClientValidator for SelfClient {
    fn validate_self_client(&self, client_state: &[u8], host: &HostInfo) -> Result<(), String> {
        let client_state = ClientState::decode(client_state).map_err(|e| e.to_string())?;
        if client_state.chain_id != self.chain_id {
            return Err(format!(
                "client tracks {}, not {}",
                client_state.chain_id, self.chain_id
            ));
        }
        if client_state.is_frozen() {
            return Err("client is frozen".into());
        }
        if client_state.latest_height >= host.height {
            return Err(format!(
                "client height {} is not below the host height {}",
                client_state.latest_height, host.height
            ));
        }
        Ok(())
    }

    fn self_consensus_state(&self, height: Height) -> Option<Vec<u8>> {
        self.history
            .lock()
            .unwrap()
            .get(&height)
            .map(|consensus_state| consensus_state.encode().unwrap())
    }
}

/// Proofs of a chain's client of its counterparty, answering the self-client checks of the
/// connection handshake.
pub struct ClientProofs {
    pub client_state: Vec<u8>,
    pub proof_client: Vec<u8>,
    pub proof_consensus: Vec<u8>,
    pub consensus_height: Height,
}

pub struct Chain {
    pub chain_id: String,
    pub core: IbcCore,
    pub store: MemoryStore,
    pub host: HostInfo,
    pub app: MockApp,
    pub port_capability: Capability,
    pub keys: Vec<SigningKey>,
    history: History,
    trees: BTreeMap<Height, MerkleTree>,
}

impl Chain {
    pub fn new(chain_id: &str) -> Self {
        Self::with_config(chain_id, CoreConfig::default())
    }

    pub fn with_config(chain_id: &str, config: CoreConfig) -> Self {
        Self::try_with_config(chain_id, config).unwrap()
    }

    pub fn try_with_config(chain_id: &str, config: CoreConfig) -> anyhow::Result<Self> {
        let history = History::default();
        let app = MockApp::default();
        let clients = ClientRegistry::new()
            .with_client(AttestedLightClient)
            .with_client_as("07-tendermint", AttestedLightClient);
        let router = Router::new().with_module(port(), app.clone());
        let self_client = SelfClient {
            chain_id: chain_id.to_string(),
            history: history.clone(),
        };
        let core = IbcCore::new(config, clients, router, Arc::new(self_client))?;

        let mut store = MemoryStore::new();
        let port_capability = core.bind_port(&mut store, &port())?.value;

        Ok(Self {
            chain_id: chain_id.to_string(),
            core,
            store,
            host: HostInfo::new(height(1), GENESIS_TIME),
            app,
            port_capability,
            keys: attestor_keys(3),
            history,
            trees: BTreeMap::new(),
        })
    }

    /// Commits the current block and starts the next one. Returns the committed height.
    pub fn commit_block(&mut self) -> Height {
        let committed = self.host.height;
        let prefix = self.core.config().commitment_prefix.as_str();
        let tree = MerkleTree::new(
            self.store
                .iter()
                .map(|(key, value)| {
                    let key = [prefix.as_bytes(), b"/".as_slice(), key.as_slice()].concat();
                    (key, value)
                }),
        );
        let consensus_state = ConsensusState {
            root: tree.root(),
            timestamp: self.host.timestamp,
        };
        self.history
            .lock()
            .unwrap()
            .insert(committed, consensus_state);
        self.trees.insert(committed, tree);
        self.host = HostInfo::new(committed.increment(), self.host.timestamp + BLOCK_TIME);
        committed
    }

    /// Advances the host by `blocks` empty blocks without committing them.
    pub fn skip_blocks(&mut self, blocks: u64) {
        self.host = HostInfo::new(
            self.host.height.add_blocks(blocks),
            self.host.timestamp + blocks * BLOCK_TIME,
        );
    }

    pub fn consensus_state_at(&self, height: Height) -> ConsensusState {
        self.history.lock().unwrap()[&height]
    }

    pub fn client_state_at(&self, height: Height) -> ClientState {
        client_state(&self.chain_id, &self.keys, QUORUM, height)
    }

    pub fn header(&self, height: Height) -> Header {
        signed_header(
            &self.chain_id,
            &self.keys[..usize::from(QUORUM)],
            height,
            self.consensus_state_at(height),
        )
    }

    /// Proves `path` against the root committed at `height`.
    pub fn prove(&self, path: &Path, height: Height) -> Vec<u8> {
        let key = self.core.config().commitment_prefix.apply(path);
        serde_json::to_vec(&self.trees[&height].prove(&key)).unwrap()
    }

    /// Proves this chain's client `client_id` and its latest consensus state at `height`.
    pub fn client_proofs(&self, client_id: &ClientId, height: Height) -> ClientProofs {
        let consensus_height = self
            .core
            .client_latest_height(&self.store, client_id)
            .unwrap();
        ClientProofs {
            client_state: self.core.client_state(&self.store, client_id).unwrap(),
            proof_client: self.prove(&Path::ClientState(client_id.clone()), height),
            proof_consensus: self.prove(
                &Path::ConsensusState(client_id.clone(), consensus_height),
                height,
            ),
            consensus_height,
        }
    }

    pub fn create_client(&mut self, counterparty: &mut Self, client_type: &str) -> ClientId {
        let height = counterparty.commit_block();
        let msg = MsgCreateClient {
            client_type: client_type.to_string(),
            client_state: counterparty.client_state_at(height).encode().unwrap(),
            consensus_state: counterparty.consensus_state_at(height).encode().unwrap(),
        };
        self.core
            .create_client(&mut self.store, &self.host, msg)
            .unwrap()
            .value
    }

    pub fn update_client(
        &mut self,
        client_id: &ClientId,
        header: Header,
    ) -> Result<Response<UpdateOutcome>, IbcError> {
        self.core.update_client(
            &mut self.store,
            &self.host,
            MsgUpdateClient {
                client_id: client_id.clone(),
                client_message: header_message(header),
            },
        )
    }

    /// Commits a block on `counterparty` and updates `client_id` to it. Returns the new
    /// proof height.
    pub fn sync(&mut self, client_id: &ClientId, counterparty: &mut Self) -> Height {
        let height = counterparty.commit_block();
        self.update_client(client_id, counterparty.header(height))
            .unwrap();
        height
    }

    pub fn connection(&self, connection_id: &ConnectionId) -> ConnectionEnd {
        self.core
            .connection_end(&self.store, connection_id)
            .unwrap()
    }

    pub fn channel(&self, channel_id: &ChannelId) -> ChannelEnd {
        self.core
            .channel_end(&self.store, &port(), channel_id)
            .unwrap()
    }

    fn channel_client(&self, channel_id: &ChannelId) -> ClientId {
        let channel = self.channel(channel_id);
        self.connection(&channel.connection_hops[0]).client_id
    }

    pub fn conn_open_init(
        &mut self,
        client_id: &ClientId,
        counterparty_client_id: &ClientId,
        delay_period: u64,
    ) -> Result<Response<ConnectionId>, IbcError> {
        self.core.conn_open_init(
            &mut self.store,
            &self.host,
            MsgConnectionOpenInit {
                client_id: client_id.clone(),
                counterparty: Counterparty {
                    client_id: counterparty_client_id.clone(),
                    connection_id: None,
                    prefix: CommitmentPrefix::default(),
                },
                versions: vec![],
                delay_period,
            },
        )
    }

    /// Answers the INIT connection `counterparty_connection_id` of `counterparty`.
    pub fn conn_open_try(
        &mut self,
        counterparty: &mut Self,
        counterparty_connection_id: &ConnectionId,
        previous_connection_id: Option<ConnectionId>,
    ) -> Result<Response<ConnectionId>, IbcError> {
        let init = counterparty.connection(counterparty_connection_id);
        let client_id = init.counterparty.client_id.clone();
        let proof_height = self.sync(&client_id, counterparty);
        let proofs = counterparty.client_proofs(&init.client_id, proof_height);
        self.core.conn_open_try(
            &mut self.store,
            &self.host,
            MsgConnectionOpenTry {
                previous_connection_id,
                client_id,
                client_state: proofs.client_state,
                counterparty: Counterparty {
                    client_id: init.client_id,
                    connection_id: Some(counterparty_connection_id.clone()),
                    prefix: CommitmentPrefix::default(),
                },
                delay_period: init.delay_period,
                counterparty_versions: init.versions,
                proof_init: counterparty.prove(
                    &Path::Connection(counterparty_connection_id.clone()),
                    proof_height,
                ),
                proof_client: proofs.proof_client,
                proof_consensus: proofs.proof_consensus,
                proof_height,
                consensus_height: proofs.consensus_height,
            },
        )
    }

    pub fn conn_open_ack(
        &mut self,
        connection_id: &ConnectionId,
        counterparty: &mut Self,
        counterparty_connection_id: &ConnectionId,
    ) -> Result<Response<()>, IbcError> {
        let client_id = self.connection(connection_id).client_id;
        let proof_height = self.sync(&client_id, counterparty);
        let try_open = counterparty.connection(counterparty_connection_id);
        let proofs = counterparty.client_proofs(&try_open.client_id, proof_height);
        self.core.conn_open_ack(
            &mut self.store,
            &self.host,
            MsgConnectionOpenAck {
                connection_id: connection_id.clone(),
                counterparty_connection_id: counterparty_connection_id.clone(),
                version: try_open.versions[0].clone(),
                client_state: proofs.client_state,
                proof_try: counterparty.prove(
                    &Path::Connection(counterparty_connection_id.clone()),
                    proof_height,
                ),
                proof_client: proofs.proof_client,
                proof_consensus: proofs.proof_consensus,
                proof_height,
                consensus_height: proofs.consensus_height,
            },
        )
    }

    pub fn conn_open_confirm(
        &mut self,
        connection_id: &ConnectionId,
        counterparty: &mut Self,
        counterparty_connection_id: &ConnectionId,
    ) -> Result<Response<()>, IbcError> {
        let client_id = self.connection(connection_id).client_id;
        let proof_height = self.sync(&client_id, counterparty);
        self.core.conn_open_confirm(
            &mut self.store,
            &self.host,
            MsgConnectionOpenConfirm {
                connection_id: connection_id.clone(),
                proof_ack: counterparty.prove(
                    &Path::Connection(counterparty_connection_id.clone()),
                    proof_height,
                ),
                proof_height,
            },
        )
    }

    pub fn chan_open_init(
        &mut self,
        connection_id: &ConnectionId,
        ordering: Order,
    ) -> Result<Response<ChannelId>, IbcError> {
        self.core.chan_open_init(
            &mut self.store,
            &self.host,
            MsgChannelOpenInit {
                port_id: port(),
                ordering,
                connection_hops: vec![connection_id.clone()],
                counterparty_port_id: port(),
                version: APP_VERSION.to_string(),
            },
        )
    }

    /// Answers the INIT channel `counterparty_channel_id` of `counterparty`, declaring
    /// `ordering`.
    pub fn chan_open_try(
        &mut self,
        connection_id: &ConnectionId,
        counterparty: &mut Self,
        counterparty_channel_id: &ChannelId,
        ordering: Order,
    ) -> Result<Response<ChannelId>, IbcError> {
        let client_id = self.connection(connection_id).client_id;
        let proof_height = self.sync(&client_id, counterparty);
        let init = counterparty.channel(counterparty_channel_id);
        self.core.chan_open_try(
            &mut self.store,
            &self.host,
            MsgChannelOpenTry {
                port_id: port(),
                ordering,
                connection_hops: vec![connection_id.clone()],
                counterparty: ChannelCounterparty::new(
                    port(),
                    Some(counterparty_channel_id.clone()),
                ),
                counterparty_version: init.version,
                proof_init: counterparty.prove(
                    &Path::ChannelEnd(port(), counterparty_channel_id.clone()),
                    proof_height,
                ),
                proof_height,
            },
        )
    }

    pub fn chan_open_ack(
        &mut self,
        channel_id: &ChannelId,
        counterparty: &mut Self,
        counterparty_channel_id: &ChannelId,
    ) -> Result<Response<()>, IbcError> {
        let client_id = self.channel_client(channel_id);
        let proof_height = self.sync(&client_id, counterparty);
        let try_open = counterparty.channel(counterparty_channel_id);
        self.core.chan_open_ack(
            &mut self.store,
            &self.host,
            MsgChannelOpenAck {
                port_id: port(),
                channel_id: channel_id.clone(),
                counterparty_channel_id: counterparty_channel_id.clone(),
                counterparty_version: try_open.version,
                proof_try: counterparty.prove(
                    &Path::ChannelEnd(port(), counterparty_channel_id.clone()),
                    proof_height,
                ),
                proof_height,
            },
        )
    }

    pub fn chan_open_confirm(
        &mut self,
        channel_id: &ChannelId,
        counterparty: &mut Self,
        counterparty_channel_id: &ChannelId,
    ) -> Result<Response<()>, IbcError> {
        let client_id = self.channel_client(channel_id);
        let proof_height = self.sync(&client_id, counterparty);
        self.core.chan_open_confirm(
            &mut self.store,
            &self.host,
            MsgChannelOpenConfirm {
                port_id: port(),
                channel_id: channel_id.clone(),
                proof_ack: counterparty.prove(
                    &Path::ChannelEnd(port(), counterparty_channel_id.clone()),
                    proof_height,
                ),
                proof_height,
            },
        )
    }

    pub fn chan_close_init(&mut self, channel_id: &ChannelId) -> Result<Response<()>, IbcError> {
        let capability = self.app.capability(channel_id);
        self.core.chan_close_init(
            &mut self.store,
            &self.host,
            &capability,
            &port(),
            channel_id,
        )
    }

    pub fn chan_close_confirm(
        &mut self,
        channel_id: &ChannelId,
        counterparty: &mut Self,
        counterparty_channel_id: &ChannelId,
    ) -> Result<Response<()>, IbcError> {
        let client_id = self.channel_client(channel_id);
        let proof_height = self.sync(&client_id, counterparty);
        self.core.chan_close_confirm(
            &mut self.store,
            &self.host,
            MsgChannelCloseConfirm {
                port_id: port(),
                channel_id: channel_id.clone(),
                proof_init: counterparty.prove(
                    &Path::ChannelEnd(port(), counterparty_channel_id.clone()),
                    proof_height,
                ),
                proof_height,
            },
        )
    }

    pub fn send(
        &mut self,
        channel_id: &ChannelId,
        data: &[u8],
        timeout_height: Height,
        timeout_timestamp: u64,
    ) -> Result<Packet, IbcError> {
        let capability = self.app.capability(channel_id);
        self.core
            .send_packet(
                &mut self.store,
                &self.host,
                &capability,
                MsgSendPacket {
                    source_port: port(),
                    source_channel: channel_id.clone(),
                    data: data.to_vec(),
                    timeout_height,
                    timeout_timestamp,
                },
            )
            .map(|response| response.value)
    }

    /// Sends a packet timing out far in the counterparty's future.
    pub fn send_default(&mut self, channel_id: &ChannelId, data: &[u8]) -> Packet {
        self.send(channel_id, data, height(10_000), 0).unwrap()
    }

    /// Updates the client of the packet's destination channel to `counterparty` and proves the
    /// packet commitment.
    pub fn commitment_proof(&mut self, counterparty: &mut Self, packet: &Packet) -> MsgRecvPacket {
        let client_id = self.channel_client(&packet.destination_channel);
        let proof_height = self.sync(&client_id, counterparty);
        MsgRecvPacket {
            packet: packet.clone(),
            proof_commitment: counterparty.prove(
                &Path::Commitment(
                    packet.source_port.clone(),
                    packet.source_channel.clone(),
                    packet.sequence,
                ),
                proof_height,
            ),
            proof_height,
        }
    }

    pub fn recv(
        &mut self,
        counterparty: &mut Self,
        packet: &Packet,
    ) -> Result<Response<Option<Acknowledgement>>, IbcError> {
        let msg = self.commitment_proof(counterparty, packet);
        self.core.recv_packet(&mut self.store, &self.host, msg)
    }

    pub fn acknowledge(
        &mut self,
        counterparty: &mut Self,
        packet: &Packet,
        acknowledgement: &[u8],
    ) -> Result<Response<()>, IbcError> {
        let client_id = self.channel_client(&packet.source_channel);
        let proof_height = self.sync(&client_id, counterparty);
        self.core.acknowledge_packet(
            &mut self.store,
            &self.host,
            MsgAcknowledgement {
                packet: packet.clone(),
                acknowledgement: acknowledgement.to_vec(),
                proof_acked: counterparty.prove(
                    &Path::Ack(
                        packet.destination_port.clone(),
                        packet.destination_channel.clone(),
                        packet.sequence,
                    ),
                    proof_height,
                ),
                proof_height,
            },
        )
    }

    /// Proves the packet unreceived on `counterparty`: the receipt's absence on UNORDERED
    /// channels, the next receive sequence on ORDERED ones.
    fn unreceived_proof(
        &self,
        counterparty: &Self,
        packet: &Packet,
        proof_height: Height,
    ) -> (Vec<u8>, u64) {
        let (port_id, channel_id) = (&packet.destination_port, &packet.destination_channel);
        let next_sequence_recv = counterparty
            .core
            .next_sequence_recv(&counterparty.store, port_id, channel_id)
            .unwrap();
        let path = match self.channel(&packet.source_channel).ordering {
            Order::Ordered => Path::NextSequenceRecv(port_id.clone(), channel_id.clone()),
            Order::Unordered => {
                Path::Receipt(port_id.clone(), channel_id.clone(), packet.sequence)
            }
        };
        (counterparty.prove(&path, proof_height), next_sequence_recv)
    }

    pub fn timeout(
        &mut self,
        counterparty: &mut Self,
        packet: &Packet,
    ) -> Result<Response<()>, IbcError> {
        let client_id = self.channel_client(&packet.source_channel);
        let proof_height = self.sync(&client_id, counterparty);
        let (proof_unreceived, next_sequence_recv) =
            self.unreceived_proof(counterparty, packet, proof_height);
        self.core.timeout_packet(
            &mut self.store,
            &self.host,
            MsgTimeout {
                packet: packet.clone(),
                proof_unreceived,
                proof_height,
                next_sequence_recv,
            },
        )
    }

    pub fn timeout_on_close(
        &mut self,
        counterparty: &mut Self,
        packet: &Packet,
    ) -> Result<Response<()>, IbcError> {
        let client_id = self.channel_client(&packet.source_channel);
        let proof_height = self.sync(&client_id, counterparty);
        let (proof_unreceived, next_sequence_recv) =
            self.unreceived_proof(counterparty, packet, proof_height);
        self.core.timeout_on_close(
            &mut self.store,
            &self.host,
            MsgTimeoutOnClose {
                packet: packet.clone(),
                proof_unreceived,
                proof_close: counterparty.prove(
                    &Path::ChannelEnd(
                        packet.destination_port.clone(),
                        packet.destination_channel.clone(),
                    ),
                    proof_height,
                ),
                proof_height,
                next_sequence_recv,
            },
        )
    }
}

/// The connection and channel identifiers of an open channel between two chains.
#[derive(Clone, Debug)]
pub struct Link {
    pub conn_a: ConnectionId,
    pub conn_b: ConnectionId,
    pub chan_a: ChannelId,
    pub chan_b: ChannelId,
}

/// Two chains, each with a client of the other.
pub struct Pair {
    pub a: Chain,
    pub b: Chain,
    /// Client on A tracking B
    pub client_a: ClientId,
    /// Client on B tracking A
    pub client_b: ClientId,
}

impl Pair {
    pub fn new() -> Self {
        Self::with_client_type(CLIENT_TYPE)
    }

    pub fn with_client_type(client_type: &str) -> Self {
        Self::with_chains(Chain::new("chain-a"), Chain::new("chain-b"), client_type)
    }

    pub fn with_chains(mut a: Chain, mut b: Chain, client_type: &str) -> Self {
        let client_a = a.create_client(&mut b, client_type);
        let client_b = b.create_client(&mut a, client_type);
        Self {
            a,
            b,
            client_a,
            client_b,
        }
    }

    /// Runs the full connection handshake, initiated by A.
    pub fn connect(&mut self, delay_period: u64) -> (ConnectionId, ConnectionId) {
        let conn_a = self
            .a
            .conn_open_init(&self.client_a, &self.client_b, delay_period)
            .unwrap()
            .value;
        let conn_b = self.b.conn_open_try(&mut self.a, &conn_a, None).unwrap().value;
        self.a.conn_open_ack(&conn_a, &mut self.b, &conn_b).unwrap();
        self.b.conn_open_confirm(&conn_b, &mut self.a, &conn_a).unwrap();
        (conn_a, conn_b)
    }

    /// Runs the channel handshake over an open connection, initiated by A.
    pub fn open_channel_on(
        &mut self,
        conn_a: ConnectionId,
        conn_b: ConnectionId,
        ordering: Order,
    ) -> Link {
        let chan_a = self.a.chan_open_init(&conn_a, ordering).unwrap().value;
        let chan_b = self
            .b
            .chan_open_try(&conn_b, &mut self.a, &chan_a, ordering)
            .unwrap()
            .value;
        self.a.chan_open_ack(&chan_a, &mut self.b, &chan_b).unwrap();
        self.b.chan_open_confirm(&chan_b, &mut self.a, &chan_a).unwrap();
        Link {
            conn_a,
            conn_b,
            chan_a,
            chan_b,
        }
    }

    /// Connects the chains without delay and opens a channel.
    pub fn open_channel(&mut self, ordering: Order) -> Link {
        let (conn_a, conn_b) = self.connect(0);
        self.open_channel_on(conn_a, conn_b, ordering)
    }
}

/// Returns true if anything is stored at `path`.
pub fn stored(chain: &Chain, path: &Path) -> bool {
    chain.store.get(&path.to_key()).is_some()
}
