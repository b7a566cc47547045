//! The channel opening and closing handshakes.

use ibc_classic_types::{
    channel::{ChannelEnd, Counterparty, Order, State},
    ensure,
    identifier::{ChannelId, ConnectionId, PortId},
    path::{Path, NEXT_CHANNEL_SEQUENCE},
    Height,
};

use super::{
    attributes, channel_connection, counterparty_hops, encode, ensure_channel_state,
    ensure_not_closed, ensure_ordering_supported, init_sequences, load_channel,
    new_channel_capability, single_hop, store_channel,
};
use crate::{
    capability::{authenticate_capability, get_capability, Capability},
    client::ProofTarget,
    connection::load_open_connection,
    engine::{IbcCore, Response},
    error::IbcError,
    events::IbcEvent,
    host::HostInfo,
    store::{next_counter, Store},
};

/// Message starting a channel handshake on a bound port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgChannelOpenInit {
    /// The local port
    pub port_id: PortId,
    /// Delivery ordering
    pub ordering: Order,
    /// The connection to open the channel over; exactly one hop
    pub connection_hops: Vec<ConnectionId>,
    /// The counterparty port
    pub counterparty_port_id: PortId,
    /// The proposed application version
    pub version: String,
}

/// Message answering a counterparty `ChanOpenInit`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgChannelOpenTry {
    /// The local port
    pub port_id: PortId,
    /// Delivery ordering; must equal the counterparty's
    pub ordering: Order,
    /// The connection to open the channel over; exactly one hop
    pub connection_hops: Vec<ConnectionId>,
    /// The counterparty port and INIT channel
    pub counterparty: Counterparty,
    /// The version proposed by the counterparty
    pub counterparty_version: String,
    /// Proof of the counterparty INIT channel
    pub proof_init: Vec<u8>,
    /// Counterparty height the proof was produced at
    pub proof_height: Height,
}

/// Message acknowledging a counterparty `ChanOpenTry`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgChannelOpenAck {
    /// The local port
    pub port_id: PortId,
    /// The local channel
    pub channel_id: ChannelId,
    /// The counterparty TRYOPEN channel
    pub counterparty_channel_id: ChannelId,
    /// The version chosen by the counterparty application
    pub counterparty_version: String,
    /// Proof of the counterparty TRYOPEN channel
    pub proof_try: Vec<u8>,
    /// Counterparty height the proof was produced at
    pub proof_height: Height,
}

/// Message confirming a counterparty `ChanOpenAck`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgChannelOpenConfirm {
    /// The local port
    pub port_id: PortId,
    /// The local channel
    pub channel_id: ChannelId,
    /// Proof of the counterparty OPEN channel
    pub proof_ack: Vec<u8>,
    /// Counterparty height the proof was produced at
    pub proof_height: Height,
}

/// Message closing a channel whose counterparty end is CLOSED.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgChannelCloseConfirm {
    /// The local port
    pub port_id: PortId,
    /// The local channel
    pub channel_id: ChannelId,
    /// Proof of the counterparty CLOSED channel
    pub proof_init: Vec<u8>,
    /// Counterparty height the proof was produced at
    pub proof_height: Height,
}

impl IbcCore {
    /// Starts a channel handshake. The module bound to the port receives the new channel
    /// capability and picks the version. Returns the new channel identifier.
    ///
    /// # Errors
    /// Returns an error if the port is not bound, the connection is not OPEN or does not
    /// support the ordering, or the module rejects the channel.
    #[tracing::instrument(skip_all, fields(port_id = %msg.port_id))]
    pub fn chan_open_init(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgChannelOpenInit,
    ) -> Result<Response<ChannelId>, IbcError> {
        let connection_id = single_hop(&msg.connection_hops)?.clone();

        Self::execute(store, |store, events| {
            let connection = load_open_connection(store, &connection_id)?;
            ensure_ordering_supported(&connection_id, &connection, msg.ordering)?;
            self.ensure_client_active(store, host, &connection.client_id)?;
            self.router().lookup_module_by_port(&msg.port_id)?;
            get_capability(store, &Path::Port(msg.port_id.clone()))?;

            let channel_id = ChannelId::new(next_counter(store, NEXT_CHANNEL_SEQUENCE)?);
            let mut channel = ChannelEnd {
                state: State::Init,
                ordering: msg.ordering,
                counterparty: Counterparty::new(msg.counterparty_port_id.clone(), None),
                connection_hops: msg.connection_hops.clone(),
                version: msg.version.clone(),
            };
            let capability = new_channel_capability(store, &msg.port_id, &channel_id)?;
            channel.version = self.callback(store, host, &msg.port_id, |module, ctx| {
                module.on_chan_open_init(ctx, &msg.port_id, &channel_id, &channel, &capability)
            })?;
            store_channel(store, &msg.port_id, &channel_id, &channel)?;
            init_sequences(store, &msg.port_id, &channel_id);

            tracing::info!(%channel_id, version = %channel.version, "channel open init");
            events.push(IbcEvent::OpenInitChannel {
                attributes: attributes(&msg.port_id, &channel_id, &channel, &connection_id),
                version: channel.version,
            });
            Ok(channel_id)
        })
    }

    /// Answers a counterparty `ChanOpenInit`. Returns the TRYOPEN channel identifier.
    ///
    /// # Errors
    /// Returns an error if the port is not bound, the connection is not OPEN, the
    /// counterparty declared the other ordering, the proof fails, or the module rejects the
    /// channel.
    #[tracing::instrument(skip_all, fields(port_id = %msg.port_id))]
    pub fn chan_open_try(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgChannelOpenTry,
    ) -> Result<Response<ChannelId>, IbcError> {
        let connection_id = single_hop(&msg.connection_hops)?.clone();
        let counterparty_channel_id = msg.counterparty.channel_id.clone().ok_or_else(|| {
            IbcError::InvalidCounterparty {
                reason: "counterparty channel id must be set on try".into(),
            }
        })?;

        Self::execute(store, |store, events| {
            let connection = load_open_connection(store, &connection_id)?;
            ensure_ordering_supported(&connection_id, &connection, msg.ordering)?;
            self.router().lookup_module_by_port(&msg.port_id)?;
            get_capability(store, &Path::Port(msg.port_id.clone()))?;

            let hops = counterparty_hops(&connection_id, &connection)?;
            let expected = |ordering: Order| ChannelEnd {
                state: State::Init,
                ordering,
                counterparty: Counterparty::new(msg.port_id.clone(), None),
                connection_hops: hops.clone(),
                version: msg.counterparty_version.clone(),
            };
            let target = ProofTarget::handshake(&connection, msg.proof_height);
            let path = Path::ChannelEnd(
                msg.counterparty.port_id.clone(),
                counterparty_channel_id.clone(),
            );
            let verify = |ordering: Order| -> Result<(), IbcError> {
                let value = encode(
                    &msg.counterparty.port_id,
                    &counterparty_channel_id,
                    &expected(ordering),
                )?;
                self.verify_membership(store, host, &target, &msg.proof_init, &path, &value)
            };
            if let Err(err) = verify(msg.ordering) {
                if matches!(err, IbcError::VerificationFailed { .. })
                    && verify(msg.ordering.other()).is_ok()
                {
                    return Err(IbcError::InvalidChannelOrdering {
                        reason: format!(
                            "counterparty channel is {}, not {}",
                            msg.ordering.other(),
                            msg.ordering
                        ),
                    });
                }
                return Err(err);
            }

            let channel_id = ChannelId::new(next_counter(store, NEXT_CHANNEL_SEQUENCE)?);
            let mut channel = ChannelEnd {
                state: State::TryOpen,
                ordering: msg.ordering,
                counterparty: msg.counterparty.clone(),
                connection_hops: msg.connection_hops.clone(),
                version: String::new(),
            };
            let capability = new_channel_capability(store, &msg.port_id, &channel_id)?;
            channel.version = self.callback(store, host, &msg.port_id, |module, ctx| {
                module.on_chan_open_try(
                    ctx,
                    &msg.port_id,
                    &channel_id,
                    &channel,
                    &capability,
                    &msg.counterparty_version,
                )
            })?;
            store_channel(store, &msg.port_id, &channel_id, &channel)?;
            init_sequences(store, &msg.port_id, &channel_id);

            tracing::info!(
                %channel_id,
                %counterparty_channel_id,
                version = %channel.version,
                "channel open try"
            );
            events.push(IbcEvent::OpenTryChannel {
                attributes: attributes(&msg.port_id, &channel_id, &channel, &connection_id),
                version: channel.version,
            });
            Ok(channel_id)
        })
    }

    /// Acknowledges a counterparty `ChanOpenTry`, opening the channel.
    ///
    /// # Errors
    /// Returns an error if the channel is not INIT or TRYOPEN, the proof fails, or the
    /// module rejects the counterparty version.
    #[tracing::instrument(skip_all, fields(port_id = %msg.port_id, channel_id = %msg.channel_id))]
    pub fn chan_open_ack(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgChannelOpenAck,
    ) -> Result<Response<()>, IbcError> {
        Self::execute(store, |store, events| {
            let (port_id, channel_id) = (&msg.port_id, &msg.channel_id);
            let mut channel = load_channel(store, port_id, channel_id)?;
            ensure_channel_state(port_id, channel_id, &channel, &[State::Init, State::TryOpen])?;
            if let Some(known) = &channel.counterparty.channel_id {
                ensure!(
                    *known == msg.counterparty_channel_id,
                    IbcError::InvalidCounterparty {
                        reason: format!(
                            "counterparty channel is {known}, got {}",
                            msg.counterparty_channel_id
                        ),
                    }
                );
            }
            get_capability(
                store,
                &Path::ChannelCapability(port_id.clone(), channel_id.clone()),
            )?;
            let (connection_id, connection) = channel_connection(store, &channel)?;

            let expected = ChannelEnd {
                state: State::TryOpen,
                ordering: channel.ordering,
                counterparty: Counterparty::new(port_id.clone(), Some(channel_id.clone())),
                connection_hops: counterparty_hops(&connection_id, &connection)?,
                version: msg.counterparty_version.clone(),
            };
            self.verify_membership(
                store,
                host,
                &ProofTarget::handshake(&connection, msg.proof_height),
                &msg.proof_try,
                &Path::ChannelEnd(
                    channel.counterparty.port_id.clone(),
                    msg.counterparty_channel_id.clone(),
                ),
                &encode(
                    &channel.counterparty.port_id,
                    &msg.counterparty_channel_id,
                    &expected,
                )?,
            )?;
            self.callback(store, host, port_id, |module, ctx| {
                module.on_chan_open_ack(
                    ctx,
                    port_id,
                    channel_id,
                    &msg.counterparty_channel_id,
                    &msg.counterparty_version,
                )
            })?;

            channel.state = State::Open;
            channel.version.clone_from(&msg.counterparty_version);
            channel.counterparty.channel_id = Some(msg.counterparty_channel_id.clone());
            store_channel(store, port_id, channel_id, &channel)?;

            tracing::info!(%port_id, %channel_id, "channel open ack");
            events.push(IbcEvent::OpenAckChannel(attributes(
                port_id,
                channel_id,
                &channel,
                &connection_id,
            )));
            Ok(())
        })
    }

    /// Confirms a counterparty `ChanOpenAck`, opening the channel.
    ///
    /// # Errors
    /// Returns an error if the channel is not TRYOPEN, the proof fails, or the module rejects
    /// the step.
    #[tracing::instrument(skip_all, fields(port_id = %msg.port_id, channel_id = %msg.channel_id))]
    pub fn chan_open_confirm(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgChannelOpenConfirm,
    ) -> Result<Response<()>, IbcError> {
        Self::execute(store, |store, events| {
            let (port_id, channel_id) = (&msg.port_id, &msg.channel_id);
            let mut channel = load_channel(store, port_id, channel_id)?;
            ensure_channel_state(port_id, channel_id, &channel, &[State::TryOpen])?;
            get_capability(
                store,
                &Path::ChannelCapability(port_id.clone(), channel_id.clone()),
            )?;
            let (connection_id, connection) = channel_connection(store, &channel)?;
            let counterparty_channel_id = counterparty_channel(port_id, channel_id, &channel)?;

            let expected = ChannelEnd {
                state: State::Open,
                ordering: channel.ordering,
                counterparty: Counterparty::new(port_id.clone(), Some(channel_id.clone())),
                connection_hops: counterparty_hops(&connection_id, &connection)?,
                version: channel.version.clone(),
            };
            self.verify_membership(
                store,
                host,
                &ProofTarget::handshake(&connection, msg.proof_height),
                &msg.proof_ack,
                &Path::ChannelEnd(
                    channel.counterparty.port_id.clone(),
                    counterparty_channel_id.clone(),
                ),
                &encode(
                    &channel.counterparty.port_id,
                    &counterparty_channel_id,
                    &expected,
                )?,
            )?;
            self.callback(store, host, port_id, |module, ctx| {
                module.on_chan_open_confirm(ctx, port_id, channel_id)
            })?;

            channel.state = State::Open;
            store_channel(store, port_id, channel_id, &channel)?;

            tracing::info!(%port_id, %channel_id, "channel open confirm");
            events.push(IbcEvent::OpenConfirmChannel(attributes(
                port_id,
                channel_id,
                &channel,
                &connection_id,
            )));
            Ok(())
        })
    }

    /// Closes a channel on behalf of the module holding its capability. Requires no proof.
    ///
    /// # Errors
    /// Returns an error if the channel is already closed, the capability does not
    /// authenticate, the connection is not OPEN, or the module refuses.
    #[tracing::instrument(skip_all, fields(port_id = %port_id, channel_id = %channel_id))]
    pub fn chan_close_init(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        capability: &Capability,
        port_id: &PortId,
        channel_id: &ChannelId,
    ) -> Result<Response<()>, IbcError> {
        Self::execute(store, |store, events| {
            let mut channel = load_channel(store, port_id, channel_id)?;
            ensure_not_closed(port_id, channel_id, &channel)?;
            authenticate_capability(
                store,
                capability,
                &Path::ChannelCapability(port_id.clone(), channel_id.clone()),
            )?;
            let (connection_id, _) = channel_connection(store, &channel)?;
            self.callback(store, host, port_id, |module, ctx| {
                module.on_chan_close_init(ctx, port_id, channel_id)
            })?;

            channel.state = State::Closed;
            store_channel(store, port_id, channel_id, &channel)?;

            tracing::info!(%port_id, %channel_id, "channel close init");
            events.push(IbcEvent::CloseInitChannel(attributes(
                port_id,
                channel_id,
                &channel,
                &connection_id,
            )));
            Ok(())
        })
    }

    /// Closes a channel whose counterparty end was proven CLOSED.
    ///
    /// # Errors
    /// Returns an error if the channel is already closed, the proof fails, or the module
    /// refuses.
    #[tracing::instrument(skip_all, fields(port_id = %msg.port_id, channel_id = %msg.channel_id))]
    pub fn chan_close_confirm(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgChannelCloseConfirm,
    ) -> Result<Response<()>, IbcError> {
        Self::execute(store, |store, events| {
            let (port_id, channel_id) = (&msg.port_id, &msg.channel_id);
            let mut channel = load_channel(store, port_id, channel_id)?;
            ensure_not_closed(port_id, channel_id, &channel)?;
            get_capability(
                store,
                &Path::ChannelCapability(port_id.clone(), channel_id.clone()),
            )?;
            let (connection_id, connection) = channel_connection(store, &channel)?;
            let counterparty_channel_id = counterparty_channel(port_id, channel_id, &channel)?;

            let expected = ChannelEnd {
                state: State::Closed,
                ordering: channel.ordering,
                counterparty: Counterparty::new(port_id.clone(), Some(channel_id.clone())),
                connection_hops: counterparty_hops(&connection_id, &connection)?,
                version: channel.version.clone(),
            };
            self.verify_membership(
                store,
                host,
                &ProofTarget::handshake(&connection, msg.proof_height),
                &msg.proof_init,
                &Path::ChannelEnd(
                    channel.counterparty.port_id.clone(),
                    counterparty_channel_id.clone(),
                ),
                &encode(
                    &channel.counterparty.port_id,
                    &counterparty_channel_id,
                    &expected,
                )?,
            )?;
            self.callback(store, host, port_id, |module, ctx| {
                module.on_chan_close_confirm(ctx, port_id, channel_id)
            })?;

            channel.state = State::Closed;
            store_channel(store, port_id, channel_id, &channel)?;

            tracing::info!(%port_id, %channel_id, "channel close confirm");
            events.push(IbcEvent::CloseConfirmChannel(attributes(
                port_id,
                channel_id,
                &channel,
                &connection_id,
            )));
            Ok(())
        })
    }
}

/// Returns the counterparty channel, known once the counterparty replied.
fn counterparty_channel(
    port_id: &PortId,
    channel_id: &ChannelId,
    channel: &ChannelEnd,
) -> Result<ChannelId, IbcError> {
    channel
        .counterparty
        .channel_id
        .clone()
        .ok_or_else(|| IbcError::InvalidChannelState {
            port_id: port_id.clone(),
            channel_id: channel_id.clone(),
            expected: "TRYOPEN or OPEN".into(),
            actual: channel.state,
        })
}
