//! Defines the [`Module`] callback set and the port [`Router`].

use std::{collections::BTreeMap, sync::Arc};

use ibc_classic_types::{
    channel::{ChannelEnd, Order},
    identifier::{ChannelId, ConnectionId, PortId},
    packet::{Acknowledgement, Packet},
};

use crate::{
    capability::Capability,
    error::IbcError,
    host::HostInfo,
    store::{PrefixStore, Store},
};

/// Error returned by a module callback.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct ModuleError {
    /// Reason for error
    pub reason: String,
}

impl ModuleError {
    /// Creates a new module error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// What a module callback sees of the host: its own key space and the current block.
pub struct ModuleCtx<'a> {
    store: PrefixStore<'a>,
    host: HostInfo,
}

impl<'a> ModuleCtx<'a> {
    pub(crate) fn new(store: &'a mut dyn Store, port_id: &PortId, host: HostInfo) -> Self {
        Self {
            store: PrefixStore::new(store, format!("apps/{port_id}/")),
            host,
        }
    }

    /// Returns the module's store, scoped to `apps/{port_id}/`.
    pub fn store(&mut self) -> &mut dyn Store {
        &mut self.store
    }

    /// Returns the current host height and timestamp.
    #[must_use]
    pub const fn host(&self) -> HostInfo {
        self.host
    }
}

/// The callbacks an application module bound to a port implements.
///
/// Handshake callbacks may veto a step by returning an error. `on_recv_packet` cannot fail:
/// application failures are expressed as an error acknowledgement.
pub trait Module: Send + Sync {
    /// Called on `ChanOpenInit`. Returns the version the channel is opened with.
    ///
    /// # Errors
    /// Returns an error to reject the channel.
    fn on_chan_open_init(
        &self,
        ctx: &mut ModuleCtx<'_>,
        port_id: &PortId,
        channel_id: &ChannelId,
        channel: &ChannelEnd,
        capability: &Capability,
    ) -> Result<String, ModuleError>;

    /// Called on `ChanOpenTry` with the version proposed by the counterparty. Returns the
    /// version the channel is opened with.
    ///
    /// # Errors
    /// Returns an error to reject the channel.
    fn on_chan_open_try(
        &self,
        ctx: &mut ModuleCtx<'_>,
        port_id: &PortId,
        channel_id: &ChannelId,
        channel: &ChannelEnd,
        capability: &Capability,
        counterparty_version: &str,
    ) -> Result<String, ModuleError>;

    /// Called on `ChanOpenAck` with the version chosen by the counterparty.
    ///
    /// # Errors
    /// Returns an error to reject the version.
    fn on_chan_open_ack(
        &self,
        ctx: &mut ModuleCtx<'_>,
        port_id: &PortId,
        channel_id: &ChannelId,
        counterparty_channel_id: &ChannelId,
        counterparty_version: &str,
    ) -> Result<(), ModuleError>;

    /// Called on `ChanOpenConfirm`.
    ///
    /// # Errors
    /// Returns an error to reject the step.
    fn on_chan_open_confirm(
        &self,
        ctx: &mut ModuleCtx<'_>,
        port_id: &PortId,
        channel_id: &ChannelId,
    ) -> Result<(), ModuleError>;

    /// Called on `ChanCloseInit`.
    ///
    /// # Errors
    /// Returns an error to keep the channel open.
    fn on_chan_close_init(
        &self,
        ctx: &mut ModuleCtx<'_>,
        port_id: &PortId,
        channel_id: &ChannelId,
    ) -> Result<(), ModuleError>;

    /// Called on `ChanCloseConfirm`.
    ///
    /// # Errors
    /// Returns an error to reject the step.
    fn on_chan_close_confirm(
        &self,
        ctx: &mut ModuleCtx<'_>,
        port_id: &PortId,
        channel_id: &ChannelId,
    ) -> Result<(), ModuleError>;

    /// Called on `RecvPacket`. Returns the acknowledgement to write, or `None` to write it
    /// later through [`crate::IbcCore::write_acknowledgement`].
    fn on_recv_packet(&self, ctx: &mut ModuleCtx<'_>, packet: &Packet)
        -> Option<Acknowledgement>;

    /// Called on `AcknowledgePacket` with the acknowledgement bytes written by the receiver.
    ///
    /// # Errors
    /// Returns an error to reject the acknowledgement.
    fn on_acknowledgement_packet(
        &self,
        ctx: &mut ModuleCtx<'_>,
        packet: &Packet,
        acknowledgement: &[u8],
    ) -> Result<(), ModuleError>;

    /// Called on `TimeoutPacket`.
    ///
    /// # Errors
    /// Returns an error to reject the timeout.
    fn on_timeout_packet(&self, ctx: &mut ModuleCtx<'_>, packet: &Packet)
        -> Result<(), ModuleError>;

    /// Called on `TimeoutOnClose`. Defaults to [`Module::on_timeout_packet`].
    ///
    /// # Errors
    /// Returns an error to reject the timeout.
    fn on_timeout_packet_close(
        &self,
        ctx: &mut ModuleCtx<'_>,
        packet: &Packet,
    ) -> Result<(), ModuleError> {
        self.on_timeout_packet(ctx, packet)
    }

    /// Returns the version this module would accept for a channel proposed with
    /// `proposed_version`. Defaults to accepting the proposal unchanged.
    ///
    /// # Errors
    /// Returns an error if no acceptable version exists.
    fn negotiate_app_version(
        &self,
        _order: Order,
        _connection_id: &ConnectionId,
        _port_id: &PortId,
        proposed_version: &str,
    ) -> Result<String, ModuleError> {
        Ok(proposed_version.to_string())
    }
}

/// Routing table from ports to modules, built once at startup.
#[derive(Clone, Default)]
pub struct Router {
    modules: BTreeMap<PortId, Arc<dyn Module>>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `port_id` to `module`.
    /// # Panics
    /// Panics if the port is already routed.
    #[must_use]
    pub fn with_module<T: Module + 'static>(mut self, port_id: PortId, module: T) -> Self {
        assert!(
            !self.modules.contains_key(&port_id),
            "port {port_id} already routed"
        );
        self.modules.insert(port_id, Arc::new(module));
        self
    }

    /// Returns the module routed to `port_id`.
    ///
    /// # Errors
    /// Returns [`IbcError::PortNotBound`] if no module is routed to the port.
    pub fn lookup_module_by_port(&self, port_id: &PortId) -> Result<&Arc<dyn Module>, IbcError> {
        self.modules
            .get(port_id)
            .ok_or_else(|| IbcError::PortNotBound(port_id.clone()))
    }

    /// Returns the routed ports.
    pub fn ports(&self) -> impl Iterator<Item = &PortId> {
        self.modules.keys()
    }
}

impl core::fmt::Debug for Router {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Router")
            .field("ports", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}
