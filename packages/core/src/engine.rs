//! Defines [`IbcCore`], the entry point of the protocol engine.

use std::sync::Arc;

use ibc_classic_light_client::ClientRegistry;
use ibc_classic_types::identifier::PortId;

use crate::{
    config::CoreConfig,
    error::IbcError,
    events::IbcEvent,
    host::{HostInfo, SelfClientValidator},
    router::{Module, ModuleCtx, ModuleError, Router},
    store::{Store, StoreCache},
};

/// The result of a successful operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response<T> {
    /// The value returned by the operation
    pub value: T,
    /// The events emitted, in order
    pub events: Vec<IbcEvent>,
}

/// The protocol engine.
///
/// Holds the immutable wiring built at startup: configuration, registered light clients, the
/// port router and the host's self-client validator. All state lives in the [`Store`] passed to
/// each operation.
pub struct IbcCore {
    config: CoreConfig,
    clients: ClientRegistry,
    router: Router,
    self_client: Arc<dyn SelfClientValidator>,
}

impl IbcCore {
    /// Creates a new engine.
    ///
    /// # Errors
    /// Returns an error if the configuration does not pass [`CoreConfig::validate`].
    pub fn new(
        config: CoreConfig,
        clients: ClientRegistry,
        router: Router,
        self_client: Arc<dyn SelfClientValidator>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        tracing::info!(
            client_types = ?clients.client_types().collect::<Vec<_>>(),
            ports = ?router.ports().map(PortId::as_str).collect::<Vec<_>>(),
            prefix = config.commitment_prefix.as_str(),
            "initialized ibc engine"
        );
        Ok(Self {
            config,
            clients,
            router,
            self_client,
        })
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Returns the registered light clients.
    #[must_use]
    pub const fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Returns the port router.
    #[must_use]
    pub const fn router(&self) -> &Router {
        &self.router
    }

    pub(crate) fn self_client(&self) -> &dyn SelfClientValidator {
        self.self_client.as_ref()
    }

    /// Runs `f` against a write-back cache over `store` and commits only on success.
    pub(crate) fn execute<T>(
        store: &mut dyn Store,
        f: impl FnOnce(&mut dyn Store, &mut Vec<IbcEvent>) -> Result<T, IbcError>,
    ) -> Result<Response<T>, IbcError> {
        let mut cache = StoreCache::new(store);
        let mut events = Vec::new();
        let value = f(&mut cache, &mut events)?;
        cache.commit();
        Ok(Response { value, events })
    }

    /// Invokes a callback of the module routed to `port_id` with a scoped store.
    pub(crate) fn callback<T>(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        port_id: &PortId,
        f: impl FnOnce(&dyn Module, &mut ModuleCtx<'_>) -> Result<T, ModuleError>,
    ) -> Result<T, IbcError> {
        let module = self.router.lookup_module_by_port(port_id)?;
        let mut ctx = ModuleCtx::new(store, port_id, *host);
        f(module.as_ref(), &mut ctx).map_err(|source| {
            tracing::warn!(%port_id, error = %source, "module callback failed");
            IbcError::Module {
                port_id: port_id.clone(),
                source,
            }
        })
    }
}

impl core::fmt::Debug for IbcCore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IbcCore")
            .field("config", &self.config)
            .field("clients", &self.clients)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}
