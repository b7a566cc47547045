//! This module defines [`ClientRegistry`].

use std::{collections::BTreeMap, sync::Arc};

use crate::client::LightClient;

/// The light client implementations known to the host, keyed by client type.
///
/// Built once at startup and immutable afterwards; the engine holds it by reference.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: BTreeMap<String, Arc<dyn LightClient>>,
}

impl ClientRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an implementation under its own client type.
    ///
    /// # Panics
    /// Panics if the client type has already been registered.
    #[must_use]
    pub fn with_client<T: LightClient + 'static>(self, client: T) -> Self {
        let client_type = client.client_type();
        self.with_client_as(client_type, client)
    }

    /// Registers an implementation under an explicit client type.
    ///
    /// # Panics
    /// Panics if the client type has already been registered.
    #[must_use]
    pub fn with_client_as<T: LightClient + 'static>(
        mut self,
        client_type: impl Into<String>,
        client: T,
    ) -> Self {
        let client_type = client_type.into();
        assert!(
            !self.clients.contains_key(&client_type),
            "light client type already registered"
        );
        self.clients.insert(client_type, Arc::new(client));
        self
    }

    /// Returns the implementation registered for `client_type`.
    #[must_use]
    pub fn get(&self, client_type: &str) -> Option<&Arc<dyn LightClient>> {
        self.clients.get(client_type)
    }

    /// Returns the registered client types.
    pub fn client_types(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }
}

impl core::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("client_types", &self.clients.keys().collect::<Vec<_>>())
            .finish()
    }
}
