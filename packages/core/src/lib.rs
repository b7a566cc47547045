//! The IBC classic protocol engine.
//!
//! [`IbcCore`] drives the client keeper, the connection and channel handshakes and the packet
//! lifecycle over a host-supplied [`store::Store`]. Every operation is synchronous and
//! all-or-nothing: writes go to a [`store::StoreCache`] that is committed only when the
//! operation succeeds. Counterparty state is observed exclusively through light client
//! membership proofs.
#![deny(clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod capability;
pub mod channel;
pub mod client;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod events;
pub mod host;
pub mod router;
pub mod store;

pub use capability::Capability;
pub use config::CoreConfig;
pub use engine::{IbcCore, Response};
pub use error::{ErrorKind, IbcError};
pub use events::IbcEvent;
pub use host::{HostInfo, SelfClientValidator};
pub use router::{Module, ModuleCtx, ModuleError, Router};
pub use store::{MemoryStore, Store};
