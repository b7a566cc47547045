//! The light client interface of the IBC classic protocol engine.
//!
//! A light client authenticates another chain's consensus state. Each supported consensus type
//! provides one closed implementation of [`LightClient`], registered once at startup in a
//! [`ClientRegistry`]. Client and consensus states cross this boundary as opaque bytes: only
//! the implementation knows their layout.
#![deny(clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod registry;

pub use client::{ConsensusStateView, LightClient, Status, UpdatedState};
pub use error::LightClientError;
pub use registry::ClientRegistry;
