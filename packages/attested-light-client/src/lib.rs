#![doc = "Attestor-quorum light client for the IBC classic protocol engine"]
#![deny(clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod client_state;
pub mod consensus_state;
pub mod error;
pub mod header;
pub mod membership;
pub mod merkle;
pub mod misbehaviour;
pub mod update;
pub mod verify;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::{AttestedLightClient, CLIENT_TYPE};
