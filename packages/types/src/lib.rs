//! Shared records and helpers for the IBC classic protocol engine.
//!
//! Everything in this crate is plain data: identifiers, heights, connection and channel ends,
//! packets, the ICS-24 path layout and the commitment hashes that are proven across chains.
#![deny(clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod channel;
pub mod commitment;
pub mod connection;
pub mod error;
pub mod height;
pub mod identifier;
pub mod packet;
pub mod path;

pub use error::TypesError;
pub use height::Height;

/// Ensure that a condition is true, otherwise return an error.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}
