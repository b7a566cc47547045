//! Capability tokens gating port and channel access.
//!
//! A [`Capability`] can only be minted by the engine. It is bound to a name (a port or channel
//! capability path) when claimed, and every operation acting on that port or channel
//! authenticates the token it is handed against the stored binding.

use ibc_classic_types::path::Path;

use crate::{
    error::IbcError,
    store::{next_counter, read_u64, write_u64, Store},
};

const NEXT_CAPABILITY_INDEX: &str = "capabilities/nextIndex";

/// An unforgeable permission token.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Capability {
    index: u64,
}

impl Capability {
    /// Returns the globally unique index of the capability.
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }
}

/// Mints a fresh capability.
///
/// # Errors
/// Returns an error if the stored index counter is corrupted.
pub fn new_capability(store: &mut dyn Store) -> Result<Capability, IbcError> {
    let index = next_counter(store, NEXT_CAPABILITY_INDEX)?;
    Ok(Capability { index })
}

/// Binds `capability` to `name`.
///
/// # Errors
/// Returns [`IbcError::CapabilityAlreadyClaimed`] if the name is already bound.
pub fn claim_capability(
    store: &mut dyn Store,
    capability: &Capability,
    name: &Path,
) -> Result<(), IbcError> {
    let key = name.to_key();
    if store.get(&key).is_some() {
        return Err(IbcError::CapabilityAlreadyClaimed(name.to_string()));
    }
    write_u64(store, &key, capability.index);
    Ok(())
}

/// Returns the capability bound to `name`.
///
/// # Errors
/// Returns [`IbcError::CapabilityNotFound`] if nothing is bound to the name.
pub fn get_capability(store: &dyn Store, name: &Path) -> Result<Capability, IbcError> {
    read_u64(store, &name.to_key())?
        .map(|index| Capability { index })
        .ok_or_else(|| IbcError::CapabilityNotFound(name.to_string()))
}

/// Checks that `capability` is the one bound to `name`.
///
/// # Errors
/// Returns [`IbcError::CapabilityNotFound`] if nothing is bound to the name, or
/// [`IbcError::InvalidCapability`] if another capability is.
pub fn authenticate_capability(
    store: &dyn Store,
    capability: &Capability,
    name: &Path,
) -> Result<(), IbcError> {
    let bound = get_capability(store, name)?;
    if bound != *capability {
        return Err(IbcError::InvalidCapability(name.to_string()));
    }
    Ok(())
}
