//! Deterministic attestor keys and header signing for tests

#![allow(clippy::missing_panics_doc)]

use ed25519_dalek::{Signer, SigningKey};
use ibc_classic_types::Height;

use crate::{
    client_state::ClientState,
    consensus_state::ConsensusState,
    header::{AttestorSignature, ClientMessage, Header, Misbehaviour},
};

/// Trusting period used by [`client_state`]: one day in nanoseconds.
pub const TRUSTING_PERIOD: u64 = 86_400 * 1_000_000_000;

/// Returns `count` attestor keys derived from the seeds `1..=count`.
#[must_use]
pub fn attestor_keys(count: u8) -> Vec<SigningKey> {
    (1..=count).map(|seed| SigningKey::from_bytes(&[seed; 32])).collect()
}

/// Builds an unfrozen client state trusting `keys`.
#[must_use]
pub fn client_state(
    chain_id: &str,
    keys: &[SigningKey],
    min_required_sigs: u8,
    latest_height: Height,
) -> ClientState {
    ClientState {
        chain_id: chain_id.to_string(),
        attestors: keys.iter().map(|k| k.verifying_key().to_bytes()).collect(),
        min_required_sigs,
        trusting_period: TRUSTING_PERIOD,
        latest_height,
        frozen_height: None,
    }
}

/// Builds a header signed by every key in `signers`.
#[must_use]
pub fn signed_header(
    chain_id: &str,
    signers: &[SigningKey],
    height: Height,
    consensus_state: ConsensusState,
) -> Header {
    let mut header = Header {
        height,
        timestamp: consensus_state.timestamp,
        root: consensus_state.root,
        signatures: vec![],
    };
    let digest = header.sign_bytes(chain_id);
    header.signatures = signers
        .iter()
        .map(|key| AttestorSignature {
            attestor: key.verifying_key().to_bytes(),
            signature: key.sign(&digest).to_bytes(),
        })
        .collect();
    header
}

/// Encodes a header as a client message.
///
/// # Panics
/// Panics if serialization fails.
#[must_use]
pub fn header_message(header: Header) -> Vec<u8> {
    ClientMessage::Header(header).encode().unwrap()
}

/// Encodes two headers as misbehaviour evidence.
///
/// # Panics
/// Panics if serialization fails.
#[must_use]
pub fn misbehaviour_message(header_1: Header, header_2: Header) -> Vec<u8> {
    ClientMessage::Misbehaviour(Misbehaviour { header_1, header_2 })
        .encode()
        .unwrap()
}
