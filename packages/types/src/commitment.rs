//! Commitment hashes that are stored locally and proven on the counterparty.

use sha2::{Digest, Sha256};

use crate::packet::Packet;

/// Value stored under a receipt path once a packet was received on an unordered channel.
pub const RECEIPT: [u8; 1] = [1];

/// Computes the packet commitment.
/// Format: `sha256(timeout_timestamp || timeout_revision_number || timeout_revision_height ||
/// sha256(data))`, all integers big-endian.
#[must_use]
pub fn packet_commitment(packet: &Packet) -> [u8; 32] {
    let data_hash = Sha256::digest(&packet.data);

    let mut hasher = Sha256::new();
    hasher.update(packet.timeout_timestamp.to_be_bytes());
    hasher.update(packet.timeout_height.revision_number.to_be_bytes());
    hasher.update(packet.timeout_height.revision_height.to_be_bytes());
    hasher.update(data_hash);
    hasher.finalize().into()
}

/// Computes the acknowledgement commitment, `sha256(ack)`.
#[must_use]
pub fn acknowledgement_commitment(ack: &[u8]) -> [u8; 32] {
    Sha256::digest(ack).into()
}

/// Encodes a sequence counter the way it is stored and proven.
#[must_use]
pub const fn sequence_bytes(sequence: u64) -> [u8; 8] {
    sequence.to_be_bytes()
}

/// Decodes a stored sequence counter.
#[must_use]
pub fn sequence_from_bytes(bytes: &[u8]) -> Option<u64> {
    <[u8; 8]>::try_from(bytes).ok().map(u64::from_be_bytes)
}
