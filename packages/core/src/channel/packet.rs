//! Sending, receiving and acknowledging packets.

use ibc_classic_types::{
    channel::Order,
    commitment::{acknowledgement_commitment, packet_commitment, RECEIPT},
    ensure,
    identifier::{ChannelId, PortId},
    packet::{Acknowledgement, Packet},
    path::Path,
    Height, TypesError,
};

use super::{
    channel_connection, ensure_channel_open, ensure_packet_destination, ensure_packet_source,
    increment_sequence, load_channel, read_sequence,
};
use crate::{
    capability::{authenticate_capability, get_capability, Capability},
    client::ProofTarget,
    engine::{IbcCore, Response},
    error::IbcError,
    events::IbcEvent,
    host::HostInfo,
    store::{Store, StoreCache},
};

/// A packet an application asks to send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgSendPacket {
    /// The sending port
    pub source_port: PortId,
    /// The sending channel
    pub source_channel: ChannelId,
    /// Opaque application payload
    pub data: Vec<u8>,
    /// Counterparty height at which the packet expires; zero disables it
    pub timeout_height: Height,
    /// Counterparty timestamp in nanoseconds at which the packet expires; zero disables it
    pub timeout_timestamp: u64,
}

/// Message delivering a packet to its destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgRecvPacket {
    /// The packet
    pub packet: Packet,
    /// Proof of the packet commitment on the source chain
    pub proof_commitment: Vec<u8>,
    /// Source chain height the proof was produced at
    pub proof_height: Height,
}

/// Message relaying an acknowledgement back to the packet's source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgAcknowledgement {
    /// The acknowledged packet
    pub packet: Packet,
    /// The acknowledgement bytes written by the receiver
    pub acknowledgement: Vec<u8>,
    /// Proof of the acknowledgement commitment on the destination chain
    pub proof_acked: Vec<u8>,
    /// Destination chain height the proof was produced at
    pub proof_height: Height,
}

impl IbcCore {
    /// Commits a packet for sending on behalf of the module holding the channel capability.
    /// Returns the committed packet.
    ///
    /// # Errors
    /// Returns an error if the channel is not OPEN, the capability does not authenticate, the
    /// client is not active, or no timeout is set or it already elapsed on the counterparty.
    #[tracing::instrument(
        skip_all,
        fields(port_id = %msg.source_port, channel_id = %msg.source_channel)
    )]
    pub fn send_packet(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        capability: &Capability,
        msg: MsgSendPacket,
    ) -> Result<Response<Packet>, IbcError> {
        Self::execute(store, |store, events| {
            let (port_id, channel_id) = (&msg.source_port, &msg.source_channel);
            let channel = load_channel(store, port_id, channel_id)?;
            ensure_channel_open(port_id, channel_id, &channel)?;
            authenticate_capability(
                store,
                capability,
                &Path::ChannelCapability(port_id.clone(), channel_id.clone()),
            )?;
            ensure!(
                !msg.timeout_height.is_zero() || msg.timeout_timestamp != 0,
                IbcError::InvalidTimeout {
                    reason: "timeout height and timeout timestamp cannot both be 0".into(),
                }
            );

            let (_, connection) = channel_connection(store, &channel)?;
            let client_id = &connection.client_id;
            self.ensure_client_active(store, host, client_id)?;
            let latest_height = self.client_latest_height(store, client_id)?;
            ensure!(
                msg.timeout_height.is_zero() || latest_height < msg.timeout_height,
                IbcError::InvalidTimeout {
                    reason: format!(
                        "timeout height {} already reached by counterparty height {latest_height}",
                        msg.timeout_height
                    ),
                }
            );
            if msg.timeout_timestamp != 0 {
                let latest_timestamp = self.consensus_timestamp(store, client_id, latest_height)?;
                ensure!(
                    latest_timestamp < msg.timeout_timestamp,
                    IbcError::InvalidTimeout {
                        reason: format!(
                            "timeout timestamp {} already reached by counterparty timestamp \
                             {latest_timestamp}",
                            msg.timeout_timestamp
                        ),
                    }
                );
            }

            let destination_channel = channel.counterparty.channel_id.clone().ok_or_else(|| {
                IbcError::corrupted(
                    Path::ChannelEnd(port_id.clone(), channel_id.clone()),
                    "OPEN channel without counterparty channel id",
                )
            })?;
            let sequence_path = Path::NextSequenceSend(port_id.clone(), channel_id.clone());
            let sequence = read_sequence(store, &sequence_path)?;
            increment_sequence(store, &sequence_path, sequence)?;

            let packet = Packet {
                sequence,
                source_port: port_id.clone(),
                source_channel: channel_id.clone(),
                destination_port: channel.counterparty.port_id.clone(),
                destination_channel,
                data: msg.data,
                timeout_height: msg.timeout_height,
                timeout_timestamp: msg.timeout_timestamp,
            };
            let commitment = packet_commitment(&packet);
            store.set(
                Path::Commitment(port_id.clone(), channel_id.clone(), sequence).to_key(),
                commitment.to_vec(),
            );

            tracing::info!(
                %port_id,
                %channel_id,
                sequence,
                commitment = %hex::encode(commitment),
                "sent packet"
            );
            events.push(IbcEvent::SendPacket(packet.clone()));
            Ok(packet)
        })
    }

    /// Receives a packet proven committed on its source chain and dispatches it to the
    /// destination module. Returns the acknowledgement written, or `None` if the module
    /// acknowledges asynchronously.
    ///
    /// # Errors
    /// Returns an error if the channel is not OPEN, the packet expired at this chain, the
    /// proof fails, or the packet is out of order or already received.
    #[tracing::instrument(skip_all, fields(sequence = msg.packet.sequence))]
    pub fn recv_packet(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgRecvPacket,
    ) -> Result<Response<Option<Acknowledgement>>, IbcError> {
        let packet = &msg.packet;
        packet.validate()?;

        Self::execute(store, |store, events| {
            let (port_id, channel_id) = (&packet.destination_port, &packet.destination_channel);
            let channel = load_channel(store, port_id, channel_id)?;
            ensure_channel_open(port_id, channel_id, &channel)?;
            ensure_packet_source(&channel, packet)?;
            get_capability(
                store,
                &Path::ChannelCapability(port_id.clone(), channel_id.clone()),
            )?;
            let (_, connection) = channel_connection(store, &channel)?;

            if packet.timed_out(host.height, host.timestamp) {
                tracing::warn!(
                    sequence = packet.sequence,
                    host_height = %host.height,
                    host_timestamp = host.timestamp,
                    "packet timed out before it was received"
                );
                return Err(IbcError::PacketTimedOut {
                    sequence: packet.sequence,
                });
            }

            self.verify_membership(
                store,
                host,
                &ProofTarget::packet(&connection, msg.proof_height),
                &msg.proof_commitment,
                &Path::Commitment(
                    packet.source_port.clone(),
                    packet.source_channel.clone(),
                    packet.sequence,
                ),
                &packet_commitment(packet),
            )?;

            match channel.ordering {
                Order::Ordered => {
                    let path = Path::NextSequenceRecv(port_id.clone(), channel_id.clone());
                    let expected = read_sequence(store, &path)?;
                    ensure!(
                        packet.sequence == expected,
                        IbcError::PacketSequenceOutOfOrder {
                            expected,
                            actual: packet.sequence,
                        }
                    );
                    increment_sequence(store, &path, expected)?;
                }
                Order::Unordered => {
                    let key = Path::Receipt(port_id.clone(), channel_id.clone(), packet.sequence)
                        .to_key();
                    if store.get(&key).is_some() {
                        tracing::warn!(sequence = packet.sequence, "packet already received");
                        return Err(IbcError::PacketAlreadyReceived {
                            sequence: packet.sequence,
                        });
                    }
                    store.set(key, RECEIPT.to_vec());
                }
            }
            tracing::info!(
                %port_id,
                %channel_id,
                sequence = packet.sequence,
                "received packet"
            );
            events.push(IbcEvent::RecvPacket(packet.clone()));

            let acknowledgement = {
                let mut cache = StoreCache::new(store);
                let acknowledgement = self.callback(&mut cache, host, port_id, |module, ctx| {
                    Ok(module.on_recv_packet(ctx, packet))
                })?;
                if acknowledgement
                    .as_ref()
                    .map_or(true, Acknowledgement::is_success)
                {
                    cache.commit();
                } else {
                    tracing::warn!(
                        sequence = packet.sequence,
                        "error acknowledgement, discarding module writes"
                    );
                }
                acknowledgement
            };
            if let Some(acknowledgement) = &acknowledgement {
                write_acknowledgement(store, events, packet, acknowledgement)?;
            }
            Ok(acknowledgement)
        })
    }

    /// Writes an acknowledgement deferred by the module's `on_recv_packet`.
    ///
    /// # Errors
    /// Returns an error if the channel is not OPEN, the capability does not authenticate, the
    /// packet was not received, or an acknowledgement was already written.
    #[tracing::instrument(skip_all, fields(sequence = packet.sequence))]
    pub fn write_acknowledgement(
        &self,
        store: &mut dyn Store,
        capability: &Capability,
        packet: &Packet,
        acknowledgement: &Acknowledgement,
    ) -> Result<Response<()>, IbcError> {
        Self::execute(store, |store, events| {
            let (port_id, channel_id) = (&packet.destination_port, &packet.destination_channel);
            let channel = load_channel(store, port_id, channel_id)?;
            ensure_channel_open(port_id, channel_id, &channel)?;
            authenticate_capability(
                store,
                capability,
                &Path::ChannelCapability(port_id.clone(), channel_id.clone()),
            )?;

            let received = match channel.ordering {
                Order::Ordered => {
                    packet.sequence
                        < read_sequence(
                            store,
                            &Path::NextSequenceRecv(port_id.clone(), channel_id.clone()),
                        )?
                }
                Order::Unordered => store
                    .get(
                        &Path::Receipt(port_id.clone(), channel_id.clone(), packet.sequence)
                            .to_key(),
                    )
                    .is_some(),
            };
            ensure!(
                received,
                IbcError::InvalidPacket {
                    reason: format!("packet {} was not received", packet.sequence),
                }
            );

            write_acknowledgement(store, events, packet, acknowledgement)
        })
    }

    /// Processes the acknowledgement of a sent packet, deleting its commitment and
    /// dispatching it to the source module.
    ///
    /// # Errors
    /// Returns an error if the channel is not OPEN, the commitment is missing or does not
    /// match, the proof fails, the acknowledgement is out of order, or the module rejects it.
    #[tracing::instrument(skip_all, fields(sequence = msg.packet.sequence))]
    pub fn acknowledge_packet(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgAcknowledgement,
    ) -> Result<Response<()>, IbcError> {
        let packet = &msg.packet;
        ensure!(
            !msg.acknowledgement.is_empty(),
            IbcError::Types(TypesError::InvalidAcknowledgement {
                reason: "acknowledgement cannot be empty".into(),
            })
        );

        Self::execute(store, |store, events| {
            let (port_id, channel_id) = (&packet.source_port, &packet.source_channel);
            let channel = load_channel(store, port_id, channel_id)?;
            ensure_channel_open(port_id, channel_id, &channel)?;
            ensure_packet_destination(&channel, packet)?;
            get_capability(
                store,
                &Path::ChannelCapability(port_id.clone(), channel_id.clone()),
            )?;
            let (_, connection) = channel_connection(store, &channel)?;
            let commitment_key = ensure_commitment(store, packet)?;

            self.verify_membership(
                store,
                host,
                &ProofTarget::packet(&connection, msg.proof_height),
                &msg.proof_acked,
                &Path::Ack(
                    packet.destination_port.clone(),
                    packet.destination_channel.clone(),
                    packet.sequence,
                ),
                &acknowledgement_commitment(&msg.acknowledgement),
            )?;

            if channel.ordering == Order::Ordered {
                let path = Path::NextSequenceAck(port_id.clone(), channel_id.clone());
                let expected = read_sequence(store, &path)?;
                ensure!(
                    packet.sequence == expected,
                    IbcError::PacketSequenceOutOfOrder {
                        expected,
                        actual: packet.sequence,
                    }
                );
                increment_sequence(store, &path, expected)?;
            }
            store.delete(&commitment_key);

            self.callback(store, host, port_id, |module, ctx| {
                module.on_acknowledgement_packet(ctx, packet, &msg.acknowledgement)
            })?;

            tracing::info!(
                %port_id,
                %channel_id,
                sequence = packet.sequence,
                "acknowledged packet"
            );
            events.push(IbcEvent::AcknowledgePacket(packet.clone()));
            Ok(())
        })
    }
}

/// Checks that the stored commitment was made for `packet` and returns its key.
pub(super) fn ensure_commitment(store: &dyn Store, packet: &Packet) -> Result<Vec<u8>, IbcError> {
    let key = Path::Commitment(
        packet.source_port.clone(),
        packet.source_channel.clone(),
        packet.sequence,
    )
    .to_key();
    let Some(stored) = store.get(&key) else {
        tracing::warn!(
            sequence = packet.sequence,
            "packet commitment not found, already acknowledged or timed out"
        );
        return Err(IbcError::PacketCommitmentNotFound {
            sequence: packet.sequence,
        });
    };
    ensure!(
        stored == packet_commitment(packet),
        IbcError::PacketCommitmentMismatch {
            sequence: packet.sequence,
        }
    );
    Ok(key)
}

/// Stores the acknowledgement commitment of a received packet.
fn write_acknowledgement(
    store: &mut dyn Store,
    events: &mut Vec<IbcEvent>,
    packet: &Packet,
    acknowledgement: &Acknowledgement,
) -> Result<(), IbcError> {
    let key = Path::Ack(
        packet.destination_port.clone(),
        packet.destination_channel.clone(),
        packet.sequence,
    )
    .to_key();
    ensure!(
        store.get(&key).is_none(),
        IbcError::AcknowledgementAlreadyWritten {
            sequence: packet.sequence,
        }
    );

    let bytes = acknowledgement.to_bytes()?;
    let commitment = acknowledgement_commitment(&bytes);
    store.set(key, commitment.to_vec());

    tracing::info!(
        sequence = packet.sequence,
        success = acknowledgement.is_success(),
        commitment = %hex::encode(commitment),
        "wrote acknowledgement"
    );
    events.push(IbcEvent::WriteAcknowledgement {
        packet: packet.clone(),
        acknowledgement: bytes,
    });
    Ok(())
}
