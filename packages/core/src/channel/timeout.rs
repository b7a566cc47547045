//! Packet timeouts, by expiry and by counterparty channel closure.

use ibc_classic_types::{
    channel::{ChannelEnd, Counterparty, Order, State},
    commitment::sequence_bytes,
    connection::ConnectionEnd,
    ensure,
    packet::Packet,
    path::Path,
    Height,
};

use super::{
    channel_connection, counterparty_hops, encode, ensure_channel_open, ensure_not_closed,
    ensure_packet_destination, load_channel, packet::ensure_commitment, store_channel,
};
use crate::{
    capability::get_capability,
    client::ProofTarget,
    engine::{IbcCore, Response},
    error::IbcError,
    events::IbcEvent,
    host::HostInfo,
    store::Store,
};

/// Message timing out a packet the counterparty never received before its timeout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgTimeout {
    /// The timed out packet
    pub packet: Packet,
    /// Proof of absence of the receipt, or of the next receive sequence on ORDERED channels
    pub proof_unreceived: Vec<u8>,
    /// Destination chain height the proof was produced at
    pub proof_height: Height,
    /// The destination's next receive sequence; checked on ORDERED channels only
    pub next_sequence_recv: u64,
}

/// Message timing out a packet whose destination channel was closed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgTimeoutOnClose {
    /// The timed out packet
    pub packet: Packet,
    /// Proof of absence of the receipt, or of the next receive sequence on ORDERED channels
    pub proof_unreceived: Vec<u8>,
    /// Proof of the CLOSED destination channel
    pub proof_close: Vec<u8>,
    /// Destination chain height the proofs were produced at
    pub proof_height: Height,
    /// The destination's next receive sequence; checked on ORDERED channels only
    pub next_sequence_recv: u64,
}

/// Proof material shared by both timeout flavours.
struct Unreceived<'a> {
    packet: &'a Packet,
    proof: &'a [u8],
    proof_height: Height,
    next_sequence_recv: u64,
}

impl IbcCore {
    /// Times out a packet whose timeout passed on the counterparty without it being received.
    /// An ORDERED channel is closed.
    ///
    /// # Errors
    /// Returns an error if the channel is not OPEN, the commitment is missing or does not
    /// match, the timeout was not reached at the proof height, or a proof fails.
    #[tracing::instrument(skip_all, fields(sequence = msg.packet.sequence))]
    pub fn timeout_packet(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgTimeout,
    ) -> Result<Response<()>, IbcError> {
        let packet = &msg.packet;

        Self::execute(store, |store, events| {
            let (port_id, channel_id) = (&packet.source_port, &packet.source_channel);
            let mut channel = load_channel(store, port_id, channel_id)?;
            ensure_channel_open(port_id, channel_id, &channel)?;
            ensure_packet_destination(&channel, packet)?;
            get_capability(
                store,
                &Path::ChannelCapability(port_id.clone(), channel_id.clone()),
            )?;
            let (connection_id, connection) = channel_connection(store, &channel)?;
            let commitment_key = ensure_commitment(store, packet)?;

            let timestamp = if packet.timeout_timestamp == 0 {
                0
            } else {
                self.consensus_timestamp(store, &connection.client_id, msg.proof_height)?
            };
            if !packet.timed_out(msg.proof_height, timestamp) {
                tracing::debug!(
                    sequence = packet.sequence,
                    proof_height = %msg.proof_height,
                    counterparty_timestamp = timestamp,
                    "packet timeout not reached"
                );
                return Err(IbcError::PacketTimeoutNotReached {
                    sequence: packet.sequence,
                });
            }

            self.verify_unreceived(
                store,
                host,
                &connection,
                channel.ordering,
                &Unreceived {
                    packet,
                    proof: &msg.proof_unreceived,
                    proof_height: msg.proof_height,
                    next_sequence_recv: msg.next_sequence_recv,
                },
            )?;
            store.delete(&commitment_key);
            close_ordered(store, events, &mut channel, packet)?;

            self.callback(store, host, port_id, |module, ctx| {
                module.on_timeout_packet(ctx, packet)
            })?;

            tracing::info!(
                %port_id,
                %channel_id,
                %connection_id,
                sequence = packet.sequence,
                "timed out packet"
            );
            events.push(IbcEvent::TimeoutPacket(packet.clone()));
            Ok(())
        })
    }

    /// Times out a packet by proving the destination channel CLOSED. An ORDERED channel is
    /// closed.
    ///
    /// # Errors
    /// Returns an error if the channel is closed, the commitment is missing or does not
    /// match, or a proof fails.
    #[tracing::instrument(skip_all, fields(sequence = msg.packet.sequence))]
    pub fn timeout_on_close(
        &self,
        store: &mut dyn Store,
        host: &HostInfo,
        msg: MsgTimeoutOnClose,
    ) -> Result<Response<()>, IbcError> {
        let packet = &msg.packet;

        Self::execute(store, |store, events| {
            let (port_id, channel_id) = (&packet.source_port, &packet.source_channel);
            let mut channel = load_channel(store, port_id, channel_id)?;
            ensure_not_closed(port_id, channel_id, &channel)?;
            ensure_packet_destination(&channel, packet)?;
            get_capability(
                store,
                &Path::ChannelCapability(port_id.clone(), channel_id.clone()),
            )?;
            let (connection_id, connection) = channel_connection(store, &channel)?;
            let commitment_key = ensure_commitment(store, packet)?;

            let expected = ChannelEnd {
                state: State::Closed,
                ordering: channel.ordering,
                counterparty: Counterparty::new(port_id.clone(), Some(channel_id.clone())),
                connection_hops: counterparty_hops(&connection_id, &connection)?,
                version: channel.version.clone(),
            };
            self.verify_membership(
                store,
                host,
                &ProofTarget::packet(&connection, msg.proof_height),
                &msg.proof_close,
                &Path::ChannelEnd(
                    packet.destination_port.clone(),
                    packet.destination_channel.clone(),
                ),
                &encode(
                    &packet.destination_port,
                    &packet.destination_channel,
                    &expected,
                )?,
            )?;
            self.verify_unreceived(
                store,
                host,
                &connection,
                channel.ordering,
                &Unreceived {
                    packet,
                    proof: &msg.proof_unreceived,
                    proof_height: msg.proof_height,
                    next_sequence_recv: msg.next_sequence_recv,
                },
            )?;
            store.delete(&commitment_key);
            close_ordered(store, events, &mut channel, packet)?;

            self.callback(store, host, port_id, |module, ctx| {
                module.on_timeout_packet_close(ctx, packet)
            })?;

            tracing::info!(
                %port_id,
                %channel_id,
                %connection_id,
                sequence = packet.sequence,
                "timed out packet on close"
            );
            events.push(IbcEvent::TimeoutPacket(packet.clone()));
            Ok(())
        })
    }

    /// Verifies the destination has not received the packet: on ORDERED channels by proving
    /// its next receive sequence, on UNORDERED channels by proving the receipt absent.
    fn verify_unreceived(
        &self,
        store: &dyn Store,
        host: &HostInfo,
        connection: &ConnectionEnd,
        ordering: Order,
        unreceived: &Unreceived<'_>,
    ) -> Result<(), IbcError> {
        let packet = unreceived.packet;
        let target = ProofTarget::packet(connection, unreceived.proof_height);
        match ordering {
            Order::Ordered => {
                ensure!(
                    unreceived.next_sequence_recv <= packet.sequence,
                    IbcError::PacketAlreadyReceived {
                        sequence: packet.sequence,
                    }
                );
                self.verify_membership(
                    store,
                    host,
                    &target,
                    unreceived.proof,
                    &Path::NextSequenceRecv(
                        packet.destination_port.clone(),
                        packet.destination_channel.clone(),
                    ),
                    &sequence_bytes(unreceived.next_sequence_recv),
                )
            }
            Order::Unordered => self.verify_non_membership(
                store,
                host,
                &target,
                unreceived.proof,
                &Path::Receipt(
                    packet.destination_port.clone(),
                    packet.destination_channel.clone(),
                    packet.sequence,
                ),
            ),
        }
    }
}

/// Closes the channel if it is ORDERED.
fn close_ordered(
    store: &mut dyn Store,
    events: &mut Vec<IbcEvent>,
    channel: &mut ChannelEnd,
    packet: &Packet,
) -> Result<(), IbcError> {
    if channel.ordering != Order::Ordered {
        return Ok(());
    }
    channel.state = State::Closed;
    store_channel(store, &packet.source_port, &packet.source_channel, channel)?;
    tracing::warn!(
        port_id = %packet.source_port,
        channel_id = %packet.source_channel,
        sequence = packet.sequence,
        "ordered channel closed by packet timeout"
    );
    events.push(IbcEvent::ChannelClosed {
        port_id: packet.source_port.clone(),
        channel_id: packet.source_channel.clone(),
    });
    Ok(())
}
