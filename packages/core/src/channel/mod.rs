//! Channels: the handshake, packet lifecycle and timeouts.

mod handshake;
mod packet;
mod timeout;

use ibc_classic_types::{
    channel::{ChannelEnd, Order, State},
    commitment::RECEIPT,
    connection::ConnectionEnd,
    ensure,
    identifier::{ChannelId, ConnectionId, PortId},
    packet::Packet,
    path::Path,
};

pub use handshake::{
    MsgChannelCloseConfirm, MsgChannelOpenAck, MsgChannelOpenConfirm, MsgChannelOpenInit,
    MsgChannelOpenTry,
};
pub use packet::{MsgAcknowledgement, MsgRecvPacket, MsgSendPacket};
pub use timeout::{MsgTimeout, MsgTimeoutOnClose};

use crate::{
    capability::{claim_capability, get_capability, new_capability, Capability},
    connection::load_open_connection,
    engine::{IbcCore, Response},
    error::IbcError,
    events::ChannelAttributes,
    store::{read_json, read_u64, write_json, write_u64, Store},
};

impl IbcCore {
    /// Claims the capability of a routed port. Channels can only be opened on bound ports.
    ///
    /// # Errors
    /// Returns an error if no module is routed to the port or it is already bound.
    #[tracing::instrument(skip_all, fields(port_id = %port_id))]
    pub fn bind_port(
        &self,
        store: &mut dyn Store,
        port_id: &PortId,
    ) -> Result<Response<Capability>, IbcError> {
        self.router().lookup_module_by_port(port_id)?;
        Self::execute(store, |store, _| {
            let name = Path::Port(port_id.clone());
            ensure!(
                get_capability(store, &name).is_err(),
                IbcError::PortAlreadyBound(port_id.clone())
            );
            let capability = new_capability(store)?;
            claim_capability(store, &capability, &name)?;
            tracing::info!(%port_id, "bound port");
            Ok(capability)
        })
    }

    /// Asks the module bound to `port_id` which version it would accept for a new channel.
    ///
    /// # Errors
    /// Returns an error if the connection does not exist, no module is routed to the port, or
    /// the module rejects the proposal.
    pub fn negotiate_app_version(
        &self,
        store: &dyn Store,
        order: Order,
        connection_id: &ConnectionId,
        port_id: &PortId,
        proposed_version: &str,
    ) -> Result<String, IbcError> {
        crate::connection::load_connection(store, connection_id)?;
        self.router()
            .lookup_module_by_port(port_id)?
            .negotiate_app_version(order, connection_id, port_id, proposed_version)
            .map_err(|source| IbcError::Module {
                port_id: port_id.clone(),
                source,
            })
    }

    /// Returns the stored channel end.
    ///
    /// # Errors
    /// Returns [`IbcError::ChannelNotFound`] if the channel does not exist.
    pub fn channel_end(
        &self,
        store: &dyn Store,
        port_id: &PortId,
        channel_id: &ChannelId,
    ) -> Result<ChannelEnd, IbcError> {
        load_channel(store, port_id, channel_id)
    }

    /// Returns the next sequence to send on a channel.
    ///
    /// # Errors
    /// Returns an error if the channel does not exist.
    pub fn next_sequence_send(
        &self,
        store: &dyn Store,
        port_id: &PortId,
        channel_id: &ChannelId,
    ) -> Result<u64, IbcError> {
        read_sequence(
            store,
            &Path::NextSequenceSend(port_id.clone(), channel_id.clone()),
        )
    }

    /// Returns the next sequence expected on an ORDERED channel.
    ///
    /// # Errors
    /// Returns an error if the channel does not exist.
    pub fn next_sequence_recv(
        &self,
        store: &dyn Store,
        port_id: &PortId,
        channel_id: &ChannelId,
    ) -> Result<u64, IbcError> {
        read_sequence(
            store,
            &Path::NextSequenceRecv(port_id.clone(), channel_id.clone()),
        )
    }

    /// Returns the next sequence to acknowledge on an ORDERED channel.
    ///
    /// # Errors
    /// Returns an error if the channel does not exist.
    pub fn next_sequence_ack(
        &self,
        store: &dyn Store,
        port_id: &PortId,
        channel_id: &ChannelId,
    ) -> Result<u64, IbcError> {
        read_sequence(
            store,
            &Path::NextSequenceAck(port_id.clone(), channel_id.clone()),
        )
    }

    /// Returns the commitment of a sent packet that was neither acknowledged nor timed out.
    #[must_use]
    pub fn packet_commitment(
        &self,
        store: &dyn Store,
        port_id: &PortId,
        channel_id: &ChannelId,
        sequence: u64,
    ) -> Option<Vec<u8>> {
        store.get(&Path::Commitment(port_id.clone(), channel_id.clone(), sequence).to_key())
    }

    /// Returns true if a receipt was written for a packet on an UNORDERED channel.
    #[must_use]
    pub fn packet_receipt(
        &self,
        store: &dyn Store,
        port_id: &PortId,
        channel_id: &ChannelId,
        sequence: u64,
    ) -> bool {
        store
            .get(&Path::Receipt(port_id.clone(), channel_id.clone(), sequence).to_key())
            .is_some_and(|receipt| receipt == RECEIPT)
    }

    /// Returns the acknowledgement commitment written for a received packet.
    #[must_use]
    pub fn packet_acknowledgement(
        &self,
        store: &dyn Store,
        port_id: &PortId,
        channel_id: &ChannelId,
        sequence: u64,
    ) -> Option<Vec<u8>> {
        store.get(&Path::Ack(port_id.clone(), channel_id.clone(), sequence).to_key())
    }
}

pub(crate) fn load_channel(
    store: &dyn Store,
    port_id: &PortId,
    channel_id: &ChannelId,
) -> Result<ChannelEnd, IbcError> {
    read_json(store, &Path::ChannelEnd(port_id.clone(), channel_id.clone()))?.ok_or_else(|| {
        IbcError::ChannelNotFound {
            port_id: port_id.clone(),
            channel_id: channel_id.clone(),
        }
    })
}

fn store_channel(
    store: &mut dyn Store,
    port_id: &PortId,
    channel_id: &ChannelId,
    channel: &ChannelEnd,
) -> Result<(), IbcError> {
    write_json(
        store,
        &Path::ChannelEnd(port_id.clone(), channel_id.clone()),
        channel,
    )
}

/// Fails with [`IbcError::ChannelClosed`] on a closed channel, or
/// [`IbcError::InvalidChannelState`] if the state is not one of `expected`.
fn ensure_channel_state(
    port_id: &PortId,
    channel_id: &ChannelId,
    channel: &ChannelEnd,
    expected: &[State],
) -> Result<(), IbcError> {
    ensure_not_closed(port_id, channel_id, channel)?;
    if expected.contains(&channel.state) {
        return Ok(());
    }
    Err(IbcError::InvalidChannelState {
        port_id: port_id.clone(),
        channel_id: channel_id.clone(),
        expected: expected
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" or "),
        actual: channel.state,
    })
}

fn ensure_not_closed(
    port_id: &PortId,
    channel_id: &ChannelId,
    channel: &ChannelEnd,
) -> Result<(), IbcError> {
    if channel.is_closed() {
        tracing::warn!(%port_id, %channel_id, "operation on closed channel");
        return Err(IbcError::ChannelClosed {
            port_id: port_id.clone(),
            channel_id: channel_id.clone(),
        });
    }
    Ok(())
}

/// Fails unless the channel is OPEN for packets.
fn ensure_channel_open(
    port_id: &PortId,
    channel_id: &ChannelId,
    channel: &ChannelEnd,
) -> Result<(), IbcError> {
    ensure_not_closed(port_id, channel_id, channel)?;
    ensure!(
        channel.is_open(),
        IbcError::ChannelNotOpen {
            port_id: port_id.clone(),
            channel_id: channel_id.clone(),
            state: channel.state,
        }
    );
    Ok(())
}

/// Returns the single connection hop of a channel.
fn single_hop(connection_hops: &[ConnectionId]) -> Result<&ConnectionId, IbcError> {
    match connection_hops {
        [connection_id] => Ok(connection_id),
        hops => Err(IbcError::InvalidConnectionHops {
            reason: format!("expected exactly one connection hop, got {}", hops.len()),
        }),
    }
}

/// Loads the OPEN connection a channel runs over.
fn channel_connection(
    store: &dyn Store,
    channel: &ChannelEnd,
) -> Result<(ConnectionId, ConnectionEnd), IbcError> {
    let connection_id = single_hop(&channel.connection_hops)?;
    let connection = load_open_connection(store, connection_id)?;
    Ok((connection_id.clone(), connection))
}

/// Returns the hops the counterparty channel end stores: the counterparty connection.
fn counterparty_hops(
    connection_id: &ConnectionId,
    connection: &ConnectionEnd,
) -> Result<Vec<ConnectionId>, IbcError> {
    connection
        .counterparty
        .connection_id
        .clone()
        .map(|id| vec![id])
        .ok_or_else(|| {
            IbcError::corrupted(
                Path::Connection(connection_id.clone()),
                "connection without counterparty connection id",
            )
        })
}

fn ensure_ordering_supported(
    connection_id: &ConnectionId,
    connection: &ConnectionEnd,
    ordering: Order,
) -> Result<(), IbcError> {
    ensure!(
        connection
            .negotiated_version()
            .is_some_and(|version| version.supports_order(ordering)),
        IbcError::InvalidChannelOrdering {
            reason: format!("connection {connection_id} does not support {ordering} channels"),
        }
    );
    Ok(())
}

/// Mints the capability of a new channel and binds it to the channel.
fn new_channel_capability(
    store: &mut dyn Store,
    port_id: &PortId,
    channel_id: &ChannelId,
) -> Result<Capability, IbcError> {
    let capability = new_capability(store)?;
    claim_capability(
        store,
        &capability,
        &Path::ChannelCapability(port_id.clone(), channel_id.clone()),
    )?;
    Ok(capability)
}

/// Fails unless the channel's counterparty is the packet's source.
fn ensure_packet_source(channel: &ChannelEnd, packet: &Packet) -> Result<(), IbcError> {
    ensure!(
        channel.counterparty.port_id == packet.source_port
            && channel.counterparty.channel_id.as_ref() == Some(&packet.source_channel),
        IbcError::InvalidPacket {
            reason: format!(
                "packet source {}/{} is not the channel counterparty",
                packet.source_port, packet.source_channel
            ),
        }
    );
    Ok(())
}

/// Fails unless the channel's counterparty is the packet's destination.
fn ensure_packet_destination(channel: &ChannelEnd, packet: &Packet) -> Result<(), IbcError> {
    ensure!(
        channel.counterparty.port_id == packet.destination_port
            && channel.counterparty.channel_id.as_ref() == Some(&packet.destination_channel),
        IbcError::InvalidPacket {
            reason: format!(
                "packet destination {}/{} is not the channel counterparty",
                packet.destination_port, packet.destination_channel
            ),
        }
    );
    Ok(())
}

fn init_sequences(store: &mut dyn Store, port_id: &PortId, channel_id: &ChannelId) {
    for path in [
        Path::NextSequenceSend(port_id.clone(), channel_id.clone()),
        Path::NextSequenceRecv(port_id.clone(), channel_id.clone()),
        Path::NextSequenceAck(port_id.clone(), channel_id.clone()),
    ] {
        write_u64(store, &path.to_key(), 1);
    }
}

fn read_sequence(store: &dyn Store, path: &Path) -> Result<u64, IbcError> {
    read_u64(store, &path.to_key())?
        .ok_or_else(|| IbcError::corrupted(path, "missing sequence"))
}

/// Stores the successor of `sequence` at `path`.
fn increment_sequence(
    store: &mut dyn Store,
    path: &Path,
    sequence: u64,
) -> Result<(), IbcError> {
    let next = sequence
        .checked_add(1)
        .ok_or_else(|| IbcError::corrupted(path, "sequence overflow"))?;
    write_u64(store, &path.to_key(), next);
    Ok(())
}

fn attributes(
    port_id: &PortId,
    channel_id: &ChannelId,
    channel: &ChannelEnd,
    connection_id: &ConnectionId,
) -> ChannelAttributes {
    ChannelAttributes {
        port_id: port_id.clone(),
        channel_id: channel_id.clone(),
        counterparty_port_id: channel.counterparty.port_id.clone(),
        counterparty_channel_id: channel.counterparty.channel_id.clone(),
        connection_id: connection_id.clone(),
    }
}

fn encode(
    port_id: &PortId,
    channel_id: &ChannelId,
    channel: &ChannelEnd,
) -> Result<Vec<u8>, IbcError> {
    channel
        .encode()
        .map_err(|e| IbcError::corrupted(Path::ChannelEnd(port_id.clone(), channel_id.clone()), e))
}

#[cfg(test)]
mod tests {
    use ibc_classic_types::channel::Counterparty;

    use super::*;

    fn channel(state: State) -> ChannelEnd {
        ChannelEnd {
            state,
            ordering: Order::Unordered,
            counterparty: Counterparty::new("transfer".parse().unwrap(), Some(ChannelId::new(3))),
            connection_hops: vec![ConnectionId::new(0)],
            version: "ics20-1".into(),
        }
    }

    #[test]
    fn closed_is_reported_before_state_mismatch() {
        let port_id: PortId = "transfer".parse().unwrap();
        let channel_id = ChannelId::new(0);

        assert!(matches!(
            ensure_channel_state(&port_id, &channel_id, &channel(State::Closed), &[State::Init]),
            Err(IbcError::ChannelClosed { .. })
        ));
        assert!(matches!(
            ensure_channel_state(&port_id, &channel_id, &channel(State::Open), &[State::Init]),
            Err(IbcError::InvalidChannelState { .. })
        ));
        assert!(matches!(
            ensure_channel_open(&port_id, &channel_id, &channel(State::TryOpen)),
            Err(IbcError::ChannelNotOpen { .. })
        ));
        ensure_channel_open(&port_id, &channel_id, &channel(State::Open)).unwrap();
    }

    #[test]
    fn multi_hop_is_rejected() {
        assert!(matches!(
            single_hop(&[ConnectionId::new(0), ConnectionId::new(1)]),
            Err(IbcError::InvalidConnectionHops { .. })
        ));
        assert!(matches!(
            single_hop(&[]),
            Err(IbcError::InvalidConnectionHops { .. })
        ));
        assert_eq!(single_hop(&[ConnectionId::new(4)]).unwrap(), &ConnectionId::new(4));
    }

    #[test]
    fn sequences_do_not_wrap() {
        let mut store = crate::store::MemoryStore::new();
        let path = Path::NextSequenceRecv("transfer".parse().unwrap(), ChannelId::new(0));

        increment_sequence(&mut store, &path, 7).unwrap();
        assert_eq!(read_sequence(&store, &path).unwrap(), 8);

        assert!(matches!(
            increment_sequence(&mut store, &path, u64::MAX),
            Err(IbcError::CorruptedState { .. })
        ));
        assert_eq!(read_sequence(&store, &path).unwrap(), 8);
    }
}
