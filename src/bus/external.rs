//! Cluster bus transport abstraction. `BusTransport` is the seam a real
//! external broker client would implement (spec section 1 explicitly keeps
//! Kafka-as-transport specifics out of scope); `InMemoryTransport` is the
//! loopback reference implementation used by tests and single-process
//! multi-node simulations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::warn;
use tokio::sync::broadcast;

use crate::bus::wire::{self, BusPayload};
use crate::bus::{BusEvent, MessageBus, SubControlEvent, BUS_CHANNEL_CAPACITY};
use crate::error::Error;
use crate::types::{Message, NodeId};

/// Transport seam a real cluster bus plugs into: turn an encoded frame into
/// "delivered to every other node", however that happens.
pub trait BusTransport: Send + Sync + 'static {
    /// # Errors
    /// Returns an error if the transport could not accept the frame.
    fn send(&self, frame: Vec<u8>) -> Result<(), Error>;

    fn subscribe(&self) -> broadcast::Receiver<Vec<u8>>;
}

pub struct InMemoryTransport {
    tx: broadcast::Sender<Vec<u8>>,
}

impl InMemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(BUS_CHANNEL_CAPACITY);
        Self { tx }
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BusTransport for InMemoryTransport {
    fn send(&self, frame: Vec<u8>) -> Result<(), Error> {
        let _ = self.tx.send(frame);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Vec<u8>> {
        self.tx.subscribe()
    }
}

/// `MessageBus` implementation that serializes events onto a pluggable
/// `BusTransport`, so the same code path serves "cluster of one process"
/// (several `ExternalBus`es sharing an `InMemoryTransport`) and a future
/// real external broker client.
pub struct ExternalBus<T> {
    transport: Arc<T>,
    node_id: NodeId,
    seq: AtomicU64,
    local_tx: broadcast::Sender<BusEvent>,
}

impl<T: BusTransport> ExternalBus<T> {
    #[must_use]
    pub fn new(transport: Arc<T>, node_id: impl Into<NodeId>) -> Self {
        let (local_tx, _rx) = broadcast::channel(BUS_CHANNEL_CAPACITY);
        let mut transport_rx = transport.subscribe();
        let forward_tx = local_tx.clone();
        tokio::spawn(async move {
            loop {
                match transport_rx.recv().await {
                    Ok(frame) => match wire::decode(&frame) {
                        Ok((_sender_id, BusPayload::Data(message))) => {
                            let _ = forward_tx.send(BusEvent::Data(message));
                        }
                        Ok((_sender_id, BusPayload::Control(event))) => {
                            let _ = forward_tx.send(BusEvent::Control(event));
                        }
                        Err(err) => warn!("dropping malformed cluster frame: {err}"),
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("cluster transport lagged, skipped {skipped} frames");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self {
            transport,
            node_id: node_id.into(),
            seq: AtomicU64::new(0),
            local_tx,
        }
    }
}

impl<T: BusTransport> MessageBus for ExternalBus<T> {
    fn publish_data(&self, message: Message) -> Result<(), Error> {
        let frame = wire::encode(&self.node_id, &BusPayload::Data(message))?;
        self.transport.send(frame)
    }

    fn publish_control(&self, mut event: SubControlEvent) -> Result<(), Error> {
        event.node_id = self.node_id.clone();
        event.seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let frame = wire::encode(&self.node_id, &BusPayload::Control(event))?;
        self.transport.send(frame)
    }

    fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.local_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::QoS;

    #[tokio::test]
    async fn two_nodes_sharing_a_transport_see_each_others_publishes() {
        let transport = Arc::new(InMemoryTransport::new());
        let node_a = ExternalBus::new(transport.clone(), "node-a");
        let node_b = ExternalBus::new(transport.clone(), "node-b");

        let mut rx_b = node_b.subscribe();
        node_a
            .publish_data(Message::new("t", b"x".to_vec(), QoS::AtMostOnce, false))
            .unwrap();

        match rx_b.recv().await.unwrap() {
            BusEvent::Data(m) => assert_eq!(m.topic, "t"),
            BusEvent::Control(_) => panic!("expected data event"),
        }
    }
}
