//! Single-node bus: direct invocation, no serialization round-trip.

use tokio::sync::broadcast;

use crate::bus::{BusEvent, MessageBus, SubControlEvent, BUS_CHANNEL_CAPACITY};
use crate::error::Error;
use crate::types::Message;

pub struct InProcBus {
    tx: broadcast::Sender<BusEvent>,
}

impl InProcBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(BUS_CHANNEL_CAPACITY);
        Self { tx }
    }
}

impl Default for InProcBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus for InProcBus {
    fn publish_data(&self, message: Message) -> Result<(), Error> {
        // No subscribers yet (e.g. during startup) is not an error: the
        // message is simply not observed by anyone, matching a real
        // broker's behavior before the session handler has attached.
        let _ = self.tx.send(BusEvent::Data(message));
        Ok(())
    }

    fn publish_control(&self, event: SubControlEvent) -> Result<(), Error> {
        let _ = self.tx.send(BusEvent::Control(event));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::control::SubControlOp;
    use codec::QoS;

    #[tokio::test]
    async fn delivers_to_every_subscriber_including_self() {
        let bus = InProcBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish_data(Message::new("t", b"x".to_vec(), QoS::AtMostOnce, false))
            .unwrap();

        matches!(rx1.recv().await.unwrap(), BusEvent::Data(_));
        matches!(rx2.recv().await.unwrap(), BusEvent::Data(_));

        bus.publish_control(SubControlEvent {
            node_id: "n1".to_string(),
            op: SubControlOp::Subscribe,
            client_id: "c1".to_string(),
            filter: Some("t".to_string()),
            qos: Some(QoS::AtMostOnce),
            seq: 1,
        })
        .unwrap();
        matches!(rx1.recv().await.unwrap(), BusEvent::Control(_));
    }
}
