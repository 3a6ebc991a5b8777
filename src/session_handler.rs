//! Central coordinator (spec section 4.6): the one component every
//! `ClientSession` calls into for subscribe/unsubscribe/publish, and the one
//! component that drains the `MessageBus` and fans messages back out to
//! locally-connected sessions.
//!
//! Grounded on hebo's `Dispatcher`: a table of per-client outbound channels
//! plus direct method calls from session tasks rather than a request/reply
//! channel, since every call here either completes synchronously against a
//! lock or awaits a store that has no reason to block a caller's turn.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use codec::QoS;
use log::warn;
use tokio::sync::mpsc;

use crate::auth::AuthPolicy;
use crate::bus::{BusEvent, MessageBus};
use crate::commands::HandlerToSessionCmd;
use crate::config::General;
use crate::error::Error;
use crate::metrics::Metrics;
use crate::retained::RetainedStore;
use crate::session_store::{AttachResult, SessionStore};
use crate::subscription_index::SubscriptionIndex;
use crate::types::{ClientId, Message, Subscription};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubscribeOutcome {
    Granted(QoS),
    Rejected,
}

pub struct SessionHandler<S: SessionStore> {
    store: S,
    retained: Arc<dyn RetainedStore>,
    subscriptions: Arc<SubscriptionIndex>,
    bus: Arc<dyn MessageBus>,
    pub auth: Arc<dyn AuthPolicy>,
    pub metrics: Arc<Metrics>,
    general: Arc<General>,
    local: RwLock<HashMap<ClientId, mpsc::Sender<HandlerToSessionCmd>>>,
}

impl<S: SessionStore> SessionHandler<S> {
    #[must_use]
    pub fn new(
        store: S,
        retained: Arc<dyn RetainedStore>,
        subscriptions: Arc<SubscriptionIndex>,
        bus: Arc<dyn MessageBus>,
        auth: Arc<dyn AuthPolicy>,
        metrics: Arc<Metrics>,
        general: Arc<General>,
    ) -> Self {
        Self {
            store,
            retained,
            subscriptions,
            bus,
            auth,
            metrics,
            general,
            local: RwLock::new(HashMap::new()),
        }
    }

    /// Record a new connection for `client_id`, evicting whatever session
    /// previously held that id on this node, and replay anything the store
    /// queued while it was offline.
    ///
    /// # Errors
    /// Returns an error if the session store could not be reached.
    pub async fn connect(
        &self,
        client_id: &ClientId,
        clean_session: bool,
        outbound: mpsc::Sender<HandlerToSessionCmd>,
    ) -> Result<AttachResult, Error> {
        let result = self.store.create_or_attach(client_id, clean_session).await?;

        if let Some(previous) = self.register_local(client_id.clone(), outbound.clone()) {
            let _ = previous.send(HandlerToSessionCmd::Evicted).await;
        }

        if result.present {
            for message in self.store.dequeue_all(client_id).await {
                if outbound
                    .send(HandlerToSessionCmd::Deliver(message))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }

        Ok(result)
    }

    /// Validate and apply a subscribe, persist it, replicate it, and push any
    /// matching retained messages straight back through `outbound`.
    ///
    /// # Errors
    /// Returns an error if the store or bus could not be reached; a
    /// filter this node's policy rejects is `Ok(Rejected)`, not an `Err`, so
    /// callers can still grant the client's other filters in the same
    /// SUBSCRIBE packet.
    pub async fn subscribe(
        &self,
        client_id: &ClientId,
        filter: &str,
        requested_qos: QoS,
        outbound: &mpsc::Sender<HandlerToSessionCmd>,
    ) -> Result<SubscribeOutcome, Error> {
        if codec::validate_topic_filter(filter).is_err() {
            return Ok(SubscribeOutcome::Rejected);
        }
        if !self.general.allow_root_wildcard_subscription && codec::is_root_wildcard(filter) {
            return Ok(SubscribeOutcome::Rejected);
        }

        self.subscriptions
            .subscribe(self.bus.as_ref(), client_id, filter, requested_qos)?;
        self.store
            .save_subscriptions(
                client_id,
                &[Subscription {
                    client_id: client_id.clone(),
                    filter: filter.to_string(),
                    granted_qos: requested_qos,
                }],
                &[],
            )
            .await?;

        for retained in self.retained.matching(filter) {
            let qos = retained.qos.min(requested_qos);
            let delivery = Message { qos, ..retained };
            if outbound
                .send(HandlerToSessionCmd::Deliver(delivery))
                .await
                .is_err()
            {
                break;
            }
        }

        Ok(SubscribeOutcome::Granted(requested_qos))
    }

    /// Replace the will a client registered at CONNECT time, used both to
    /// install it up front and to clear it on a graceful DISCONNECT.
    ///
    /// # Errors
    /// Returns an error if the store could not be reached.
    pub async fn set_will(&self, client_id: &ClientId, will: Option<Message>) -> Result<(), Error> {
        self.store.set_will(client_id, will).await
    }

    /// # Errors
    /// Returns an error if the store or bus could not be reached.
    pub async fn unsubscribe(&self, client_id: &ClientId, filter: &str) -> Result<(), Error> {
        self.subscriptions
            .unsubscribe(self.bus.as_ref(), client_id, filter)?;
        self.store
            .save_subscriptions(client_id, &[], std::slice::from_ref(&filter.to_string()))
            .await
    }

    /// Publish `message`: store it if retained, then hand it to the bus.
    /// Returns as soon as the bus accepts it, matching spec section 4.6 (a
    /// sender's PUBACK/PUBCOMP does not wait for every subscriber to drain).
    ///
    /// # Errors
    /// Returns an error if the retained store rejected the write or the bus
    /// did not accept the publish.
    pub fn publish(&self, message: Message) -> Result<(), Error> {
        if message.retain {
            self.retained.store(message.clone())?;
        }
        self.bus.publish_data(message)
    }

    /// Deliver a message that arrived over the bus (from this node's own
    /// publish, or a remote one) to every locally-connected matching
    /// subscriber.
    pub async fn dispatch(&self, message: &Message) {
        let matches = self.subscriptions.matching(&message.topic);
        for (client_id, (node_id, granted_qos)) in matches {
            if node_id != self.subscriptions.node_id() {
                continue;
            }
            let effective_qos = message.qos.min(granted_qos);
            let outgoing = Message {
                qos: effective_qos,
                packet_id: None,
                ..message.clone()
            };
            self.deliver_to(&client_id, outgoing).await;
        }
    }

    async fn deliver_to(&self, client_id: &ClientId, message: Message) {
        let sender = self.local.read().expect("session handler lock poisoned").get(client_id).cloned();
        match sender {
            Some(sender) => {
                if message.qos == QoS::AtMostOnce {
                    if sender.try_send(HandlerToSessionCmd::Deliver(message)).is_err() {
                        self.metrics.online_queue_dropped.incr();
                    }
                } else if sender
                    .send(HandlerToSessionCmd::Deliver(message))
                    .await
                    .is_err()
                {
                    self.metrics.online_queue_dropped.incr();
                }
            }
            None => {
                if !self.general.queued_messages_enabled {
                    return;
                }
                if let Err(err) = self.store.enqueue(client_id, message).await {
                    warn!("failed to enqueue offline message for {client_id}: {err}");
                }
            }
        }
    }

    /// Apply one event drained from the bus, including our own replicated
    /// publishes (the subscription index ignores self-originated control
    /// events, but data events must still fan out locally).
    pub async fn apply_bus_event(&self, event: BusEvent) {
        match event {
            BusEvent::Data(message) => self.dispatch(&message).await,
            BusEvent::Control(control) => self.subscriptions.apply_remote(&control),
        }
    }

    /// Run until the bus channel closes, dispatching every event it carries.
    /// Spawned once per node by the `Broker`.
    pub async fn run(self: Arc<Self>) {
        let mut receiver = self.bus.subscribe();
        loop {
            match receiver.recv().await {
                Ok(event) => self.apply_bus_event(event).await,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("session handler bus consumer lagged by {skipped} events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Disconnect `client_id` from this node: optionally publish its will,
    /// drop its local routing entry, and replicate the unsubscribe-all.
    ///
    /// # Errors
    /// Returns an error if the store or bus could not be reached.
    pub async fn disconnect(
        &self,
        client_id: &ClientId,
        clean_session: bool,
        publish_will: bool,
    ) -> Result<(), Error> {
        if publish_will {
            if let Some(will) = self.store.take_will(client_id).await {
                self.publish(will)?;
            }
        } else {
            self.store.set_will(client_id, None).await?;
        }

        self.local
            .write()
            .expect("session handler lock poisoned")
            .remove(client_id);

        if clean_session {
            self.subscriptions.disconnect(self.bus.as_ref(), client_id)?;
            self.store.drop_session(client_id).await?;
        }
        Ok(())
    }

    fn register_local(
        &self,
        client_id: ClientId,
        sender: mpsc::Sender<HandlerToSessionCmd>,
    ) -> Option<mpsc::Sender<HandlerToSessionCmd>> {
        self.local
            .write()
            .expect("session handler lock poisoned")
            .insert(client_id, sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AllowAllAuthPolicy;
    use crate::bus::InProcBus;
    use crate::retained::InMemoryRetainedStore;
    use crate::session_store::InMemorySessionStore;

    fn handler() -> SessionHandler<InMemorySessionStore> {
        let metrics = Arc::new(Metrics::default());
        let general = Arc::new(General::default());
        SessionHandler::new(
            InMemorySessionStore::new(10, metrics.clone()),
            Arc::new(InMemoryRetainedStore::new()),
            Arc::new(SubscriptionIndex::new("n1")),
            Arc::new(InProcBus::new()),
            Arc::new(AllowAllAuthPolicy),
            metrics,
            general,
        )
    }

    #[tokio::test]
    async fn subscribe_replays_matching_retained_messages() {
        let h = handler();
        h.publish(Message::new("t", b"v".to_vec(), QoS::AtLeastOnce, true))
            .unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        h.connect(&"c1".to_string(), true, tx.clone()).await.unwrap();
        h.subscribe(&"c1".to_string(), "t", QoS::AtLeastOnce, &tx)
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            HandlerToSessionCmd::Deliver(m) => assert_eq!(m.topic, "t"),
            HandlerToSessionCmd::Evicted => panic!("expected a delivery"),
        }
    }

    #[tokio::test]
    async fn root_wildcard_is_rejected_when_disabled() {
        let metrics = Arc::new(Metrics::default());
        let mut general = General::default();
        general.allow_root_wildcard_subscription = false;
        let h = SessionHandler::new(
            InMemorySessionStore::new(10, metrics.clone()),
            Arc::new(InMemoryRetainedStore::new()),
            Arc::new(SubscriptionIndex::new("n1")),
            Arc::new(InProcBus::new()),
            Arc::new(AllowAllAuthPolicy),
            metrics,
            Arc::new(general),
        );
        let (tx, _rx) = mpsc::channel(8);
        let outcome = h.subscribe(&"c1".to_string(), "#", QoS::AtMostOnce, &tx).await.unwrap();
        assert_eq!(outcome, SubscribeOutcome::Rejected);
    }

    #[tokio::test]
    async fn second_connect_evicts_the_first() {
        let h = handler();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, _rx2) = mpsc::channel(8);
        h.connect(&"c1".to_string(), true, tx1).await.unwrap();
        h.connect(&"c1".to_string(), true, tx2).await.unwrap();

        match rx1.recv().await.unwrap() {
            HandlerToSessionCmd::Evicted => {}
            HandlerToSessionCmd::Deliver(_) => panic!("expected eviction"),
        }
    }

    #[tokio::test]
    async fn publish_without_local_subscriber_queues_when_offline() {
        let h = handler();
        let (tx, _rx) = mpsc::channel(8);
        h.connect(&"c1".to_string(), false, tx.clone()).await.unwrap();
        h.subscribe(&"c1".to_string(), "t", QoS::AtLeastOnce, &tx)
            .await
            .unwrap();
        h.disconnect(&"c1".to_string(), false, false).await.unwrap();

        h.dispatch(&Message::new("t", b"v".to_vec(), QoS::AtLeastOnce, false))
            .await;

        let queued = h.store.dequeue_all(&"c1".to_string()).await;
        assert_eq!(queued.len(), 1);
    }
}
