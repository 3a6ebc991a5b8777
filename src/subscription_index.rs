//! Cluster-replicated fan-out table (spec section 4.4): `topic filter ->
//! {clientId -> QoS}`, synchronized across nodes over the `MessageBus`
//! control channel.

use std::collections::HashMap;
use std::sync::RwLock;

use codec::QoS;

use crate::bus::{MessageBus, SubControlEvent, SubControlOp};
use crate::error::Error;
use crate::topic::TopicTree;
use crate::types::{ClientId, ClientRef, NodeId};

struct Inner {
    tree: TopicTree<ClientRef>,
    /// `client_id -> (node_id, {filter -> granted qos})`, so a disconnect or
    /// local lookup doesn't need a full tree scan.
    clients: HashMap<ClientId, (NodeId, HashMap<String, QoS>)>,
    /// Highest sequence number accepted per remote node, for discarding
    /// out-of-order duplicate control events.
    last_seq: HashMap<NodeId, u64>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            tree: TopicTree::new(),
            clients: HashMap::new(),
            last_seq: HashMap::new(),
        }
    }
}

pub struct SubscriptionIndex {
    node_id: NodeId,
    inner: RwLock<Inner>,
}

impl SubscriptionIndex {
    #[must_use]
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Apply a subscribe locally and replicate it to peers.
    ///
    /// # Errors
    /// Returns an error if the bus rejected the replication publish.
    pub fn subscribe(
        &self,
        bus: &dyn MessageBus,
        client_id: &ClientId,
        filter: &str,
        qos: QoS,
    ) -> Result<(), Error> {
        self.apply_subscribe(&self.node_id.clone(), client_id, filter, qos);
        bus.publish_control(SubControlEvent {
            node_id: self.node_id.clone(),
            op: SubControlOp::Subscribe,
            client_id: client_id.clone(),
            filter: Some(filter.to_string()),
            qos: Some(qos),
            seq: 0, // overwritten by the bus with the node's next sequence number
        })
    }

    /// # Errors
    /// Returns an error if the bus rejected the replication publish.
    pub fn unsubscribe(
        &self,
        bus: &dyn MessageBus,
        client_id: &ClientId,
        filter: &str,
    ) -> Result<(), Error> {
        self.apply_unsubscribe(client_id, filter);
        bus.publish_control(SubControlEvent {
            node_id: self.node_id.clone(),
            op: SubControlOp::Unsubscribe,
            client_id: client_id.clone(),
            filter: Some(filter.to_string()),
            qos: None,
            seq: 0,
        })
    }

    /// # Errors
    /// Returns an error if the bus rejected the replication publish.
    pub fn disconnect(&self, bus: &dyn MessageBus, client_id: &ClientId) -> Result<(), Error> {
        self.apply_disconnect(client_id);
        bus.publish_control(SubControlEvent {
            node_id: self.node_id.clone(),
            op: SubControlOp::Disconnect,
            client_id: client_id.clone(),
            filter: None,
            qos: None,
            seq: 0,
        })
    }

    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Collect all matches for `topic`, grouped by client, taking the
    /// maximum granted QoS across overlapping filters.
    #[must_use]
    pub fn matching(&self, topic: &str) -> HashMap<ClientId, (NodeId, QoS)> {
        let inner = self.inner.read().expect("subscription index lock poisoned");
        let mut out: HashMap<ClientId, (NodeId, QoS)> = HashMap::new();
        for client_ref in inner.tree.match_concrete(topic) {
            out.entry(client_ref.client_id.clone())
                .and_modify(|(_, qos)| *qos = (*qos).max(client_ref.granted_qos))
                .or_insert((client_ref.node_id.clone(), client_ref.granted_qos));
        }
        out
    }

    /// Apply a control event received from the bus (including our own
    /// replicated events, which are idempotent to re-apply). Out-of-order
    /// duplicates from the same node are discarded.
    pub fn apply_remote(&self, event: &SubControlEvent) {
        if event.node_id == self.node_id {
            // We already applied this locally before publishing it.
            return;
        }
        {
            let mut inner = self.inner.write().expect("subscription index lock poisoned");
            let last = inner.last_seq.get(&event.node_id).copied().unwrap_or(0);
            if event.op != SubControlOp::FullSet && event.seq != 0 && event.seq <= last {
                return;
            }
            if event.seq != 0 {
                inner.last_seq.insert(event.node_id.clone(), event.seq);
            }
        }
        match event.op {
            SubControlOp::Subscribe => {
                if let (Some(filter), Some(qos)) = (&event.filter, event.qos) {
                    self.apply_subscribe(&event.node_id, &event.client_id, filter, qos);
                }
            }
            SubControlOp::Unsubscribe => {
                if let Some(filter) = &event.filter {
                    self.apply_unsubscribe(&event.client_id, filter);
                }
            }
            SubControlOp::Disconnect => self.apply_disconnect(&event.client_id),
            SubControlOp::FullSet => {
                // A peer rebroadcasting its full set after joining; treated
                // as a subscribe for whatever it names (disjoint full-state
                // refresh is handled by replaying one FullSet event per
                // subscription, not a single aggregate event).
                if let (Some(filter), Some(qos)) = (&event.filter, event.qos) {
                    self.apply_subscribe(&event.node_id, &event.client_id, filter, qos);
                }
            }
        }
    }

    fn apply_subscribe(&self, node_id: &NodeId, client_id: &ClientId, filter: &str, qos: QoS) {
        let mut inner = self.inner.write().expect("subscription index lock poisoned");
        let entry = inner
            .clients
            .entry(client_id.clone())
            .or_insert_with(|| (node_id.clone(), HashMap::new()));
        if let Some(previous_qos) = entry.1.insert(filter.to_string(), qos) {
            if previous_qos != qos {
                inner.tree.remove(
                    filter,
                    &ClientRef {
                        client_id: client_id.clone(),
                        node_id: node_id.clone(),
                        granted_qos: previous_qos,
                    },
                );
            }
        }
        inner.tree.add(
            filter,
            ClientRef {
                client_id: client_id.clone(),
                node_id: node_id.clone(),
                granted_qos: qos,
            },
        );
    }

    fn apply_unsubscribe(&self, client_id: &ClientId, filter: &str) {
        let mut inner = self.inner.write().expect("subscription index lock poisoned");
        let Some((node_id, filters)) = inner.clients.get_mut(client_id) else {
            return;
        };
        let node_id = node_id.clone();
        if let Some(qos) = filters.remove(filter) {
            inner.tree.remove(
                filter,
                &ClientRef {
                    client_id: client_id.clone(),
                    node_id,
                    granted_qos: qos,
                },
            );
        }
    }

    fn apply_disconnect(&self, client_id: &ClientId) {
        let mut inner = self.inner.write().expect("subscription index lock poisoned");
        let Some((node_id, filters)) = inner.clients.remove(client_id) else {
            return;
        };
        for (filter, qos) in filters {
            inner.tree.remove(
                &filter,
                &ClientRef {
                    client_id: client_id.clone(),
                    node_id: node_id.clone(),
                    granted_qos: qos,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InProcBus;

    #[test]
    fn match_groups_by_client_and_takes_max_qos() {
        let bus = InProcBus::new();
        let index = SubscriptionIndex::new("n1");
        let client = "c1".to_string();

        index
            .subscribe(&bus, &client, "a/+/c", QoS::AtLeastOnce)
            .unwrap();
        index
            .subscribe(&bus, &client, "a/b/#", QoS::ExactlyOnce)
            .unwrap();

        let matches = index.matching("a/b/c");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[&client].1, QoS::ExactlyOnce);
    }

    #[test]
    fn subscribe_then_unsubscribe_is_identity() {
        let bus = InProcBus::new();
        let index = SubscriptionIndex::new("n1");
        let client = "c1".to_string();

        index.subscribe(&bus, &client, "t", QoS::AtMostOnce).unwrap();
        index.unsubscribe(&bus, &client, "t").unwrap();

        assert!(index.matching("t").is_empty());
    }

    #[test]
    fn disconnect_clears_every_filter_for_the_client() {
        let bus = InProcBus::new();
        let index = SubscriptionIndex::new("n1");
        let client = "c1".to_string();

        index.subscribe(&bus, &client, "a", QoS::AtMostOnce).unwrap();
        index.subscribe(&bus, &client, "b", QoS::AtMostOnce).unwrap();
        index.disconnect(&bus, &client).unwrap();

        assert!(index.matching("a").is_empty());
        assert!(index.matching("b").is_empty());
    }
}
