// Shared value types used across the broker, grounded on hebo's types.rs.

use codec::QoS;

pub type ClientId = String;
pub type NodeId = String;

/// Identifies which connected session owns a client id on this node, mirrors
/// hebo's `SessionGid` but scoped to a single node (no listener id: this
/// broker's listeners all feed the same per-node session table).
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SessionGid {
    pub node_id: NodeId,
    pub client_id: ClientId,
}

impl SessionGid {
    #[must_use]
    pub fn new(node_id: impl Into<NodeId>, client_id: impl Into<ClientId>) -> Self {
        Self {
            node_id: node_id.into(),
            client_id: client_id.into(),
        }
    }
}

/// An immutable application message, the unit of delivery through the
/// publish/subscribe pipeline (spec data model's `Message`).
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
    pub dup: bool,
    pub packet_id: Option<codec::PacketId>,
    pub sender_id: Option<ClientId>,
}

impl Message {
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: Vec<u8>, qos: QoS, retain: bool) -> Self {
        Self {
            topic: topic.into(),
            payload,
            qos,
            retain,
            dup: false,
            packet_id: None,
            sender_id: None,
        }
    }

    #[must_use]
    pub fn with_dup(mut self, dup: bool) -> Self {
        self.dup = dup;
        self
    }

    #[must_use]
    pub fn with_sender(mut self, sender_id: impl Into<ClientId>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    /// Retained-deletion marker: retain flag set, empty payload.
    #[must_use]
    pub fn is_retained_delete(&self) -> bool {
        self.retain && self.payload.is_empty()
    }
}

/// A client's subscription to a topic filter. Uniqueness key is
/// `(client_id, filter)`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Subscription {
    pub client_id: ClientId,
    pub filter: String,
    pub granted_qos: QoS,
}

/// What one node knows about one subscribed client, the `ClientRef`
/// the subscription index's topic tree stores as its dataset payload.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ClientRef {
    pub client_id: ClientId,
    pub node_id: NodeId,
    pub granted_qos: QoS,
}
