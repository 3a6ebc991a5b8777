//! Subscription-replication control events (spec section 4.4/4.5).

use codec::QoS;

use crate::types::{ClientId, NodeId};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubControlOp {
    Subscribe,
    Unsubscribe,
    Disconnect,
    FullSet,
}

impl SubControlOp {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Subscribe => 0,
            Self::Unsubscribe => 1,
            Self::Disconnect => 2,
            Self::FullSet => 3,
        }
    }

    #[must_use]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Subscribe),
            1 => Some(Self::Unsubscribe),
            2 => Some(Self::Disconnect),
            3 => Some(Self::FullSet),
            _ => None,
        }
    }
}

/// A single subscription mutation (or disconnect/full-resync marker)
/// broadcast to every other node. Carries a per-node monotonic `seq` so
/// receivers can discard out-of-order duplicates.
#[derive(Clone, Debug, PartialEq)]
pub struct SubControlEvent {
    pub node_id: NodeId,
    pub op: SubControlOp,
    pub client_id: ClientId,
    pub filter: Option<String>,
    pub qos: Option<QoS>,
    pub seq: u64,
}
