//! Inter-node message bus abstraction (spec section 4.5): `InProc` for a
//! single-node deployment, `External` for a cluster, both behind the same
//! `MessageBus` capability so `SessionHandler` never knows which it has.

pub mod control;
pub mod external;
pub mod inproc;
pub mod wire;

use tokio::sync::broadcast;

use crate::error::Error;
use crate::types::Message;

pub use control::{SubControlEvent, SubControlOp};
pub use external::{ExternalBus, InMemoryTransport};
pub use inproc::InProcBus;

#[derive(Clone, Debug, PartialEq)]
pub enum BusEvent {
    Data(Message),
    Control(SubControlEvent),
}

/// Capacity of the broadcast channel backing bus fan-out. Generous: slow
/// subscribers that lag past this many events get `RecvError::Lagged`,
/// which `SessionHandler`'s consumer loop treats as "request a full
/// resync", not a fatal error.
const BUS_CHANNEL_CAPACITY: usize = 4096;

/// Cluster transport for published messages and subscription-control
/// events. At-least-once to all nodes including self; receivers dedupe.
pub trait MessageBus: Send + Sync {
    /// # Errors
    /// Returns an error if the bus could not accept the message (the caller
    /// does not wait for delivery to complete, only acceptance).
    fn publish_data(&self, message: Message) -> Result<(), Error>;

    /// # Errors
    /// Returns an error if the bus could not accept the control event.
    fn publish_control(&self, event: SubControlEvent) -> Result<(), Error>;

    /// A fresh receiver over every event published from now on, including
    /// this node's own publishes (the dedup step lives in the consumer).
    fn subscribe(&self) -> broadcast::Receiver<BusEvent>;
}
