//! Cross-task command enums, grounded on hebo's `commands.rs` (one enum per
//! direction between two actors) but scoped to the one channel this crate
//! actually needs: handler-to-session delivery.

use crate::types::Message;

/// Sent from `SessionHandler` into a connected `ClientSession`'s own task.
#[derive(Debug)]
pub enum HandlerToSessionCmd {
    /// A message to place on the session's outbound queue.
    Deliver(Message),
    /// A new connection with the same `clientId` has taken over; this
    /// session must close gracefully without publishing its will.
    Evicted,
}

crate::convert_send_error!(HandlerToSessionCmd);
