//! Inbound QoS 2 duplicate-suppression table (spec section 4.7.2): one
//! `RECEIVED` entry per in-flight packet id, cleared on the matching PUBREL.
//! Entries also track a retry clock so the session can resend PUBREC on a
//! client that never sent PUBREL, and give up after too many attempts.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use codec::PacketId;

use crate::types::Message;

struct Entry {
    message: Message,
    received_at: Instant,
    retry_count: u32,
}

#[derive(Default)]
pub struct InboundTable {
    entries: HashMap<PacketId, Entry>,
}

impl InboundTable {
    #[must_use]
    pub fn is_duplicate(&self, packet_id: PacketId) -> bool {
        self.entries.contains_key(&packet_id)
    }

    pub fn insert(&mut self, packet_id: PacketId, message: Message) {
        self.entries.insert(
            packet_id,
            Entry {
                message,
                received_at: Instant::now(),
                retry_count: 0,
            },
        );
    }

    /// Remove and return the stored message on a matching PUBREL.
    pub fn release(&mut self, packet_id: PacketId) -> Option<Message> {
        self.entries.remove(&packet_id).map(|e| e.message)
    }

    /// Packet ids whose `RECEIVED` entry has been waiting longer than
    /// `interval` without a PUBREL, for the periodic PUBREC retransmission
    /// scan. Order is unspecified.
    #[must_use]
    pub fn due_for_retry(&self, interval: Duration) -> Vec<PacketId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.received_at.elapsed() >= interval)
            .map(|(packet_id, _)| *packet_id)
            .collect()
    }

    /// Current retry count for an entry, if it still exists.
    #[must_use]
    pub fn retry_count(&self, packet_id: PacketId) -> Option<u32> {
        self.entries.get(&packet_id).map(|e| e.retry_count)
    }

    /// Record a PUBREC retransmission, resetting the retry clock.
    pub fn note_retry(&mut self, packet_id: PacketId) {
        if let Some(entry) = self.entries.get_mut(&packet_id) {
            entry.received_at = Instant::now();
            entry.retry_count += 1;
        }
    }

    /// Drop an entry after exhausting its retries, without delivering the
    /// message it held.
    pub fn discard(&mut self, packet_id: PacketId) {
        self.entries.remove(&packet_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::QoS;

    #[test]
    fn duplicate_publish_is_detected_until_release() {
        let mut table = InboundTable::default();
        assert!(!table.is_duplicate(7));
        table.insert(7, Message::new("t", vec![], QoS::ExactlyOnce, false));
        assert!(table.is_duplicate(7));
        assert!(table.release(7).is_some());
        assert!(!table.is_duplicate(7));
    }

    #[test]
    fn entry_is_due_for_retry_after_interval_elapses() {
        let mut table = InboundTable::default();
        table.insert(3, Message::new("t", vec![], QoS::ExactlyOnce, false));
        assert!(table.due_for_retry(Duration::from_secs(0)).contains(&3));
        assert!(table.due_for_retry(Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn note_retry_increments_count_and_discard_removes_entry() {
        let mut table = InboundTable::default();
        table.insert(3, Message::new("t", vec![], QoS::ExactlyOnce, false));
        assert_eq!(table.retry_count(3), Some(0));
        table.note_retry(3);
        assert_eq!(table.retry_count(3), Some(1));
        table.discard(3);
        assert_eq!(table.retry_count(3), None);
    }
}
