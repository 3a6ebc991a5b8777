//! Outbound QoS 1/2 delivery queue (spec section 4.7.3): a FIFO whose head is
//! the only packet in flight on the wire; QoS 0 messages bypass this queue
//! entirely and are written straight out.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use codec::PacketId;

use crate::types::Message;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    AwaitAck,
    AwaitComp,
}

pub struct OutboundInFlight {
    pub packet_id: PacketId,
    pub message: Message,
    pub stage: Stage,
    pub last_send_at: Instant,
    pub retry_count: u32,
}

#[derive(Default)]
pub struct OutboundQueue {
    entries: VecDeque<OutboundInFlight>,
}

impl OutboundQueue {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enqueue a QoS 1/2 message. Returns `true` when it lands as the new
    /// head, i.e. the caller must write it to the socket immediately.
    pub fn push(&mut self, packet_id: PacketId, message: Message) -> bool {
        let becomes_head = self.entries.is_empty();
        self.entries.push_back(OutboundInFlight {
            packet_id,
            message,
            stage: Stage::AwaitAck,
            last_send_at: Instant::now(),
            retry_count: 0,
        });
        becomes_head
    }

    #[must_use]
    pub fn head(&self) -> Option<&OutboundInFlight> {
        self.entries.front()
    }

    #[must_use]
    pub fn in_use_ids(&self) -> std::collections::HashSet<PacketId> {
        self.entries.iter().map(|e| e.packet_id).collect()
    }

    /// A QoS 1 PUBACK (or QoS 2 PUBCOMP) matching the head pops it and
    /// returns the next head's packet id/message, if the queue isn't empty.
    /// Returns `None` if `packet_id` does not match the head (logged and
    /// ignored by the caller, per spec section 4.7.3).
    pub fn complete_head(&mut self, packet_id: PacketId) -> Option<Option<(PacketId, Message)>> {
        if self.entries.front()?.packet_id != packet_id {
            return None;
        }
        self.entries.pop_front();
        Some(self.entries.front().map(|e| (e.packet_id, e.message.clone())))
    }

    /// A QoS 2 PUBREC matching the head moves it to `AwaitComp`. Returns
    /// `false` if `packet_id` does not match the head.
    pub fn receive_head(&mut self, packet_id: PacketId) -> bool {
        match self.entries.front_mut() {
            Some(head) if head.packet_id == packet_id && head.stage == Stage::AwaitAck => {
                head.stage = Stage::AwaitComp;
                head.last_send_at = Instant::now();
                head.retry_count = 0;
                true
            }
            _ => false,
        }
    }

    /// `Some(head)` if the head has been waiting longer than `interval`,
    /// for the periodic retransmission scan.
    pub fn head_due_for_retry(&self, interval: Duration) -> Option<&OutboundInFlight> {
        self.entries
            .front()
            .filter(|head| head.last_send_at.elapsed() >= interval)
    }

    /// Record a retransmission of the head, returning its new retry count.
    pub fn retry_head(&mut self) -> Option<u32> {
        let head = self.entries.front_mut()?;
        head.last_send_at = Instant::now();
        head.retry_count += 1;
        Some(head.retry_count)
    }

    /// Drop the head after exhausting retries, returning the next head to
    /// send (if any).
    pub fn discard_head(&mut self) -> Option<(PacketId, Message)> {
        self.entries.pop_front();
        self.entries.front().map(|e| (e.packet_id, e.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::QoS;

    fn msg() -> Message {
        Message::new("t", vec![1], QoS::AtLeastOnce, false)
    }

    #[test]
    fn first_push_becomes_head_second_does_not() {
        let mut q = OutboundQueue::default();
        assert!(q.push(1, msg()));
        assert!(!q.push(2, msg()));
    }

    #[test]
    fn puback_pops_head_and_advances() {
        let mut q = OutboundQueue::default();
        q.push(1, msg());
        q.push(2, msg());
        let next = q.complete_head(1).unwrap();
        assert_eq!(next.unwrap().0, 2);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn mismatched_ack_is_ignored() {
        let mut q = OutboundQueue::default();
        q.push(1, msg());
        assert!(q.complete_head(99).is_none());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn pubrec_then_pubcomp_qos2_flow() {
        let mut q = OutboundQueue::default();
        q.push(5, msg());
        assert!(q.receive_head(5));
        assert_eq!(q.head().unwrap().stage, Stage::AwaitComp);
        assert!(q.complete_head(5).unwrap().is_none());
        assert!(q.is_empty());
    }
}
