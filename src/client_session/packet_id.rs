//! Monotonic ring packet-id allocator (spec section 4.7.3 / section 9):
//! wraps 65535 back to 1, never yields 0, and linearly probes past ids
//! still held by the outbound in-flight queue.

use std::collections::HashSet;

use codec::PacketId;

pub struct PacketIdAllocator {
    next: PacketId,
}

impl Default for PacketIdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl PacketIdAllocator {
    #[must_use]
    pub fn allocate(&mut self, in_use: &HashSet<PacketId>) -> PacketId {
        loop {
            let candidate = self.next;
            self.next = if self.next == u16::MAX { 1 } else { self.next + 1 };
            if !in_use.contains(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_past_65535_and_never_yields_zero() {
        let mut allocator = PacketIdAllocator { next: u16::MAX };
        let empty = HashSet::new();
        assert_eq!(allocator.allocate(&empty), u16::MAX);
        assert_eq!(allocator.allocate(&empty), 1);
    }

    #[test]
    fn skips_ids_currently_in_use() {
        let mut allocator = PacketIdAllocator::default();
        let in_use: HashSet<PacketId> = [1, 2].into_iter().collect();
        assert_eq!(allocator.allocate(&in_use), 3);
    }
}
