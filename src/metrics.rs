//! In-process counters, grounded on hebo::metrics's counter style but scoped
//! to the drop/overflow events spec.md sections 4.3 and 4.6 require to be
//! observable. No exporter: that surface is out of scope.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn incr(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Process-wide counters for queue back-pressure, one instance owned by the
/// `Broker` and shared by `Arc` with every component that can drop a message.
#[derive(Default)]
pub struct Metrics {
    pub offline_queue_dropped: Counter,
    pub online_queue_dropped: Counter,
    pub publish_rate_limited: Counter,
    pub subscribe_rate_limited: Counter,
    pub qos2_retries_exhausted: Counter,
    pub qos2_inbound_retries_exhausted: Counter,
}
