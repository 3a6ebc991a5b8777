//! Retained-message store contract (spec section 4.2), grounded on hebo's
//! `backends` trait-per-capability style but scoped to the single retained
//! responsibility this crate implements.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Error;
use crate::topic::TopicTree;
use crate::types::Message;

/// At most one retained message per concrete topic; `store` with an empty
/// payload deletes the entry for that topic.
pub trait RetainedStore: Send + Sync {
    /// # Errors
    /// Returns an error if the backend could not durably record the change.
    fn store(&self, message: Message) -> Result<(), Error>;

    fn get(&self, topic: &str) -> Option<Message>;

    /// Concrete topics whose retained message matches `filter`, in no
    /// particular but stable-within-call order.
    fn matching(&self, filter: &str) -> Vec<Message>;
}

/// In-memory reference backend: a map plus a `TopicTree` mirror so wildcard
/// `matching()` lookups don't need a linear scan over every retained topic.
#[derive(Default)]
pub struct InMemoryRetainedStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    by_topic: HashMap<String, Message>,
    index: TopicTree<()>,
}

impl InMemoryRetainedStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RetainedStore for InMemoryRetainedStore {
    fn store(&self, message: Message) -> Result<(), Error> {
        let mut inner = self.inner.write().expect("retained store lock poisoned");
        if message.is_retained_delete() {
            if inner.by_topic.remove(&message.topic).is_some() {
                inner.index.remove(&message.topic, &());
            }
        } else {
            inner.index.add(&message.topic, ());
            inner.by_topic.insert(message.topic.clone(), message);
        }
        Ok(())
    }

    fn get(&self, topic: &str) -> Option<Message> {
        let inner = self.inner.read().expect("retained store lock poisoned");
        inner.by_topic.get(topic).cloned()
    }

    fn matching(&self, filter: &str) -> Vec<Message> {
        let inner = self.inner.read().expect("retained store lock poisoned");
        inner
            .index
            .match_filter(filter)
            .into_iter()
            .filter_map(|topic| inner.by_topic.get(&topic).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::QoS;

    fn msg(topic: &str, payload: &[u8]) -> Message {
        Message::new(topic, payload.to_vec(), QoS::AtLeastOnce, true)
    }

    #[test]
    fn overwrite_then_delete_leaves_no_entry() {
        let store = InMemoryRetainedStore::new();
        store.store(msg("t", b"x")).unwrap();
        store.store(msg("t", b"y")).unwrap();
        assert_eq!(store.get("t").unwrap().payload, b"y");

        store.store(msg("t", b"")).unwrap();
        assert!(store.get("t").is_none());
    }

    #[test]
    fn delete_on_never_retained_topic_is_a_noop() {
        let store = InMemoryRetainedStore::new();
        assert!(store.store(msg("never", b"")).is_ok());
        assert!(store.get("never").is_none());
    }

    #[test]
    fn matching_finds_wildcard_hits() {
        let store = InMemoryRetainedStore::new();
        store.store(msg("r/1", b"v1")).unwrap();
        store.store(msg("r/2", b"v2")).unwrap();

        let mut topics: Vec<String> = store
            .matching("r/+")
            .into_iter()
            .map(|m| m.topic)
            .collect();
        topics.sort();
        assert_eq!(topics, vec!["r/1".to_string(), "r/2".to_string()]);
    }
}
