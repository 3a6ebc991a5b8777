//! Persisted per-client session state contract (spec section 4.3).
//!
//! Methods are `async` (native async-fn-in-trait; this crate never reaches
//! for `async_trait`, matching the rest of the corpus) so a real backend can
//! do network I/O without blocking the session's task. The in-memory
//! reference implementation here never actually awaits, but keeps the same
//! shape a SQL or KV backend would.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use codec::QoS;

use crate::error::Error;
use crate::metrics::Metrics;
use crate::types::{ClientId, Message, Subscription};

pub struct AttachResult {
    pub present: bool,
}

pub trait SessionStore: Send + Sync {
    /// # Errors
    /// Returns an error if the backend could not be reached or is corrupt.
    fn create_or_attach(
        &self,
        client_id: &ClientId,
        clean_session: bool,
    ) -> impl std::future::Future<Output = Result<AttachResult, Error>> + Send;

    fn save_subscriptions(
        &self,
        client_id: &ClientId,
        add: &[Subscription],
        remove: &[String],
    ) -> impl std::future::Future<Output = Result<(), Error>> + Send;

    fn subscriptions(
        &self,
        client_id: &ClientId,
    ) -> impl std::future::Future<Output = Vec<Subscription>> + Send;

    fn set_will(
        &self,
        client_id: &ClientId,
        will: Option<Message>,
    ) -> impl std::future::Future<Output = Result<(), Error>> + Send;

    fn take_will(
        &self,
        client_id: &ClientId,
    ) -> impl std::future::Future<Output = Option<Message>> + Send;

    /// Enqueue for an offline session. Bounded by `MessageQueueSize`; on
    /// overflow the oldest queued message is dropped and a counter
    /// incremented.
    fn enqueue(
        &self,
        client_id: &ClientId,
        message: Message,
    ) -> impl std::future::Future<Output = Result<(), Error>> + Send;

    fn dequeue_all(
        &self,
        client_id: &ClientId,
    ) -> impl std::future::Future<Output = Vec<Message>> + Send;

    fn drop_session(
        &self,
        client_id: &ClientId,
    ) -> impl std::future::Future<Output = Result<(), Error>> + Send;
}

#[derive(Default)]
struct SessionRecord {
    subscriptions: HashMap<String, QoS>,
    will: Option<Message>,
    queue: VecDeque<Message>,
    ever_connected: bool,
}

pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<ClientId, SessionRecord>>,
    queue_capacity: usize,
    metrics: Arc<Metrics>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new(queue_capacity: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            queue_capacity,
            metrics,
        }
    }
}

impl SessionStore for InMemorySessionStore {
    async fn create_or_attach(
        &self,
        client_id: &ClientId,
        clean_session: bool,
    ) -> Result<AttachResult, Error> {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        if clean_session {
            sessions.remove(client_id);
            sessions.insert(client_id.clone(), SessionRecord::default());
            return Ok(AttachResult { present: false });
        }
        let present = sessions
            .get(client_id)
            .map(|s| s.ever_connected)
            .unwrap_or(false);
        let record = sessions.entry(client_id.clone()).or_default();
        record.ever_connected = true;
        Ok(AttachResult { present })
    }

    async fn save_subscriptions(
        &self,
        client_id: &ClientId,
        add: &[Subscription],
        remove: &[String],
    ) -> Result<(), Error> {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        let record = sessions.entry(client_id.clone()).or_default();
        for filter in remove {
            record.subscriptions.remove(filter);
        }
        for sub in add {
            record
                .subscriptions
                .insert(sub.filter.clone(), sub.granted_qos);
        }
        Ok(())
    }

    async fn subscriptions(&self, client_id: &ClientId) -> Vec<Subscription> {
        let sessions = self.sessions.lock().expect("session store lock poisoned");
        sessions
            .get(client_id)
            .map(|record| {
                record
                    .subscriptions
                    .iter()
                    .map(|(filter, qos)| Subscription {
                        client_id: client_id.clone(),
                        filter: filter.clone(),
                        granted_qos: *qos,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn set_will(&self, client_id: &ClientId, will: Option<Message>) -> Result<(), Error> {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        sessions.entry(client_id.clone()).or_default().will = will;
        Ok(())
    }

    async fn take_will(&self, client_id: &ClientId) -> Option<Message> {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        sessions.get_mut(client_id).and_then(|r| r.will.take())
    }

    async fn enqueue(&self, client_id: &ClientId, message: Message) -> Result<(), Error> {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        let record = sessions.entry(client_id.clone()).or_default();
        if record.queue.len() >= self.queue_capacity {
            record.queue.pop_front();
            self.metrics.offline_queue_dropped.incr();
        }
        record.queue.push_back(message);
        Ok(())
    }

    async fn dequeue_all(&self, client_id: &ClientId) -> Vec<Message> {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        sessions
            .get_mut(client_id)
            .map(|r| r.queue.drain(..).collect())
            .unwrap_or_default()
    }

    async fn drop_session(&self, client_id: &ClientId) -> Result<(), Error> {
        let mut sessions = self.sessions.lock().expect("session store lock poisoned");
        sessions.remove(client_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemorySessionStore {
        InMemorySessionStore::new(2, Arc::new(Metrics::default()))
    }

    #[tokio::test]
    async fn clean_session_wipes_prior_state() {
        let store = store();
        let id = "c1".to_string();
        store.create_or_attach(&id, false).await.unwrap();
        store
            .enqueue(&id, Message::new("t", vec![1], QoS::AtLeastOnce, false))
            .await
            .unwrap();

        let result = store.create_or_attach(&id, true).await.unwrap();
        assert!(!result.present);
        assert!(store.dequeue_all(&id).await.is_empty());
    }

    #[tokio::test]
    async fn non_clean_reattach_reports_prior_session() {
        let store = store();
        let id = "c1".to_string();
        store.create_or_attach(&id, false).await.unwrap();
        let second = store.create_or_attach(&id, false).await.unwrap();
        assert!(second.present);
    }

    #[tokio::test]
    async fn queue_overflow_drops_oldest_and_counts() {
        let store = store();
        let id = "c1".to_string();
        for i in 0..3u8 {
            store
                .enqueue(&id, Message::new("t", vec![i], QoS::AtLeastOnce, false))
                .await
                .unwrap();
        }
        let drained = store.dequeue_all(&id).await;
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].payload, vec![1]);
        assert_eq!(store.metrics.offline_queue_dropped.get(), 1);
    }
}
