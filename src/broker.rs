//! Composition root (spec section 4.9): wires the stores, the bus, the
//! subscription index, and the session handler together, then starts one
//! listener task per `[[listener]]` entry plus the handler's bus consumer
//! loop. Grounded on hebo's `Dashboard`/top-level `Gateway::run`, which owns
//! the same kind of "build every component, spawn every task" sequence.

use std::sync::Arc;

use log::info;

use crate::auth::{AllowAllAuthPolicy, AuthPolicy, FileAuthPolicy};
use crate::bus::{ExternalBus, InMemoryTransport, InProcBus, MessageBus};
use crate::config::{BusKind, Config};
use crate::error::Error;
use crate::listener;
use crate::metrics::Metrics;
use crate::retained::InMemoryRetainedStore;
use crate::session_handler::SessionHandler;
use crate::session_store::InMemorySessionStore;
use crate::subscription_index::SubscriptionIndex;

/// Runs until every listener task exits, which in practice means until the
/// process is killed: listeners only return on a bind-time error, in which
/// case the whole broker shuts down rather than limping along without one
/// of its configured ports.
///
/// # Errors
/// Returns an error if a listener could not be bound or a configured
/// password file could not be loaded.
pub async fn run(config: Config) -> Result<(), Error> {
    let general = Arc::new(config.general);
    let metrics = Arc::new(Metrics::default());

    let auth: Arc<dyn AuthPolicy> = match &config.security.password_file {
        Some(path) => Arc::new(FileAuthPolicy::load(path, config.security.allow_anonymous)?),
        None => Arc::new(AllowAllAuthPolicy),
    };

    let bus: Arc<dyn MessageBus> = match config.bus.kind {
        BusKind::None => Arc::new(InProcBus::new()),
        BusKind::External => {
            // A single in-process transport stands in for the real cluster
            // transport (spec section 1 keeps the concrete Kafka wiring out
            // of scope); a future transport only needs to implement
            // `BusTransport`, not change anything here.
            let transport = Arc::new(InMemoryTransport::new());
            Arc::new(ExternalBus::new(transport, general.node_id.clone()))
        }
    };

    let store = InMemorySessionStore::new(general.message_queue_size, metrics.clone());
    let retained = Arc::new(InMemoryRetainedStore::new());
    let subscriptions = Arc::new(SubscriptionIndex::new(general.node_id.clone()));

    let handler = Arc::new(SessionHandler::new(
        store,
        retained,
        subscriptions,
        bus,
        auth.clone(),
        metrics.clone(),
        general.clone(),
    ));

    tokio::spawn(handler.clone().run());

    info!(
        "node {} starting with {} listener(s)",
        general.node_id,
        config.listeners.len()
    );

    let mut listener_tasks = Vec::with_capacity(config.listeners.len());
    for listener_config in config.listeners {
        let handler = handler.clone();
        let general = general.clone();
        let auth = auth.clone();
        let metrics = metrics.clone();
        listener_tasks.push(tokio::spawn(async move {
            listener::serve(listener_config, handler, general, auth, metrics).await
        }));
    }

    for task in listener_tasks {
        task.await.map_err(|err| {
            Error::new(crate::error::ErrorKind::Io, format!("listener task panicked: {err}"))
        })??;
    }

    Ok(())
}
