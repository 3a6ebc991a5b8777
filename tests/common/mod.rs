//! Shared end-to-end harness: wires a fresh in-memory `SessionHandler` and
//! drives a `ClientSession` over one half of a `tokio::io::duplex`, so tests
//! can write raw encoded packets in and decode raw packets back out without
//! touching a real socket.

use std::sync::Arc;

use codec::Packet;
use monstermq::auth::AllowAllAuthPolicy;
use monstermq::bus::InProcBus;
use monstermq::client_session::ClientSession;
use monstermq::config::General;
use monstermq::metrics::Metrics;
use monstermq::retained::InMemoryRetainedStore;
use monstermq::session_handler::SessionHandler;
use monstermq::session_store::InMemorySessionStore;
use monstermq::subscription_index::SubscriptionIndex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

pub type Handler = SessionHandler<InMemorySessionStore>;

pub fn handler(general: General) -> Arc<Handler> {
    let general = Arc::new(general);
    let metrics = Arc::new(Metrics::default());
    Arc::new(SessionHandler::new(
        InMemorySessionStore::new(general.message_queue_size, metrics.clone()),
        Arc::new(InMemoryRetainedStore::new()),
        Arc::new(SubscriptionIndex::new(general.node_id.clone())),
        Arc::new(InProcBus::new()),
        Arc::new(AllowAllAuthPolicy),
        metrics,
        general,
    ))
}

/// Spawns a `ClientSession` and the handler's bus consumer loop, returning
/// the client-side half of the duplex the test drives directly.
pub fn spawn_session(handler: Arc<Handler>, general: Arc<General>) -> DuplexStream {
    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    tokio::spawn(handler.clone().run());

    let session = ClientSession::new(
        handler,
        general,
        Arc::new(AllowAllAuthPolicy),
        Arc::new(Metrics::default()),
        "127.0.0.1:0".to_string(),
    );
    tokio::spawn(async move {
        let _ = session.run(server_side).await;
    });
    client_side
}

pub async fn write_packet(stream: &mut DuplexStream, packet: &Packet) {
    let mut buf = Vec::new();
    packet.encode(&mut buf).unwrap();
    stream.write_all(&buf).await.unwrap();
}

/// Reads exactly one packet, growing the read buffer as needed. Panics if
/// the stream closes before a full packet arrives.
pub async fn read_packet(stream: &mut DuplexStream) -> Packet {
    let mut buf = Vec::new();
    loop {
        if let Some(total) = Packet::peek_total_len(&buf).unwrap() {
            if buf.len() >= total {
                let packet = Packet::decode(&buf).unwrap();
                return packet;
            }
        }
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await.unwrap();
        assert_ne!(n, 0, "stream closed before a full packet arrived");
        buf.extend_from_slice(&chunk[..n]);
    }
}
