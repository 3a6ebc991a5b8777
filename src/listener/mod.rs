//! Listener acceptors (spec section 4.8): one task per configured
//! `[[listener]]`, each binding a `TcpListener` and handing every accepted
//! connection to a fresh `ClientSession`. TLS and WebSocket framing are
//! peeled off before the byte stream reaches `ClientSession`, which only
//! ever sees a plain `AsyncRead + AsyncWrite`.

mod tls;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use log::{info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

use crate::auth::AuthPolicy;
use crate::client_session::ClientSession;
use crate::config::listener::Protocol;
use crate::config::{General, Listener as ListenerConfig};
use crate::error::{Error, ErrorKind};
use crate::metrics::Metrics;
use crate::session_handler::SessionHandler;
use crate::session_store::SessionStore;

/// Binds `config`'s address and accepts connections until the process is
/// torn down. Each connection runs on its own task and is logged, never
/// propagated: one bad client must not bring the listener down.
///
/// # Errors
/// Returns an error if the listener socket cannot be bound or the TLS
/// material configured for a `Tcps`/`Wss` listener cannot be loaded.
pub async fn serve<S: SessionStore + 'static>(
    config: ListenerConfig,
    handler: Arc<SessionHandler<S>>,
    general: Arc<General>,
    auth: Arc<dyn AuthPolicy>,
    metrics: Arc<Metrics>,
) -> Result<(), Error> {
    let addr: SocketAddr = format!("{}:{}", config.address, config.port)
        .parse()
        .map_err(|err| Error::new(ErrorKind::Config, format!("invalid listener address: {err}")))?;

    let tcp_listener = TcpListener::bind(addr).await?;
    info!("{:?} listener bound on {addr}", config.protocol);

    let tls_acceptor = match config.protocol {
        Protocol::Tcps | Protocol::Wss => Some(tls::load_acceptor(
            config
                .cert_file
                .as_deref()
                .expect("validated at config load"),
            config
                .key_file
                .as_deref()
                .expect("validated at config load"),
        )?),
        Protocol::Tcp | Protocol::Ws => None,
    };

    loop {
        let (socket, peer) = tcp_listener.accept().await?;
        let handler = handler.clone();
        let general = general.clone();
        let auth = auth.clone();
        let metrics = metrics.clone();
        let protocol = config.protocol;
        let tls_acceptor = tls_acceptor.clone();

        tokio::spawn(async move {
            if let Err(err) =
                accept_one(protocol, socket, peer, tls_acceptor, handler, general, auth, metrics)
                    .await
            {
                warn!("connection from {peer} ended with error: {err}");
            }
        });
    }
}

#[allow(clippy::too_many_arguments)]
async fn accept_one<S: SessionStore + 'static>(
    protocol: Protocol,
    socket: TcpStream,
    peer: SocketAddr,
    tls_acceptor: Option<TlsAcceptor>,
    handler: Arc<SessionHandler<S>>,
    general: Arc<General>,
    auth: Arc<dyn AuthPolicy>,
    metrics: Arc<Metrics>,
) -> Result<(), Error> {
    socket.set_nodelay(true).ok();
    let session = ClientSession::new(handler, general, auth, metrics, peer.to_string());

    match (protocol, tls_acceptor) {
        (Protocol::Tcp, None) => session.run(socket).await,
        (Protocol::Tcps, Some(acceptor)) => {
            let stream = acceptor.accept(socket).await?;
            session.run(stream).await
        }
        (Protocol::Ws, None) => {
            let stream = ws::accept_plain(socket).await?;
            session.run(stream).await
        }
        (Protocol::Wss, Some(acceptor)) => {
            let tls_stream = acceptor.accept(socket).await?;
            let stream = ws::accept_tls(tls_stream).await?;
            session.run(stream).await
        }
        (Protocol::Tcp | Protocol::Ws, Some(_)) | (Protocol::Tcps | Protocol::Wss, None) => {
            unreachable!("tls_acceptor presence matches protocol by construction in serve()")
        }
    }
}
