//! WebSocket framing for `Ws`/`Wss` listeners (spec section 4.8): MQTT is
//! carried in WebSocket binary frames. Grounded on hebo's `Stream::Ws`/
//! `Stream::Wss` (`hebo/src/stream.rs`), which reads frames with
//! `WebSocketStream::next`/`into_data` and writes them with
//! `WebSocketStream::send(Message::binary(..))`. Unlike hebo, which bakes
//! the transport into every call site via a `Stream` enum, this broker
//! keeps `ClientSession` transport-agnostic: a background task pumps bytes
//! between the WebSocket and one half of a `tokio::io::duplex`, handing
//! `ClientSession` the other half as a plain byte stream.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_async, WebSocketStream};

use crate::error::{Error, ErrorKind};

const DUPLEX_BUFFER: usize = 64 * 1024;

/// # Errors
/// Returns an error if the WebSocket opening handshake fails.
pub async fn accept_plain(socket: TcpStream) -> Result<DuplexStream, Error> {
    let ws = accept_async(socket)
        .await
        .map_err(|err| Error::new(ErrorKind::Protocol, err.to_string()))?;
    Ok(spawn_pump(ws))
}

/// # Errors
/// Returns an error if the WebSocket opening handshake fails.
pub async fn accept_tls<S>(stream: S) -> Result<DuplexStream, Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ws = accept_async(stream)
        .await
        .map_err(|err| Error::new(ErrorKind::Protocol, err.to_string()))?;
    Ok(spawn_pump(ws))
}

fn spawn_pump<S>(ws: WebSocketStream<S>) -> DuplexStream
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (session_side, pump_side) = tokio::io::duplex(DUPLEX_BUFFER);
    tokio::spawn(pump(ws, pump_side));
    session_side
}

async fn pump<S>(mut ws: WebSocketStream<S>, mut byte_side: DuplexStream)
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut out_buf = [0u8; 8192];
    loop {
        tokio::select! {
            frame = ws.next() => {
                match frame {
                    Some(Ok(WsMessage::Binary(data))) => {
                        if byte_side.write_all(&data).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {} // text/ping/pong: tungstenite answers pings itself
                }
            }
            n = byte_side.read(&mut out_buf) => {
                match n {
                    Ok(0) | Err(_) => {
                        let _ = ws.send(WsMessage::Close(None)).await;
                        break;
                    }
                    Ok(n) => {
                        if ws.send(WsMessage::Binary(out_buf[..n].to_vec().into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
}
