//! Per-connection protocol state machine (spec section 4.7): CONNECT
//! handshake, keep-alive, inbound/outbound QoS 0/1/2, SUBSCRIBE/UNSUBSCRIBE,
//! will, and clean-session cleanup. One task per connected client, modeled
//! on hebo's `session::client` actor: the task owns its socket and all
//! per-session mutable state; nothing here is shared across sessions.

mod inbound;
mod outbound;
mod packet_id;
mod will;

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use codec::{
    ConnectAckPacket, ConnectReturnCode, DisconnectPacket, Packet, PingResponsePacket,
    PublishAckPacket, PublishCompletePacket, PublishPacket, PublishReceivedPacket,
    PublishReleasePacket, QoS, SubscribeAck, SubscribeAckPacket, UnsubscribeAckPacket,
};
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Sleep;

use crate::auth::{AuthOp, AuthPolicy};
use crate::commands::HandlerToSessionCmd;
use crate::config::General;
use crate::error::{Error, ErrorKind};
use crate::metrics::Metrics;
use crate::session_handler::{SessionHandler, SubscribeOutcome};
use crate::session_store::SessionStore;
use crate::types::{ClientId, Message};

use inbound::InboundTable;
use outbound::{OutboundQueue, Stage};
use packet_id::PacketIdAllocator;

const READ_CHUNK: usize = 4096;

/// A fixed-window per-second rate limiter: counts events in the current
/// one-second window and rejects once the budget is spent. A limit of `0`
/// means unlimited, matching the `General` config convention.
struct RateLimiter {
    limit: u32,
    window_start: tokio::time::Instant,
    count: u32,
}

impl RateLimiter {
    fn new(limit: u32) -> Self {
        Self {
            limit,
            window_start: tokio::time::Instant::now(),
            count: 0,
        }
    }

    fn allow(&mut self) -> bool {
        if self.limit == 0 {
            return true;
        }
        let now = tokio::time::Instant::now();
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.window_start = now;
            self.count = 0;
        }
        if self.count >= self.limit {
            return false;
        }
        self.count += 1;
        true
    }
}

pub struct ClientSession<S: SessionStore> {
    handler: Arc<SessionHandler<S>>,
    general: Arc<General>,
    auth: Arc<dyn AuthPolicy>,
    metrics: Arc<Metrics>,
    remote_addr: String,
}

impl<S: SessionStore + 'static> ClientSession<S> {
    #[must_use]
    pub fn new(
        handler: Arc<SessionHandler<S>>,
        general: Arc<General>,
        auth: Arc<dyn AuthPolicy>,
        metrics: Arc<Metrics>,
        remote_addr: String,
    ) -> Self {
        Self {
            handler,
            general,
            auth,
            metrics,
            remote_addr,
        }
    }

    /// Drive one connection end to end. Returns once the connection is
    /// closed, for any reason; errors here are this session's own, never
    /// propagated to other sessions (spec section 7).
    ///
    /// # Errors
    /// Returns an error on a protocol violation, I/O failure, or a store/bus
    /// call failing during the CONNECT handshake.
    pub async fn run<RW>(self, mut stream: RW) -> Result<(), Error>
    where
        RW: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let max_frame_len = self.general.max_message_size_kb as usize * 1024;
        let mut read_buf = Vec::new();

        let Some(packet) = read_one(&mut stream, &mut read_buf, max_frame_len).await? else {
            return Ok(());
        };
        let Packet::Connect(mut connect) = packet else {
            return Err(Error::new(ErrorKind::Protocol, "expected CONNECT as the first packet"));
        };

        if connect.protocol_level() != codec::ProtocolLevel::V311 {
            write_connack(&mut stream, false, ConnectReturnCode::UnacceptableProtocolVersion)
                .await?;
            return Ok(());
        }

        if connect.client_id().is_empty() {
            if connect.clean_session() {
                connect.set_client_id(&codec::random_client_id());
            } else {
                write_connack(&mut stream, false, ConnectReturnCode::IdentifierRejected).await?;
                return Ok(());
            }
        }
        let client_id: ClientId = connect.client_id().to_string();

        let auth_result =
            self.auth
                .authenticate(connect.username(), connect.password(), &self.remote_addr);
        if !auth_result.ok {
            write_connack(&mut stream, false, ConnectReturnCode::BadUserNameOrPassword).await?;
            return Ok(());
        }
        let effective_user = auth_result.effective_user.unwrap_or_else(|| client_id.clone());

        let clean_session = connect.clean_session();
        let will = will::from_connect(&connect, &client_id);

        let (tx, mut rx) = mpsc::channel(self.general.message_queue_size);
        let attach = self.handler.connect(&client_id, clean_session, tx.clone()).await?;
        self.handler.set_will(&client_id, will).await?;

        write_connack(&mut stream, attach.present, ConnectReturnCode::Accepted).await?;

        let keep_alive_secs = connect.keep_alive();
        let keep_alive_duration = (keep_alive_secs > 0).then(|| {
            Duration::from_secs_f32(f32::from(keep_alive_secs) * self.general.keep_alive_grace)
        });
        let mut keep_alive_timer: Option<Pin<Box<Sleep>>> =
            keep_alive_duration.map(|d| Box::pin(tokio::time::sleep(d)));

        let mut publish_limiter = RateLimiter::new(self.general.max_publish_rate);
        let mut subscribe_limiter = RateLimiter::new(self.general.max_subscribe_rate);

        let retry_interval = Duration::from_secs(self.general.qos2_retry_interval_secs);
        let mut retry_ticker = tokio::time::interval(retry_interval);
        retry_ticker.tick().await; // first tick fires immediately; consume it

        let mut packet_ids = PacketIdAllocator::default();
        let mut inbound = InboundTable::default();
        let mut outbound = OutboundQueue::default();

        let mut graceful = false;

        loop {
            let keep_alive_fires = async {
                match &mut keep_alive_timer {
                    Some(timer) => timer.as_mut().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                read_result = read_one(&mut stream, &mut read_buf, max_frame_len) => {
                    let packet = match read_result {
                        Ok(Some(packet)) => packet,
                        Ok(None) => break,
                        Err(err) => {
                            warn!("client {client_id} protocol error: {err}");
                            break;
                        }
                    };
                    if let Some(d) = keep_alive_duration {
                        if let Some(timer) = &mut keep_alive_timer {
                            timer.as_mut().reset(tokio::time::Instant::now() + d);
                        }
                    }
                    match self
                        .handle_inbound(
                            packet,
                            &client_id,
                            &effective_user,
                            &mut stream,
                            &tx,
                            &mut inbound,
                            &mut outbound,
                            &mut publish_limiter,
                            &mut subscribe_limiter,
                        )
                        .await
                    {
                        Ok(true) => {}
                        Ok(false) => {
                            graceful = true;
                            break;
                        }
                        Err(err) => {
                            warn!("client {client_id} error handling packet: {err}");
                            break;
                        }
                    }
                }
                cmd = rx.recv() => {
                    match cmd {
                        Some(HandlerToSessionCmd::Deliver(message)) => {
                            if let Err(err) = self
                                .write_outbound_message(&mut stream, message, &mut outbound, &mut packet_ids)
                                .await
                            {
                                warn!("client {client_id} failed writing delivery: {err}");
                                break;
                            }
                        }
                        Some(HandlerToSessionCmd::Evicted) | None => {
                            graceful = true;
                            break;
                        }
                    }
                }
                () = keep_alive_fires => {
                    debug!("client {client_id} keep-alive expired");
                    break;
                }
                _ = retry_ticker.tick() => {
                    if let Err(err) = self.retry_outbound(&mut stream, &mut outbound).await {
                        warn!("client {client_id} failed resending in-flight message: {err}");
                        break;
                    }
                    if let Err(err) = self.retry_inbound(&client_id, &mut stream, &mut inbound).await {
                        warn!("client {client_id} failed resending PUBREC: {err}");
                        break;
                    }
                }
            }
        }

        self.handler.disconnect(&client_id, clean_session, !graceful).await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_inbound<RW>(
        &self,
        packet: Packet,
        client_id: &ClientId,
        effective_user: &str,
        stream: &mut RW,
        tx: &mpsc::Sender<HandlerToSessionCmd>,
        inbound: &mut InboundTable,
        outbound: &mut OutboundQueue,
        publish_limiter: &mut RateLimiter,
        subscribe_limiter: &mut RateLimiter,
    ) -> Result<bool, Error>
    where
        RW: AsyncWrite + Unpin + Send,
    {
        match packet {
            Packet::Connect(_) => {
                return Err(Error::new(ErrorKind::Protocol, "unexpected second CONNECT"));
            }
            Packet::Publish(p) => {
                self.handle_publish(p, client_id, effective_user, stream, inbound, publish_limiter)
                    .await?;
            }
            Packet::PublishRelease(p) => {
                if let Some(message) = inbound.release(p.packet_id()) {
                    self.handler.publish(message)?;
                }
                write_packet(stream, &Packet::PublishComplete(PublishCompletePacket::new(p.packet_id()))).await?;
            }
            Packet::PublishAck(p) => {
                match outbound.complete_head(p.packet_id()) {
                    Some(Some((next_id, next_msg))) => write_outbound_publish(stream, next_id, &next_msg).await?,
                    Some(None) => {}
                    None => debug!("client {client_id} sent PUBACK for unknown packet {}", p.packet_id()),
                }
            }
            Packet::PublishReceived(p) => {
                if outbound.receive_head(p.packet_id()) {
                    write_packet(stream, &Packet::PublishRelease(PublishReleasePacket::new(p.packet_id()))).await?;
                } else {
                    debug!("client {client_id} sent PUBREC for unknown packet {}", p.packet_id());
                }
            }
            Packet::PublishComplete(p) => {
                match outbound.complete_head(p.packet_id()) {
                    Some(Some((next_id, next_msg))) => write_outbound_publish(stream, next_id, &next_msg).await?,
                    Some(None) => {}
                    None => debug!("client {client_id} sent PUBCOMP for unknown packet {}", p.packet_id()),
                }
            }
            Packet::Subscribe(p) => {
                if !subscribe_limiter.allow() {
                    self.metrics.subscribe_rate_limited.incr();
                    return Err(Error::new(ErrorKind::ResourceExhausted, "subscribe rate exceeded"));
                }
                let mut acks = Vec::with_capacity(p.topics().len());
                for topic in p.topics() {
                    if !self.auth.authorize(effective_user, AuthOp::Subscribe, topic.topic()) {
                        acks.push(SubscribeAck::Failure);
                        continue;
                    }
                    let outcome = self
                        .handler
                        .subscribe(client_id, topic.topic(), topic.qos(), tx)
                        .await?;
                    acks.push(match outcome {
                        SubscribeOutcome::Granted(qos) => SubscribeAck::QoS(qos),
                        SubscribeOutcome::Rejected => SubscribeAck::Failure,
                    });
                }
                write_packet(stream, &Packet::SubscribeAck(SubscribeAckPacket::with_vec(p.packet_id(), acks))).await?;
            }
            Packet::Unsubscribe(p) => {
                for topic in p.topics() {
                    self.handler.unsubscribe(client_id, topic).await?;
                }
                write_packet(stream, &Packet::UnsubscribeAck(UnsubscribeAckPacket::new(p.packet_id()))).await?;
            }
            Packet::PingRequest(_) => {
                write_packet(stream, &Packet::PingResponse(PingResponsePacket)).await?;
            }
            Packet::Disconnect(DisconnectPacket) => {
                self.handler.set_will(client_id, None).await?;
                return Ok(false);
            }
            Packet::ConnectAck(_) | Packet::SubscribeAck(_) | Packet::UnsubscribeAck(_) | Packet::PingResponse(_) => {
                return Err(Error::new(ErrorKind::Protocol, "server-only packet sent by client"));
            }
        }
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_publish<RW>(
        &self,
        p: PublishPacket,
        client_id: &ClientId,
        effective_user: &str,
        stream: &mut RW,
        inbound: &mut InboundTable,
        publish_limiter: &mut RateLimiter,
    ) -> Result<(), Error>
    where
        RW: AsyncWrite + Unpin + Send,
    {
        if !publish_limiter.allow() {
            self.metrics.publish_rate_limited.incr();
            if p.qos() == QoS::AtMostOnce {
                return Ok(());
            }
            return Err(Error::new(ErrorKind::ResourceExhausted, "publish rate exceeded"));
        }

        let message = if self.auth.authorize(effective_user, AuthOp::Publish, p.topic()) {
            let mut message = Message::new(p.topic(), p.payload().to_vec(), p.qos(), p.retain())
                .with_dup(p.dup())
                .with_sender(client_id.clone());
            message.packet_id = p.packet_id();
            Some(message)
        } else {
            // Authorization failure drops the message silently but still
            // completes the QoS handshake with the client.
            None
        };

        match p.qos() {
            QoS::AtMostOnce => {
                if let Some(message) = message {
                    self.handler.publish(message)?;
                }
            }
            QoS::AtLeastOnce => {
                let packet_id = p
                    .packet_id()
                    .ok_or_else(|| Error::new(ErrorKind::Protocol, "QoS 1 PUBLISH without packet id"))?;
                if let Some(message) = message {
                    self.handler.publish(message)?;
                }
                write_packet(stream, &Packet::PublishAck(PublishAckPacket::new(packet_id))).await?;
            }
            QoS::ExactlyOnce => {
                let packet_id = p
                    .packet_id()
                    .ok_or_else(|| Error::new(ErrorKind::Protocol, "QoS 2 PUBLISH without packet id"))?;
                if inbound.is_duplicate(packet_id) {
                    debug!("client {client_id} resent duplicate QoS 2 PUBLISH {packet_id}");
                } else if let Some(message) = message {
                    inbound.insert(packet_id, message);
                }
                write_packet(stream, &Packet::PublishReceived(PublishReceivedPacket::new(packet_id))).await?;
            }
        }
        Ok(())
    }

    async fn write_outbound_message<RW>(
        &self,
        stream: &mut RW,
        message: Message,
        outbound: &mut OutboundQueue,
        packet_ids: &mut PacketIdAllocator,
    ) -> Result<(), Error>
    where
        RW: AsyncWrite + Unpin + Send,
    {
        if message.qos == QoS::AtMostOnce {
            let mut packet = PublishPacket::new(&message.topic, QoS::AtMostOnce, message.payload)?;
            packet.set_retain(message.retain);
            write_packet(stream, &Packet::Publish(packet)).await?;
            return Ok(());
        }

        let packet_id = packet_ids.allocate(&outbound.in_use_ids());
        let becomes_head = outbound.push(packet_id, message.clone());
        if becomes_head {
            write_outbound_publish(stream, packet_id, &message).await?;
        }
        Ok(())
    }

    async fn retry_outbound<RW>(&self, stream: &mut RW, outbound: &mut OutboundQueue) -> Result<(), Error>
    where
        RW: AsyncWrite + Unpin + Send,
    {
        let retry_interval = Duration::from_secs(self.general.qos2_retry_interval_secs);
        let Some(head) = outbound.head_due_for_retry(retry_interval) else {
            return Ok(());
        };

        if head.retry_count >= self.general.qos2_retry_count {
            self.metrics.qos2_retries_exhausted.incr();
            if let Some((next_id, next_msg)) = outbound.discard_head() {
                write_outbound_publish(stream, next_id, &next_msg).await?;
            }
            return Ok(());
        }

        let packet_id = head.packet_id;
        let stage = head.stage;
        let message = head.message.clone();
        outbound.retry_head();

        match stage {
            Stage::AwaitAck => {
                let mut packet = PublishPacket::new(&message.topic, message.qos, message.payload)?;
                packet.set_packet_id(packet_id).set_dup(true).set_retain(message.retain);
                write_packet(stream, &Packet::Publish(packet)).await?;
            }
            Stage::AwaitComp => {
                write_packet(stream, &Packet::PublishRelease(PublishReleasePacket::new(packet_id))).await?;
            }
        }
        Ok(())
    }

    /// Resend PUBREC for any inbound QoS 2 entry still waiting on a PUBREL
    /// past `QoS2RetryInterval`, dropping it without delivering its message
    /// once `QoS2RetryCount` is exhausted.
    async fn retry_inbound<RW>(
        &self,
        client_id: &ClientId,
        stream: &mut RW,
        inbound: &mut InboundTable,
    ) -> Result<(), Error>
    where
        RW: AsyncWrite + Unpin + Send,
    {
        let retry_interval = Duration::from_secs(self.general.qos2_retry_interval_secs);
        for packet_id in inbound.due_for_retry(retry_interval) {
            let Some(retry_count) = inbound.retry_count(packet_id) else {
                continue;
            };
            if retry_count >= self.general.qos2_retry_count {
                self.metrics.qos2_inbound_retries_exhausted.incr();
                warn!("client {client_id} dropping inbound QoS 2 packet {packet_id} after exhausting retries");
                inbound.discard(packet_id);
                continue;
            }
            inbound.note_retry(packet_id);
            write_packet(stream, &Packet::PublishReceived(PublishReceivedPacket::new(packet_id))).await?;
        }
        Ok(())
    }
}

async fn write_outbound_publish<RW>(
    stream: &mut RW,
    packet_id: codec::PacketId,
    message: &Message,
) -> Result<(), Error>
where
    RW: AsyncWrite + Unpin + Send,
{
    let mut packet = PublishPacket::new(&message.topic, message.qos, message.payload.clone())?;
    packet.set_packet_id(packet_id).set_dup(message.dup).set_retain(message.retain);
    write_packet(stream, &Packet::Publish(packet)).await
}

async fn write_connack<RW>(
    stream: &mut RW,
    session_present: bool,
    return_code: ConnectReturnCode,
) -> Result<(), Error>
where
    RW: AsyncWrite + Unpin + Send,
{
    write_packet(stream, &Packet::ConnectAck(ConnectAckPacket::new(session_present, return_code))).await
}

async fn write_packet<RW>(stream: &mut RW, packet: &Packet) -> Result<(), Error>
where
    RW: AsyncWrite + Unpin + Send,
{
    let mut buf = Vec::new();
    packet.encode(&mut buf)?;
    stream.write_all(&buf).await?;
    Ok(())
}

/// Accumulate bytes from `stream` into `buf` until one full frame is
/// available, then decode and drain it. Returns `Ok(None)` on a clean EOF
/// with no partial frame pending.
async fn read_one<RW>(
    stream: &mut RW,
    buf: &mut Vec<u8>,
    max_frame_len: usize,
) -> Result<Option<Packet>, Error>
where
    RW: AsyncRead + Unpin + Send,
{
    loop {
        if let Some(total) = Packet::peek_total_len(buf)? {
            if total > max_frame_len {
                return Err(Error::new(ErrorKind::Protocol, "frame exceeds MaxMessageSizeKb"));
            }
            if buf.len() >= total {
                let packet = Packet::decode(&buf[..total])?;
                buf.drain(..total);
                return Ok(Some(packet));
            }
        }
        let mut chunk = [0u8; READ_CHUNK];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
