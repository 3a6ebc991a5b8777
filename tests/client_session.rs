//! End-to-end scenarios driven through `ClientSession::run` over an
//! in-memory duplex stream, covering the cross-component behavior a unit
//! test inside a single module can't reach: CONNECT handshake, QoS
//! handshakes, retained fan-out, and wildcard subscriptions.

mod common;

use codec::{
    ConnectPacket, ConnectReturnCode, DisconnectPacket, Packet, PublishAckPacket, PublishPacket,
    QoS, SubscribeAck, SubscribePacket, SubscribeTopic,
};
use monstermq::config::General;

use common::{handler, read_packet, spawn_session, write_packet};

fn connect(client_id: &str, clean_session: bool) -> Packet {
    Packet::Connect(ConnectPacket::new(client_id, clean_session, 0))
}

#[tokio::test]
async fn connect_handshake_grants_a_fresh_session() {
    let general = std::sync::Arc::new(General::default());
    let h = handler((*general).clone());
    let mut stream = spawn_session(h, general);

    write_packet(&mut stream, &connect("alice", true)).await;
    match read_packet(&mut stream).await {
        Packet::ConnectAck(ack) => {
            assert!(!ack.session_present());
            assert_eq!(ack.return_code(), ConnectReturnCode::Accepted);
        }
        other => panic!("expected CONNACK, got {other:?}"),
    }
}

#[tokio::test]
async fn qos1_publish_is_acked_and_delivered_to_a_subscriber() {
    let general = std::sync::Arc::new(General::default());
    let h = handler((*general).clone());

    let mut subscriber = spawn_session(h.clone(), general.clone());
    write_packet(&mut subscriber, &connect("sub", true)).await;
    read_packet(&mut subscriber).await; // CONNACK

    write_packet(
        &mut subscriber,
        &Packet::Subscribe(SubscribePacket::new(
            1,
            vec![SubscribeTopic::new("sensors/temp", QoS::AtLeastOnce).unwrap()],
        )),
    )
    .await;
    match read_packet(&mut subscriber).await {
        Packet::SubscribeAck(ack) => assert_eq!(ack.acks(), &[SubscribeAck::QoS(QoS::AtLeastOnce)]),
        other => panic!("expected SUBACK, got {other:?}"),
    }

    let mut publisher = spawn_session(h, general);
    write_packet(&mut publisher, &connect("pub", true)).await;
    read_packet(&mut publisher).await; // CONNACK

    let mut publish = PublishPacket::new("sensors/temp", QoS::AtLeastOnce, b"21.5".to_vec()).unwrap();
    publish.set_packet_id(7);
    write_packet(&mut publisher, &Packet::Publish(publish)).await;

    match read_packet(&mut publisher).await {
        Packet::PublishAck(ack) => assert_eq!(ack.packet_id(), 7),
        other => panic!("expected PUBACK, got {other:?}"),
    }

    match read_packet(&mut subscriber).await {
        Packet::Publish(p) => {
            assert_eq!(p.topic(), "sensors/temp");
            assert_eq!(p.payload(), b"21.5");
            assert_eq!(p.qos(), QoS::AtLeastOnce);
        }
        other => panic!("expected a PUBLISH delivery, got {other:?}"),
    }
    write_packet(
        &mut subscriber,
        &Packet::PublishAck(PublishAckPacket::new(1)),
    )
    .await;
}

#[tokio::test]
async fn subscribing_replays_retained_messages_for_a_wildcard_filter() {
    let general = std::sync::Arc::new(General::default());
    let h = handler((*general).clone());

    let mut publisher = spawn_session(h.clone(), general.clone());
    write_packet(&mut publisher, &connect("pub", true)).await;
    read_packet(&mut publisher).await;

    let mut retained = PublishPacket::new("home/kitchen/temp", QoS::AtMostOnce, b"19".to_vec()).unwrap();
    retained.set_retain(true);
    write_packet(&mut publisher, &Packet::Publish(retained)).await;

    let mut subscriber = spawn_session(h, general);
    write_packet(&mut subscriber, &connect("sub", true)).await;
    read_packet(&mut subscriber).await;

    write_packet(
        &mut subscriber,
        &Packet::Subscribe(SubscribePacket::new(
            1,
            vec![SubscribeTopic::new("home/+/temp", QoS::AtMostOnce).unwrap()],
        )),
    )
    .await;
    read_packet(&mut subscriber).await; // SUBACK

    match read_packet(&mut subscriber).await {
        Packet::Publish(p) => {
            assert_eq!(p.topic(), "home/kitchen/temp");
            assert!(p.retain());
        }
        other => panic!("expected retained delivery, got {other:?}"),
    }
}

#[tokio::test]
async fn graceful_disconnect_does_not_publish_the_will() {
    let general = std::sync::Arc::new(General::default());
    let h = handler((*general).clone());

    let mut witness = spawn_session(h.clone(), general.clone());
    write_packet(&mut witness, &connect("witness", true)).await;
    read_packet(&mut witness).await;
    write_packet(
        &mut witness,
        &Packet::Subscribe(SubscribePacket::new(
            1,
            vec![SubscribeTopic::new("status/doomed", QoS::AtMostOnce).unwrap()],
        )),
    )
    .await;
    read_packet(&mut witness).await;

    let mut connect_with_will = ConnectPacket::new("doomed", true, 0);
    connect_with_will.set_will("status/doomed", b"offline", QoS::AtMostOnce, false);
    let mut dying = spawn_session(h, general);
    write_packet(&mut dying, &Packet::Connect(connect_with_will)).await;
    read_packet(&mut dying).await;

    write_packet(&mut dying, &Packet::Disconnect(DisconnectPacket)).await;

    // No will should arrive; confirm by racing a PINGREQ/PINGRESP round
    // trip through the still-alive witness session instead of sleeping.
    write_packet(
        &mut witness,
        &Packet::PingRequest(codec::PingRequestPacket),
    )
    .await;
    match read_packet(&mut witness).await {
        Packet::PingResponse(_) => {}
        other => panic!("expected PINGRESP, got {other:?}"),
    }
}
