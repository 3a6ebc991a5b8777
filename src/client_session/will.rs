//! Will construction from a parsed CONNECT (spec sections 4.7.1, 4.7.4).

use codec::ConnectPacket;

use crate::types::{ClientId, Message};

#[must_use]
pub fn from_connect(connect: &ConnectPacket, client_id: &ClientId) -> Option<Message> {
    connect.will().map(|(topic, payload, qos, retain)| {
        Message::new(topic, payload.to_vec(), qos, retain).with_sender(client_id.clone())
    })
}
