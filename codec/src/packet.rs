// Top-level packet enum tying every control packet together, grounded on
// hebo's codec::Packet enum used at the listener/session boundary.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::ByteArray;
use crate::connect::ConnectPacket;
use crate::connect_ack::ConnectAckPacket;
use crate::disconnect::DisconnectPacket;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};
use crate::ping::{PingRequestPacket, PingResponsePacket};
use crate::publish::PublishPacket;
use crate::publish_ack::PublishAckPacket;
use crate::publish_complete::PublishCompletePacket;
use crate::publish_received::PublishReceivedPacket;
use crate::publish_release::PublishReleasePacket;
use crate::subscribe::SubscribePacket;
use crate::subscribe_ack::SubscribeAckPacket;
use crate::unsubscribe::UnsubscribePacket;
use crate::unsubscribe_ack::UnsubscribeAckPacket;

#[derive(Clone, Debug, PartialEq)]
pub enum Packet {
    Connect(ConnectPacket),
    ConnectAck(ConnectAckPacket),
    Publish(PublishPacket),
    PublishAck(PublishAckPacket),
    PublishReceived(PublishReceivedPacket),
    PublishRelease(PublishReleasePacket),
    PublishComplete(PublishCompletePacket),
    Subscribe(SubscribePacket),
    SubscribeAck(SubscribeAckPacket),
    Unsubscribe(UnsubscribePacket),
    UnsubscribeAck(UnsubscribeAckPacket),
    PingRequest(PingRequestPacket),
    PingResponse(PingResponsePacket),
    Disconnect(DisconnectPacket),
}

impl Packet {
    /// Peek the fixed header without consuming the packet body, so callers
    /// can decide whether the full frame has arrived yet.
    ///
    /// # Errors
    /// Returns an error if the buffer does not hold a well-formed fixed header.
    pub fn peek_total_len(buf: &[u8]) -> Result<Option<usize>, DecodeError> {
        let mut ba = ByteArray::new(buf);
        match FixedHeader::decode(&mut ba) {
            Ok(header) => Ok(Some(header.bytes() + header.remaining_length())),
            Err(DecodeError::InvalidRemainingLength) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// # Errors
    /// Returns an error if `buf` does not contain a well-formed packet of a
    /// recognized type.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut probe = ByteArray::new(buf);
        let fixed_header = FixedHeader::decode(&mut probe)?;
        let mut ba = ByteArray::new(buf);

        Ok(match fixed_header.packet_type() {
            PacketType::Connect => Self::Connect(ConnectPacket::decode(&mut ba)?),
            PacketType::ConnectAck => Self::ConnectAck(ConnectAckPacket::decode(&mut ba)?),
            PacketType::Publish { .. } => Self::Publish(PublishPacket::decode(&mut ba)?),
            PacketType::PublishAck => Self::PublishAck(PublishAckPacket::decode(&mut ba)?),
            PacketType::PublishReceived => {
                Self::PublishReceived(PublishReceivedPacket::decode(&mut ba)?)
            }
            PacketType::PublishRelease => {
                Self::PublishRelease(PublishReleasePacket::decode(&mut ba)?)
            }
            PacketType::PublishComplete => {
                Self::PublishComplete(PublishCompletePacket::decode(&mut ba)?)
            }
            PacketType::Subscribe => Self::Subscribe(SubscribePacket::decode(&mut ba)?),
            PacketType::SubscribeAck => Self::SubscribeAck(SubscribeAckPacket::decode(&mut ba)?),
            PacketType::Unsubscribe => Self::Unsubscribe(UnsubscribePacket::decode(&mut ba)?),
            PacketType::UnsubscribeAck => {
                Self::UnsubscribeAck(UnsubscribeAckPacket::decode(&mut ba)?)
            }
            PacketType::PingRequest => Self::PingRequest(PingRequestPacket::decode(&mut ba)?),
            PacketType::PingResponse => Self::PingResponse(PingResponsePacket::decode(&mut ba)?),
            PacketType::Disconnect => Self::Disconnect(DisconnectPacket::decode(&mut ba)?),
        })
    }

    /// # Errors
    /// Returns an error if the contained packet's fields cannot be encoded.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        match self {
            Self::Connect(p) => p.encode(buf),
            Self::ConnectAck(p) => p.encode(buf),
            Self::Publish(p) => p.encode(buf),
            Self::PublishAck(p) => p.encode(buf),
            Self::PublishReceived(p) => p.encode(buf),
            Self::PublishRelease(p) => p.encode(buf),
            Self::PublishComplete(p) => p.encode(buf),
            Self::Subscribe(p) => p.encode(buf),
            Self::SubscribeAck(p) => p.encode(buf),
            Self::Unsubscribe(p) => p.encode(buf),
            Self::UnsubscribeAck(p) => p.encode(buf),
            Self::PingRequest(p) => p.encode(buf),
            Self::PingResponse(p) => p.encode(buf),
            Self::Disconnect(p) => p.encode(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::QoS;

    #[test]
    fn decodes_the_right_variant() {
        let publish = PublishPacket::new("a/b", QoS::AtMostOnce, b"x".to_vec()).unwrap();
        let mut buf = Vec::new();
        publish.encode(&mut buf).unwrap();

        let total = Packet::peek_total_len(&buf).unwrap().unwrap();
        assert_eq!(total, buf.len());

        match Packet::decode(&buf).unwrap() {
            Packet::Publish(p) => assert_eq!(p.topic(), "a/b"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn peek_reports_none_on_partial_buffer() {
        assert_eq!(Packet::peek_total_len(&[0x10]).unwrap(), None);
    }
}
