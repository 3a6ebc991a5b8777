// SUBACK packet, grounded on hebo's codec::subscribe_ack_packet module.

use crate::base::{DecodePacket, EncodePacket, PacketId, QoS};
use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

/// A single SUBACK payload entry: the granted QoS, or a failure code
/// (0x80) if the server refused the corresponding subscription
/// [MQTT-3.9.3-2].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubscribeAck {
    QoS(QoS),
    Failure,
}

impl From<SubscribeAck> for u8 {
    fn from(ack: SubscribeAck) -> Self {
        match ack {
            SubscribeAck::QoS(qos) => qos.into(),
            SubscribeAck::Failure => 0x80,
        }
    }
}

impl TryFrom<u8> for SubscribeAck {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        if v == 0x80 {
            return Ok(Self::Failure);
        }
        QoS::try_from(v).map(Self::QoS)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubscribeAckPacket {
    packet_id: PacketId,
    acks: Vec<SubscribeAck>,
}

impl SubscribeAckPacket {
    #[must_use]
    pub fn with_vec(packet_id: PacketId, acks: Vec<SubscribeAck>) -> Self {
        Self { packet_id, acks }
    }

    #[must_use]
    pub fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    #[must_use]
    pub fn acks(&self) -> &[SubscribeAck] {
        &self.acks
    }
}

impl DecodePacket for SubscribeAckPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        let packet_id = ba.read_u16()?;
        let n = fixed_header.remaining_length() - 2;
        let mut acks = Vec::with_capacity(n);
        for _ in 0..n {
            acks.push(SubscribeAck::try_from(ba.read_byte()?)?);
        }
        Ok(Self { packet_id, acks })
    }
}

impl EncodePacket for SubscribeAckPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut payload = Vec::new();
        byte_array::write_u16(&mut payload, self.packet_id);
        for ack in &self.acks {
            payload.push(u8::from(*ack));
        }

        let fixed_header = FixedHeader::new(PacketType::SubscribeAck, payload.len())?;
        let start = buf.len();
        fixed_header.encode(buf)?;
        buf.extend_from_slice(&payload);
        Ok(buf.len() - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_grants_and_failures() {
        let packet = SubscribeAckPacket::with_vec(
            9,
            vec![SubscribeAck::QoS(QoS::AtLeastOnce), SubscribeAck::Failure],
        );
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = SubscribeAckPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded.packet_id(), 9);
        assert_eq!(
            decoded.acks(),
            &[SubscribeAck::QoS(QoS::AtLeastOnce), SubscribeAck::Failure]
        );
    }
}
