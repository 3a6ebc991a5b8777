// PUBLISH packet, grounded on hebo's codec::publish_packet module.

use crate::base::{DecodePacket, EncodePacket, PacketId, QoS};
use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};
use crate::topic::validate_topic_name;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PublishPacket {
    dup: bool,
    qos: QoS,
    retain: bool,
    topic: String,
    packet_id: Option<PacketId>,
    payload: Vec<u8>,
}

impl PublishPacket {
    /// # Errors
    /// Returns an error if `topic` is not a valid concrete topic name.
    pub fn new(topic: &str, qos: QoS, payload: Vec<u8>) -> Result<Self, EncodeError> {
        validate_topic_name(topic).map_err(|_err| EncodeError::InvalidRemainingLength)?;
        Ok(Self {
            dup: false,
            qos,
            retain: false,
            topic: topic.to_string(),
            packet_id: None,
            payload,
        })
    }

    #[must_use]
    pub fn dup(&self) -> bool {
        self.dup
    }

    pub fn set_dup(&mut self, dup: bool) -> &mut Self {
        self.dup = dup;
        self
    }

    #[must_use]
    pub fn qos(&self) -> QoS {
        self.qos
    }

    #[must_use]
    pub fn retain(&self) -> bool {
        self.retain
    }

    pub fn set_retain(&mut self, retain: bool) -> &mut Self {
        self.retain = retain;
        self
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn packet_id(&self) -> Option<PacketId> {
        self.packet_id
    }

    pub fn set_packet_id(&mut self, packet_id: PacketId) -> &mut Self {
        self.packet_id = Some(packet_id);
        self
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl DecodePacket for PublishPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        let (dup, qos, retain) = match fixed_header.packet_type() {
            PacketType::Publish { dup, qos, retain } => (dup, qos, retain),
            _ => return Err(DecodeError::InvalidPacketType),
        };

        let topic = ba.read_string()?;
        validate_topic_name(&topic)?;

        let packet_id = if qos == QoS::AtMostOnce {
            None
        } else {
            Some(ba.read_u16()?)
        };

        let payload = ba.read_remaining().to_vec();

        Ok(Self {
            dup,
            qos,
            retain,
            topic,
            packet_id,
            payload,
        })
    }
}

impl EncodePacket for PublishPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        if self.qos != QoS::AtMostOnce && self.packet_id.is_none() {
            return Err(EncodeError::InvalidRemainingLength);
        }

        let mut payload = Vec::new();
        byte_array::write_string(&mut payload, &self.topic)?;
        if let Some(packet_id) = self.packet_id {
            byte_array::write_u16(&mut payload, packet_id);
        }
        payload.extend_from_slice(&self.payload);

        let fixed_header = FixedHeader::new(
            PacketType::Publish {
                dup: self.dup,
                qos: self.qos,
                retain: self.retain,
            },
            payload.len(),
        )?;
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
    fn round_trips_a_qos1_publish() {
        let mut packet = PublishPacket::new("a/b", QoS::AtLeastOnce, b"hi".to_vec()).unwrap();
        packet.set_packet_id(7).set_dup(true).set_retain(true);

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = PublishPacket::decode(&mut ba).unwrap();

        assert_eq!(decoded.topic(), "a/b");
        assert_eq!(decoded.packet_id(), Some(7));
        assert!(decoded.dup());
        assert!(decoded.retain());
        assert_eq!(decoded.payload(), b"hi");
    }

    #[test]
    fn qos0_publish_carries_no_packet_id() {
        let packet = PublishPacket::new("a/b", QoS::AtMostOnce, b"hi".to_vec()).unwrap();
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = PublishPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded.packet_id(), None);
    }
}
