// SUBSCRIBE packet, grounded on hebo's codec::subscribe_packet module.

use crate::base::{DecodePacket, EncodePacket, PacketId, QoS};
use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};
use crate::topic::validate_topic_filter;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubscribeTopic {
    topic: String,
    qos: QoS,
}

impl SubscribeTopic {
    /// # Errors
    /// Returns an error if `topic` is not a syntactically valid topic filter.
    pub fn new(topic: &str, qos: QoS) -> Result<Self, EncodeError> {
        validate_topic_filter(topic).map_err(|_err| EncodeError::InvalidRemainingLength)?;
        Ok(Self {
            topic: topic.to_string(),
            qos,
        })
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn qos(&self) -> QoS {
        self.qos
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubscribePacket {
    packet_id: PacketId,
    topics: Vec<SubscribeTopic>,
}

impl SubscribePacket {
    #[must_use]
    pub fn new(packet_id: PacketId, topics: Vec<SubscribeTopic>) -> Self {
        Self { packet_id, topics }
    }

    #[must_use]
    pub fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    #[must_use]
    pub fn topics(&self) -> &[SubscribeTopic] {
        &self.topics
    }
}

impl DecodePacket for SubscribePacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        let packet_id = ba.read_u16()?;
        let end = ba.pos() + fixed_header.remaining_length() - 2;

        let mut topics = Vec::new();
        while ba.pos() < end {
            let topic = ba.read_string()?;
            validate_topic_filter(&topic)?;
            let qos_byte = ba.read_byte()?;
            // Bits 7-2 of the Requested QoS byte are reserved [MQTT-3.8.3-4].
            if qos_byte & 0b1111_1100 != 0 {
                return Err(DecodeError::InvalidPacketFlags);
            }
            let qos = QoS::try_from(qos_byte)?;
            topics.push(SubscribeTopic { topic, qos });
        }
        // The payload MUST contain at least one Topic Filter/QoS pair [MQTT-3.8.3-3].
        if topics.is_empty() {
            return Err(DecodeError::EmptyTopicFilter);
        }

        Ok(Self { packet_id, topics })
    }
}

impl EncodePacket for SubscribePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut payload = Vec::new();
        byte_array::write_u16(&mut payload, self.packet_id);
        for topic in &self.topics {
            byte_array::write_string(&mut payload, &topic.topic)?;
            payload.push(u8::from(topic.qos));
        }

        let fixed_header = FixedHeader::new(PacketType::Subscribe, payload.len())?;
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
    fn round_trips_multiple_topics() {
        let packet = SubscribePacket::new(
            1,
            vec![
                SubscribeTopic::new("a/+", QoS::AtLeastOnce).unwrap(),
                SubscribeTopic::new("b/#", QoS::ExactlyOnce).unwrap(),
            ],
        );
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = SubscribePacket::decode(&mut ba).unwrap();
        assert_eq!(decoded.packet_id(), 1);
        assert_eq!(decoded.topics().len(), 2);
        assert_eq!(decoded.topics()[1].topic(), "b/#");
    }
}
