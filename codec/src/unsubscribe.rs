// UNSUBSCRIBE packet, grounded on hebo's codec::unsubscribe_packet module.

use crate::base::{DecodePacket, EncodePacket, PacketId};
use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};
use crate::topic::validate_topic_filter;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnsubscribePacket {
    packet_id: PacketId,
    topics: Vec<String>,
}

impl UnsubscribePacket {
    /// # Errors
    /// Returns an error if any topic filter is syntactically invalid.
    pub fn new(packet_id: PacketId, topics: Vec<String>) -> Result<Self, EncodeError> {
        for topic in &topics {
            validate_topic_filter(topic).map_err(|_err| EncodeError::InvalidRemainingLength)?;
        }
        Ok(Self { packet_id, topics })
    }

    #[must_use]
    pub fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    #[must_use]
    pub fn topics(&self) -> &[String] {
        &self.topics
    }
}

impl DecodePacket for UnsubscribePacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        let packet_id = ba.read_u16()?;
        let end = ba.pos() + fixed_header.remaining_length() - 2;

        let mut topics = Vec::new();
        while ba.pos() < end {
            let topic = ba.read_string()?;
            validate_topic_filter(&topic)?;
            topics.push(topic);
        }
        // The payload MUST contain at least one Topic Filter [MQTT-3.10.3-2].
        if topics.is_empty() {
            return Err(DecodeError::EmptyTopicFilter);
        }

        Ok(Self { packet_id, topics })
    }
}

impl EncodePacket for UnsubscribePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut payload = Vec::new();
        byte_array::write_u16(&mut payload, self.packet_id);
        for topic in &self.topics {
            byte_array::write_string(&mut payload, topic)?;
        }

        let fixed_header = FixedHeader::new(PacketType::Unsubscribe, payload.len())?;
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
        let packet =
            UnsubscribePacket::new(4, vec!["a/+".to_string(), "b/#".to_string()]).unwrap();
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = UnsubscribePacket::decode(&mut ba).unwrap();
        assert_eq!(decoded.packet_id(), 4);
        assert_eq!(decoded.topics(), &["a/+".to_string(), "b/#".to_string()]);
    }
}
