// PUBCOMP packet, grounded on hebo's codec::publish_complete_packet module.

use crate::base::{DecodePacket, EncodePacket, PacketId};
use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PublishCompletePacket {
    packet_id: PacketId,
}

impl PublishCompletePacket {
    #[must_use]
    pub fn new(packet_id: PacketId) -> Self {
        Self { packet_id }
    }

    #[must_use]
    pub fn packet_id(&self) -> PacketId {
        self.packet_id
    }
}

impl DecodePacket for PublishCompletePacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let _fixed_header = FixedHeader::decode(ba)?;
        Ok(Self {
            packet_id: ba.read_u16()?,
        })
    }
}

impl EncodePacket for PublishCompletePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let fixed_header = FixedHeader::new(PacketType::PublishComplete, 2)?;
        let start = buf.len();
        fixed_header.encode(buf)?;
        byte_array::write_u16(buf, self.packet_id);
        Ok(buf.len() - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_packet_id() {
        let packet = PublishCompletePacket::new(3);
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            PublishCompletePacket::decode(&mut ba).unwrap().packet_id(),
            3
        );
    }
}
