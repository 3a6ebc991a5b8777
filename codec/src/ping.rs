// PINGREQ/PINGRESP packets, grounded on hebo's codec::ping_packet module.
// Both are header-only: no variable header, no payload.

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PingRequestPacket;

impl DecodePacket for PingRequestPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let _fixed_header = FixedHeader::decode(ba)?;
        Ok(Self)
    }
}

impl EncodePacket for PingRequestPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let fixed_header = FixedHeader::new(PacketType::PingRequest, 0)?;
        let start = buf.len();
        fixed_header.encode(buf)?;
        Ok(buf.len() - start)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PingResponsePacket;

impl DecodePacket for PingResponsePacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let _fixed_header = FixedHeader::decode(ba)?;
        Ok(Self)
    }
}

impl EncodePacket for PingResponsePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let fixed_header = FixedHeader::new(PacketType::PingResponse, 0)?;
        let start = buf.len();
        fixed_header.encode(buf)?;
        Ok(buf.len() - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_round_trip() {
        let mut buf = Vec::new();
        PingRequestPacket.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        PingRequestPacket::decode(&mut ba).unwrap();

        let mut buf = Vec::new();
        PingResponsePacket.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        PingResponsePacket::decode(&mut ba).unwrap();
    }
}
