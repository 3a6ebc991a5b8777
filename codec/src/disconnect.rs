// DISCONNECT packet, grounded on hebo's codec::disconnect_packet module.
// Header-only: client announced a graceful close, the server MUST discard
// the Will Message without publishing it [MQTT-3.1.2-10].

use crate::base::{DecodePacket, EncodePacket};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DisconnectPacket;

impl DecodePacket for DisconnectPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let _fixed_header = FixedHeader::decode(ba)?;
        Ok(Self)
    }
}

impl EncodePacket for DisconnectPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let fixed_header = FixedHeader::new(PacketType::Disconnect, 0)?;
        let start = buf.len();
        fixed_header.encode(buf)?;
        Ok(buf.len() - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let mut buf = Vec::new();
        DisconnectPacket.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        DisconnectPacket::decode(&mut ba).unwrap();
    }
}
