// Fixed header parsing, grounded on hebo's codec::header module.

use std::convert::TryFrom;

use crate::base::{DecodePacket, EncodePacket, QoS};
use crate::byte_array::ByteArray;
use crate::error::{DecodeError, EncodeError};
use crate::var_int::VarInt;

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ProtocolLevel {
    V31 = 3,
    #[default]
    V311 = 4,
    V5 = 5,
}

impl TryFrom<u8> for ProtocolLevel {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            3 => Ok(Self::V31),
            4 => Ok(Self::V311),
            5 => Ok(Self::V5),
            _ => Err(DecodeError::InvalidProtocolLevel),
        }
    }
}

/// Control packet type, with the `Publish` variant carrying its flag bits
/// the way the fixed header packs them (dup/qos/retain in the low nibble).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PacketType {
    #[default]
    Connect,
    ConnectAck,
    Publish {
        dup: bool,
        qos: QoS,
        retain: bool,
    },
    PublishAck,
    PublishReceived,
    PublishRelease,
    PublishComplete,
    Subscribe,
    SubscribeAck,
    Unsubscribe,
    UnsubscribeAck,
    PingRequest,
    PingResponse,
    Disconnect,
}

impl From<PacketType> for u8 {
    fn from(packet_type: PacketType) -> Self {
        let type_bits: u8 = match packet_type {
            PacketType::Connect => 1,
            PacketType::ConnectAck => 2,
            PacketType::Publish { .. } => 3,
            PacketType::PublishAck => 4,
            PacketType::PublishReceived => 5,
            PacketType::PublishRelease => 6,
            PacketType::PublishComplete => 7,
            PacketType::Subscribe => 8,
            PacketType::SubscribeAck => 9,
            PacketType::Unsubscribe => 10,
            PacketType::UnsubscribeAck => 11,
            PacketType::PingRequest => 12,
            PacketType::PingResponse => 13,
            PacketType::Disconnect => 14,
        };
        let flag_bits: u8 = match packet_type {
            PacketType::Publish { dup, qos, retain } => {
                let dup = if dup { 0b1000 } else { 0 };
                let qos = match qos {
                    QoS::AtMostOnce => 0b0000,
                    QoS::AtLeastOnce => 0b0010,
                    QoS::ExactlyOnce => 0b0100,
                };
                let retain = u8::from(retain);
                dup | qos | retain
            }
            // Bits 3,2,1 and 0 of the fixed header are reserved and MUST be
            // 0,0,1,0 for PUBREL/SUBSCRIBE/UNSUBSCRIBE [MQTT-3.6.1-1].
            PacketType::PublishRelease | PacketType::Subscribe | PacketType::Unsubscribe => 0b0010,
            _ => 0,
        };
        (type_bits << 4) | flag_bits
    }
}

impl TryFrom<u8> for PacketType {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        let type_bits = (v & 0b1111_0000) >> 4;
        let flag = v & 0b0000_1111;
        match type_bits {
            1 if flag == 0 => Ok(Self::Connect),
            2 if flag == 0 => Ok(Self::ConnectAck),
            3 => {
                let dup = flag & 0b1000 == 0b1000;
                let retain = flag & 0b0001 == 0b0001;
                let qos = match flag & 0b0110 {
                    0b0000 => QoS::AtMostOnce,
                    0b0010 => QoS::AtLeastOnce,
                    0b0100 => QoS::ExactlyOnce,
                    _ => return Err(DecodeError::InvalidPacketFlags),
                };
                Ok(Self::Publish { dup, qos, retain })
            }
            4 if flag == 0 => Ok(Self::PublishAck),
            5 if flag == 0 => Ok(Self::PublishReceived),
            6 if flag == 0b0010 => Ok(Self::PublishRelease),
            7 if flag == 0 => Ok(Self::PublishComplete),
            8 if flag == 0b0010 => Ok(Self::Subscribe),
            9 if flag == 0 => Ok(Self::SubscribeAck),
            10 if flag == 0b0010 => Ok(Self::Unsubscribe),
            11 if flag == 0 => Ok(Self::UnsubscribeAck),
            12 if flag == 0 => Ok(Self::PingRequest),
            13 if flag == 0 => Ok(Self::PingResponse),
            14 if flag == 0 => Ok(Self::Disconnect),
            1..=14 => Err(DecodeError::InvalidPacketFlags),
            _ => Err(DecodeError::InvalidPacketType),
        }
    }
}

/// ```text
///  7 6 5 4 3 2 1 0
/// +-------+-------+
/// | Type  | Flags |
/// +-------+-------+
/// | Remaining Len |
/// +-------+-------+
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FixedHeader {
    packet_type: PacketType,
    remaining_length: VarInt,
}

impl FixedHeader {
    /// # Errors
    /// Returns an error if `remaining_length` exceeds the wire encoding's range.
    pub fn new(packet_type: PacketType, remaining_length: usize) -> Result<Self, EncodeError> {
        Ok(Self {
            packet_type,
            remaining_length: VarInt::from(remaining_length)?,
        })
    }

    #[must_use]
    pub const fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    #[must_use]
    pub const fn remaining_length(&self) -> usize {
        self.remaining_length.value()
    }

    #[must_use]
    pub const fn bytes(&self) -> usize {
        1 + self.remaining_length.bytes()
    }
}

impl DecodePacket for FixedHeader {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let flag = ba.read_byte()?;
        let packet_type = PacketType::try_from(flag)?;
        let remaining_length = VarInt::decode(ba)?;
        Ok(Self {
            packet_type,
            remaining_length,
        })
    }
}

impl EncodePacket for FixedHeader {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let type_byte: u8 = self.packet_type.into();
        buf.push(type_byte);
        self.remaining_length.encode(buf)?;
        Ok(self.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_and_decodes_publish_flags() {
        let header = FixedHeader::new(
            PacketType::Publish {
                dup: true,
                qos: QoS::AtLeastOnce,
                retain: true,
            },
            19,
        )
        .unwrap();
        let mut buf = Vec::new();
        header.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = FixedHeader::decode(&mut ba).unwrap();
        assert_eq!(decoded.packet_type(), header.packet_type());
        assert_eq!(decoded.remaining_length(), 19);
    }

    #[test]
    fn rejects_bad_pubrel_flags() {
        assert!(PacketType::try_from(0b0110_0000).is_err());
    }
}
