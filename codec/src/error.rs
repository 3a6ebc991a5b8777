// Packet encode/decode error types.

use std::fmt;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DecodeError {
    /// Buffer ran out before a full packet could be parsed.
    InvalidRemainingLength,
    InvalidPacketType,
    InvalidPacketFlags,
    InvalidProtocolName,
    InvalidProtocolLevel,
    InvalidClientId,
    InvalidQoS,
    InvalidString,
    InvalidTopic,
    EmptyTopicFilter,
    PacketTooLarge,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for DecodeError {}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EncodeError {
    InvalidRemainingLength,
    StringTooLong,
    PayloadTooLarge,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for EncodeError {}
