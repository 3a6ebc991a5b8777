// CONNECT packet, grounded on hebo's codec::connect_packet module.

use crate::base::{DecodePacket, EncodePacket, QoS};
use crate::byte_array::{self, ByteArray};
use crate::error::{DecodeError, EncodeError};
use crate::header::{FixedHeader, PacketType, ProtocolLevel};
use crate::topic::validate_topic_name;

const PROTOCOL_NAME: &str = "MQTT";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ConnectFlags {
    pub username: bool,
    pub password: bool,
    pub will_retain: bool,
    pub will_qos: QoS,
    pub will: bool,
    pub clean_session: bool,
}

impl ConnectFlags {
    fn decode(byte: u8) -> Result<Self, DecodeError> {
        // Bit 0 of the Connect Flags byte is reserved and MUST be 0 [MQTT-3.1.2-3].
        if byte & 0b0000_0001 != 0 {
            return Err(DecodeError::InvalidPacketFlags);
        }
        let clean_session = byte & 0b0000_0010 != 0;
        let will = byte & 0b0000_0100 != 0;
        let will_qos = QoS::try_from((byte & 0b0001_1000) >> 3)?;
        let will_retain = byte & 0b0010_0000 != 0;
        let password = byte & 0b0100_0000 != 0;
        let username = byte & 0b1000_0000 != 0;
        // If the Will Flag is set to 0, the Will QoS MUST be set to 0 [MQTT-3.1.2-11].
        if !will && will_qos != QoS::AtMostOnce {
            return Err(DecodeError::InvalidPacketFlags);
        }
        // If the Will Flag is set to 0, Will Retain MUST be set to 0 [MQTT-3.1.2-13].
        if !will && will_retain {
            return Err(DecodeError::InvalidPacketFlags);
        }
        Ok(Self {
            username,
            password,
            will_retain,
            will_qos,
            will,
            clean_session,
        })
    }

    fn encode(self) -> u8 {
        let mut byte = 0u8;
        if self.username {
            byte |= 0b1000_0000;
        }
        if self.password {
            byte |= 0b0100_0000;
        }
        if self.will_retain {
            byte |= 0b0010_0000;
        }
        byte |= u8::from(self.will_qos) << 3;
        if self.will {
            byte |= 0b0000_0100;
        }
        if self.clean_session {
            byte |= 0b0000_0010;
        }
        byte
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectPacket {
    protocol_level: ProtocolLevel,
    connect_flags: ConnectFlags,
    keep_alive: u16,
    client_id: String,
    will_topic: Option<String>,
    will_message: Vec<u8>,
    username: Option<String>,
    password: Option<Vec<u8>>,
}

impl ConnectPacket {
    /// # Errors
    /// Returns an error if `client_id` is empty and the caller did not intend
    /// to rely on server-assigned ids (callers check this themselves; the
    /// constructor only rejects structurally invalid wills).
    pub fn new(client_id: &str, clean_session: bool, keep_alive: u16) -> Self {
        Self {
            protocol_level: ProtocolLevel::V311,
            connect_flags: ConnectFlags {
                clean_session,
                ..ConnectFlags::default()
            },
            keep_alive,
            client_id: client_id.to_string(),
            will_topic: None,
            will_message: Vec::new(),
            username: None,
            password: None,
        }
    }

    #[must_use]
    pub fn protocol_level(&self) -> ProtocolLevel {
        self.protocol_level
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Replace the client id, used to assign a server-generated id per
    /// [MQTT-3.1.3-6].
    pub fn set_client_id(&mut self, client_id: &str) {
        self.client_id = client_id.to_string();
    }

    #[must_use]
    pub fn clean_session(&self) -> bool {
        self.connect_flags.clean_session
    }

    #[must_use]
    pub fn keep_alive(&self) -> u16 {
        self.keep_alive
    }

    #[must_use]
    pub fn will(&self) -> Option<(&str, &[u8], QoS, bool)> {
        self.will_topic.as_deref().map(|topic| {
            (
                topic,
                self.will_message.as_slice(),
                self.connect_flags.will_qos,
                self.connect_flags.will_retain,
            )
        })
    }

    pub fn set_will(&mut self, topic: &str, message: &[u8], qos: QoS, retain: bool) {
        self.connect_flags.will = true;
        self.connect_flags.will_qos = qos;
        self.connect_flags.will_retain = retain;
        self.will_topic = Some(topic.to_string());
        self.will_message = message.to_vec();
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    #[must_use]
    pub fn password(&self) -> Option<&[u8]> {
        self.password.as_deref()
    }

    pub fn set_credentials(&mut self, username: Option<String>, password: Option<Vec<u8>>) {
        self.connect_flags.username = username.is_some();
        self.connect_flags.password = password.is_some();
        self.username = username;
        self.password = password;
    }
}

impl DecodePacket for ConnectPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let _fixed_header = FixedHeader::decode(ba)?;

        let protocol_name = ba.read_string()?;
        if protocol_name != PROTOCOL_NAME {
            return Err(DecodeError::InvalidProtocolName);
        }

        let protocol_level = ProtocolLevel::try_from(ba.read_byte()?)?;
        let connect_flags = ConnectFlags::decode(ba.read_byte()?)?;
        let keep_alive = ba.read_u16()?;

        let client_id = ba.read_string()?;
        // ClientId length and charset restrictions are relaxed per modern
        // broker practice (hebo behaves the same way): only emptiness
        // combined with `clean_session = false` is rejected, by the caller.

        let (will_topic, will_message) = if connect_flags.will {
            let topic = ba.read_string()?;
            validate_topic_name(&topic)?;
            let len = ba.read_u16()? as usize;
            let payload = ba.read_bytes(len)?.to_vec();
            (Some(topic), payload)
        } else {
            (None, Vec::new())
        };

        let username = if connect_flags.username {
            Some(ba.read_string()?)
        } else {
            None
        };
        let password = if connect_flags.password {
            let len = ba.read_u16()? as usize;
            Some(ba.read_bytes(len)?.to_vec())
        } else {
            None
        };

        Ok(Self {
            protocol_level,
            connect_flags,
            keep_alive,
            client_id,
            will_topic,
            will_message,
            username,
            password,
        })
    }
}

impl EncodePacket for ConnectPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut payload = Vec::new();
        byte_array::write_string(&mut payload, PROTOCOL_NAME)?;
        payload.push(self.protocol_level as u8);
        payload.push(self.connect_flags.encode());
        byte_array::write_u16(&mut payload, self.keep_alive);
        byte_array::write_string(&mut payload, &self.client_id)?;
        if let Some(topic) = &self.will_topic {
            byte_array::write_string(&mut payload, topic)?;
            byte_array::write_bytes(&mut payload, &self.will_message)?;
        }
        if let Some(username) = &self.username {
            byte_array::write_string(&mut payload, username)?;
        }
        if let Some(password) = &self.password {
            byte_array::write_bytes(&mut payload, password)?;
        }

        let fixed_header = FixedHeader::new(PacketType::Connect, payload.len())?;
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
    fn round_trips_a_connect_with_will_and_credentials() {
        let mut packet = ConnectPacket::new("client-1", false, 30);
        packet.set_will("status/a", b"down", QoS::AtLeastOnce, true);
        packet.set_credentials(Some("alice".to_string()), Some(b"secret".to_vec()));

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();

        let mut ba = ByteArray::new(&buf);
        let decoded = ConnectPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded.client_id(), "client-1");
        assert!(!decoded.clean_session());
        assert_eq!(decoded.keep_alive(), 30);
        assert_eq!(
            decoded.will(),
            Some(("status/a", b"down".as_slice(), QoS::AtLeastOnce, true))
        );
        assert_eq!(decoded.username(), Some("alice"));
        assert_eq!(decoded.password(), Some(b"secret".as_slice()));
    }
}
