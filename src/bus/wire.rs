//! Inter-node wire format for the external bus transport (spec section 6):
//! `{ version: u8, kind: u8, senderId: varstring, payload: ... }`.
//!
//! Deliberately independent of the `codec` crate: that crate encodes MQTT
//! control packets, this encodes cluster-internal envelopes, a distinct wire
//! format that happens to reuse the same length-prefixed-string idiom.

use codec::QoS;

use crate::bus::control::{SubControlEvent, SubControlOp};
use crate::error::{Error, ErrorKind};
use crate::types::Message;

const FRAME_VERSION: u8 = 1;
const KIND_DATA: u8 = 0;
const KIND_CONTROL: u8 = 1;

#[derive(Clone, Debug, PartialEq)]
pub enum BusPayload {
    Data(Message),
    Control(SubControlEvent),
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    #[allow(clippy::cast_possible_truncation)]
    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn read_string(buf: &[u8], pos: &mut usize) -> Result<String, Error> {
    let len = read_u32(buf, pos)? as usize;
    let end = *pos + len;
    let bytes = buf
        .get(*pos..end)
        .ok_or_else(|| Error::new(ErrorKind::Bus, "truncated frame"))?;
    *pos = end;
    String::from_utf8(bytes.to_vec()).map_err(|_err| Error::new(ErrorKind::Bus, "invalid utf8"))
}

fn write_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    #[allow(clippy::cast_possible_truncation)]
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(data);
}

fn read_bytes(buf: &[u8], pos: &mut usize) -> Result<Vec<u8>, Error> {
    let len = read_u32(buf, pos)? as usize;
    let end = *pos + len;
    let slice = buf
        .get(*pos..end)
        .ok_or_else(|| Error::new(ErrorKind::Bus, "truncated frame"))?;
    *pos = end;
    Ok(slice.to_vec())
}

fn read_u8(buf: &[u8], pos: &mut usize) -> Result<u8, Error> {
    let b = *buf
        .get(*pos)
        .ok_or_else(|| Error::new(ErrorKind::Bus, "truncated frame"))?;
    *pos += 1;
    Ok(b)
}

fn read_u32(buf: &[u8], pos: &mut usize) -> Result<u32, Error> {
    let end = *pos + 4;
    let bytes = buf
        .get(*pos..end)
        .ok_or_else(|| Error::new(ErrorKind::Bus, "truncated frame"))?;
    *pos = end;
    Ok(u32::from_be_bytes(bytes.try_into().expect("checked len")))
}

fn read_u64(buf: &[u8], pos: &mut usize) -> Result<u64, Error> {
    let end = *pos + 8;
    let bytes = buf
        .get(*pos..end)
        .ok_or_else(|| Error::new(ErrorKind::Bus, "truncated frame"))?;
    *pos = end;
    Ok(u64::from_be_bytes(bytes.try_into().expect("checked len")))
}

/// # Errors
/// Returns an error if `sender_id` or the payload cannot be represented.
pub fn encode(sender_id: &str, payload: &BusPayload) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    buf.push(FRAME_VERSION);
    match payload {
        BusPayload::Data(message) => {
            buf.push(KIND_DATA);
            write_string(&mut buf, sender_id);
            write_string(&mut buf, &message.topic);
            write_bytes(&mut buf, &message.payload);
            buf.push(u8::from(message.qos));
            buf.push(u8::from(message.retain));
            buf.push(u8::from(message.dup));
            match message.packet_id {
                Some(id) => {
                    buf.push(1);
                    buf.extend_from_slice(&id.to_be_bytes());
                }
                None => buf.push(0),
            }
        }
        BusPayload::Control(event) => {
            buf.push(KIND_CONTROL);
            write_string(&mut buf, sender_id);
            buf.push(event.op.as_u8());
            write_string(&mut buf, &event.client_id);
            match &event.filter {
                Some(filter) => {
                    buf.push(1);
                    write_string(&mut buf, filter);
                }
                None => buf.push(0),
            }
            match event.qos {
                Some(qos) => {
                    buf.push(1);
                    buf.push(u8::from(qos));
                }
                None => buf.push(0),
            }
            buf.extend_from_slice(&event.seq.to_be_bytes());
        }
    }
    Ok(buf)
}

/// # Errors
/// Returns an error if `buf` is not a well-formed frame of a known version.
pub fn decode(buf: &[u8]) -> Result<(String, BusPayload), Error> {
    let mut pos = 0usize;
    let version = read_u8(buf, &mut pos)?;
    if version != FRAME_VERSION {
        return Err(Error::new(ErrorKind::Bus, "unsupported frame version"));
    }
    let kind = read_u8(buf, &mut pos)?;
    let sender_id = read_string(buf, &mut pos)?;

    let payload = match kind {
        KIND_DATA => {
            let topic = read_string(buf, &mut pos)?;
            let payload = read_bytes(buf, &mut pos)?;
            let qos_byte = read_u8(buf, &mut pos)?;
            let qos = QoS::try_from(qos_byte).map_err(Error::from)?;
            let retain = read_u8(buf, &mut pos)? != 0;
            let dup = read_u8(buf, &mut pos)? != 0;
            let has_packet_id = read_u8(buf, &mut pos)? != 0;
            let packet_id = if has_packet_id {
                let end = pos + 2;
                let bytes = buf
                    .get(pos..end)
                    .ok_or_else(|| Error::new(ErrorKind::Bus, "truncated frame"))?;
                pos = end;
                Some(u16::from_be_bytes(bytes.try_into().expect("checked len")))
            } else {
                None
            };
            let mut message = Message::new(topic, payload, qos, retain).with_dup(dup);
            message.packet_id = packet_id;
            message.sender_id = Some(sender_id.clone());
            BusPayload::Data(message)
        }
        KIND_CONTROL => {
            let op_byte = read_u8(buf, &mut pos)?;
            let op = SubControlOp::from_u8(op_byte)
                .ok_or_else(|| Error::new(ErrorKind::Bus, "invalid control op"))?;
            let client_id = read_string(buf, &mut pos)?;
            let has_filter = read_u8(buf, &mut pos)? != 0;
            let filter = if has_filter {
                Some(read_string(buf, &mut pos)?)
            } else {
                None
            };
            let has_qos = read_u8(buf, &mut pos)? != 0;
            let qos = if has_qos {
                Some(QoS::try_from(read_u8(buf, &mut pos)?).map_err(Error::from)?)
            } else {
                None
            };
            let seq = read_u64(buf, &mut pos)?;
            BusPayload::Control(SubControlEvent {
                node_id: sender_id.clone(),
                op,
                client_id,
                filter,
                qos,
                seq,
            })
        }
        _ => return Err(Error::new(ErrorKind::Bus, "unknown frame kind")),
    };

    Ok((sender_id, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_data_frame() {
        let message = Message::new("t", b"hi".to_vec(), QoS::AtLeastOnce, false)
            .with_dup(true)
            .with_sender("node-a");
        let mut message = message;
        message.packet_id = Some(42);

        let buf = encode("node-a", &BusPayload::Data(message.clone())).unwrap();
        let (sender_id, decoded) = decode(&buf).unwrap();
        assert_eq!(sender_id, "node-a");
        match decoded {
            BusPayload::Data(m) => {
                assert_eq!(m.topic, "t");
                assert_eq!(m.packet_id, Some(42));
                assert!(m.dup);
            }
            BusPayload::Control(_) => panic!("expected data frame"),
        }
    }

    #[test]
    fn round_trips_a_control_frame() {
        let event = SubControlEvent {
            node_id: "node-a".to_string(),
            op: SubControlOp::Subscribe,
            client_id: "c1".to_string(),
            filter: Some("a/+".to_string()),
            qos: Some(QoS::ExactlyOnce),
            seq: 7,
        };
        let buf = encode("node-a", &BusPayload::Control(event.clone())).unwrap();
        let (_sender_id, decoded) = decode(&buf).unwrap();
        match decoded {
            BusPayload::Control(e) => assert_eq!(e, event),
            BusPayload::Data(_) => panic!("expected control frame"),
        }
    }
}
