//! Wire-format encode/decode for the MQTT 3.1.1 control packets this broker
//! understands. Deliberately has no knowledge of sessions, subscriptions or
//! storage: it only turns bytes into packets and back.

mod base;
mod byte_array;
mod connect;
mod connect_ack;
mod disconnect;
mod error;
mod header;
mod packet;
mod ping;
mod publish;
mod publish_ack;
mod publish_complete;
mod publish_received;
mod publish_release;
mod subscribe;
mod subscribe_ack;
mod topic;
mod unsubscribe;
mod unsubscribe_ack;
mod utils;
mod var_int;

pub use base::{DecodePacket, EncodePacket, PacketId, QoS};
pub use byte_array::ByteArray;
pub use connect::{ConnectFlags, ConnectPacket};
pub use connect_ack::{ConnectAckPacket, ConnectReturnCode};
pub use disconnect::DisconnectPacket;
pub use error::{DecodeError, EncodeError};
pub use header::{FixedHeader, PacketType, ProtocolLevel};
pub use packet::Packet;
pub use ping::{PingRequestPacket, PingResponsePacket};
pub use publish::PublishPacket;
pub use publish_ack::PublishAckPacket;
pub use publish_complete::PublishCompletePacket;
pub use publish_received::PublishReceivedPacket;
pub use publish_release::PublishReleasePacket;
pub use subscribe::{SubscribePacket, SubscribeTopic};
pub use subscribe_ack::{SubscribeAck, SubscribeAckPacket};
pub use topic::{is_root_wildcard, validate_topic_filter, validate_topic_name};
pub use unsubscribe::UnsubscribePacket;
pub use unsubscribe_ack::UnsubscribeAckPacket;
pub use utils::random_client_id;

pub const MAX_REMAINING_LENGTH: usize = var_int::MAX_VALUE;
