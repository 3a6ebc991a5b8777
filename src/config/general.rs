use serde::Deserialize;

use crate::error::{Error, ErrorKind};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct General {
    #[serde(default = "General::default_node_id")]
    pub node_id: String,

    #[serde(default = "General::default_max_message_size_kb")]
    pub max_message_size_kb: u32,

    #[serde(default = "General::default_queued_messages_enabled")]
    pub queued_messages_enabled: bool,

    #[serde(default = "General::default_allow_root_wildcard_subscription")]
    pub allow_root_wildcard_subscription: bool,

    #[serde(default = "General::default_max_publish_rate")]
    pub max_publish_rate: u32,

    #[serde(default = "General::default_max_subscribe_rate")]
    pub max_subscribe_rate: u32,

    #[serde(default = "General::default_message_queue_size")]
    pub message_queue_size: usize,

    #[serde(default = "General::default_subscription_queue_size")]
    pub subscription_queue_size: usize,

    #[serde(default = "General::default_keep_alive_grace")]
    pub keep_alive_grace: f32,

    #[serde(default = "General::default_qos2_retry_interval_secs")]
    pub qos2_retry_interval_secs: u64,

    #[serde(default = "General::default_qos2_retry_count")]
    pub qos2_retry_count: u32,
}

impl General {
    const fn default_max_message_size_kb() -> u32 {
        256
    }

    const fn default_queued_messages_enabled() -> bool {
        true
    }

    const fn default_allow_root_wildcard_subscription() -> bool {
        true
    }

    const fn default_max_publish_rate() -> u32 {
        0
    }

    const fn default_max_subscribe_rate() -> u32 {
        0
    }

    const fn default_message_queue_size() -> usize {
        1000
    }

    const fn default_subscription_queue_size() -> usize {
        1000
    }

    const fn default_keep_alive_grace() -> f32 {
        1.5
    }

    const fn default_qos2_retry_interval_secs() -> u64 {
        10
    }

    const fn default_qos2_retry_count() -> u32 {
        5
    }

    fn default_node_id() -> String {
        codec::random_client_id()
    }

    /// # Errors
    /// Returns an error if `keep_alive_grace` is not a sane multiplier.
    pub fn validate(&self) -> Result<(), Error> {
        if self.keep_alive_grace < 1.0 {
            return Err(Error::new(
                ErrorKind::Config,
                "general.keep_alive_grace must be >= 1.0",
            ));
        }
        if self.max_message_size_kb == 0 {
            return Err(Error::new(
                ErrorKind::Config,
                "general.max_message_size_kb must be > 0",
            ));
        }
        if self.qos2_retry_interval_secs == 0 {
            return Err(Error::new(
                ErrorKind::Config,
                "general.qos2_retry_interval_secs must be > 0",
            ));
        }
        Ok(())
    }
}

impl Default for General {
    fn default() -> Self {
        Self {
            node_id: Self::default_node_id(),
            max_message_size_kb: Self::default_max_message_size_kb(),
            queued_messages_enabled: Self::default_queued_messages_enabled(),
            allow_root_wildcard_subscription: Self::default_allow_root_wildcard_subscription(),
            max_publish_rate: Self::default_max_publish_rate(),
            max_subscribe_rate: Self::default_max_subscribe_rate(),
            message_queue_size: Self::default_message_queue_size(),
            subscription_queue_size: Self::default_subscription_queue_size(),
            keep_alive_grace: Self::default_keep_alive_grace(),
            qos2_retry_interval_secs: Self::default_qos2_retry_interval_secs(),
            qos2_retry_count: Self::default_qos2_retry_count(),
        }
    }
}
