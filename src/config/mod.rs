//! Layered TOML configuration, grounded on hebo's `config/` module: one
//! `serde::Deserialize` struct per concern, `#[serde(default = "...")]`
//! per-field defaults, and a `validate()` pass after parsing.

pub mod bus;
pub mod general;
pub mod listener;
pub mod log;
pub mod security;
pub mod storage;

use std::fs;
use std::path::Path;

use serde::Deserialize;

pub use bus::{Bus, BusKind};
pub use general::General;
pub use listener::{Listener, Protocol};
pub use log::{Log, LogLevel};
pub use security::Security;
pub use storage::{RetainedStoreType, SessionStoreType, Storage};

use crate::error::Error;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: General,
    #[serde(rename = "listener")]
    pub listeners: Vec<Listener>,
    pub security: Security,
    pub storage: Storage,
    pub bus: Bus,
    pub log: Log,
}

impl Config {
    /// # Errors
    /// Returns an error if `path` cannot be read or does not parse as valid
    /// TOML, or if `validate()` rejects the result.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns an error describing the first invalid field found.
    pub fn validate(&self) -> Result<(), Error> {
        self.general.validate()?;
        for listener in &self.listeners {
            listener.validate()?;
        }
        self.security.validate()?;
        self.storage.validate()?;
        self.bus.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_an_empty_document() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert!(config.listeners.is_empty());
    }

    #[test]
    fn parses_a_representative_document() {
        let toml = r#"
            [general]
            max_message_size_kb = 256
            allow_root_wildcard_subscription = false

            [[listener]]
            protocol = "tcp"
            address = "0.0.0.0"
            port = 1883

            [[listener]]
            protocol = "ws"
            address = "0.0.0.0"
            port = 8083

            [security]
            allow_anonymous = true

            [storage]
            session_store_type = "memory"
            retained_store_type = "memory"

            [bus]
            kind = "none"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.listeners.len(), 2);
        assert!(!config.general.allow_root_wildcard_subscription);
    }
}
