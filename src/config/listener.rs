use serde::Deserialize;

use crate::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Tcps,
    Ws,
    Wss,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Listener {
    pub protocol: Protocol,

    #[serde(default = "Listener::default_address")]
    pub address: String,

    pub port: u16,

    pub cert_file: Option<String>,
    pub key_file: Option<String>,
}

impl Listener {
    fn default_address() -> String {
        "0.0.0.0".to_string()
    }

    /// # Errors
    /// Returns an error if a `Tcps`/`Wss` listener is missing TLS material,
    /// or a port-`0` listener is configured explicitly via `[[listener]]`
    /// (per spec section 6, `0` means "disabled" and such a listener should
    /// simply be absent from the list rather than present with port `0`).
    pub fn validate(&self) -> Result<(), Error> {
        if self.port == 0 {
            return Err(Error::new(
                ErrorKind::Config,
                "listener port 0 means disabled; omit the [[listener]] entry instead",
            ));
        }
        let needs_tls = matches!(self.protocol, Protocol::Tcps | Protocol::Wss);
        if needs_tls && (self.cert_file.is_none() || self.key_file.is_none()) {
            return Err(Error::new(
                ErrorKind::Config,
                "TLS listener requires cert_file and key_file",
            ));
        }
        Ok(())
    }
}
