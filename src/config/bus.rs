use serde::Deserialize;

use crate::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    None,
    External,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Bus {
    pub kind: BusKind,

    /// Connection details for the external transport (opaque to this
    /// crate: only the `MessageBus`/`BusTransport` contract is defined
    /// here, per spec section 1's Kafka-as-transport scoping).
    pub endpoint: Option<String>,
}

impl Bus {
    /// # Errors
    /// Returns an error if `kind = "external"` but no endpoint is given.
    pub fn validate(&self) -> Result<(), Error> {
        if self.kind == BusKind::External && self.endpoint.is_none() {
            return Err(Error::new(
                ErrorKind::Config,
                "bus.endpoint is required when bus.kind = \"external\"",
            ));
        }
        Ok(())
    }
}
