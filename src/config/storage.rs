use serde::Deserialize;

use crate::error::Error;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreType {
    #[default]
    Memory,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RetainedStoreType {
    #[default]
    Memory,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub session_store_type: SessionStoreType,
    pub retained_store_type: RetainedStoreType,
}

impl Storage {
    /// # Errors
    /// Never fails today: only the `Memory` backend is implemented (concrete
    /// SQL/KV backends are out of scope per spec section 1), so there is
    /// nothing yet to cross-check.
    pub fn validate(&self) -> Result<(), Error> {
        Ok(())
    }
}
