use serde::Deserialize;

use crate::error::Error;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Security {
    #[serde(default = "Security::default_allow_anonymous")]
    pub allow_anonymous: bool,

    pub password_file: Option<String>,
}

impl Security {
    const fn default_allow_anonymous() -> bool {
        false
    }

    /// # Errors
    /// Never fails today; kept for symmetry with the other config sections
    /// and as the natural place to add cross-field checks later.
    pub fn validate(&self) -> Result<(), Error> {
        Ok(())
    }
}

impl Default for Security {
    fn default() -> Self {
        Self {
            allow_anonymous: Self::default_allow_anonymous(),
            password_file: None,
        }
    }
}
