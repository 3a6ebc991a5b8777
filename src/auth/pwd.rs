//! Salted SHA-512 password hashing, grounded on hebo's `auth::pwd`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use openssl::hash::{Hasher, MessageDigest};
use rand::Rng;

use crate::error::{Error, ErrorKind};

pub const SALT_LEN: usize = 12;
pub const HASH_LEN: usize = 64;
pub const PW_SHA512: i32 = 6;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Salt([u8; SALT_LEN]);

impl Salt {
    fn from_slice(s: &[u8]) -> Result<Self, Error> {
        let mut v = [0; SALT_LEN];
        if s.len() != SALT_LEN {
            return Err(Error::new(ErrorKind::Auth, "invalid salt length"));
        }
        v.copy_from_slice(s);
        Ok(Self(v))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Hash([u8; HASH_LEN]);

impl Hash {
    fn from_slice(s: &[u8]) -> Result<Self, Error> {
        let mut v = [0; HASH_LEN];
        if s.len() != HASH_LEN {
            return Err(Error::new(ErrorKind::Auth, "invalid hash length"));
        }
        v.copy_from_slice(s);
        Ok(Self(v))
    }
}

/// One password-file entry: a salt and the SHA-512 hash of `password ||
/// salt`. `valid = false` marks an intentionally empty (locked) password.
#[derive(Clone, Debug, PartialEq)]
pub struct Password {
    salt: Salt,
    password_hash: Hash,
    valid: bool,
}

impl Password {
    /// # Errors
    /// Returns an error if hashing fails (an `openssl` internal error).
    pub fn generate(password: &[u8]) -> Result<Self, Error> {
        let salt = Salt(rand::rng().random());
        if password.is_empty() {
            return Ok(Self {
                salt,
                password_hash: Hash([0; HASH_LEN]),
                valid: false,
            });
        }
        let password_hash = Self::hash(password, &salt)?;
        Ok(Self {
            salt,
            password_hash,
            valid: true,
        })
    }

    fn hash(password: &[u8], salt: &Salt) -> Result<Hash, Error> {
        let mut hasher = Hasher::new(MessageDigest::sha512())
            .map_err(|err| Error::new(ErrorKind::Auth, err.to_string()))?;
        hasher
            .update(password)
            .and_then(|()| hasher.update(&salt.0))
            .map_err(|err| Error::new(ErrorKind::Auth, err.to_string()))?;
        let digest = hasher
            .finish()
            .map_err(|err| Error::new(ErrorKind::Auth, err.to_string()))?;
        Hash::from_slice(digest.as_ref())
    }

    /// # Errors
    /// Returns an error if hashing the candidate password fails.
    pub fn is_match(&self, password: &[u8]) -> Result<bool, Error> {
        if !self.valid {
            return Ok(false);
        }
        let candidate = Self::hash(password, &self.salt)?;
        Ok(candidate.0 == self.password_hash.0)
    }

    /// Parse one `username:$6$salt$hash` line.
    ///
    /// # Errors
    /// Returns an error if the line is non-empty, non-comment, and
    /// malformed.
    pub fn parse(line: &str) -> Result<Option<(String, Self)>, Error> {
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let Some((username, rest)) = line.split_once(':') else {
            return Err(Error::new(ErrorKind::Auth, format!("invalid entry: {line:?}")));
        };
        if username.is_empty() {
            return Err(Error::new(ErrorKind::Auth, "username is empty"));
        }
        let parts: Vec<&str> = rest.split('$').collect();
        if parts.len() != 4 {
            return Err(Error::new(ErrorKind::Auth, format!("invalid hash field: {rest:?}")));
        }
        let hash_type: i32 = parts[1]
            .parse()
            .map_err(|_err| Error::new(ErrorKind::Auth, "invalid hash type"))?;
        if hash_type != PW_SHA512 {
            return Err(Error::new(ErrorKind::Auth, "unsupported hash type"));
        }
        let salt = STANDARD
            .decode(parts[2])
            .map_err(|err| Error::new(ErrorKind::Auth, err.to_string()))?;
        let password_hash = STANDARD
            .decode(parts[3])
            .map_err(|err| Error::new(ErrorKind::Auth, err.to_string()))?;
        Ok(Some((
            username.to_string(),
            Self {
                salt: Salt::from_slice(&salt)?,
                password_hash: Hash::from_slice(&password_hash)?,
                valid: true,
            },
        )))
    }

    /// Render one `username:$6$salt$hash` password-file line.
    #[must_use]
    pub fn dump(&self, username: &str) -> String {
        if self.valid {
            format!(
                "{username}:${}${}${}",
                PW_SHA512,
                STANDARD.encode(self.salt.0),
                STANDARD.encode(self.password_hash.0)
            )
        } else {
            format!("{username}:")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_password_matches_itself_and_rejects_wrong_guess() {
        let password = Password::generate(b"hunter2").unwrap();
        assert!(password.is_match(b"hunter2").unwrap());
        assert!(!password.is_match(b"wrong").unwrap());
    }

    #[test]
    fn round_trips_through_dump_and_parse() {
        let password = Password::generate(b"hunter2").unwrap();
        let line = password.dump("alice");
        let (username, parsed) = Password::parse(&line).unwrap().unwrap();
        assert_eq!(username, "alice");
        assert!(parsed.is_match(b"hunter2").unwrap());
    }

    #[test]
    fn empty_password_is_never_a_match() {
        let password = Password::generate(b"").unwrap();
        assert!(!password.is_match(b"").unwrap());
        assert!(!password.is_match(b"anything").unwrap());
    }
}
