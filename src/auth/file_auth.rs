//! File-backed `AuthPolicy`, grounded on hebo's `auth::file_auth`.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::auth::pwd::Password;
use crate::auth::{AuthOp, AuthPolicy, AuthResult};
use crate::error::Error;

/// Authenticates against a `username:$6$salt$hash` file. Does not evaluate
/// an ACL: `authorize` always succeeds, per spec section 1's scoping of
/// "authorization evaluation policy" out of this crate.
pub struct FileAuthPolicy {
    path: PathBuf,
    allow_anonymous: bool,
    users: RwLock<BTreeMap<String, Password>>,
}

impl FileAuthPolicy {
    /// # Errors
    /// Returns an error if the password file cannot be read.
    pub fn load<P: AsRef<Path>>(path: P, allow_anonymous: bool) -> Result<Self, Error> {
        let users = read_users(path.as_ref())?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            allow_anonymous,
            users: RwLock::new(users),
        })
    }

    /// Re-read the password file from disk, replacing the in-memory table.
    ///
    /// # Errors
    /// Returns an error if the password file cannot be read.
    pub fn reload(&self) -> Result<(), Error> {
        let users = read_users(&self.path)?;
        *self.users.write().expect("auth table lock poisoned") = users;
        Ok(())
    }
}

impl AuthPolicy for FileAuthPolicy {
    fn authenticate(
        &self,
        username: Option<&str>,
        password: Option<&[u8]>,
        _remote_addr: &str,
    ) -> AuthResult {
        let Some(username) = username else {
            return if self.allow_anonymous {
                AuthResult::accepted("anonymous")
            } else {
                AuthResult::rejected()
            };
        };
        let users = self.users.read().expect("auth table lock poisoned");
        let Some(entry) = users.get(username) else {
            return AuthResult::rejected();
        };
        match entry.is_match(password.unwrap_or(&[])) {
            Ok(true) => AuthResult::accepted(username),
            _ => AuthResult::rejected(),
        }
    }

    fn authorize(&self, _user: &str, _op: AuthOp, _topic: &str) -> bool {
        true
    }
}

fn read_users(path: &Path) -> Result<BTreeMap<String, Password>, Error> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut users = BTreeMap::new();
    for line in reader.lines() {
        let line = line?;
        if let Some((username, password)) = Password::parse(&line)? {
            users.insert(username, password);
        }
    }
    Ok(users)
}

/// Add or update `username` with `password` in the password file, creating
/// it if missing. Used by the `monstermq-passwd` companion binary.
///
/// # Errors
/// Returns an error if the file cannot be read or rewritten.
pub fn set_password<P: AsRef<Path>>(path: P, username: &str, password: &[u8]) -> Result<(), Error> {
    let mut users = if path.as_ref().exists() {
        read_users(path.as_ref())?
    } else {
        BTreeMap::new()
    };
    users.insert(username.to_string(), Password::generate(password)?);
    write_users(path.as_ref(), &users)
}

/// Remove `username` from the password file. A no-op if the user is absent.
///
/// # Errors
/// Returns an error if the file cannot be read or rewritten.
pub fn delete_user<P: AsRef<Path>>(path: P, username: &str) -> Result<(), Error> {
    let mut users = read_users(path.as_ref())?;
    users.remove(username);
    write_users(path.as_ref(), &users)
}

fn write_users(path: &Path, users: &BTreeMap<String, Password>) -> Result<(), Error> {
    let mut out = String::new();
    for (username, password) in users {
        out.push_str(&password.dump(username));
        out.push('\n');
    }
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.write_all(out.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn authenticates_a_known_user_and_rejects_a_bad_password() {
        let dir = std::env::temp_dir().join(format!(
            "monstermq-auth-test-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("passwd");
        set_password(&path, "alice", b"hunter2").unwrap();

        let policy = FileAuthPolicy::load(&path, false).unwrap();
        assert!(
            policy
                .authenticate(Some("alice"), Some(b"hunter2"), "127.0.0.1")
                .ok
        );
        assert!(
            !policy
                .authenticate(Some("alice"), Some(b"wrong"), "127.0.0.1")
                .ok
        );
        assert!(!policy.authenticate(Some("bob"), Some(b"x"), "127.0.0.1").ok);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn anonymous_connect_respects_allow_anonymous_flag() {
        let dir = std::env::temp_dir().join(format!(
            "monstermq-auth-test-anon-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("passwd");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "# empty").unwrap();

        let open_policy = FileAuthPolicy::load(&path, true).unwrap();
        assert!(open_policy.authenticate(None, None, "127.0.0.1").ok);

        let closed_policy = FileAuthPolicy::load(&path, false).unwrap();
        assert!(!closed_policy.authenticate(None, None, "127.0.0.1").ok);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
