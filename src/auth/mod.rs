//! `AuthPolicy` capability contract (spec section 6) plus one file-backed
//! reference implementation, grounded on hebo's `auth` module.

pub mod file_auth;
pub mod pwd;

pub use file_auth::FileAuthPolicy;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthOp {
    Publish,
    Subscribe,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AuthResult {
    pub ok: bool,
    pub effective_user: Option<String>,
}

impl AuthResult {
    #[must_use]
    pub fn accepted(user: impl Into<String>) -> Self {
        Self {
            ok: true,
            effective_user: Some(user.into()),
        }
    }

    #[must_use]
    pub fn rejected() -> Self {
        Self {
            ok: false,
            effective_user: None,
        }
    }
}

/// Authentication and authorization are explicitly out of scope as a
/// *policy* surface (spec section 1); this is only the capability contract
/// plus the one reference implementation every deployment in the corpus
/// ships (`hebo`'s password-file auth).
pub trait AuthPolicy: Send + Sync {
    fn authenticate(
        &self,
        username: Option<&str>,
        password: Option<&[u8]>,
        remote_addr: &str,
    ) -> AuthResult;

    fn authorize(&self, user: &str, op: AuthOp, topic: &str) -> bool;
}

/// Accepts any CONNECT and authorizes everything. Used when `Security`
/// config has no password file configured.
pub struct AllowAllAuthPolicy;

impl AuthPolicy for AllowAllAuthPolicy {
    fn authenticate(
        &self,
        username: Option<&str>,
        _password: Option<&[u8]>,
        _remote_addr: &str,
    ) -> AuthResult {
        AuthResult {
            ok: true,
            effective_user: username.map(str::to_string),
        }
    }

    fn authorize(&self, _user: &str, _op: AuthOp, _topic: &str) -> bool {
        true
    }
}
