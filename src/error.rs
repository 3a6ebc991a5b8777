// Crate-wide error type, grounded on hebo's error.rs.

use std::fmt;
use std::io;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    Protocol,
    Auth,
    ResourceExhausted,
    Store,
    Bus,
    Timeout,
    Io,
    Codec,
    Config,
    Channel,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::new(ErrorKind::Io, err.to_string())
    }
}

impl From<codec::DecodeError> for Error {
    fn from(err: codec::DecodeError) -> Self {
        Self::new(ErrorKind::Codec, err.to_string())
    }
}

impl From<codec::EncodeError> for Error {
    fn from(err: codec::EncodeError) -> Self {
        Self::new(ErrorKind::Codec, err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::new(ErrorKind::Config, err.to_string())
    }
}

/// Mirrors hebo's `convert_send_error!` macro: every `mpsc::Sender<T>` in
/// this crate carries a different `T`, so `From<SendError<T>>` has to be
/// generated per channel type instead of written once generically.
#[macro_export]
macro_rules! convert_send_error {
    ($t:ty) => {
        impl From<tokio::sync::mpsc::error::SendError<$t>> for $crate::error::Error {
            fn from(err: tokio::sync::mpsc::error::SendError<$t>) -> Self {
                $crate::error::Error::new($crate::error::ErrorKind::Channel, err.to_string())
            }
        }
    };
}
