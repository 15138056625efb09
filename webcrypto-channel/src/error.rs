//! Channel error types
//!
//! Engine failures keep their kind; the adapter adds its own failures for
//! malformed calls and stale key handles. Every error maps to one of the
//! stable wire codes in [`codes`].

use thiserror::Error;
use uuid::Uuid;
use webcrypto::{CryptoError, ErrorKind};

/// Wire error codes. These strings are part of the host contract.
pub mod codes {
    pub const NOT_SUPPORTED: &str = "NotSupportedError";
    pub const SYNTAX: &str = "SyntaxError";
    pub const INVALID_ACCESS: &str = "InvalidAccessError";
    pub const DATA: &str = "DataError";
    pub const OPERATION: &str = "OperationError";
    pub const QUOTA_EXCEEDED: &str = "QuotaExceededError";
    pub const ABORT: &str = "AbortError";
    pub const UNKNOWN_METHOD: &str = "UnknownMethod";
    pub const BAD_ARGUMENTS: &str = "BadArguments";
    pub const UNKNOWN_KEY: &str = "UnknownKey";
    pub const INTERNAL: &str = "InternalError";
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Bad arguments: {0}")]
    BadArguments(String),

    #[error("Unknown key handle: {0}")]
    UnknownKey(Uuid),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadArguments(err.to_string())
    }
}

impl ChannelError {
    /// Stable code sent to the host.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Crypto(err) => match err.kind() {
                ErrorKind::UnsupportedAlgorithm | ErrorKind::UnsupportedFormat => codes::NOT_SUPPORTED,
                ErrorKind::InvalidParams | ErrorKind::InvalidUsage => codes::SYNTAX,
                ErrorKind::InvalidAccess => codes::INVALID_ACCESS,
                ErrorKind::DataError => codes::DATA,
                ErrorKind::OperationError => codes::OPERATION,
                ErrorKind::QuotaExceeded => codes::QUOTA_EXCEEDED,
                ErrorKind::Aborted => codes::ABORT,
                ErrorKind::Configuration => codes::INTERNAL,
            },
            Self::UnknownMethod(_) => codes::UNKNOWN_METHOD,
            Self::BadArguments(_) => codes::BAD_ARGUMENTS,
            Self::UnknownKey(_) => codes::UNKNOWN_KEY,
            Self::Internal(_) => codes::INTERNAL,
        }
    }
}

pub type ChannelResult<T> = Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_codes() {
        let err = ChannelError::from(CryptoError::InvalidUsage("sign".to_string()));
        assert_eq!(err.code(), codes::SYNTAX);
        let err = ChannelError::from(CryptoError::Aborted);
        assert_eq!(err.code(), codes::ABORT);
        assert_eq!(err.to_string(), "Operation aborted");
    }

    #[test]
    fn test_json_errors_are_bad_arguments() {
        let err: ChannelError = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert_eq!(err.code(), codes::BAD_ARGUMENTS);
    }
}
