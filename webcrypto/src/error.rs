use thiserror::Error;

/// Message used for every authenticated-decryption or unwrap failure.
///
/// Tag mismatches, padding errors and truncated ciphertexts all surface with
/// this exact text so callers cannot tell which check rejected the input.
pub(crate) const DECRYPTION_FAILED: &str = "decryption failed";

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid algorithm parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid key usage: {0}")]
    InvalidUsage(String),

    #[error("Invalid access: {0}")]
    InvalidAccess(String),

    #[error("Invalid key data: {0}")]
    DataError(String),

    #[error("Operation failed: {0}")]
    OperationError(String),

    #[error("Unsupported key format: {0}")]
    UnsupportedFormat(String),

    #[error("Requested {requested} random bytes, at most {max} are allowed")]
    QuotaExceeded { requested: usize, max: usize },

    #[error("Operation aborted")]
    Aborted,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Fieldless discriminant of [`CryptoError`], used by transport layers to pick
/// stable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedAlgorithm,
    InvalidParams,
    InvalidUsage,
    InvalidAccess,
    DataError,
    OperationError,
    UnsupportedFormat,
    QuotaExceeded,
    Aborted,
    Configuration,
}

impl CryptoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            Self::InvalidParams(_) => ErrorKind::InvalidParams,
            Self::InvalidUsage(_) => ErrorKind::InvalidUsage,
            Self::InvalidAccess(_) => ErrorKind::InvalidAccess,
            Self::DataError(_) => ErrorKind::DataError,
            Self::OperationError(_) => ErrorKind::OperationError,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::Aborted => ErrorKind::Aborted,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// The opaque failure returned by every decrypt and unwrap path.
    pub(crate) fn decryption_failed() -> Self {
        Self::OperationError(DECRYPTION_FAILED.to_string())
    }

    pub(crate) fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }

    pub(crate) fn data(msg: impl Into<String>) -> Self {
        Self::DataError(msg.into())
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decryption_failure_is_generic() {
        let error = CryptoError::decryption_failed();
        assert_eq!(error.kind(), ErrorKind::OperationError);
        assert_eq!(error.to_string(), "Operation failed: decryption failed");
    }

    #[test]
    fn test_quota_message() {
        let error = CryptoError::QuotaExceeded { requested: 70000, max: 65536 };
        assert_eq!(error.kind(), ErrorKind::QuotaExceeded);
        assert!(error.to_string().contains("70000"));
    }
}
