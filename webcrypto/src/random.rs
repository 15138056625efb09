//! Random source.

use crate::error::{CryptoError, CryptoResult};
use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;

/// Largest request `get_random_values` will fill.
pub const MAX_RANDOM_BYTES: usize = 65536;

/// Fill a fresh buffer of `len` bytes from the OS CSPRNG.
pub fn get_random_values(len: usize) -> CryptoResult<Vec<u8>> {
    if len > MAX_RANDOM_BYTES {
        return Err(CryptoError::QuotaExceeded {
            requested: len,
            max: MAX_RANDOM_BYTES,
        });
    }
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    Ok(buf)
}

/// Random (version 4) UUID in its hyphenated lowercase form.
pub fn random_uuid() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_values_length_and_quota() {
        assert_eq!(get_random_values(0).unwrap().len(), 0);
        assert_eq!(get_random_values(MAX_RANDOM_BYTES).unwrap().len(), MAX_RANDOM_BYTES);
        assert!(matches!(
            get_random_values(MAX_RANDOM_BYTES + 1),
            Err(CryptoError::QuotaExceeded { .. })
        ));
    }

    #[test]
    fn test_random_values_differ() {
        assert_ne!(get_random_values(32).unwrap(), get_random_values(32).unwrap());
    }

    #[test]
    fn test_random_uuid_shape() {
        let id = random_uuid();
        assert_eq!(id.len(), 36);
        assert_eq!(id.as_bytes()[14], b'4');
        assert_ne!(id, random_uuid());
    }
}
