//! Cipher engine: AES-GCM, AES-CBC, AES-CTR and RSA-OAEP.

pub(crate) mod aes;
mod rsa_oaep;

use crate::algorithm::Operation;
use crate::config::EngineConfig;
use crate::error::CryptoResult;
use crate::key::{CryptoKey, KeyUsage};
use crate::params::CipherParams;
use crate::registry::{self, OperationParams};
use tracing::debug;

/// Run the registry, key and usage checks shared by every cipher entry point.
pub(crate) fn check(
    operation: Operation,
    usage: KeyUsage,
    params: &CipherParams,
    key: &CryptoKey,
    config: &EngineConfig,
) -> CryptoResult<()> {
    let spec = registry::spec_for(params.algorithm())?;
    registry::validate_params(spec, operation, params, config)?;
    key.require_algorithm(spec.algorithm)?;
    key.require_usage(usage)
}

/// Encrypt `data` under `key`.
///
/// # Errors
///
/// `InvalidParams` for malformed parameters, `InvalidAccess` when the key
/// belongs to another algorithm and `InvalidUsage` when it lacks `encrypt`.
pub fn encrypt(
    params: &CipherParams,
    key: &CryptoKey,
    data: &[u8],
    config: &EngineConfig,
) -> CryptoResult<Vec<u8>> {
    debug!(algorithm = params.algorithm().name(), len = data.len(), "encrypt");
    check(Operation::Encrypt, KeyUsage::Encrypt, params, key, config)?;
    encrypt_unchecked(params, key, data)
}

/// Decrypt `data` under `key`.
///
/// # Errors
///
/// As [`encrypt`]; every authentication or padding failure is the same
/// opaque `OperationError`.
pub fn decrypt(
    params: &CipherParams,
    key: &CryptoKey,
    data: &[u8],
    config: &EngineConfig,
) -> CryptoResult<Vec<u8>> {
    debug!(algorithm = params.algorithm().name(), len = data.len(), "decrypt");
    check(Operation::Decrypt, KeyUsage::Decrypt, params, key, config)?;
    decrypt_unchecked(params, key, data)
}

pub(crate) fn encrypt_unchecked(params: &CipherParams, key: &CryptoKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
    match params {
        CipherParams::AesGcm {
            iv,
            additional_data,
            tag_length,
        } => aes::gcm_encrypt(
            key.secret_bytes()?,
            iv,
            additional_data.as_deref().unwrap_or_default(),
            CipherParams::gcm_tag_length(*tag_length),
            data,
        ),
        CipherParams::AesCbc { iv } => aes::cbc_encrypt(key.secret_bytes()?, iv, data),
        CipherParams::AesCtr { counter, length } => aes::ctr_apply(key.secret_bytes()?, counter, *length, data),
        CipherParams::RsaOaep { label } => rsa_oaep::encrypt(key, label.as_deref(), data),
    }
}

pub(crate) fn decrypt_unchecked(params: &CipherParams, key: &CryptoKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
    match params {
        CipherParams::AesGcm {
            iv,
            additional_data,
            tag_length,
        } => aes::gcm_decrypt(
            key.secret_bytes()?,
            iv,
            additional_data.as_deref().unwrap_or_default(),
            CipherParams::gcm_tag_length(*tag_length),
            data,
        ),
        CipherParams::AesCbc { iv } => aes::cbc_decrypt(key.secret_bytes()?, iv, data),
        CipherParams::AesCtr { counter, length } => aes::ctr_apply(key.secret_bytes()?, counter, *length, data),
        CipherParams::RsaOaep { label } => rsa_oaep::decrypt(key, label.as_deref(), data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Algorithm;
    use crate::error::CryptoError;
    use crate::key::KeyUsages;
    use crate::keys::secret;

    fn gcm_params() -> CipherParams {
        CipherParams::AesGcm {
            iv: vec![0; 12],
            additional_data: None,
            tag_length: None,
        }
    }

    #[test]
    fn test_usage_enforced() {
        let key = secret::generate_aes(Algorithm::AesGcm, 128, false, KeyUsages::of(&[KeyUsage::Decrypt])).unwrap();
        let result = encrypt(&gcm_params(), &key, b"x", &EngineConfig::default());
        assert!(matches!(result, Err(CryptoError::InvalidUsage(_))));
    }

    #[test]
    fn test_algorithm_mismatch_is_invalid_access() {
        let key = secret::generate_aes(Algorithm::AesCbc, 128, false, KeyUsages::of(&[KeyUsage::Encrypt])).unwrap();
        let result = encrypt(&gcm_params(), &key, b"x", &EngineConfig::default());
        assert!(matches!(result, Err(CryptoError::InvalidAccess(_))));
    }

    #[test]
    fn test_bad_iv_is_invalid_params() {
        let key = secret::generate_aes(Algorithm::AesGcm, 256, false, KeyUsages::of(&[KeyUsage::Encrypt])).unwrap();
        let params = CipherParams::AesGcm {
            iv: vec![0; 16],
            additional_data: None,
            tag_length: None,
        };
        let result = encrypt(&params, &key, b"x", &EngineConfig::default());
        assert!(matches!(result, Err(CryptoError::InvalidParams(_))));
    }

    #[test]
    fn test_ctr_round_trip() {
        let key = secret::generate_aes(
            Algorithm::AesCtr,
            192,
            false,
            KeyUsages::of(&[KeyUsage::Encrypt, KeyUsage::Decrypt]),
        )
        .unwrap();
        let params = CipherParams::AesCtr {
            counter: vec![9; 16],
            length: 64,
        };
        let config = EngineConfig::default();
        let ciphertext = encrypt(&params, &key, b"counter mode text", &config).unwrap();
        assert_eq!(ciphertext.len(), 17);
        assert_eq!(decrypt(&params, &key, &ciphertext, &config).unwrap(), b"counter mode text");
    }
}
