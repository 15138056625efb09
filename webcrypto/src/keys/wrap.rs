//! Wrap and unwrap: export-then-encrypt and decrypt-then-import.

use super::{export_key, import_key, KeyData};
use crate::algorithm::{KeyFormat, Operation};
use crate::cipher::{self, aes};
use crate::config::EngineConfig;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{CryptoKey, KeyUsage, KeyUsages};
use crate::params::{ImportParams, WrapParams};
use crate::registry::{self, OperationParams};
use tracing::debug;
use zeroize::Zeroizing;

const KW_SEMIBLOCK: usize = 8;

fn check(
    operation: Operation,
    usage: KeyUsage,
    params: &WrapParams,
    key: &CryptoKey,
    config: &EngineConfig,
) -> CryptoResult<()> {
    let spec = registry::spec_for(params.algorithm())?;
    registry::validate_params(spec, operation, params, config)?;
    key.require_algorithm(spec.algorithm)?;
    key.require_usage(usage)
}

/// Export `key` in `format` and encrypt the result under `wrapping_key`.
///
/// JWK exports are JSON text; for AES-KW that text is padded with trailing
/// spaces to a whole number of 64-bit blocks.
///
/// # Errors
///
/// `InvalidUsage` when `wrapping_key` lacks `wrapKey`, `InvalidAccess` when
/// `key` is not extractable, plus any export or cipher failure.
pub fn wrap_key(
    format: KeyFormat,
    key: &CryptoKey,
    wrapping_key: &CryptoKey,
    params: &WrapParams,
    config: &EngineConfig,
) -> CryptoResult<Vec<u8>> {
    debug!(algorithm = params.algorithm().name(), format = format.name(), "wrap_key");
    check(Operation::WrapKey, KeyUsage::WrapKey, params, wrapping_key, config)?;

    let mut bytes = Zeroizing::new(export_key(format, key)?.into_bytes()?);
    match params {
        WrapParams::AesKw => {
            if format == KeyFormat::Jwk {
                let padded = bytes.len().div_ceil(KW_SEMIBLOCK) * KW_SEMIBLOCK;
                bytes.resize(padded, b' ');
            }
            aes::kw_wrap(wrapping_key.secret_bytes()?, &bytes)
        }
        WrapParams::Cipher(cipher_params) => cipher::encrypt_unchecked(cipher_params, wrapping_key, &bytes),
    }
}

/// Decrypt `wrapped` under `unwrapping_key` and import the result.
///
/// # Errors
///
/// `InvalidUsage` when `unwrapping_key` lacks `unwrapKey`; a wrapped blob
/// that fails to decrypt is the same opaque `OperationError` as `decrypt`.
#[allow(clippy::too_many_arguments)]
pub fn unwrap_key(
    format: KeyFormat,
    wrapped: &[u8],
    unwrapping_key: &CryptoKey,
    params: &WrapParams,
    import_params: &ImportParams,
    extractable: bool,
    usages: KeyUsages,
    config: &EngineConfig,
) -> CryptoResult<CryptoKey> {
    debug!(algorithm = params.algorithm().name(), format = format.name(), "unwrap_key");
    check(Operation::UnwrapKey, KeyUsage::UnwrapKey, params, unwrapping_key, config)?;

    let bytes = match params {
        WrapParams::AesKw => aes::kw_unwrap(unwrapping_key.secret_bytes()?, wrapped),
        WrapParams::Cipher(cipher_params) => cipher::decrypt_unchecked(cipher_params, unwrapping_key, wrapped),
    }
    .map_err(|_| CryptoError::decryption_failed())?;
    let bytes = Zeroizing::new(bytes);

    let data = KeyData::from_bytes(format, bytes.to_vec())?;
    import_key(format, &data, import_params, extractable, usages, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{Algorithm, HashAlgorithm};
    use crate::keys::secret;
    use crate::params::CipherParams;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn kek(algorithm: Algorithm) -> CryptoKey {
        secret::generate_aes(
            algorithm,
            256,
            false,
            KeyUsages::of(&[KeyUsage::WrapKey, KeyUsage::UnwrapKey]),
        )
        .unwrap()
    }

    fn hmac_key() -> CryptoKey {
        secret::generate_hmac(HashAlgorithm::Sha256, None, true, KeyUsages::of(&[KeyUsage::Sign])).unwrap()
    }

    #[test]
    fn test_kw_jwk_round_trip() {
        let kek = kek(Algorithm::AesKw);
        let key = hmac_key();
        let wrapped = wrap_key(KeyFormat::Jwk, &key, &kek, &WrapParams::AesKw, &config()).unwrap();
        assert_eq!(wrapped.len() % 8, 0);

        let unwrapped = unwrap_key(
            KeyFormat::Jwk,
            &wrapped,
            &kek,
            &WrapParams::AesKw,
            &ImportParams::Hmac {
                hash: HashAlgorithm::Sha256,
                length: None,
            },
            true,
            KeyUsages::of(&[KeyUsage::Sign]),
            &config(),
        )
        .unwrap();
        assert_eq!(unwrapped.secret_bytes().unwrap(), key.secret_bytes().unwrap());
    }

    #[test]
    fn test_gcm_raw_round_trip() {
        let kek = kek(Algorithm::AesGcm);
        let key = hmac_key();
        let params = WrapParams::Cipher(CipherParams::AesGcm {
            iv: vec![3; 12],
            additional_data: Some(b"wrap".to_vec()),
            tag_length: None,
        });
        let wrapped = wrap_key(KeyFormat::Raw, &key, &kek, &params, &config()).unwrap();
        let unwrapped = unwrap_key(
            KeyFormat::Raw,
            &wrapped,
            &kek,
            &params,
            &ImportParams::Hmac {
                hash: HashAlgorithm::Sha256,
                length: None,
            },
            false,
            KeyUsages::of(&[KeyUsage::Sign]),
            &config(),
        )
        .unwrap();
        assert!(!unwrapped.extractable());
        assert_eq!(unwrapped.secret_bytes().unwrap(), key.secret_bytes().unwrap());
    }

    #[test]
    fn test_non_extractable_key_cannot_be_wrapped() {
        let kek = kek(Algorithm::AesKw);
        let key = secret::generate_aes(Algorithm::AesGcm, 128, false, KeyUsages::of(&[KeyUsage::Encrypt])).unwrap();
        assert!(matches!(
            wrap_key(KeyFormat::Raw, &key, &kek, &WrapParams::AesKw, &config()),
            Err(CryptoError::InvalidAccess(_))
        ));
    }

    #[test]
    fn test_wrapping_key_needs_usage() {
        let kek = secret::generate_aes(Algorithm::AesKw, 128, false, KeyUsages::of(&[KeyUsage::UnwrapKey])).unwrap();
        assert!(matches!(
            wrap_key(KeyFormat::Raw, &hmac_key(), &kek, &WrapParams::AesKw, &config()),
            Err(CryptoError::InvalidUsage(_))
        ));
    }

    #[test]
    fn test_corrupt_blob_is_opaque() {
        let kek = kek(Algorithm::AesKw);
        let mut wrapped = wrap_key(KeyFormat::Raw, &hmac_key(), &kek, &WrapParams::AesKw, &config()).unwrap();
        wrapped[0] ^= 0xff;
        let err = unwrap_key(
            KeyFormat::Raw,
            &wrapped,
            &kek,
            &WrapParams::AesKw,
            &ImportParams::Hmac {
                hash: HashAlgorithm::Sha256,
                length: None,
            },
            false,
            KeyUsages::of(&[KeyUsage::Sign]),
            &config(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), CryptoError::decryption_failed().to_string());
    }
}
