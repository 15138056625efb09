//! Typed operation parameters.
//!
//! Each enum variant fixes the algorithm, so a parameter bag can never name
//! one algorithm while carrying fields for another.

use crate::algorithm::{Algorithm, HashAlgorithm, NamedCurve};
use crate::config::EngineConfig;
use crate::error::{CryptoError, CryptoResult};
use crate::key::CryptoKey;
use crate::registry::OperationParams;

pub const GCM_IV_LEN: usize = 12;
pub const GCM_TAG_LENGTHS: [usize; 5] = [96, 104, 112, 120, 128];
pub const DEFAULT_GCM_TAG_LENGTH: usize = 128;
pub const AES_BLOCK_LEN: usize = 16;

fn ensure_aes(algorithm: Algorithm) -> CryptoResult<()> {
    if algorithm.is_aes() {
        Ok(())
    } else {
        Err(CryptoError::invalid_params(format!("{algorithm} is not an AES algorithm")))
    }
}

fn ensure_aes_length(length: usize) -> CryptoResult<()> {
    if matches!(length, 128 | 192 | 256) {
        Ok(())
    } else {
        Err(CryptoError::invalid_params(format!(
            "AES key length must be 128, 192 or 256 bits, got {length}"
        )))
    }
}

fn ensure_hmac_length(length: Option<usize>) -> CryptoResult<()> {
    match length {
        Some(0) => Err(CryptoError::invalid_params("HMAC key length must be greater than zero")),
        _ => Ok(()),
    }
}

/// Decode a big-endian public exponent and check it is one we accept.
pub(crate) fn public_exponent_value(bytes: &[u8]) -> CryptoResult<u64> {
    let significant: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
    if significant.len() > 8 {
        return Err(CryptoError::invalid_params("public exponent too large"));
    }
    let value = significant
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    if value == 3 || value == 65537 {
        Ok(value)
    } else {
        Err(CryptoError::invalid_params(format!(
            "public exponent must be 3 or 65537, got {value}"
        )))
    }
}

/// Parameters for `generate_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyGenParams {
    Aes {
        algorithm: Algorithm,
        length: usize,
    },
    Hmac {
        hash: HashAlgorithm,
        /// Bits; defaults to the hash block size.
        length: Option<usize>,
    },
    Rsa {
        algorithm: Algorithm,
        modulus_length: usize,
        /// Big-endian bytes, as in `RsaHashedKeyGenParams`.
        public_exponent: Vec<u8>,
        hash: HashAlgorithm,
    },
    Ec {
        algorithm: Algorithm,
        named_curve: NamedCurve,
    },
    Ed25519,
    X25519,
}

impl OperationParams for KeyGenParams {
    fn algorithm(&self) -> Algorithm {
        match self {
            Self::Aes { algorithm, .. } | Self::Rsa { algorithm, .. } | Self::Ec { algorithm, .. } => {
                *algorithm
            }
            Self::Hmac { .. } => Algorithm::Hmac,
            Self::Ed25519 => Algorithm::Ed25519,
            Self::X25519 => Algorithm::X25519,
        }
    }

    fn validate(&self, config: &EngineConfig) -> CryptoResult<()> {
        match self {
            Self::Aes { algorithm, length } => {
                ensure_aes(*algorithm)?;
                ensure_aes_length(*length)
            }
            Self::Hmac { length, .. } => ensure_hmac_length(*length),
            Self::Rsa {
                algorithm,
                modulus_length,
                public_exponent,
                ..
            } => {
                if !algorithm.is_rsa() {
                    return Err(CryptoError::invalid_params(format!("{algorithm} is not an RSA algorithm")));
                }
                if !config.rsa_modulus_allowed(*modulus_length) {
                    return Err(CryptoError::invalid_params(format!(
                        "RSA modulus length {modulus_length} outside {}..={} or not a multiple of 8",
                        config.min_rsa_modulus_bits, config.max_rsa_modulus_bits
                    )));
                }
                public_exponent_value(public_exponent).map(|_| ())
            }
            Self::Ec { algorithm, .. } => {
                if algorithm.is_ec() {
                    Ok(())
                } else {
                    Err(CryptoError::invalid_params(format!("{algorithm} is not an EC algorithm")))
                }
            }
            Self::Ed25519 | Self::X25519 => Ok(()),
        }
    }
}

/// Parameters for `import_key` and for the key produced by `unwrap_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportParams {
    /// Key length comes from the key data.
    Aes { algorithm: Algorithm },
    Hmac {
        hash: HashAlgorithm,
        length: Option<usize>,
    },
    Rsa {
        algorithm: Algorithm,
        hash: HashAlgorithm,
    },
    Ec {
        algorithm: Algorithm,
        named_curve: NamedCurve,
    },
    Ed25519,
    X25519,
    Hkdf,
    Pbkdf2,
}

impl OperationParams for ImportParams {
    fn algorithm(&self) -> Algorithm {
        match self {
            Self::Aes { algorithm } | Self::Rsa { algorithm, .. } | Self::Ec { algorithm, .. } => *algorithm,
            Self::Hmac { .. } => Algorithm::Hmac,
            Self::Ed25519 => Algorithm::Ed25519,
            Self::X25519 => Algorithm::X25519,
            Self::Hkdf => Algorithm::Hkdf,
            Self::Pbkdf2 => Algorithm::Pbkdf2,
        }
    }

    fn validate(&self, _config: &EngineConfig) -> CryptoResult<()> {
        match self {
            Self::Aes { algorithm } => ensure_aes(*algorithm),
            Self::Hmac { length, .. } => ensure_hmac_length(*length),
            Self::Rsa { algorithm, .. } if !algorithm.is_rsa() => Err(CryptoError::invalid_params(
                format!("{algorithm} is not an RSA algorithm"),
            )),
            Self::Ec { algorithm, .. } if !algorithm.is_ec() => Err(CryptoError::invalid_params(
                format!("{algorithm} is not an EC algorithm"),
            )),
            _ => Ok(()),
        }
    }
}

/// Parameters for `encrypt`/`decrypt`, and for cipher-based key wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherParams {
    AesGcm {
        iv: Vec<u8>,
        additional_data: Option<Vec<u8>>,
        /// Bits; defaults to 128.
        tag_length: Option<usize>,
    },
    AesCbc {
        iv: Vec<u8>,
    },
    AesCtr {
        counter: Vec<u8>,
        /// Number of rightmost counter bits that increment.
        length: u32,
    },
    RsaOaep {
        label: Option<Vec<u8>>,
    },
}

impl CipherParams {
    pub(crate) fn gcm_tag_length(tag_length: Option<usize>) -> usize {
        tag_length.unwrap_or(DEFAULT_GCM_TAG_LENGTH)
    }
}

impl OperationParams for CipherParams {
    fn algorithm(&self) -> Algorithm {
        match self {
            Self::AesGcm { .. } => Algorithm::AesGcm,
            Self::AesCbc { .. } => Algorithm::AesCbc,
            Self::AesCtr { .. } => Algorithm::AesCtr,
            Self::RsaOaep { .. } => Algorithm::RsaOaep,
        }
    }

    fn validate(&self, _config: &EngineConfig) -> CryptoResult<()> {
        match self {
            Self::AesGcm { iv, tag_length, .. } => {
                if iv.len() != GCM_IV_LEN {
                    return Err(CryptoError::invalid_params(format!(
                        "AES-GCM IV must be {GCM_IV_LEN} bytes, got {}",
                        iv.len()
                    )));
                }
                let tag_length = Self::gcm_tag_length(*tag_length);
                if !GCM_TAG_LENGTHS.contains(&tag_length) {
                    return Err(CryptoError::invalid_params(format!(
                        "AES-GCM tag length must be one of {GCM_TAG_LENGTHS:?}, got {tag_length}"
                    )));
                }
                Ok(())
            }
            Self::AesCbc { iv } => {
                if iv.len() == AES_BLOCK_LEN {
                    Ok(())
                } else {
                    Err(CryptoError::invalid_params(format!(
                        "AES-CBC IV must be {AES_BLOCK_LEN} bytes, got {}",
                        iv.len()
                    )))
                }
            }
            Self::AesCtr { counter, length } => {
                if counter.len() != AES_BLOCK_LEN {
                    return Err(CryptoError::invalid_params(format!(
                        "AES-CTR counter must be {AES_BLOCK_LEN} bytes, got {}",
                        counter.len()
                    )));
                }
                if !(1..=128).contains(length) {
                    return Err(CryptoError::invalid_params(format!(
                        "AES-CTR counter length must be between 1 and 128 bits, got {length}"
                    )));
                }
                Ok(())
            }
            Self::RsaOaep { label } => match label {
                Some(label) if std::str::from_utf8(label).is_err() => {
                    Err(CryptoError::invalid_params("RSA-OAEP label must be valid UTF-8"))
                }
                _ => Ok(()),
            },
        }
    }
}

/// Parameters for `sign`/`verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignParams {
    /// Hash comes from the key.
    Hmac,
    /// Hash comes from the key.
    RsassaPkcs1V15,
    RsaPss {
        salt_length: usize,
    },
    Ecdsa {
        hash: HashAlgorithm,
    },
    Ed25519,
}

impl OperationParams for SignParams {
    fn algorithm(&self) -> Algorithm {
        match self {
            Self::Hmac => Algorithm::Hmac,
            Self::RsassaPkcs1V15 => Algorithm::RsassaPkcs1V15,
            Self::RsaPss { .. } => Algorithm::RsaPss,
            Self::Ecdsa { .. } => Algorithm::Ecdsa,
            Self::Ed25519 => Algorithm::Ed25519,
        }
    }

    fn validate(&self, _config: &EngineConfig) -> CryptoResult<()> {
        Ok(())
    }
}

/// Parameters for `derive_bits`/`derive_key`.
#[derive(Debug, Clone)]
pub enum DeriveParams<'a> {
    Hkdf {
        hash: HashAlgorithm,
        salt: Vec<u8>,
        info: Vec<u8>,
    },
    Pbkdf2 {
        hash: HashAlgorithm,
        salt: Vec<u8>,
        iterations: u32,
    },
    Ecdh {
        public: &'a CryptoKey,
    },
    X25519 {
        public: &'a CryptoKey,
    },
}

impl OperationParams for DeriveParams<'_> {
    fn algorithm(&self) -> Algorithm {
        match self {
            Self::Hkdf { .. } => Algorithm::Hkdf,
            Self::Pbkdf2 { .. } => Algorithm::Pbkdf2,
            Self::Ecdh { .. } => Algorithm::Ecdh,
            Self::X25519 { .. } => Algorithm::X25519,
        }
    }

    fn validate(&self, config: &EngineConfig) -> CryptoResult<()> {
        match self {
            Self::Pbkdf2 { iterations, .. } => {
                if *iterations == 0 {
                    return Err(CryptoError::invalid_params("PBKDF2 iterations must be at least 1"));
                }
                match config.max_pbkdf2_iterations {
                    Some(max) if *iterations > max => Err(CryptoError::invalid_params(format!(
                        "PBKDF2 iterations {iterations} exceed the configured maximum {max}"
                    ))),
                    _ => Ok(()),
                }
            }
            Self::Hkdf { .. } | Self::Ecdh { .. } | Self::X25519 { .. } => Ok(()),
        }
    }
}

/// Algorithm of the key produced by `derive_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivedKeyParams {
    Aes {
        algorithm: Algorithm,
        length: usize,
    },
    Hmac {
        hash: HashAlgorithm,
        length: Option<usize>,
    },
    Hkdf,
    Pbkdf2,
}

impl DerivedKeyParams {
    /// Number of bits to derive for this key, if the algorithm fixes one.
    pub(crate) fn length_bits(&self) -> Option<usize> {
        match self {
            Self::Aes { length, .. } => Some(*length),
            Self::Hmac { hash, length } => Some(length.unwrap_or(hash.block_len() * 8)),
            Self::Hkdf | Self::Pbkdf2 => None,
        }
    }

    pub(crate) fn import_params(&self) -> ImportParams {
        match self {
            Self::Aes { algorithm, .. } => ImportParams::Aes { algorithm: *algorithm },
            Self::Hmac { hash, length } => ImportParams::Hmac {
                hash: *hash,
                length: *length,
            },
            Self::Hkdf => ImportParams::Hkdf,
            Self::Pbkdf2 => ImportParams::Pbkdf2,
        }
    }
}

impl OperationParams for DerivedKeyParams {
    fn algorithm(&self) -> Algorithm {
        match self {
            Self::Aes { algorithm, .. } => *algorithm,
            Self::Hmac { .. } => Algorithm::Hmac,
            Self::Hkdf => Algorithm::Hkdf,
            Self::Pbkdf2 => Algorithm::Pbkdf2,
        }
    }

    fn validate(&self, _config: &EngineConfig) -> CryptoResult<()> {
        match self {
            Self::Aes { algorithm, length } => {
                ensure_aes(*algorithm)?;
                ensure_aes_length(*length)
            }
            Self::Hmac { length, .. } => ensure_hmac_length(*length),
            Self::Hkdf | Self::Pbkdf2 => Ok(()),
        }
    }
}

/// Parameters for `wrap_key`/`unwrap_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrapParams {
    AesKw,
    Cipher(CipherParams),
}

impl OperationParams for WrapParams {
    fn algorithm(&self) -> Algorithm {
        match self {
            Self::AesKw => Algorithm::AesKw,
            Self::Cipher(params) => params.algorithm(),
        }
    }

    fn validate(&self, config: &EngineConfig) -> CryptoResult<()> {
        match self {
            Self::AesKw => Ok(()),
            Self::Cipher(params) => params.validate(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_gcm_iv_and_tag_validation() {
        let ok = CipherParams::AesGcm {
            iv: vec![0; 12],
            additional_data: None,
            tag_length: Some(104),
        };
        assert!(ok.validate(&config()).is_ok());

        let short_iv = CipherParams::AesGcm {
            iv: vec![0; 8],
            additional_data: None,
            tag_length: None,
        };
        assert!(matches!(short_iv.validate(&config()), Err(CryptoError::InvalidParams(_))));

        let odd_tag = CipherParams::AesGcm {
            iv: vec![0; 12],
            additional_data: None,
            tag_length: Some(100),
        };
        assert!(matches!(odd_tag.validate(&config()), Err(CryptoError::InvalidParams(_))));
    }

    #[test]
    fn test_ctr_validation() {
        let zero = CipherParams::AesCtr {
            counter: vec![0; 16],
            length: 0,
        };
        assert!(zero.validate(&config()).is_err());

        let too_long = CipherParams::AesCtr {
            counter: vec![0; 16],
            length: 129,
        };
        assert!(too_long.validate(&config()).is_err());
    }

    #[test]
    fn test_oaep_label_must_be_utf8() {
        let params = CipherParams::RsaOaep {
            label: Some(vec![0xff, 0xfe]),
        };
        assert!(matches!(params.validate(&config()), Err(CryptoError::InvalidParams(_))));
    }

    #[test]
    fn test_public_exponent() {
        assert_eq!(public_exponent_value(&[0x01, 0x00, 0x01]).unwrap(), 65537);
        assert_eq!(public_exponent_value(&[0x00, 0x03]).unwrap(), 3);
        assert!(public_exponent_value(&[0x05]).is_err());
    }

    #[test]
    fn test_rsa_modulus_bounds() {
        let params = KeyGenParams::Rsa {
            algorithm: Algorithm::RsaPss,
            modulus_length: 512,
            public_exponent: vec![1, 0, 1],
            hash: HashAlgorithm::Sha256,
        };
        assert!(params.validate(&config()).is_err());
    }

    #[test]
    fn test_pbkdf2_iteration_ceiling() {
        let params = DeriveParams::Pbkdf2 {
            hash: HashAlgorithm::Sha256,
            salt: b"salt".to_vec(),
            iterations: 5000,
        };
        let capped = EngineConfig {
            max_pbkdf2_iterations: Some(1000),
            ..EngineConfig::default()
        };
        assert!(params.validate(&config()).is_ok());
        assert!(params.validate(&capped).is_err());
    }

    #[test]
    fn test_hmac_default_derived_length() {
        let params = DerivedKeyParams::Hmac {
            hash: HashAlgorithm::Sha384,
            length: None,
        };
        assert_eq!(params.length_bits(), Some(1024));
    }
}
