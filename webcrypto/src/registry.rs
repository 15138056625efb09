//! Algorithm registry.
//!
//! A read-only table describing, for each [`Algorithm`], which operations it
//! supports, which usages its keys may carry and which formats they accept.
//! Engines consult it before touching key material.

use crate::algorithm::{Algorithm, KeyFormat, Operation};
use crate::config::EngineConfig;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{KeyType, KeyUsage, KeyUsages};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmCategory {
    Digest,
    Cipher,
    KeyWrap,
    Signature,
    Derive,
}

/// Static description of one algorithm.
#[derive(Debug)]
pub struct AlgorithmSpec {
    pub algorithm: Algorithm,
    pub category: AlgorithmCategory,
    pub operations: &'static [Operation],
    /// Usages permitted on secret keys.
    pub secret_usages: KeyUsages,
    /// Usages permitted on public keys.
    pub public_usages: KeyUsages,
    /// Usages permitted on private keys.
    pub private_usages: KeyUsages,
    /// Allowed key lengths in bits; empty when the length is not fixed here.
    pub key_lengths: &'static [usize],
    pub formats: &'static [KeyFormat],
    /// Names of the parameters a request must carry.
    pub required_params: &'static [&'static str],
}

impl AlgorithmSpec {
    pub fn supports(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }

    pub fn supports_format(&self, format: KeyFormat) -> bool {
        self.formats.contains(&format)
    }

    /// All usages any key of this algorithm may hold.
    pub fn all_usages(&self) -> KeyUsages {
        self.secret_usages
            .union(self.public_usages)
            .union(self.private_usages)
    }

    pub fn usages_for(&self, key_type: KeyType) -> KeyUsages {
        match key_type {
            KeyType::Secret => self.secret_usages,
            KeyType::Public => self.public_usages,
            KeyType::Private => self.private_usages,
        }
    }

    pub fn ensure_supports(&self, operation: Operation) -> CryptoResult<()> {
        if self.supports(operation) {
            Ok(())
        } else {
            Err(CryptoError::UnsupportedAlgorithm(format!(
                "{} does not support {operation}",
                self.algorithm
            )))
        }
    }

    /// Fails with `InvalidUsage` unless every requested usage is permitted
    /// for this algorithm.
    pub fn ensure_usages(&self, requested: KeyUsages) -> CryptoResult<()> {
        if requested.is_subset_of(self.all_usages()) {
            Ok(())
        } else {
            Err(CryptoError::InvalidUsage(format!(
                "{:?} not permitted for {}",
                requested.to_vec(),
                self.algorithm
            )))
        }
    }

    pub fn ensure_usages_for(&self, key_type: KeyType, requested: KeyUsages) -> CryptoResult<()> {
        if requested.is_subset_of(self.usages_for(key_type)) {
            Ok(())
        } else {
            Err(CryptoError::InvalidUsage(format!(
                "{:?} not permitted for a {} {} key",
                requested.to_vec(),
                self.algorithm,
                key_type.name()
            )))
        }
    }
}

const DIGEST_OPS: &[Operation] = &[Operation::Digest];
const SYMMETRIC_CIPHER_OPS: &[Operation] = &[
    Operation::GenerateKey,
    Operation::ImportKey,
    Operation::ExportKey,
    Operation::Encrypt,
    Operation::Decrypt,
    Operation::WrapKey,
    Operation::UnwrapKey,
];
const KEY_WRAP_OPS: &[Operation] = &[
    Operation::GenerateKey,
    Operation::ImportKey,
    Operation::ExportKey,
    Operation::WrapKey,
    Operation::UnwrapKey,
];
const SIGNATURE_OPS: &[Operation] = &[
    Operation::GenerateKey,
    Operation::ImportKey,
    Operation::ExportKey,
    Operation::Sign,
    Operation::Verify,
];
const AGREEMENT_OPS: &[Operation] = &[
    Operation::GenerateKey,
    Operation::ImportKey,
    Operation::ExportKey,
    Operation::DeriveBits,
    Operation::DeriveKey,
];
const KDF_OPS: &[Operation] = &[
    Operation::ImportKey,
    Operation::DeriveBits,
    Operation::DeriveKey,
];

const SECRET_FORMATS: &[KeyFormat] = &[KeyFormat::Raw, KeyFormat::Jwk];
const RSA_FORMATS: &[KeyFormat] = &[KeyFormat::Pkcs8, KeyFormat::Spki, KeyFormat::Jwk];
const ASYMMETRIC_FORMATS: &[KeyFormat] = &[
    KeyFormat::Raw,
    KeyFormat::Pkcs8,
    KeyFormat::Spki,
    KeyFormat::Jwk,
];
const KDF_FORMATS: &[KeyFormat] = &[KeyFormat::Raw];

const AES_LENGTHS: &[usize] = &[128, 192, 256];

const AES_USAGES: KeyUsages = KeyUsages::of(&[
    KeyUsage::Encrypt,
    KeyUsage::Decrypt,
    KeyUsage::WrapKey,
    KeyUsage::UnwrapKey,
]);
const WRAP_USAGES: KeyUsages = KeyUsages::of(&[KeyUsage::WrapKey, KeyUsage::UnwrapKey]);
const MAC_USAGES: KeyUsages = KeyUsages::of(&[KeyUsage::Sign, KeyUsage::Verify]);
const SIGN_USAGES: KeyUsages = KeyUsages::of(&[KeyUsage::Sign]);
const VERIFY_USAGES: KeyUsages = KeyUsages::of(&[KeyUsage::Verify]);
const DERIVE_USAGES: KeyUsages = KeyUsages::of(&[KeyUsage::DeriveKey, KeyUsage::DeriveBits]);
const OAEP_PUBLIC_USAGES: KeyUsages = KeyUsages::of(&[KeyUsage::Encrypt, KeyUsage::WrapKey]);
const OAEP_PRIVATE_USAGES: KeyUsages = KeyUsages::of(&[KeyUsage::Decrypt, KeyUsage::UnwrapKey]);

const fn digest(algorithm: Algorithm) -> AlgorithmSpec {
    AlgorithmSpec {
        algorithm,
        category: AlgorithmCategory::Digest,
        operations: DIGEST_OPS,
        secret_usages: KeyUsages::EMPTY,
        public_usages: KeyUsages::EMPTY,
        private_usages: KeyUsages::EMPTY,
        key_lengths: &[],
        formats: &[],
        required_params: &[],
    }
}

const fn aes(algorithm: Algorithm, required_params: &'static [&'static str]) -> AlgorithmSpec {
    AlgorithmSpec {
        algorithm,
        category: AlgorithmCategory::Cipher,
        operations: SYMMETRIC_CIPHER_OPS,
        secret_usages: AES_USAGES,
        public_usages: KeyUsages::EMPTY,
        private_usages: KeyUsages::EMPTY,
        key_lengths: AES_LENGTHS,
        formats: SECRET_FORMATS,
        required_params,
    }
}

const fn signature(algorithm: Algorithm, required_params: &'static [&'static str]) -> AlgorithmSpec {
    AlgorithmSpec {
        algorithm,
        category: AlgorithmCategory::Signature,
        operations: SIGNATURE_OPS,
        secret_usages: KeyUsages::EMPTY,
        public_usages: VERIFY_USAGES,
        private_usages: SIGN_USAGES,
        key_lengths: &[],
        formats: ASYMMETRIC_FORMATS,
        required_params,
    }
}

const fn agreement(algorithm: Algorithm, required_params: &'static [&'static str]) -> AlgorithmSpec {
    AlgorithmSpec {
        algorithm,
        category: AlgorithmCategory::Derive,
        operations: AGREEMENT_OPS,
        secret_usages: KeyUsages::EMPTY,
        public_usages: KeyUsages::EMPTY,
        private_usages: DERIVE_USAGES,
        key_lengths: &[],
        formats: ASYMMETRIC_FORMATS,
        required_params,
    }
}

const fn kdf(algorithm: Algorithm, required_params: &'static [&'static str]) -> AlgorithmSpec {
    AlgorithmSpec {
        algorithm,
        category: AlgorithmCategory::Derive,
        operations: KDF_OPS,
        secret_usages: DERIVE_USAGES,
        public_usages: KeyUsages::EMPTY,
        private_usages: KeyUsages::EMPTY,
        key_lengths: &[],
        formats: KDF_FORMATS,
        required_params,
    }
}

/// The process-wide algorithm table. Never mutated.
pub static REGISTRY: [AlgorithmSpec; 18] = [
    digest(Algorithm::Sha1),
    digest(Algorithm::Sha256),
    digest(Algorithm::Sha384),
    digest(Algorithm::Sha512),
    AlgorithmSpec {
        algorithm: Algorithm::Hmac,
        category: AlgorithmCategory::Signature,
        operations: SIGNATURE_OPS,
        secret_usages: MAC_USAGES,
        public_usages: KeyUsages::EMPTY,
        private_usages: KeyUsages::EMPTY,
        key_lengths: &[],
        formats: SECRET_FORMATS,
        required_params: &["hash"],
    },
    aes(Algorithm::AesGcm, &["iv"]),
    aes(Algorithm::AesCbc, &["iv"]),
    aes(Algorithm::AesCtr, &["counter", "length"]),
    AlgorithmSpec {
        algorithm: Algorithm::AesKw,
        category: AlgorithmCategory::KeyWrap,
        operations: KEY_WRAP_OPS,
        secret_usages: WRAP_USAGES,
        public_usages: KeyUsages::EMPTY,
        private_usages: KeyUsages::EMPTY,
        key_lengths: AES_LENGTHS,
        formats: SECRET_FORMATS,
        required_params: &[],
    },
    AlgorithmSpec {
        formats: RSA_FORMATS,
        ..signature(Algorithm::RsassaPkcs1V15, &["hash"])
    },
    AlgorithmSpec {
        formats: RSA_FORMATS,
        ..signature(Algorithm::RsaPss, &["hash", "saltLength"])
    },
    AlgorithmSpec {
        algorithm: Algorithm::RsaOaep,
        category: AlgorithmCategory::Cipher,
        operations: SYMMETRIC_CIPHER_OPS,
        secret_usages: KeyUsages::EMPTY,
        public_usages: OAEP_PUBLIC_USAGES,
        private_usages: OAEP_PRIVATE_USAGES,
        key_lengths: &[],
        formats: RSA_FORMATS,
        required_params: &["hash"],
    },
    signature(Algorithm::Ecdsa, &["namedCurve", "hash"]),
    agreement(Algorithm::Ecdh, &["namedCurve", "public"]),
    signature(Algorithm::Ed25519, &[]),
    agreement(Algorithm::X25519, &["public"]),
    kdf(Algorithm::Hkdf, &["hash", "salt", "info"]),
    kdf(Algorithm::Pbkdf2, &["hash", "salt", "iterations"]),
];

/// Look up an algorithm by (case-insensitive) name.
pub fn lookup(name: &str) -> CryptoResult<&'static AlgorithmSpec> {
    spec_for(name.parse()?)
}

pub fn spec_for(algorithm: Algorithm) -> CryptoResult<&'static AlgorithmSpec> {
    REGISTRY
        .iter()
        .find(|spec| spec.algorithm == algorithm)
        .ok_or_else(|| CryptoError::UnsupportedAlgorithm(algorithm.name().to_string()))
}

/// Typed parameters for one operation.
pub trait OperationParams {
    /// Algorithm these parameters belong to.
    fn algorithm(&self) -> Algorithm;

    /// Structural checks that need no key material.
    fn validate(&self, config: &EngineConfig) -> CryptoResult<()>;
}

/// Check `params` against `spec` for `operation`: operation supported,
/// parameters belong to this algorithm, parameters well-formed.
pub fn validate_params<P: OperationParams + ?Sized>(
    spec: &AlgorithmSpec,
    operation: Operation,
    params: &P,
    config: &EngineConfig,
) -> CryptoResult<()> {
    spec.ensure_supports(operation)?;
    if params.algorithm() != spec.algorithm {
        return Err(CryptoError::invalid_params(format!(
            "{} parameters supplied for {}",
            params.algorithm(),
            spec.algorithm
        )));
    }
    params.validate(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_algorithm_has_an_entry() {
        for alg in Algorithm::ALL {
            let spec = spec_for(alg).unwrap();
            assert_eq!(spec.algorithm, alg);
        }
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let spec = lookup("aes-gcm").unwrap();
        assert_eq!(spec.algorithm, Algorithm::AesGcm);
        assert!(matches!(
            lookup("ChaCha20-Poly1305"),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_operation_support() {
        let hkdf = spec_for(Algorithm::Hkdf).unwrap();
        assert!(hkdf.supports(Operation::DeriveBits));
        assert!(matches!(
            hkdf.ensure_supports(Operation::GenerateKey),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));

        let kw = spec_for(Algorithm::AesKw).unwrap();
        assert!(!kw.supports(Operation::Encrypt));
        assert!(kw.supports(Operation::WrapKey));
    }

    #[test]
    fn test_usage_partition() {
        let oaep = spec_for(Algorithm::RsaOaep).unwrap();
        let requested = KeyUsages::of(&[KeyUsage::Encrypt, KeyUsage::Decrypt]);
        assert!(oaep.ensure_usages(requested).is_ok());
        assert!(oaep.ensure_usages_for(KeyType::Public, requested).is_err());
        assert!(oaep
            .ensure_usages_for(KeyType::Private, KeyUsages::of(&[KeyUsage::Decrypt]))
            .is_ok());

        let ecdh = spec_for(Algorithm::Ecdh).unwrap();
        assert!(matches!(
            ecdh.ensure_usages(KeyUsages::of(&[KeyUsage::Sign])),
            Err(CryptoError::InvalidUsage(_))
        ));
    }

    #[test]
    fn test_formats() {
        assert!(spec_for(Algorithm::Pbkdf2).unwrap().supports_format(KeyFormat::Raw));
        assert!(!spec_for(Algorithm::Pbkdf2).unwrap().supports_format(KeyFormat::Jwk));
        assert!(!spec_for(Algorithm::RsaPss).unwrap().supports_format(KeyFormat::Raw));
    }
}
