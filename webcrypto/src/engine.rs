//! `CryptoEngine`: the call surface a host adapter talks to.
//!
//! Each method validates, performs one operation and returns. The engine
//! keeps no state beyond its configuration, so one instance can serve any
//! number of threads.

use crate::abort::AbortSignal;
use crate::algorithm::{HashAlgorithm, KeyFormat, Operation};
use crate::cipher;
use crate::config::EngineConfig;
use crate::derive;
use crate::digest::{self, DigestContext};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{CryptoKey, CryptoKeyPair, KeyUsages};
use crate::keys::{self, GeneratedKey, KeyData};
use crate::params::{CipherParams, DeriveParams, DerivedKeyParams, ImportParams, KeyGenParams, SignParams, WrapParams};
use crate::random;
use crate::registry;
use crate::signature::{self, HmacContext};

#[derive(Debug, Clone, Default)]
pub struct CryptoEngine {
    config: EngineConfig,
}

/// One operation with everything it needs.
#[derive(Debug)]
pub enum OperationRequest<'a> {
    Digest {
        algorithm: &'a str,
        data: &'a [u8],
    },
    GenerateKey {
        params: KeyGenParams,
        extractable: bool,
        usages: KeyUsages,
    },
    ImportKey {
        format: KeyFormat,
        data: KeyData,
        params: ImportParams,
        extractable: bool,
        usages: KeyUsages,
    },
    ExportKey {
        format: KeyFormat,
        key: &'a CryptoKey,
    },
    Encrypt {
        params: CipherParams,
        key: &'a CryptoKey,
        data: &'a [u8],
    },
    Decrypt {
        params: CipherParams,
        key: &'a CryptoKey,
        data: &'a [u8],
    },
    Sign {
        params: SignParams,
        key: &'a CryptoKey,
        data: &'a [u8],
    },
    Verify {
        params: SignParams,
        key: &'a CryptoKey,
        data: &'a [u8],
        signature: &'a [u8],
    },
    DeriveBits {
        params: DeriveParams<'a>,
        key: &'a CryptoKey,
        length: Option<usize>,
        abort: Option<AbortSignal>,
    },
    DeriveKey {
        params: DeriveParams<'a>,
        key: &'a CryptoKey,
        derived: DerivedKeyParams,
        extractable: bool,
        usages: KeyUsages,
        abort: Option<AbortSignal>,
    },
    WrapKey {
        format: KeyFormat,
        key: &'a CryptoKey,
        wrapping_key: &'a CryptoKey,
        params: WrapParams,
    },
    UnwrapKey {
        format: KeyFormat,
        wrapped: &'a [u8],
        unwrapping_key: &'a CryptoKey,
        params: WrapParams,
        import_params: ImportParams,
        extractable: bool,
        usages: KeyUsages,
    },
}

impl OperationRequest<'_> {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Digest { .. } => Operation::Digest,
            Self::GenerateKey { .. } => Operation::GenerateKey,
            Self::ImportKey { .. } => Operation::ImportKey,
            Self::ExportKey { .. } => Operation::ExportKey,
            Self::Encrypt { .. } => Operation::Encrypt,
            Self::Decrypt { .. } => Operation::Decrypt,
            Self::Sign { .. } => Operation::Sign,
            Self::Verify { .. } => Operation::Verify,
            Self::DeriveBits { .. } => Operation::DeriveBits,
            Self::DeriveKey { .. } => Operation::DeriveKey,
            Self::WrapKey { .. } => Operation::WrapKey,
            Self::UnwrapKey { .. } => Operation::UnwrapKey,
        }
    }
}

/// Exactly one of these per successful request.
#[derive(Debug)]
pub enum OperationResult {
    Bytes(Vec<u8>),
    Key(CryptoKey),
    KeyPair(CryptoKeyPair),
    Exported(KeyData),
    Verified(bool),
}

impl From<GeneratedKey> for OperationResult {
    fn from(generated: GeneratedKey) -> Self {
        match generated {
            GeneratedKey::Secret(key) => Self::Key(key),
            GeneratedKey::Pair(pair) => Self::KeyPair(pair),
        }
    }
}

impl CryptoEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Engine configured from `WEBCRYPTO_*` environment variables.
    ///
    /// # Errors
    ///
    /// `Configuration` when a variable is malformed or the bounds disagree.
    pub fn from_env() -> CryptoResult<Self> {
        EngineConfig::from_env().map(Self::new)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Hash `data` with the digest algorithm named `algorithm`.
    ///
    /// # Errors
    ///
    /// `UnsupportedAlgorithm` for anything that is not a digest.
    pub fn digest(&self, algorithm: &str, data: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(digest::digest(Self::hash(algorithm)?, data))
    }

    /// Streaming counterpart of [`CryptoEngine::digest`].
    ///
    /// # Errors
    ///
    /// `UnsupportedAlgorithm` for anything that is not a digest.
    pub fn digest_context(&self, algorithm: &str) -> CryptoResult<DigestContext> {
        Ok(DigestContext::new(Self::hash(algorithm)?))
    }

    fn hash(algorithm: &str) -> CryptoResult<HashAlgorithm> {
        let spec = registry::lookup(algorithm)?;
        spec.ensure_supports(Operation::Digest)?;
        spec.algorithm
            .as_hash()
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(format!("{} is not a digest", spec.algorithm)))
    }

    /// # Errors
    ///
    /// See [`keys::generate_key`].
    pub fn generate_key(&self, params: &KeyGenParams, extractable: bool, usages: KeyUsages) -> CryptoResult<GeneratedKey> {
        keys::generate_key(params, extractable, usages, &self.config)
    }

    /// # Errors
    ///
    /// See [`keys::import_key`].
    pub fn import_key(
        &self,
        format: KeyFormat,
        data: &KeyData,
        params: &ImportParams,
        extractable: bool,
        usages: KeyUsages,
    ) -> CryptoResult<CryptoKey> {
        keys::import_key(format, data, params, extractable, usages, &self.config)
    }

    /// # Errors
    ///
    /// `InvalidAccess` for a non-extractable key, `UnsupportedFormat` when
    /// the key has no encoding in `format`.
    pub fn export_key(&self, format: KeyFormat, key: &CryptoKey) -> CryptoResult<KeyData> {
        keys::export_key(format, key)
    }

    /// # Errors
    ///
    /// See [`cipher::encrypt`].
    pub fn encrypt(&self, params: &CipherParams, key: &CryptoKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
        cipher::encrypt(params, key, data, &self.config)
    }

    /// # Errors
    ///
    /// See [`cipher::decrypt`].
    pub fn decrypt(&self, params: &CipherParams, key: &CryptoKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
        cipher::decrypt(params, key, data, &self.config)
    }

    /// # Errors
    ///
    /// See [`signature::sign`].
    pub fn sign(&self, params: &SignParams, key: &CryptoKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
        signature::sign(params, key, data, &self.config)
    }

    /// # Errors
    ///
    /// See [`signature::verify`].
    pub fn verify(&self, params: &SignParams, key: &CryptoKey, data: &[u8], signature: &[u8]) -> CryptoResult<bool> {
        signature::verify(params, key, data, signature, &self.config)
    }

    /// Streaming HMAC over `key`.
    ///
    /// # Errors
    ///
    /// See [`HmacContext::new`].
    pub fn hmac_context(&self, key: &CryptoKey) -> CryptoResult<HmacContext> {
        HmacContext::new(key)
    }

    /// # Errors
    ///
    /// See [`derive::derive_bits`].
    pub fn derive_bits(
        &self,
        params: &DeriveParams<'_>,
        base_key: &CryptoKey,
        length: Option<usize>,
        abort: Option<&AbortSignal>,
    ) -> CryptoResult<Vec<u8>> {
        derive::derive_bits(params, base_key, length, abort, &self.config)
    }

    /// # Errors
    ///
    /// See [`derive::derive_key`].
    pub fn derive_key(
        &self,
        params: &DeriveParams<'_>,
        base_key: &CryptoKey,
        derived: &DerivedKeyParams,
        extractable: bool,
        usages: KeyUsages,
        abort: Option<&AbortSignal>,
    ) -> CryptoResult<CryptoKey> {
        derive::derive_key(params, base_key, derived, extractable, usages, abort, &self.config)
    }

    /// # Errors
    ///
    /// See [`keys::wrap_key`].
    pub fn wrap_key(
        &self,
        format: KeyFormat,
        key: &CryptoKey,
        wrapping_key: &CryptoKey,
        params: &WrapParams,
    ) -> CryptoResult<Vec<u8>> {
        keys::wrap_key(format, key, wrapping_key, params, &self.config)
    }

    /// # Errors
    ///
    /// See [`keys::unwrap_key`].
    #[allow(clippy::too_many_arguments)]
    pub fn unwrap_key(
        &self,
        format: KeyFormat,
        wrapped: &[u8],
        unwrapping_key: &CryptoKey,
        params: &WrapParams,
        import_params: &ImportParams,
        extractable: bool,
        usages: KeyUsages,
    ) -> CryptoResult<CryptoKey> {
        keys::unwrap_key(
            format,
            wrapped,
            unwrapping_key,
            params,
            import_params,
            extractable,
            usages,
            &self.config,
        )
    }

    /// # Errors
    ///
    /// `QuotaExceeded` above 65 536 bytes.
    pub fn get_random_values(&self, len: usize) -> CryptoResult<Vec<u8>> {
        random::get_random_values(len)
    }

    pub fn random_uuid(&self) -> String {
        random::random_uuid()
    }

    /// Run a request through the matching entry point.
    ///
    /// # Errors
    ///
    /// Whatever that entry point reports.
    pub fn execute(&self, request: OperationRequest<'_>) -> CryptoResult<OperationResult> {
        match request {
            OperationRequest::Digest { algorithm, data } => self.digest(algorithm, data).map(OperationResult::Bytes),
            OperationRequest::GenerateKey {
                params,
                extractable,
                usages,
            } => self.generate_key(&params, extractable, usages).map(OperationResult::from),
            OperationRequest::ImportKey {
                format,
                data,
                params,
                extractable,
                usages,
            } => self
                .import_key(format, &data, &params, extractable, usages)
                .map(OperationResult::Key),
            OperationRequest::ExportKey { format, key } => self.export_key(format, key).map(OperationResult::Exported),
            OperationRequest::Encrypt { params, key, data } => self.encrypt(&params, key, data).map(OperationResult::Bytes),
            OperationRequest::Decrypt { params, key, data } => self.decrypt(&params, key, data).map(OperationResult::Bytes),
            OperationRequest::Sign { params, key, data } => self.sign(&params, key, data).map(OperationResult::Bytes),
            OperationRequest::Verify {
                params,
                key,
                data,
                signature,
            } => self.verify(&params, key, data, signature).map(OperationResult::Verified),
            OperationRequest::DeriveBits {
                params,
                key,
                length,
                abort,
            } => self
                .derive_bits(&params, key, length, abort.as_ref())
                .map(OperationResult::Bytes),
            OperationRequest::DeriveKey {
                params,
                key,
                derived,
                extractable,
                usages,
                abort,
            } => self
                .derive_key(&params, key, &derived, extractable, usages, abort.as_ref())
                .map(OperationResult::Key),
            OperationRequest::WrapKey {
                format,
                key,
                wrapping_key,
                params,
            } => self
                .wrap_key(format, key, wrapping_key, &params)
                .map(OperationResult::Bytes),
            OperationRequest::UnwrapKey {
                format,
                wrapped,
                unwrapping_key,
                params,
                import_params,
                extractable,
                usages,
            } => self
                .unwrap_key(
                    format,
                    wrapped,
                    unwrapping_key,
                    &params,
                    &import_params,
                    extractable,
                    usages,
                )
                .map(OperationResult::Key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyUsage;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_engine_and_keys_are_thread_safe() {
        assert_send_sync::<CryptoEngine>();
        assert_send_sync::<CryptoKey>();
        assert_send_sync::<AbortSignal>();
    }

    #[test]
    fn test_digest_by_name() {
        let engine = CryptoEngine::default();
        let out = engine.digest("sha-256", b"abc").unwrap();
        assert_eq!(
            hex::encode(out),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(matches!(
            engine.digest("AES-GCM", b"abc"),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            engine.digest("MD5", b"abc"),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_execute_dispatches() {
        let engine = CryptoEngine::default();
        let result = engine
            .execute(OperationRequest::GenerateKey {
                params: KeyGenParams::Hmac {
                    hash: HashAlgorithm::Sha256,
                    length: None,
                },
                extractable: false,
                usages: KeyUsages::of(&[KeyUsage::Sign, KeyUsage::Verify]),
            })
            .unwrap();
        let OperationResult::Key(key) = result else {
            panic!("expected a secret key");
        };

        let OperationResult::Bytes(tag) = engine
            .execute(OperationRequest::Sign {
                params: SignParams::Hmac,
                key: &key,
                data: b"payload",
            })
            .unwrap()
        else {
            panic!("expected bytes");
        };
        let verified = engine
            .execute(OperationRequest::Verify {
                params: SignParams::Hmac,
                key: &key,
                data: b"payload",
                signature: &tag,
            })
            .unwrap();
        assert!(matches!(verified, OperationResult::Verified(true)));
    }

    #[test]
    fn test_request_operation_names() {
        let request = OperationRequest::Digest {
            algorithm: "SHA-1",
            data: b"",
        };
        assert_eq!(request.operation(), Operation::Digest);
        assert_eq!(request.operation().name(), "digest");
    }
}
