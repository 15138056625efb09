//! Key management: generate, import, export, wrap and unwrap.
//!
//! Every path checks the registry and the requested usages before any key
//! material is created or decoded, and export refuses non-extractable keys
//! before looking at the format.

pub(crate) mod ec;
pub(crate) mod okp;
pub(crate) mod rsa;
pub(crate) mod secret;
mod wrap;

pub use wrap::{unwrap_key, wrap_key};

use crate::algorithm::{Algorithm, KeyFormat, Operation};
use crate::config::EngineConfig;
use crate::error::{CryptoError, CryptoResult};
use crate::jwk::JsonWebKey;
use crate::key::{CryptoKey, CryptoKeyPair, KeyType, KeyUsages};
use crate::params::{ImportParams, KeyGenParams};
use crate::registry::{self, AlgorithmSpec, OperationParams};
use tracing::debug;

/// Key data crossing the import/export boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyData {
    /// `raw`, `pkcs8` or `spki` bytes.
    Bytes(Vec<u8>),
    Jwk(JsonWebKey),
}

impl KeyData {
    /// Parse serialized key data in `format`; JWKs are JSON text.
    pub fn from_bytes(format: KeyFormat, bytes: Vec<u8>) -> CryptoResult<Self> {
        match format {
            KeyFormat::Jwk => Ok(Self::Jwk(JsonWebKey::from_json(&bytes)?)),
            _ => Ok(Self::Bytes(bytes)),
        }
    }

    /// Serialized form; JWKs become compact JSON.
    pub fn into_bytes(self) -> CryptoResult<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Jwk(jwk) => jwk.to_json(),
        }
    }

    pub(crate) fn bytes(&self) -> CryptoResult<&[u8]> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Jwk(_) => Err(CryptoError::data("expected binary key data, got a JWK")),
        }
    }

    pub(crate) fn jwk(&self) -> CryptoResult<&JsonWebKey> {
        match self {
            Self::Jwk(jwk) => Ok(jwk),
            Self::Bytes(_) => Err(CryptoError::data("expected a JWK")),
        }
    }
}

/// Output of `generate_key`: a single secret key or a key pair.
#[derive(Debug)]
pub enum GeneratedKey {
    Secret(CryptoKey),
    Pair(CryptoKeyPair),
}

/// Secret and private keys must be usable for something.
fn ensure_not_empty(key_type: KeyType, usages: KeyUsages) -> CryptoResult<()> {
    if key_type != KeyType::Public && usages.is_empty() {
        return Err(CryptoError::InvalidUsage(format!(
            "a {} key needs at least one usage",
            key_type.name()
        )));
    }
    Ok(())
}

/// Split requested usages between the halves of a key pair.
fn split_pair_usages(spec: &AlgorithmSpec, usages: KeyUsages) -> CryptoResult<(KeyUsages, KeyUsages)> {
    let public = usages.intersection(spec.public_usages);
    let private = usages.intersection(spec.private_usages);
    ensure_not_empty(KeyType::Private, private)?;
    Ok((public, private))
}

pub fn generate_key(
    params: &KeyGenParams,
    extractable: bool,
    usages: KeyUsages,
    config: &EngineConfig,
) -> CryptoResult<GeneratedKey> {
    let spec = registry::spec_for(params.algorithm())?;
    debug!(algorithm = spec.algorithm.name(), "generate_key");
    registry::validate_params(spec, Operation::GenerateKey, params, config)?;
    spec.ensure_usages(usages)?;

    match params {
        KeyGenParams::Aes { algorithm, length } => {
            ensure_not_empty(KeyType::Secret, usages)?;
            secret::generate_aes(*algorithm, *length, extractable, usages).map(GeneratedKey::Secret)
        }
        KeyGenParams::Hmac { hash, length } => {
            ensure_not_empty(KeyType::Secret, usages)?;
            secret::generate_hmac(*hash, *length, extractable, usages).map(GeneratedKey::Secret)
        }
        KeyGenParams::Rsa {
            algorithm,
            modulus_length,
            public_exponent,
            hash,
        } => {
            let (public, private) = split_pair_usages(spec, usages)?;
            rsa::generate(
                *algorithm,
                *modulus_length,
                public_exponent,
                *hash,
                extractable,
                public,
                private,
            )
            .map(GeneratedKey::Pair)
        }
        KeyGenParams::Ec { algorithm, named_curve } => {
            let (public, private) = split_pair_usages(spec, usages)?;
            Ok(GeneratedKey::Pair(ec::generate(
                *algorithm,
                *named_curve,
                extractable,
                public,
                private,
            )))
        }
        KeyGenParams::Ed25519 | KeyGenParams::X25519 => {
            let (public, private) = split_pair_usages(spec, usages)?;
            Ok(GeneratedKey::Pair(okp::generate(
                spec.algorithm,
                extractable,
                public,
                private,
            )))
        }
    }
}

pub fn import_key(
    format: KeyFormat,
    data: &KeyData,
    params: &ImportParams,
    extractable: bool,
    usages: KeyUsages,
    config: &EngineConfig,
) -> CryptoResult<CryptoKey> {
    let spec = registry::spec_for(params.algorithm())?;
    debug!(algorithm = spec.algorithm.name(), format = format.name(), "import_key");
    registry::validate_params(spec, Operation::ImportKey, params, config)?;
    if !spec.supports_format(format) {
        return Err(CryptoError::UnsupportedFormat(format!(
            "{} keys cannot be imported as {format}",
            spec.algorithm
        )));
    }
    spec.ensure_usages(usages)?;

    let key = match params {
        ImportParams::Aes { algorithm } => {
            secret::import_aes(format, data, *algorithm, extractable, usages)?
        }
        ImportParams::Hmac { hash, length } => {
            secret::import_hmac(format, data, *hash, *length, extractable, usages)?
        }
        ImportParams::Hkdf | ImportParams::Pbkdf2 => {
            secret::import_kdf(format, data, spec.algorithm, extractable, usages)?
        }
        ImportParams::Rsa { algorithm, hash } => {
            rsa::import(format, data, *algorithm, *hash, extractable, usages, config)?
        }
        ImportParams::Ec { algorithm, named_curve } => {
            ec::import(format, data, *algorithm, *named_curve, extractable, usages)?
        }
        ImportParams::Ed25519 | ImportParams::X25519 => {
            okp::import(format, data, spec.algorithm, extractable, usages)?
        }
    };

    spec.ensure_usages_for(key.key_type(), usages)?;
    ensure_not_empty(key.key_type(), usages)?;
    Ok(key)
}

pub fn export_key(format: KeyFormat, key: &CryptoKey) -> CryptoResult<KeyData> {
    let algorithm = key.algorithm().name();
    debug!(algorithm = algorithm.name(), format = format.name(), "export_key");

    if !key.extractable() {
        return Err(CryptoError::InvalidAccess("key is not extractable".to_string()));
    }

    let spec = registry::spec_for(algorithm)?;
    spec.ensure_supports(Operation::ExportKey)?;
    if !spec.supports_format(format) {
        return Err(CryptoError::UnsupportedFormat(format!(
            "{algorithm} keys cannot be exported as {format}"
        )));
    }

    let exported = match algorithm {
        Algorithm::Hmac
        | Algorithm::AesGcm
        | Algorithm::AesCbc
        | Algorithm::AesCtr
        | Algorithm::AesKw => secret::export(format, key)?,
        Algorithm::RsassaPkcs1V15 | Algorithm::RsaPss | Algorithm::RsaOaep => rsa::export(format, key)?,
        Algorithm::Ecdsa | Algorithm::Ecdh => ec::export(format, key)?,
        Algorithm::Ed25519 | Algorithm::X25519 => okp::export(format, key)?,
        other => {
            return Err(CryptoError::UnsupportedFormat(format!(
                "{other} keys cannot be exported"
            )))
        }
    };

    Ok(match exported {
        KeyData::Jwk(jwk) => KeyData::Jwk(jwk.with_metadata(key.usages(), key.extractable())),
        bytes @ KeyData::Bytes(_) => bytes,
    })
}

/// Fail with `UnsupportedFormat` for a format the key type has no encoding in.
pub(crate) fn format_mismatch(format: KeyFormat, key_type: KeyType) -> CryptoError {
    CryptoError::UnsupportedFormat(format!(
        "{format} is not available for {} keys",
        key_type.name()
    ))
}
