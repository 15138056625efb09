//! Algorithm identifiers.
//!
//! Every algorithm the engine understands is a variant of [`Algorithm`];
//! adding one means adding a variant here and an entry in
//! [`crate::registry`]. Names follow the Web Cryptography API and are
//! matched case-insensitively.

use crate::error::CryptoError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "SHA-1")]
    Sha1,
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[serde(rename = "SHA-512")]
    Sha512,
    #[serde(rename = "HMAC")]
    Hmac,
    #[serde(rename = "AES-GCM")]
    AesGcm,
    #[serde(rename = "AES-CBC")]
    AesCbc,
    #[serde(rename = "AES-CTR")]
    AesCtr,
    #[serde(rename = "AES-KW")]
    AesKw,
    #[serde(rename = "RSASSA-PKCS1-v1_5")]
    RsassaPkcs1V15,
    #[serde(rename = "RSA-PSS")]
    RsaPss,
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,
    #[serde(rename = "ECDSA")]
    Ecdsa,
    #[serde(rename = "ECDH")]
    Ecdh,
    #[serde(rename = "Ed25519")]
    Ed25519,
    #[serde(rename = "X25519")]
    X25519,
    #[serde(rename = "HKDF")]
    Hkdf,
    #[serde(rename = "PBKDF2")]
    Pbkdf2,
}

impl Algorithm {
    pub const ALL: [Algorithm; 18] = [
        Self::Sha1,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
        Self::Hmac,
        Self::AesGcm,
        Self::AesCbc,
        Self::AesCtr,
        Self::AesKw,
        Self::RsassaPkcs1V15,
        Self::RsaPss,
        Self::RsaOaep,
        Self::Ecdsa,
        Self::Ecdh,
        Self::Ed25519,
        Self::X25519,
        Self::Hkdf,
        Self::Pbkdf2,
    ];

    /// Canonical Web Cryptography name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
            Self::Hmac => "HMAC",
            Self::AesGcm => "AES-GCM",
            Self::AesCbc => "AES-CBC",
            Self::AesCtr => "AES-CTR",
            Self::AesKw => "AES-KW",
            Self::RsassaPkcs1V15 => "RSASSA-PKCS1-v1_5",
            Self::RsaPss => "RSA-PSS",
            Self::RsaOaep => "RSA-OAEP",
            Self::Ecdsa => "ECDSA",
            Self::Ecdh => "ECDH",
            Self::Ed25519 => "Ed25519",
            Self::X25519 => "X25519",
            Self::Hkdf => "HKDF",
            Self::Pbkdf2 => "PBKDF2",
        }
    }

    pub const fn is_aes(self) -> bool {
        matches!(self, Self::AesGcm | Self::AesCbc | Self::AesCtr | Self::AesKw)
    }

    pub const fn is_rsa(self) -> bool {
        matches!(self, Self::RsassaPkcs1V15 | Self::RsaPss | Self::RsaOaep)
    }

    pub const fn is_ec(self) -> bool {
        matches!(self, Self::Ecdsa | Self::Ecdh)
    }

    pub const fn is_okp(self) -> bool {
        matches!(self, Self::Ed25519 | Self::X25519)
    }

    /// The hash this identifier names, if it is a digest algorithm.
    pub const fn as_hash(self) -> Option<HashAlgorithm> {
        match self {
            Self::Sha1 => Some(HashAlgorithm::Sha1),
            Self::Sha256 => Some(HashAlgorithm::Sha256),
            Self::Sha384 => Some(HashAlgorithm::Sha384),
            Self::Sha512 => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }
}

impl FromStr for Algorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(s.to_string()))
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hash functions usable standalone and as a parameter of HMAC, RSA,
/// ECDSA, HKDF and PBKDF2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "SHA-1")]
    Sha1,
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl HashAlgorithm {
    pub const fn name(self) -> &'static str {
        self.algorithm().name()
    }

    pub const fn algorithm(self) -> Algorithm {
        match self {
            Self::Sha1 => Algorithm::Sha1,
            Self::Sha256 => Algorithm::Sha256,
            Self::Sha384 => Algorithm::Sha384,
            Self::Sha512 => Algorithm::Sha512,
        }
    }

    /// Output length in bytes.
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Internal block size in bytes.
    pub const fn block_len(self) -> usize {
        match self {
            Self::Sha1 | Self::Sha256 => 64,
            Self::Sha384 | Self::Sha512 => 128,
        }
    }

    /// Suffix used in JWK `alg` values (`HS256`, `RS1`, ...).
    pub(crate) const fn jwk_suffix(self) -> &'static str {
        match self {
            Self::Sha1 => "1",
            Self::Sha256 => "256",
            Self::Sha384 => "384",
            Self::Sha512 => "512",
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Algorithm>()?
            .as_hash()
            .ok_or_else(|| CryptoError::invalid_params(format!("{s} is not a hash algorithm")))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Elliptic curves for ECDSA and ECDH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedCurve {
    #[serde(rename = "P-256")]
    P256,
    #[serde(rename = "P-384")]
    P384,
}

impl NamedCurve {
    pub const fn name(self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
        }
    }

    /// Length of a field element (and of a scalar) in bytes.
    pub const fn field_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
        }
    }
}

impl FromStr for NamedCurve {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P-256" => Ok(Self::P256),
            "P-384" => Ok(Self::P384),
            "P-521" => Err(CryptoError::UnsupportedAlgorithm("curve P-521".to_string())),
            _ => Err(CryptoError::invalid_params(format!("unknown named curve: {s}"))),
        }
    }
}

impl fmt::Display for NamedCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operations an algorithm may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Digest,
    GenerateKey,
    ImportKey,
    ExportKey,
    Encrypt,
    Decrypt,
    Sign,
    Verify,
    DeriveBits,
    DeriveKey,
    WrapKey,
    UnwrapKey,
}

impl Operation {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Digest => "digest",
            Self::GenerateKey => "generateKey",
            Self::ImportKey => "importKey",
            Self::ExportKey => "exportKey",
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::Sign => "sign",
            Self::Verify => "verify",
            Self::DeriveBits => "deriveBits",
            Self::DeriveKey => "deriveKey",
            Self::WrapKey => "wrapKey",
            Self::UnwrapKey => "unwrapKey",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key serialization formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFormat {
    Raw,
    Pkcs8,
    Spki,
    Jwk,
}

impl KeyFormat {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Pkcs8 => "pkcs8",
            Self::Spki => "spki",
            Self::Jwk => "jwk",
        }
    }
}

impl FromStr for KeyFormat {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "pkcs8" => Ok(Self::Pkcs8),
            "spki" => Ok(Self::Spki),
            "jwk" => Ok(Self::Jwk),
            _ => Err(CryptoError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
