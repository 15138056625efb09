//! JSON Web Key representation.
//!
//! Implements the subset of [RFC 7517](https://tools.ietf.org/html/rfc7517)
//! and [RFC 7518](https://tools.ietf.org/html/rfc7518) needed for the `jwk`
//! import/export format. Binary members are base64url without padding.

use crate::algorithm::{Algorithm, HashAlgorithm};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{KeyUsage, KeyUsages};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

pub const KTY_OCT: &str = "oct";
pub const KTY_RSA: &str = "RSA";
pub const KTY_EC: &str = "EC";
pub const KTY_OKP: &str = "OKP";

/// JSON Web Key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type ("oct", "RSA", "EC", "OKP").
    pub kty: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Public key use ("sig" or "enc").
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<bool>,

    /// Symmetric key value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,

    /// RSA modulus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// Private exponent (RSA) or private scalar (EC, OKP).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dp: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub qi: Option<String>,

    /// Curve name ("P-256", "P-384", "Ed25519", "X25519").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

pub fn encode_b64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn decode_b64url(value: &str) -> CryptoResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| CryptoError::data(format!("invalid base64url: {e}")))
}

impl JsonWebKey {
    pub fn new(kty: &str) -> Self {
        Self {
            kty: kty.to_string(),
            ..Self::default()
        }
    }

    pub fn from_json(bytes: &[u8]) -> CryptoResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| CryptoError::data(format!("invalid JWK: {e}")))
    }

    pub fn to_json(&self) -> CryptoResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CryptoError::OperationError(format!("JWK encoding failed: {e}")))
    }

    /// Decode a required base64url member.
    pub fn member(&self, name: &str, value: Option<&String>) -> CryptoResult<Vec<u8>> {
        let value = value.ok_or_else(|| CryptoError::data(format!("JWK is missing \"{name}\"")))?;
        decode_b64url(value)
    }

    /// Stamp `key_ops` and `ext` from the exported key.
    pub(crate) fn with_metadata(mut self, usages: KeyUsages, extractable: bool) -> Self {
        self.key_ops = Some(usages.iter().map(|u| u.name().to_string()).collect());
        self.ext = Some(extractable);
        self
    }

    /// Checks common to every import: `kty`, `alg`, `use`, `key_ops`, `ext`.
    pub(crate) fn check_import(
        &self,
        kty: &str,
        expected_alg: Option<&str>,
        extractable: bool,
        usages: KeyUsages,
    ) -> CryptoResult<()> {
        if self.kty != kty {
            return Err(CryptoError::data(format!(
                "JWK kty must be \"{kty}\", got \"{}\"",
                self.kty
            )));
        }

        if let (Some(alg), Some(expected)) = (self.alg.as_deref(), expected_alg) {
            if alg != expected {
                return Err(CryptoError::data(format!(
                    "JWK alg \"{alg}\" does not match \"{expected}\""
                )));
            }
        }

        if let Some(key_use) = self.key_use.as_deref() {
            let allowed = match key_use {
                "sig" => KeyUsages::of(&[KeyUsage::Sign, KeyUsage::Verify]),
                "enc" => KeyUsages::of(&[
                    KeyUsage::Encrypt,
                    KeyUsage::Decrypt,
                    KeyUsage::WrapKey,
                    KeyUsage::UnwrapKey,
                    KeyUsage::DeriveKey,
                    KeyUsage::DeriveBits,
                ]),
                other => return Err(CryptoError::data(format!("unknown JWK use \"{other}\""))),
            };
            if !usages.is_subset_of(allowed) {
                return Err(CryptoError::data(format!(
                    "JWK use \"{key_use}\" is inconsistent with the requested usages"
                )));
            }
        }

        if let Some(key_ops) = &self.key_ops {
            let mut listed = KeyUsages::EMPTY;
            for op in key_ops {
                // Unknown operations are ignored, as in RFC 7517 section 4.3.
                if let Ok(usage) = op.parse::<KeyUsage>() {
                    listed.insert(usage);
                }
            }
            if !usages.is_subset_of(listed) {
                return Err(CryptoError::data(
                    "requested usages are not listed in JWK key_ops",
                ));
            }
        }

        if self.ext == Some(false) && extractable {
            return Err(CryptoError::data(
                "JWK has ext=false but an extractable key was requested",
            ));
        }

        Ok(())
    }
}

/// JWK `alg` value for AES keys of `length` bits.
pub(crate) fn aes_alg(algorithm: Algorithm, length: usize) -> Option<String> {
    let mode = match algorithm {
        Algorithm::AesGcm => "GCM",
        Algorithm::AesCbc => "CBC",
        Algorithm::AesCtr => "CTR",
        Algorithm::AesKw => "KW",
        _ => return None,
    };
    Some(format!("A{length}{mode}"))
}

pub(crate) fn hmac_alg(hash: HashAlgorithm) -> String {
    format!("HS{}", hash.jwk_suffix())
}

pub(crate) fn rsa_alg(algorithm: Algorithm, hash: HashAlgorithm) -> Option<String> {
    match algorithm {
        Algorithm::RsassaPkcs1V15 => Some(format!("RS{}", hash.jwk_suffix())),
        Algorithm::RsaPss => Some(format!("PS{}", hash.jwk_suffix())),
        Algorithm::RsaOaep => Some(match hash {
            HashAlgorithm::Sha1 => "RSA-OAEP".to_string(),
            other => format!("RSA-OAEP-{}", other.jwk_suffix()),
        }),
        _ => None,
    }
}
