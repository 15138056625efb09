//! JSON argument shapes and their conversion into engine parameters.
//!
//! Binary values travel as unpadded base64url strings. Algorithm objects
//! follow the WebCrypto dictionaries (`{"name": "AES-GCM", "iv": ...}`); a
//! bare string is accepted wherever only a name is needed.

use crate::error::{ChannelError, ChannelResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;
use uuid::Uuid;
use webcrypto::{
    Algorithm, CipherParams, CryptoError, CryptoKey, CryptoKeyPair, DeriveParams, DerivedKeyParams, HashAlgorithm,
    ImportParams, KeyAlgorithm, KeyGenParams, KeyType, KeyUsages, NamedCurve, SignParams, WrapParams,
};

/// Bytes carried as a base64url string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Serialize for Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// `"SHA-256"` or `{"name": "SHA-256"}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NameRef {
    Name(String),
    Object { name: String },
}

impl NameRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Object { name } => name,
        }
    }

    fn hash(&self) -> ChannelResult<HashAlgorithm> {
        Ok(HashAlgorithm::from_str(self.name())?)
    }
}

/// A WebCrypto algorithm dictionary. Which members matter depends on
/// `name` and the operation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgorithmDto {
    pub name: String,
    pub hash: Option<NameRef>,
    pub length: Option<usize>,
    pub modulus_length: Option<usize>,
    pub public_exponent: Option<Bytes>,
    pub named_curve: Option<String>,
    pub iv: Option<Bytes>,
    pub additional_data: Option<Bytes>,
    pub tag_length: Option<usize>,
    pub counter: Option<Bytes>,
    pub label: Option<Bytes>,
    pub salt_length: Option<usize>,
    pub salt: Option<Bytes>,
    pub info: Option<Bytes>,
    pub iterations: Option<u32>,
    /// Handle of the peer public key for ECDH and X25519.
    pub public: Option<Uuid>,
}

/// Either a dictionary or a bare algorithm name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AlgorithmArg {
    Name(String),
    Dict(AlgorithmDto),
}

impl AlgorithmArg {
    pub fn into_dto(self) -> AlgorithmDto {
        match self {
            Self::Name(name) => AlgorithmDto {
                name,
                ..AlgorithmDto::default()
            },
            Self::Dict(dto) => dto,
        }
    }
}

fn missing(algorithm: Algorithm, member: &str) -> ChannelError {
    CryptoError::InvalidParams(format!("{algorithm} requires `{member}`")).into()
}

fn unsupported_for(algorithm: Algorithm, operation: &str) -> ChannelError {
    CryptoError::UnsupportedAlgorithm(format!("{algorithm} does not support {operation}")).into()
}

impl AlgorithmDto {
    pub fn algorithm(&self) -> ChannelResult<Algorithm> {
        Ok(Algorithm::from_str(&self.name)?)
    }

    fn hash_member(&self, algorithm: Algorithm) -> ChannelResult<HashAlgorithm> {
        self.hash.as_ref().ok_or_else(|| missing(algorithm, "hash"))?.hash()
    }

    fn curve_member(&self, algorithm: Algorithm) -> ChannelResult<NamedCurve> {
        let curve = self.named_curve.as_deref().ok_or_else(|| missing(algorithm, "namedCurve"))?;
        Ok(NamedCurve::from_str(curve)?)
    }

    fn bytes_member(member: &Option<Bytes>, algorithm: Algorithm, name: &str) -> ChannelResult<Vec<u8>> {
        member
            .as_ref()
            .map(|b| b.0.clone())
            .ok_or_else(|| missing(algorithm, name))
    }

    pub fn key_gen_params(&self) -> ChannelResult<KeyGenParams> {
        let algorithm = self.algorithm()?;
        match algorithm {
            Algorithm::AesGcm | Algorithm::AesCbc | Algorithm::AesCtr | Algorithm::AesKw => Ok(KeyGenParams::Aes {
                algorithm,
                length: self.length.ok_or_else(|| missing(algorithm, "length"))?,
            }),
            Algorithm::Hmac => Ok(KeyGenParams::Hmac {
                hash: self.hash_member(algorithm)?,
                length: self.length,
            }),
            Algorithm::RsassaPkcs1V15 | Algorithm::RsaPss | Algorithm::RsaOaep => Ok(KeyGenParams::Rsa {
                algorithm,
                modulus_length: self.modulus_length.ok_or_else(|| missing(algorithm, "modulusLength"))?,
                public_exponent: Self::bytes_member(&self.public_exponent, algorithm, "publicExponent")?,
                hash: self.hash_member(algorithm)?,
            }),
            Algorithm::Ecdsa | Algorithm::Ecdh => Ok(KeyGenParams::Ec {
                algorithm,
                named_curve: self.curve_member(algorithm)?,
            }),
            Algorithm::Ed25519 => Ok(KeyGenParams::Ed25519),
            Algorithm::X25519 => Ok(KeyGenParams::X25519),
            other => Err(unsupported_for(other, "generateKey")),
        }
    }

    pub fn import_params(&self) -> ChannelResult<ImportParams> {
        let algorithm = self.algorithm()?;
        match algorithm {
            Algorithm::AesGcm | Algorithm::AesCbc | Algorithm::AesCtr | Algorithm::AesKw => {
                Ok(ImportParams::Aes { algorithm })
            }
            Algorithm::Hmac => Ok(ImportParams::Hmac {
                hash: self.hash_member(algorithm)?,
                length: self.length,
            }),
            Algorithm::RsassaPkcs1V15 | Algorithm::RsaPss | Algorithm::RsaOaep => Ok(ImportParams::Rsa {
                algorithm,
                hash: self.hash_member(algorithm)?,
            }),
            Algorithm::Ecdsa | Algorithm::Ecdh => Ok(ImportParams::Ec {
                algorithm,
                named_curve: self.curve_member(algorithm)?,
            }),
            Algorithm::Ed25519 => Ok(ImportParams::Ed25519),
            Algorithm::X25519 => Ok(ImportParams::X25519),
            Algorithm::Hkdf => Ok(ImportParams::Hkdf),
            Algorithm::Pbkdf2 => Ok(ImportParams::Pbkdf2),
            other => Err(unsupported_for(other, "importKey")),
        }
    }

    pub fn cipher_params(&self) -> ChannelResult<CipherParams> {
        let algorithm = self.algorithm()?;
        match algorithm {
            Algorithm::AesGcm => Ok(CipherParams::AesGcm {
                iv: Self::bytes_member(&self.iv, algorithm, "iv")?,
                additional_data: self.additional_data.clone().map(Bytes::into_inner),
                tag_length: self.tag_length,
            }),
            Algorithm::AesCbc => Ok(CipherParams::AesCbc {
                iv: Self::bytes_member(&self.iv, algorithm, "iv")?,
            }),
            Algorithm::AesCtr => {
                let length = self.length.ok_or_else(|| missing(algorithm, "length"))?;
                Ok(CipherParams::AesCtr {
                    counter: Self::bytes_member(&self.counter, algorithm, "counter")?,
                    length: u32::try_from(length)
                        .map_err(|_| CryptoError::InvalidParams(format!("counter length {length} out of range")))?,
                })
            }
            Algorithm::RsaOaep => Ok(CipherParams::RsaOaep {
                label: self.label.clone().map(Bytes::into_inner),
            }),
            other => Err(unsupported_for(other, "encrypt")),
        }
    }

    pub fn sign_params(&self) -> ChannelResult<SignParams> {
        let algorithm = self.algorithm()?;
        match algorithm {
            Algorithm::Hmac => Ok(SignParams::Hmac),
            Algorithm::RsassaPkcs1V15 => Ok(SignParams::RsassaPkcs1V15),
            Algorithm::RsaPss => Ok(SignParams::RsaPss {
                salt_length: self.salt_length.ok_or_else(|| missing(algorithm, "saltLength"))?,
            }),
            Algorithm::Ecdsa => Ok(SignParams::Ecdsa {
                hash: self.hash_member(algorithm)?,
            }),
            Algorithm::Ed25519 => Ok(SignParams::Ed25519),
            other => Err(unsupported_for(other, "sign")),
        }
    }

    /// `peer` is the key named by `public`, already resolved by the caller.
    pub fn derive_params<'a>(&self, peer: Option<&'a CryptoKey>) -> ChannelResult<DeriveParams<'a>> {
        let algorithm = self.algorithm()?;
        match algorithm {
            Algorithm::Hkdf => Ok(DeriveParams::Hkdf {
                hash: self.hash_member(algorithm)?,
                salt: Self::bytes_member(&self.salt, algorithm, "salt")?,
                info: Self::bytes_member(&self.info, algorithm, "info")?,
            }),
            Algorithm::Pbkdf2 => Ok(DeriveParams::Pbkdf2 {
                hash: self.hash_member(algorithm)?,
                salt: Self::bytes_member(&self.salt, algorithm, "salt")?,
                iterations: self.iterations.ok_or_else(|| missing(algorithm, "iterations"))?,
            }),
            Algorithm::Ecdh => Ok(DeriveParams::Ecdh {
                public: peer.ok_or_else(|| missing(algorithm, "public"))?,
            }),
            Algorithm::X25519 => Ok(DeriveParams::X25519 {
                public: peer.ok_or_else(|| missing(algorithm, "public"))?,
            }),
            other => Err(unsupported_for(other, "deriveBits")),
        }
    }

    pub fn derived_key_params(&self) -> ChannelResult<DerivedKeyParams> {
        let algorithm = self.algorithm()?;
        match algorithm {
            Algorithm::AesGcm | Algorithm::AesCbc | Algorithm::AesCtr | Algorithm::AesKw => {
                Ok(DerivedKeyParams::Aes {
                    algorithm,
                    length: self.length.ok_or_else(|| missing(algorithm, "length"))?,
                })
            }
            Algorithm::Hmac => Ok(DerivedKeyParams::Hmac {
                hash: self.hash_member(algorithm)?,
                length: self.length,
            }),
            Algorithm::Hkdf => Ok(DerivedKeyParams::Hkdf),
            Algorithm::Pbkdf2 => Ok(DerivedKeyParams::Pbkdf2),
            other => Err(unsupported_for(other, "deriveKey")),
        }
    }

    pub fn wrap_params(&self) -> ChannelResult<WrapParams> {
        if self.algorithm()? == Algorithm::AesKw {
            Ok(WrapParams::AesKw)
        } else {
            self.cipher_params().map(WrapParams::Cipher)
        }
    }
}

/// What the host learns about a stored key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDescriptor {
    pub handle: Uuid,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub extractable: bool,
    pub algorithm: KeyAlgorithm,
    pub usages: KeyUsages,
}

impl KeyDescriptor {
    pub fn new(handle: Uuid, key: &CryptoKey) -> Self {
        Self {
            handle,
            key_type: key.key_type(),
            extractable: key.extractable(),
            algorithm: key.algorithm().clone(),
            usages: key.usages(),
        }
    }
}

/// Descriptors for both halves of a generated pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPairDescriptor {
    pub public_key: KeyDescriptor,
    pub private_key: KeyDescriptor,
}

impl KeyPairDescriptor {
    pub fn new(public: Uuid, private: Uuid, pair: &CryptoKeyPair) -> Self {
        Self {
            public_key: KeyDescriptor::new(public, &pair.public_key),
            private_key: KeyDescriptor::new(private, &pair.private_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dto(value: serde_json::Value) -> AlgorithmDto {
        serde_json::from_value::<AlgorithmArg>(value).unwrap().into_dto()
    }

    #[test]
    fn test_bytes_are_base64url() {
        let bytes: Bytes = serde_json::from_value(json!("AQID_w")).unwrap();
        assert_eq!(bytes.0, vec![1, 2, 3, 255]);
        assert_eq!(serde_json::to_value(&bytes).unwrap(), json!("AQID_w"));
        assert!(serde_json::from_value::<Bytes>(json!("!!")).is_err());
    }

    #[test]
    fn test_gcm_params() {
        let params = dto(json!({"name": "aes-gcm", "iv": "AAAAAAAAAAAAAAAA", "tagLength": 96}))
            .cipher_params()
            .unwrap();
        assert_eq!(
            params,
            CipherParams::AesGcm {
                iv: vec![0; 12],
                additional_data: None,
                tag_length: Some(96),
            }
        );
    }

    #[test]
    fn test_hash_as_string_or_object() {
        let a = dto(json!({"name": "HMAC", "hash": "SHA-256"})).key_gen_params().unwrap();
        let b = dto(json!({"name": "HMAC", "hash": {"name": "SHA-256"}})).key_gen_params().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_member_is_invalid_params() {
        let err = dto(json!({"name": "AES-CBC"})).cipher_params().unwrap_err();
        assert!(matches!(err, ChannelError::Crypto(CryptoError::InvalidParams(_))));
    }

    #[test]
    fn test_unknown_algorithm() {
        let err = dto(json!("MD5")).sign_params().unwrap_err();
        assert!(matches!(err, ChannelError::Crypto(CryptoError::UnsupportedAlgorithm(_))));
        let err = dto(json!("SHA-256")).sign_params().unwrap_err();
        assert!(matches!(err, ChannelError::Crypto(CryptoError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_wrap_params() {
        assert_eq!(dto(json!("AES-KW")).wrap_params().unwrap(), WrapParams::AesKw);
        assert!(matches!(
            dto(json!({"name": "RSA-OAEP"})).wrap_params().unwrap(),
            WrapParams::Cipher(CipherParams::RsaOaep { label: None })
        ));
    }
}
