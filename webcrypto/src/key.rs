//! Key object model.
//!
//! A [`CryptoKey`] is immutable once built: its type, algorithm, usages and
//! extractable flag are fixed at creation, and the material it wraps is never
//! handed out except through the export paths in [`crate::keys`].

use crate::algorithm::{Algorithm, HashAlgorithm, NamedCurve};
use crate::error::{CryptoError, CryptoResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// A capability a key must hold before an operation may use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyUsage {
    Encrypt,
    Decrypt,
    Sign,
    Verify,
    DeriveKey,
    DeriveBits,
    WrapKey,
    UnwrapKey,
}

impl KeyUsage {
    pub const ALL: [KeyUsage; 8] = [
        Self::Encrypt,
        Self::Decrypt,
        Self::Sign,
        Self::Verify,
        Self::DeriveKey,
        Self::DeriveBits,
        Self::WrapKey,
        Self::UnwrapKey,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::Sign => "sign",
            Self::Verify => "verify",
            Self::DeriveKey => "deriveKey",
            Self::DeriveBits => "deriveBits",
            Self::WrapKey => "wrapKey",
            Self::UnwrapKey => "unwrapKey",
        }
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl FromStr for KeyUsage {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|usage| usage.name() == s)
            .ok_or_else(|| CryptoError::invalid_params(format!("unknown key usage: {s}")))
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of [`KeyUsage`] values, stored as a bitmask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyUsages(u8);

impl KeyUsages {
    pub const EMPTY: KeyUsages = KeyUsages(0);

    /// Build a set from a list; usable in `const` context for the registry.
    pub const fn of(list: &[KeyUsage]) -> Self {
        let mut bits = 0;
        let mut rest = list;
        while let [usage, tail @ ..] = rest {
            bits |= usage.bit();
            rest = tail;
        }
        Self(bits)
    }

    pub const fn contains(self, usage: KeyUsage) -> bool {
        self.0 & usage.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn is_subset_of(self, other: KeyUsages) -> bool {
        self.0 & !other.0 == 0
    }

    pub const fn intersection(self, other: KeyUsages) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn union(self, other: KeyUsages) -> Self {
        Self(self.0 | other.0)
    }

    pub fn insert(&mut self, usage: KeyUsage) {
        self.0 |= usage.bit();
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Usages in canonical order.
    pub fn iter(self) -> impl Iterator<Item = KeyUsage> {
        KeyUsage::ALL.into_iter().filter(move |usage| self.contains(*usage))
    }

    pub fn to_vec(self) -> Vec<KeyUsage> {
        self.iter().collect()
    }
}

impl FromIterator<KeyUsage> for KeyUsages {
    fn from_iter<I: IntoIterator<Item = KeyUsage>>(iter: I) -> Self {
        let mut usages = Self::EMPTY;
        for usage in iter {
            usages.insert(usage);
        }
        usages
    }
}

impl From<&[KeyUsage]> for KeyUsages {
    fn from(list: &[KeyUsage]) -> Self {
        list.iter().copied().collect()
    }
}

impl fmt::Debug for KeyUsages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for KeyUsages {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for KeyUsages {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let list = Vec::<KeyUsage>::deserialize(deserializer)?;
        Ok(list.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Secret,
    Public,
    Private,
}

impl KeyType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Secret => "secret",
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

/// Algorithm description attached to a key, shaped like the Web Cryptography
/// `KeyAlgorithm` dictionaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum KeyAlgorithm {
    Aes {
        name: Algorithm,
        length: usize,
    },
    Hmac {
        name: Algorithm,
        hash: HashAlgorithm,
        length: usize,
    },
    Rsa {
        name: Algorithm,
        #[serde(rename = "modulusLength")]
        modulus_length: usize,
        #[serde(rename = "publicExponent")]
        public_exponent: u64,
        hash: HashAlgorithm,
    },
    Ec {
        name: Algorithm,
        #[serde(rename = "namedCurve")]
        named_curve: NamedCurve,
    },
    /// Ed25519, X25519, HKDF and PBKDF2 carry no parameters beyond the name.
    Plain { name: Algorithm },
}

impl KeyAlgorithm {
    pub fn name(&self) -> Algorithm {
        match self {
            Self::Aes { name, .. }
            | Self::Hmac { name, .. }
            | Self::Rsa { name, .. }
            | Self::Ec { name, .. }
            | Self::Plain { name } => *name,
        }
    }

    pub fn hash(&self) -> Option<HashAlgorithm> {
        match self {
            Self::Hmac { hash, .. } | Self::Rsa { hash, .. } => Some(*hash),
            _ => None,
        }
    }

    pub fn named_curve(&self) -> Option<NamedCurve> {
        match self {
            Self::Ec { named_curve, .. } => Some(*named_curve),
            _ => None,
        }
    }
}

/// Key material. Never leaves the crate except through export.
pub(crate) enum KeyMaterial {
    Secret(Zeroizing<Vec<u8>>),
    RsaPrivate(Box<rsa::RsaPrivateKey>),
    RsaPublic(Box<rsa::RsaPublicKey>),
    P256Private(p256::SecretKey),
    P256Public(p256::PublicKey),
    P384Private(p384::SecretKey),
    P384Public(p384::PublicKey),
    Ed25519Private(Box<ed25519_dalek::SigningKey>),
    Ed25519Public(ed25519_dalek::VerifyingKey),
    X25519Private(Box<x25519_dalek::StaticSecret>),
    X25519Public(x25519_dalek::PublicKey),
}

impl KeyMaterial {
    pub(crate) fn key_type(&self) -> KeyType {
        match self {
            Self::Secret(_) => KeyType::Secret,
            Self::RsaPrivate(_)
            | Self::P256Private(_)
            | Self::P384Private(_)
            | Self::Ed25519Private(_)
            | Self::X25519Private(_) => KeyType::Private,
            Self::RsaPublic(_)
            | Self::P256Public(_)
            | Self::P384Public(_)
            | Self::Ed25519Public(_)
            | Self::X25519Public(_) => KeyType::Public,
        }
    }
}

/// A cryptographic key with its metadata.
///
/// Not `Clone`: a key has one owner, and sharing across threads goes through
/// `Arc`.
pub struct CryptoKey {
    algorithm: KeyAlgorithm,
    extractable: bool,
    usages: KeyUsages,
    material: KeyMaterial,
}

impl CryptoKey {
    pub(crate) fn new(
        algorithm: KeyAlgorithm,
        extractable: bool,
        usages: KeyUsages,
        material: KeyMaterial,
    ) -> Self {
        Self {
            algorithm,
            extractable,
            usages,
            material,
        }
    }

    pub fn key_type(&self) -> KeyType {
        self.material.key_type()
    }

    pub fn algorithm(&self) -> &KeyAlgorithm {
        &self.algorithm
    }

    pub fn extractable(&self) -> bool {
        self.extractable
    }

    pub fn usages(&self) -> KeyUsages {
        self.usages
    }

    pub fn has_usage(&self, usage: KeyUsage) -> bool {
        self.usages.contains(usage)
    }

    pub(crate) fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// Fails with `InvalidAccess` when the key belongs to another algorithm.
    pub(crate) fn require_algorithm(&self, algorithm: Algorithm) -> CryptoResult<()> {
        if self.algorithm.name() == algorithm {
            Ok(())
        } else {
            Err(CryptoError::InvalidAccess(format!(
                "{} key cannot be used with {}",
                self.algorithm.name(),
                algorithm
            )))
        }
    }

    pub(crate) fn require_usage(&self, usage: KeyUsage) -> CryptoResult<()> {
        if self.has_usage(usage) {
            Ok(())
        } else {
            Err(CryptoError::InvalidUsage(format!(
                "key does not permit {usage}"
            )))
        }
    }

    pub(crate) fn require_type(&self, key_type: KeyType) -> CryptoResult<()> {
        if self.key_type() == key_type {
            Ok(())
        } else {
            Err(CryptoError::InvalidAccess(format!(
                "expected a {} key, got a {} key",
                key_type.name(),
                self.key_type().name()
            )))
        }
    }

    /// Secret bytes for symmetric keys.
    pub(crate) fn secret_bytes(&self) -> CryptoResult<&[u8]> {
        match &self.material {
            KeyMaterial::Secret(bytes) => Ok(bytes.as_slice()),
            _ => Err(CryptoError::InvalidAccess("not a secret key".to_string())),
        }
    }
}

impl fmt::Debug for CryptoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoKey")
            .field("type", &self.key_type())
            .field("algorithm", &self.algorithm)
            .field("extractable", &self.extractable)
            .field("usages", &self.usages)
            .field("material", &"[REDACTED]")
            .finish()
    }
}

/// Result of generating an asymmetric key.
#[derive(Debug)]
pub struct CryptoKeyPair {
    pub public_key: CryptoKey,
    pub private_key: CryptoKey,
}
