//! Web Cryptography API engine.
//!
//! Implements the operations of the W3C `SubtleCrypto` interface over a
//! closed set of algorithms:
//! - Digest: SHA-1, SHA-256, SHA-384, SHA-512
//! - Ciphers: AES-GCM, AES-CBC, AES-CTR, RSA-OAEP
//! - Key wrap: AES-KW, or any cipher above
//! - Signatures and MACs: HMAC, RSASSA-PKCS1-v1_5, RSA-PSS, ECDSA, Ed25519
//! - Derivation: HKDF, PBKDF2, ECDH, X25519
//!
//! Keys are opaque [`CryptoKey`] values carrying their algorithm, type,
//! extractable flag and permitted usages. Every operation checks those before
//! touching key material, and non-extractable keys never leave the engine.
//!
//! # Example
//!
//! ```rust
//! use webcrypto::{CipherParams, CryptoEngine, GeneratedKey, KeyGenParams, KeyUsage, KeyUsages, Algorithm};
//!
//! # fn main() -> Result<(), webcrypto::CryptoError> {
//! let engine = CryptoEngine::default();
//! let usages = KeyUsages::of(&[KeyUsage::Encrypt, KeyUsage::Decrypt]);
//! let GeneratedKey::Secret(key) = engine.generate_key(
//!     &KeyGenParams::Aes { algorithm: Algorithm::AesGcm, length: 256 },
//!     false,
//!     usages,
//! )? else {
//!     unreachable!("AES keys are secret keys");
//! };
//!
//! let iv = engine.get_random_values(12)?;
//! let params = CipherParams::AesGcm { iv, additional_data: None, tag_length: None };
//! let sealed = engine.encrypt(&params, &key, b"hello")?;
//! assert_eq!(engine.decrypt(&params, &key, &sealed)?, b"hello");
//! # Ok(())
//! # }
//! ```

pub mod abort;
pub mod algorithm;
pub mod cipher;
pub mod config;
pub mod constant_time;
pub mod derive;
pub mod digest;
pub mod engine;
pub mod error;
pub mod jwk;
pub mod key;
pub mod keys;
pub mod params;
pub mod random;
pub mod registry;
pub mod signature;

pub use abort::AbortSignal;
pub use algorithm::{Algorithm, HashAlgorithm, KeyFormat, NamedCurve, Operation};
pub use config::EngineConfig;
pub use digest::DigestContext;
pub use engine::{CryptoEngine, OperationRequest, OperationResult};
pub use error::{CryptoError, CryptoResult, ErrorKind};
pub use jwk::JsonWebKey;
pub use key::{CryptoKey, CryptoKeyPair, KeyAlgorithm, KeyType, KeyUsage, KeyUsages};
pub use keys::{GeneratedKey, KeyData};
pub use params::{
    CipherParams, DeriveParams, DerivedKeyParams, ImportParams, KeyGenParams, SignParams, WrapParams,
};
pub use registry::{AlgorithmCategory, AlgorithmSpec};
pub use signature::HmacContext;
