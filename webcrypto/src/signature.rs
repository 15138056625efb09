//! Signature engine: HMAC, RSASSA-PKCS1-v1_5, RSA-PSS, ECDSA and Ed25519.
//!
//! `verify` reports a bad signature as `Ok(false)`; only structural problems
//! (wrong key, wrong usage, malformed parameters) are errors.

use crate::algorithm::{Algorithm, HashAlgorithm, Operation};
use crate::config::EngineConfig;
use crate::constant_time::verify_mac;
use crate::digest::{self, dispatch_hash};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{CryptoKey, KeyMaterial, KeyUsage};
use crate::keys::{ec, okp};
use crate::params::SignParams;
use crate::registry::{self, OperationParams};
use ed25519_dalek::{Signer, Verifier};
use hmac::{Mac, SimpleHmac};
use rand::rngs::OsRng;
use rsa::{Pkcs1v15Sign, Pss};
use tracing::debug;

fn key_hash(key: &CryptoKey) -> CryptoResult<HashAlgorithm> {
    key.algorithm()
        .hash()
        .ok_or_else(|| CryptoError::InvalidAccess(format!("{} key has no hash", key.algorithm().name())))
}

fn hmac_tag(key: &CryptoKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut context = HmacContext::keyed(key)?;
    context.update(data);
    Ok(context.finalize())
}

fn check(
    operation: Operation,
    usage: KeyUsage,
    params: &SignParams,
    key: &CryptoKey,
    config: &EngineConfig,
) -> CryptoResult<()> {
    let spec = registry::spec_for(params.algorithm())?;
    registry::validate_params(spec, operation, params, config)?;
    key.require_algorithm(spec.algorithm)?;
    key.require_usage(usage)
}

/// Sign `data` with `key`.
///
/// # Errors
///
/// `InvalidAccess` for a key of another algorithm or type, `InvalidUsage`
/// when the key lacks `sign`, `OperationError` when the primitive rejects the
/// input (for example an RSA-PSS salt too long for the modulus).
pub fn sign(params: &SignParams, key: &CryptoKey, data: &[u8], config: &EngineConfig) -> CryptoResult<Vec<u8>> {
    debug!(algorithm = params.algorithm().name(), len = data.len(), "sign");
    check(Operation::Sign, KeyUsage::Sign, params, key, config)?;

    match params {
        SignParams::Hmac => hmac_tag(key, data),
        SignParams::RsassaPkcs1V15 | SignParams::RsaPss { .. } => {
            let KeyMaterial::RsaPrivate(private) = key.material() else {
                return Err(CryptoError::InvalidAccess("RSA signing needs a private key".to_string()));
            };
            let hash = key_hash(key)?;
            let hashed = digest::digest(hash, data);
            let signed = match params {
                SignParams::RsaPss { salt_length } => dispatch_hash!(hash, H => {
                    private.sign_with_rng(&mut OsRng, Pss::new_with_salt::<H>(*salt_length), &hashed)
                }),
                _ => dispatch_hash!(hash, H => {
                    private.sign_with_rng(&mut OsRng, Pkcs1v15Sign::new::<H>(), &hashed)
                }),
            };
            signed.map_err(|e| CryptoError::OperationError(format!("RSA signing failed: {e}")))
        }
        SignParams::Ecdsa { hash } => ec::sign_prehash(key, &digest::digest(*hash, data)),
        SignParams::Ed25519 => Ok(okp::signing_key(key)?.sign(data).to_bytes().to_vec()),
    }
}

/// Check `signature` over `data`.
///
/// # Errors
///
/// Only for structural problems; a signature that does not match is
/// `Ok(false)`.
pub fn verify(
    params: &SignParams,
    key: &CryptoKey,
    data: &[u8],
    signature: &[u8],
    config: &EngineConfig,
) -> CryptoResult<bool> {
    debug!(algorithm = params.algorithm().name(), len = data.len(), "verify");
    check(Operation::Verify, KeyUsage::Verify, params, key, config)?;

    match params {
        SignParams::Hmac => Ok(verify_mac(&hmac_tag(key, data)?, signature)),
        SignParams::RsassaPkcs1V15 | SignParams::RsaPss { .. } => {
            let KeyMaterial::RsaPublic(public) = key.material() else {
                return Err(CryptoError::InvalidAccess("RSA verification needs a public key".to_string()));
            };
            let hash = key_hash(key)?;
            let hashed = digest::digest(hash, data);
            let verified = match params {
                SignParams::RsaPss { salt_length } => dispatch_hash!(hash, H => {
                    public.verify(Pss::new_with_salt::<H>(*salt_length), &hashed, signature)
                }),
                _ => dispatch_hash!(hash, H => {
                    public.verify(Pkcs1v15Sign::new::<H>(), &hashed, signature)
                }),
            };
            Ok(verified.is_ok())
        }
        SignParams::Ecdsa { hash } => ec::verify_prehash(key, &digest::digest(*hash, data), signature),
        SignParams::Ed25519 => {
            let verifying = okp::verifying_key(key)?;
            let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
                return Ok(false);
            };
            Ok(verifying.verify(data, &signature).is_ok())
        }
    }
}

enum HmacState {
    Sha1(SimpleHmac<sha1::Sha1>),
    Sha256(SimpleHmac<sha2::Sha256>),
    Sha384(SimpleHmac<sha2::Sha384>),
    Sha512(SimpleHmac<sha2::Sha512>),
}

macro_rules! each_state {
    ($state:expr, $mac:ident => $body:expr) => {
        match $state {
            HmacState::Sha1($mac) => $body,
            HmacState::Sha256($mac) => $body,
            HmacState::Sha384($mac) => $body,
            HmacState::Sha512($mac) => $body,
        }
    };
}

/// Streaming HMAC over a key with the `sign` usage.
///
/// `finalize` yields the same tag [`sign`] would for the concatenated input.
pub struct HmacContext {
    hash: HashAlgorithm,
    state: HmacState,
}

impl HmacContext {
    /// # Errors
    ///
    /// `InvalidAccess` for a non-HMAC key, `InvalidUsage` without `sign`.
    pub fn new(key: &CryptoKey) -> CryptoResult<Self> {
        key.require_algorithm(Algorithm::Hmac)?;
        key.require_usage(KeyUsage::Sign)?;
        Self::keyed(key)
    }

    fn keyed(key: &CryptoKey) -> CryptoResult<Self> {
        let hash = key_hash(key)?;
        let secret = key.secret_bytes()?;
        let invalid = |_| CryptoError::data("invalid HMAC key length");
        let state = match hash {
            HashAlgorithm::Sha1 => HmacState::Sha1(SimpleHmac::new_from_slice(secret).map_err(invalid)?),
            HashAlgorithm::Sha256 => HmacState::Sha256(SimpleHmac::new_from_slice(secret).map_err(invalid)?),
            HashAlgorithm::Sha384 => HmacState::Sha384(SimpleHmac::new_from_slice(secret).map_err(invalid)?),
            HashAlgorithm::Sha512 => HmacState::Sha512(SimpleHmac::new_from_slice(secret).map_err(invalid)?),
        };
        Ok(Self { hash, state })
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    pub fn update(&mut self, data: &[u8]) {
        each_state!(&mut self.state, mac => mac.update(data));
    }

    pub fn finalize(self) -> Vec<u8> {
        each_state!(self.state, mac => mac.finalize().into_bytes().to_vec())
    }
}

impl std::fmt::Debug for HmacContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacContext").field("hash", &self.hash).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{KeyFormat, NamedCurve};
    use crate::key::{CryptoKeyPair, KeyUsages};
    use crate::keys::{self, secret, KeyData};
    use crate::params::ImportParams;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn hmac_key(bytes: &[u8], hash: HashAlgorithm) -> CryptoKey {
        keys::import_key(
            KeyFormat::Raw,
            &KeyData::Bytes(bytes.to_vec()),
            &ImportParams::Hmac { hash, length: None },
            false,
            KeyUsages::of(&[KeyUsage::Sign, KeyUsage::Verify]),
            &config(),
        )
        .unwrap()
    }

    // RFC 4231 test case 2.
    #[test]
    fn test_hmac_sha256_known_answer() {
        let key = hmac_key(b"Jefe", HashAlgorithm::Sha256);
        let tag = sign(&SignParams::Hmac, &key, b"what do ya want for nothing?", &config()).unwrap();
        assert_eq!(
            hex::encode(&tag),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
        assert!(verify(&SignParams::Hmac, &key, b"what do ya want for nothing?", &tag, &config()).unwrap());
    }

    #[test]
    fn test_hmac_context_matches_one_shot() {
        let key = secret::generate_hmac(
            HashAlgorithm::Sha384,
            None,
            false,
            KeyUsages::of(&[KeyUsage::Sign]),
        )
        .unwrap();
        let mut context = HmacContext::new(&key).unwrap();
        context.update(b"split ");
        context.update(b"input");
        assert_eq!(
            context.finalize(),
            sign(&SignParams::Hmac, &key, b"split input", &config()).unwrap()
        );
    }

    #[test]
    fn test_hmac_tampered_tag_is_false() {
        let key = hmac_key(&[7; 32], HashAlgorithm::Sha1);
        let mut tag = sign(&SignParams::Hmac, &key, b"data", &config()).unwrap();
        tag[0] ^= 1;
        assert!(!verify(&SignParams::Hmac, &key, b"data", &tag, &config()).unwrap());
        assert!(!verify(&SignParams::Hmac, &key, b"data", &tag[..4], &config()).unwrap());
    }

    fn rsa_pair(algorithm: Algorithm) -> CryptoKeyPair {
        crate::keys::rsa::generate(
            algorithm,
            1024,
            &[0x01, 0x00, 0x01],
            HashAlgorithm::Sha256,
            false,
            KeyUsages::of(&[KeyUsage::Verify]),
            KeyUsages::of(&[KeyUsage::Sign]),
        )
        .unwrap()
    }

    #[test]
    fn test_rsa_pkcs1_round_trip() {
        let pair = rsa_pair(Algorithm::RsassaPkcs1V15);
        let params = SignParams::RsassaPkcs1V15;
        let signature = sign(&params, &pair.private_key, b"message", &config()).unwrap();
        assert_eq!(signature.len(), 128);
        assert!(verify(&params, &pair.public_key, b"message", &signature, &config()).unwrap());
        assert!(!verify(&params, &pair.public_key, b"massage", &signature, &config()).unwrap());
    }

    #[test]
    fn test_rsa_pss_round_trip() {
        let pair = rsa_pair(Algorithm::RsaPss);
        let params = SignParams::RsaPss { salt_length: 32 };
        let signature = sign(&params, &pair.private_key, b"message", &config()).unwrap();
        assert!(verify(&params, &pair.public_key, b"message", &signature, &config()).unwrap());
        assert!(!verify(&params, &pair.public_key, b"message", &signature[1..], &config()).unwrap());
    }

    #[test]
    fn test_pss_salt_too_long() {
        let pair = rsa_pair(Algorithm::RsaPss);
        let params = SignParams::RsaPss { salt_length: 200 };
        assert!(matches!(
            sign(&params, &pair.private_key, b"message", &config()),
            Err(CryptoError::OperationError(_))
        ));
    }

    #[test]
    fn test_ecdsa_round_trip_both_curves() {
        for curve in [NamedCurve::P256, NamedCurve::P384] {
            let pair = ec::generate(
                Algorithm::Ecdsa,
                curve,
                false,
                KeyUsages::of(&[KeyUsage::Verify]),
                KeyUsages::of(&[KeyUsage::Sign]),
            );
            let params = SignParams::Ecdsa {
                hash: HashAlgorithm::Sha384,
            };
            let signature = sign(&params, &pair.private_key, b"message", &config()).unwrap();
            assert_eq!(signature.len(), curve.field_len() * 2);
            assert!(verify(&params, &pair.public_key, b"message", &signature, &config()).unwrap());
            assert!(!verify(&params, &pair.public_key, b"other", &signature, &config()).unwrap());
            assert!(!verify(&params, &pair.public_key, b"message", b"short", &config()).unwrap());
        }
    }

    #[test]
    fn test_ed25519_round_trip() {
        let pair = okp::generate(
            Algorithm::Ed25519,
            false,
            KeyUsages::of(&[KeyUsage::Verify]),
            KeyUsages::of(&[KeyUsage::Sign]),
        );
        let signature = sign(&SignParams::Ed25519, &pair.private_key, b"message", &config()).unwrap();
        assert_eq!(signature.len(), 64);
        assert!(verify(&SignParams::Ed25519, &pair.public_key, b"message", &signature, &config()).unwrap());
        let mut bad = signature.clone();
        bad[10] ^= 0x80;
        assert!(!verify(&SignParams::Ed25519, &pair.public_key, b"message", &bad, &config()).unwrap());
    }

    #[test]
    fn test_sign_with_public_key_is_usage_error() {
        let pair = rsa_pair(Algorithm::RsassaPkcs1V15);
        assert!(matches!(
            sign(&SignParams::RsassaPkcs1V15, &pair.public_key, b"m", &config()),
            Err(CryptoError::InvalidUsage(_))
        ));
    }

    #[test]
    fn test_params_for_other_algorithm() {
        let pair = rsa_pair(Algorithm::RsaPss);
        assert!(matches!(
            sign(&SignParams::RsassaPkcs1V15, &pair.private_key, b"m", &config()),
            Err(CryptoError::InvalidAccess(_))
        ));
    }
}
