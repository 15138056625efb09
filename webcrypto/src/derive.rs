//! Derivation engine: HKDF, PBKDF2, ECDH and X25519.

use crate::abort::AbortSignal;
use crate::algorithm::{HashAlgorithm, KeyFormat, Operation};
use crate::config::EngineConfig;
use crate::digest::dispatch_hash;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{CryptoKey, KeyType, KeyUsage, KeyUsages};
use crate::keys::{self, ec, okp, KeyData};
use crate::params::{DeriveParams, DerivedKeyParams};
use crate::registry::{self, OperationParams};
use hmac::digest::core_api::BlockSizeUser;
use hmac::digest::Digest;
use hmac::{Mac, SimpleHmac};
use tracing::debug;
use zeroize::Zeroizing;

/// HKDF and PBKDF2 have no natural output size; callers must ask for whole bytes.
fn kdf_output_len(length: Option<usize>) -> CryptoResult<usize> {
    match length {
        Some(bits) if bits > 0 && bits % 8 == 0 => Ok(bits / 8),
        Some(bits) => Err(CryptoError::OperationError(format!(
            "derived length must be a positive multiple of 8, got {bits}"
        ))),
        None => Err(CryptoError::OperationError("a derived length is required".to_string())),
    }
}

fn hkdf(hash: HashAlgorithm, ikm: &[u8], salt: &[u8], info: &[u8], len: usize) -> CryptoResult<Vec<u8>> {
    let mut okm = vec![0u8; len];
    let expanded = dispatch_hash!(hash, H => ::hkdf::SimpleHkdf::<H>::new(Some(salt), ikm).expand(info, &mut okm));
    expanded.map_err(|_| CryptoError::OperationError(format!("HKDF cannot produce {len} bytes")))?;
    Ok(okm)
}

/// PBKDF2 with the abort signal polled every `interval` rounds.
fn pbkdf2_abortable<H>(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    out: &mut [u8],
    signal: &AbortSignal,
    interval: u32,
) -> CryptoResult<()>
where
    H: Digest + BlockSizeUser + Clone,
{
    let prf = <SimpleHmac<H> as Mac>::new_from_slice(password)
        .map_err(|_| CryptoError::data("invalid PBKDF2 password"))?;
    // A zero interval from an unvalidated config polls every round.
    let interval = interval.max(1);

    for (index, block) in out.chunks_mut(<H as Digest>::output_size()).enumerate() {
        let counter = u32::try_from(index + 1)
            .map_err(|_| CryptoError::OperationError("PBKDF2 output too long".to_string()))?;
        let mut u = prf.clone().chain_update(salt).chain_update(counter.to_be_bytes()).finalize().into_bytes();
        let mut t = u.clone();

        for round in 1..iterations {
            if round % interval == 0 {
                signal.check()?;
            }
            u = prf.clone().chain_update(&u).finalize().into_bytes();
            t.iter_mut().zip(u.iter()).for_each(|(t, u)| *t ^= u);
        }
        block.iter_mut().zip(t.iter()).for_each(|(b, t)| *b = *t);
    }
    Ok(())
}

fn pbkdf2(
    hash: HashAlgorithm,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    len: usize,
    abort: Option<&AbortSignal>,
    config: &EngineConfig,
) -> CryptoResult<Vec<u8>> {
    let mut out = vec![0u8; len];
    match abort {
        Some(signal) => {
            signal.check()?;
            let derived = dispatch_hash!(hash, H => pbkdf2_abortable::<H>(
                password,
                salt,
                iterations,
                &mut out,
                signal,
                config.abort_check_interval,
            ));
            derived?;
        }
        None => {
            let derived =
                dispatch_hash!(hash, H => ::pbkdf2::pbkdf2::<SimpleHmac<H>>(password, salt, iterations, &mut out));
            derived.map_err(|_| CryptoError::data("invalid PBKDF2 password"))?;
        }
    }
    Ok(out)
}

/// Trim a shared secret to `length` bits, zeroing any spare low bits.
fn truncate_secret(secret: &[u8], length: Option<usize>) -> CryptoResult<Vec<u8>> {
    let full = secret.len() * 8;
    let bits = length.unwrap_or(full);
    if bits > full {
        return Err(CryptoError::OperationError(format!(
            "requested {bits} bits from a {full}-bit shared secret"
        )));
    }
    let mut out: Vec<u8> = secret.iter().take(bits.div_ceil(8)).copied().collect();
    let spare = out.len() * 8 - bits;
    if let Some(last) = out.last_mut() {
        *last &= 0xffu8 << spare;
    }
    Ok(out)
}

/// The peer key must be a public key of the same algorithm as the base key.
fn check_peer(base: &CryptoKey, peer: &CryptoKey) -> CryptoResult<()> {
    peer.require_type(KeyType::Public)?;
    peer.require_algorithm(base.algorithm().name())
}

fn derive_unchecked(
    params: &DeriveParams<'_>,
    base_key: &CryptoKey,
    length: Option<usize>,
    abort: Option<&AbortSignal>,
    config: &EngineConfig,
) -> CryptoResult<Vec<u8>> {
    match params {
        DeriveParams::Hkdf { hash, salt, info } => {
            let len = kdf_output_len(length)?;
            hkdf(*hash, base_key.secret_bytes()?, salt, info, len)
        }
        DeriveParams::Pbkdf2 { hash, salt, iterations } => {
            let len = kdf_output_len(length)?;
            pbkdf2(*hash, base_key.secret_bytes()?, salt, *iterations, len, abort, config)
        }
        DeriveParams::Ecdh { public } => {
            check_peer(base_key, public)?;
            let shared: Zeroizing<Vec<u8>> = ec::agree(base_key, public)?;
            truncate_secret(&shared, length)
        }
        DeriveParams::X25519 { public } => {
            check_peer(base_key, public)?;
            let shared = okp::agree(base_key, public)?;
            truncate_secret(&shared, length)
        }
    }
}

fn check_base(
    operation: Operation,
    usage: KeyUsage,
    params: &DeriveParams<'_>,
    base_key: &CryptoKey,
    config: &EngineConfig,
) -> CryptoResult<()> {
    let spec = registry::spec_for(params.algorithm())?;
    registry::validate_params(spec, operation, params, config)?;
    base_key.require_algorithm(spec.algorithm)?;
    base_key.require_usage(usage)
}

/// Derive `length` bits from `base_key`.
///
/// `length` is required for HKDF and PBKDF2; for ECDH and X25519 it defaults
/// to the full shared secret.
///
/// # Errors
///
/// `InvalidAccess` for a base or peer key that does not fit, `InvalidUsage`
/// without `deriveBits`, `OperationError` for an unusable length and
/// `Aborted` when `abort` trips during PBKDF2.
pub fn derive_bits(
    params: &DeriveParams<'_>,
    base_key: &CryptoKey,
    length: Option<usize>,
    abort: Option<&AbortSignal>,
    config: &EngineConfig,
) -> CryptoResult<Vec<u8>> {
    debug!(algorithm = params.algorithm().name(), ?length, "derive_bits");
    check_base(Operation::DeriveBits, KeyUsage::DeriveBits, params, base_key, config)?;
    derive_unchecked(params, base_key, length, abort, config)
}

/// Derive a new key of `derived` type from `base_key`.
///
/// # Errors
///
/// As [`derive_bits`], with `deriveKey` as the required usage, plus whatever
/// importing the derived bits as `derived` reports.
#[allow(clippy::too_many_arguments)]
pub fn derive_key(
    params: &DeriveParams<'_>,
    base_key: &CryptoKey,
    derived: &DerivedKeyParams,
    extractable: bool,
    usages: KeyUsages,
    abort: Option<&AbortSignal>,
    config: &EngineConfig,
) -> CryptoResult<CryptoKey> {
    debug!(
        algorithm = params.algorithm().name(),
        derived = derived.algorithm().name(),
        "derive_key"
    );
    check_base(Operation::DeriveKey, KeyUsage::DeriveKey, params, base_key, config)?;
    let target = registry::spec_for(derived.algorithm())?;
    registry::validate_params(target, Operation::ImportKey, derived, config)?;
    target.ensure_usages(usages)?;

    let bits = Zeroizing::new(derive_unchecked(params, base_key, derived.length_bits(), abort, config)?);
    keys::import_key(
        KeyFormat::Raw,
        &KeyData::Bytes(bits.to_vec()),
        &derived.import_params(),
        extractable,
        usages,
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{Algorithm, NamedCurve};
    use crate::params::ImportParams;
    use proptest::prelude::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn kdf_key(params: ImportParams, bytes: &[u8]) -> CryptoKey {
        keys::import_key(
            KeyFormat::Raw,
            &KeyData::Bytes(bytes.to_vec()),
            &params,
            false,
            KeyUsages::of(&[KeyUsage::DeriveBits, KeyUsage::DeriveKey]),
            &config(),
        )
        .unwrap()
    }

    // RFC 5869 test case 1.
    #[test]
    fn test_hkdf_known_answer() {
        let ikm = hex::decode("0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b").unwrap();
        let key = kdf_key(ImportParams::Hkdf, &ikm);
        let params = DeriveParams::Hkdf {
            hash: HashAlgorithm::Sha256,
            salt: hex::decode("000102030405060708090a0b0c").unwrap(),
            info: hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap(),
        };
        let okm = derive_bits(&params, &key, Some(42 * 8), None, &config()).unwrap();
        assert_eq!(
            hex::encode(okm),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
        );
    }

    // RFC 6070, c = 2.
    #[test]
    fn test_pbkdf2_known_answer() {
        let key = kdf_key(ImportParams::Pbkdf2, b"password");
        let params = DeriveParams::Pbkdf2 {
            hash: HashAlgorithm::Sha1,
            salt: b"salt".to_vec(),
            iterations: 2,
        };
        let dk = derive_bits(&params, &key, Some(160), None, &config()).unwrap();
        assert_eq!(hex::encode(dk), "ea6c014dc72d6f8ccd1ed92ace1d41f0d8de8957");
    }

    #[test]
    fn test_pbkdf2_abortable_path_matches_library() {
        let key = kdf_key(ImportParams::Pbkdf2, b"correct horse");
        let config = EngineConfig {
            abort_check_interval: 3,
            ..EngineConfig::default()
        };
        for hash in [HashAlgorithm::Sha1, HashAlgorithm::Sha256, HashAlgorithm::Sha512] {
            let params = DeriveParams::Pbkdf2 {
                hash,
                salt: b"battery staple".to_vec(),
                iterations: 25,
            };
            let plain = derive_bits(&params, &key, Some(640), None, &config).unwrap();
            let signal = AbortSignal::new();
            let polled = derive_bits(&params, &key, Some(640), Some(&signal), &config).unwrap();
            assert_eq!(plain, polled);
        }
    }

    #[test]
    fn test_pbkdf2_zero_check_interval_still_derives() {
        let key = kdf_key(ImportParams::Pbkdf2, b"password");
        let unvalidated = EngineConfig {
            abort_check_interval: 0,
            ..EngineConfig::default()
        };
        let params = DeriveParams::Pbkdf2 {
            hash: HashAlgorithm::Sha1,
            salt: b"salt".to_vec(),
            iterations: 2,
        };
        let signal = AbortSignal::new();
        let dk = derive_bits(&params, &key, Some(160), Some(&signal), &unvalidated).unwrap();
        assert_eq!(hex::encode(dk), "ea6c014dc72d6f8ccd1ed92ace1d41f0d8de8957");
    }

    #[test]
    fn test_pbkdf2_aborted() {
        let key = kdf_key(ImportParams::Pbkdf2, b"password");
        let params = DeriveParams::Pbkdf2 {
            hash: HashAlgorithm::Sha256,
            salt: b"salt".to_vec(),
            iterations: 10_000,
        };
        let signal = AbortSignal::new();
        signal.abort();
        assert!(matches!(
            derive_bits(&params, &key, Some(256), Some(&signal), &config()),
            Err(CryptoError::Aborted)
        ));
    }

    #[test]
    fn test_kdf_length_rules() {
        let key = kdf_key(ImportParams::Hkdf, b"ikm");
        let params = DeriveParams::Hkdf {
            hash: HashAlgorithm::Sha256,
            salt: Vec::new(),
            info: Vec::new(),
        };
        for length in [None, Some(0), Some(12)] {
            assert!(matches!(
                derive_bits(&params, &key, length, None, &config()),
                Err(CryptoError::OperationError(_))
            ));
        }
        assert!(matches!(
            derive_bits(&params, &key, Some(255 * 32 * 8 + 8), None, &config()),
            Err(CryptoError::OperationError(_))
        ));
    }

    #[test]
    fn test_ecdh_agreement_and_truncation() {
        let usages = KeyUsages::of(&[KeyUsage::DeriveBits]);
        let alice = ec::generate(Algorithm::Ecdh, NamedCurve::P256, false, KeyUsages::EMPTY, usages);
        let bob = ec::generate(Algorithm::Ecdh, NamedCurve::P256, false, KeyUsages::EMPTY, usages);

        let ab = derive_bits(
            &DeriveParams::Ecdh { public: &bob.public_key },
            &alice.private_key,
            None,
            None,
            &config(),
        )
        .unwrap();
        let ba = derive_bits(
            &DeriveParams::Ecdh { public: &alice.public_key },
            &bob.private_key,
            None,
            None,
            &config(),
        )
        .unwrap();
        assert_eq!(ab.len(), 32);
        assert_eq!(ab, ba);

        let short = derive_bits(
            &DeriveParams::Ecdh { public: &bob.public_key },
            &alice.private_key,
            Some(12),
            None,
            &config(),
        )
        .unwrap();
        assert_eq!(short.len(), 2);
        assert_eq!(short[0], ab[0]);
        assert_eq!(short[1], ab[1] & 0xf0);

        assert!(matches!(
            derive_bits(
                &DeriveParams::Ecdh { public: &bob.public_key },
                &alice.private_key,
                Some(264),
                None,
                &config(),
            ),
            Err(CryptoError::OperationError(_))
        ));
    }

    #[test]
    fn test_ecdh_peer_must_be_public_same_curve() {
        let usages = KeyUsages::of(&[KeyUsage::DeriveBits]);
        let p256 = ec::generate(Algorithm::Ecdh, NamedCurve::P256, false, KeyUsages::EMPTY, usages);
        let p384 = ec::generate(Algorithm::Ecdh, NamedCurve::P384, false, KeyUsages::EMPTY, usages);

        let private_peer = DeriveParams::Ecdh { public: &p256.private_key };
        assert!(matches!(
            derive_bits(&private_peer, &p256.private_key, None, None, &config()),
            Err(CryptoError::InvalidAccess(_))
        ));
        let other_curve = DeriveParams::Ecdh { public: &p384.public_key };
        assert!(matches!(
            derive_bits(&other_curve, &p256.private_key, None, None, &config()),
            Err(CryptoError::InvalidAccess(_))
        ));
    }

    #[test]
    fn test_x25519_agreement() {
        let usages = KeyUsages::of(&[KeyUsage::DeriveBits]);
        let alice = okp::generate(Algorithm::X25519, false, KeyUsages::EMPTY, usages);
        let bob = okp::generate(Algorithm::X25519, false, KeyUsages::EMPTY, usages);
        let ab = derive_bits(&DeriveParams::X25519 { public: &bob.public_key }, &alice.private_key, None, None, &config())
            .unwrap();
        let ba = derive_bits(&DeriveParams::X25519 { public: &alice.public_key }, &bob.private_key, None, None, &config())
            .unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.len(), 32);
    }

    #[test]
    fn test_derive_key_produces_aes_key() {
        let base = kdf_key(ImportParams::Hkdf, b"input keying material");
        let params = DeriveParams::Hkdf {
            hash: HashAlgorithm::Sha384,
            salt: b"salt".to_vec(),
            info: b"aes".to_vec(),
        };
        let derived = derive_key(
            &params,
            &base,
            &DerivedKeyParams::Aes {
                algorithm: Algorithm::AesGcm,
                length: 256,
            },
            true,
            KeyUsages::of(&[KeyUsage::Encrypt]),
            None,
            &config(),
        )
        .unwrap();
        let bits = derive_bits(&params, &base, Some(256), None, &config()).unwrap();
        assert_eq!(derived.secret_bytes().unwrap(), bits.as_slice());
        assert_eq!(derived.algorithm().name(), Algorithm::AesGcm);
    }

    #[test]
    fn test_derive_key_requires_usage() {
        let base = keys::import_key(
            KeyFormat::Raw,
            &KeyData::Bytes(b"pw".to_vec()),
            &ImportParams::Pbkdf2,
            false,
            KeyUsages::of(&[KeyUsage::DeriveBits]),
            &config(),
        )
        .unwrap();
        let params = DeriveParams::Pbkdf2 {
            hash: HashAlgorithm::Sha256,
            salt: b"s".to_vec(),
            iterations: 1,
        };
        let result = derive_key(
            &params,
            &base,
            &DerivedKeyParams::Hmac {
                hash: HashAlgorithm::Sha256,
                length: None,
            },
            false,
            KeyUsages::of(&[KeyUsage::Sign]),
            None,
            &config(),
        );
        assert!(matches!(result, Err(CryptoError::InvalidUsage(_))));
    }

    proptest! {
        #[test]
        fn prop_hkdf_is_deterministic(
            ikm in proptest::collection::vec(any::<u8>(), 1..64),
            salt in proptest::collection::vec(any::<u8>(), 0..32),
            bytes in 1usize..64,
        ) {
            let key = kdf_key(ImportParams::Hkdf, &ikm);
            let params = DeriveParams::Hkdf { hash: HashAlgorithm::Sha256, salt, info: Vec::new() };
            let first = derive_bits(&params, &key, Some(bytes * 8), None, &config()).unwrap();
            let second = derive_bits(&params, &key, Some(bytes * 8), None, &config()).unwrap();
            prop_assert_eq!(first.len(), bytes);
            prop_assert_eq!(first, second);
        }
    }
}
