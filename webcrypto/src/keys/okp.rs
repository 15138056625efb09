//! Edwards/Montgomery curve keys: Ed25519 and X25519.
//!
//! PKCS#8 and SPKI encodings for these curves are a fixed DER prefix
//! (RFC 8410) followed by the 32-byte key, so they are built and parsed
//! directly.

use super::{format_mismatch, KeyData};
use crate::algorithm::{Algorithm, KeyFormat};
use crate::error::{CryptoError, CryptoResult};
use crate::jwk::{self, JsonWebKey, KTY_OKP};
use crate::key::{CryptoKey, CryptoKeyPair, KeyAlgorithm, KeyMaterial, KeyType, KeyUsages};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroizing;

const KEY_LEN: usize = 32;

const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];
const ED25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];
const X25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x6e, 0x03, 0x21, 0x00,
];
const X25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x6e, 0x04, 0x22, 0x04, 0x20,
];

fn prefixes(algorithm: Algorithm) -> (&'static [u8], &'static [u8]) {
    match algorithm {
        Algorithm::X25519 => (&X25519_SPKI_PREFIX, &X25519_PKCS8_PREFIX),
        _ => (&ED25519_SPKI_PREFIX, &ED25519_PKCS8_PREFIX),
    }
}

fn key32(bytes: &[u8], what: &str) -> CryptoResult<Zeroizing<[u8; KEY_LEN]>> {
    let array: [u8; KEY_LEN] = bytes
        .try_into()
        .map_err(|_| CryptoError::data(format!("{what} must be {KEY_LEN} bytes, got {}", bytes.len())))?;
    Ok(Zeroizing::new(array))
}

/// Strip a DER prefix and return the trailing 32-byte key.
fn strip_prefix<'a>(der: &'a [u8], prefix: &[u8], what: &str) -> CryptoResult<&'a [u8]> {
    der.strip_prefix(prefix)
        .filter(|rest| rest.len() == KEY_LEN)
        .ok_or_else(|| CryptoError::data(format!("invalid {what} encoding")))
}

fn with_prefix(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut der = Vec::with_capacity(prefix.len() + key.len());
    der.extend_from_slice(prefix);
    der.extend_from_slice(key);
    der
}

fn private_material(algorithm: Algorithm, seed: &[u8]) -> CryptoResult<KeyMaterial> {
    let seed = key32(seed, "private key")?;
    Ok(match algorithm {
        Algorithm::X25519 => KeyMaterial::X25519Private(Box::new(StaticSecret::from(*seed))),
        _ => KeyMaterial::Ed25519Private(Box::new(SigningKey::from_bytes(&seed))),
    })
}

fn public_material(algorithm: Algorithm, bytes: &[u8]) -> CryptoResult<KeyMaterial> {
    let bytes = key32(bytes, "public key")?;
    match algorithm {
        Algorithm::X25519 => Ok(KeyMaterial::X25519Public(X25519Public::from(*bytes))),
        _ => VerifyingKey::from_bytes(&bytes)
            .map(KeyMaterial::Ed25519Public)
            .map_err(|_| CryptoError::data("invalid Ed25519 public key")),
    }
}

/// Public key bytes for a private or public key.
fn public_bytes(material: &KeyMaterial) -> Option<[u8; KEY_LEN]> {
    match material {
        KeyMaterial::Ed25519Private(signing) => Some(signing.verifying_key().to_bytes()),
        KeyMaterial::Ed25519Public(verifying) => Some(verifying.to_bytes()),
        KeyMaterial::X25519Private(secret) => Some(X25519Public::from(&**secret).to_bytes()),
        KeyMaterial::X25519Public(public) => Some(public.to_bytes()),
        _ => None,
    }
}

fn private_bytes(material: &KeyMaterial) -> Option<Zeroizing<[u8; KEY_LEN]>> {
    match material {
        KeyMaterial::Ed25519Private(signing) => Some(Zeroizing::new(signing.to_bytes())),
        KeyMaterial::X25519Private(secret) => Some(Zeroizing::new(secret.to_bytes())),
        _ => None,
    }
}

pub(crate) fn generate(
    algorithm: Algorithm,
    extractable: bool,
    public_usages: KeyUsages,
    private_usages: KeyUsages,
) -> CryptoKeyPair {
    let (private, public) = match algorithm {
        Algorithm::X25519 => {
            let secret = StaticSecret::random_from_rng(OsRng);
            let public = X25519Public::from(&secret);
            (
                KeyMaterial::X25519Private(Box::new(secret)),
                KeyMaterial::X25519Public(public),
            )
        }
        _ => {
            let signing = SigningKey::generate(&mut OsRng);
            let verifying = signing.verifying_key();
            (
                KeyMaterial::Ed25519Private(Box::new(signing)),
                KeyMaterial::Ed25519Public(verifying),
            )
        }
    };
    let alg = KeyAlgorithm::Plain { name: algorithm };
    CryptoKeyPair {
        public_key: CryptoKey::new(alg.clone(), true, public_usages, public),
        private_key: CryptoKey::new(alg, extractable, private_usages, private),
    }
}

fn material_from_jwk(jwk: &JsonWebKey, algorithm: Algorithm) -> CryptoResult<KeyMaterial> {
    if jwk.crv.as_deref() != Some(algorithm.name()) {
        return Err(CryptoError::data(format!("JWK crv must be \"{algorithm}\"")));
    }
    let x = jwk.member("x", jwk.x.as_ref())?;
    let Some(d) = jwk.d.as_ref() else {
        return public_material(algorithm, &x);
    };

    let d = Zeroizing::new(jwk.member("d", Some(d))?);
    let material = private_material(algorithm, &d)?;
    if public_bytes(&material).as_ref().map(|b| b.as_slice()) != Some(x.as_slice()) {
        return Err(CryptoError::data("JWK x does not match d"));
    }
    Ok(material)
}

pub(crate) fn import(
    format: KeyFormat,
    data: &KeyData,
    algorithm: Algorithm,
    extractable: bool,
    usages: KeyUsages,
) -> CryptoResult<CryptoKey> {
    let (spki_prefix, pkcs8_prefix) = prefixes(algorithm);
    let material = match format {
        KeyFormat::Raw => public_material(algorithm, data.bytes()?)?,
        KeyFormat::Spki => public_material(algorithm, strip_prefix(data.bytes()?, spki_prefix, "SPKI")?)?,
        KeyFormat::Pkcs8 => private_material(algorithm, strip_prefix(data.bytes()?, pkcs8_prefix, "PKCS#8")?)?,
        KeyFormat::Jwk => {
            let jwk = data.jwk()?;
            // "Ed25519" is the newer fully-specified alg name.
            let expected = match (algorithm, jwk.alg.as_deref()) {
                (Algorithm::Ed25519, Some("Ed25519")) => Some("Ed25519"),
                (Algorithm::Ed25519, _) => Some("EdDSA"),
                _ => None,
            };
            jwk.check_import(KTY_OKP, expected, extractable, usages)?;
            material_from_jwk(jwk, algorithm)?
        }
    };
    Ok(CryptoKey::new(
        KeyAlgorithm::Plain { name: algorithm },
        extractable,
        usages,
        material,
    ))
}

pub(crate) fn export(format: KeyFormat, key: &CryptoKey) -> CryptoResult<KeyData> {
    let algorithm = key.algorithm().name();
    let (spki_prefix, pkcs8_prefix) = prefixes(algorithm);
    let material = key.material();
    let key_type = key.key_type();

    match (format, key_type) {
        (KeyFormat::Raw, KeyType::Public) => public_bytes(material)
            .map(|b| KeyData::Bytes(b.to_vec()))
            .ok_or_else(|| format_mismatch(format, key_type)),
        (KeyFormat::Spki, KeyType::Public) => public_bytes(material)
            .map(|b| KeyData::Bytes(with_prefix(spki_prefix, &b)))
            .ok_or_else(|| format_mismatch(format, key_type)),
        (KeyFormat::Pkcs8, KeyType::Private) => private_bytes(material)
            .map(|seed| KeyData::Bytes(with_prefix(pkcs8_prefix, seed.as_ref())))
            .ok_or_else(|| format_mismatch(format, key_type)),
        (KeyFormat::Jwk, _) => {
            let x = public_bytes(material).ok_or_else(|| format_mismatch(format, key_type))?;
            let mut jwk = JsonWebKey::new(KTY_OKP);
            jwk.crv = Some(algorithm.name().to_string());
            jwk.x = Some(jwk::encode_b64url(&x));
            if algorithm == Algorithm::Ed25519 {
                jwk.alg = Some("EdDSA".to_string());
            }
            if let Some(seed) = private_bytes(material) {
                jwk.d = Some(jwk::encode_b64url(seed.as_ref()));
            }
            Ok(KeyData::Jwk(jwk))
        }
        (format, key_type) => Err(format_mismatch(format, key_type)),
    }
}

/// X25519 shared secret; all-zero (non-contributory) results are rejected.
pub(crate) fn agree(private: &CryptoKey, public: &CryptoKey) -> CryptoResult<Zeroizing<Vec<u8>>> {
    match (private.material(), public.material()) {
        (KeyMaterial::X25519Private(secret), KeyMaterial::X25519Public(peer)) => {
            let shared = secret.diffie_hellman(peer);
            if !shared.was_contributory() {
                return Err(CryptoError::OperationError(
                    "X25519 produced an all-zero shared secret".to_string(),
                ));
            }
            Ok(Zeroizing::new(shared.as_bytes().to_vec()))
        }
        _ => Err(CryptoError::InvalidAccess(
            "X25519 needs a private key and a public key".to_string(),
        )),
    }
}

pub(crate) fn signing_key(key: &CryptoKey) -> CryptoResult<&SigningKey> {
    match key.material() {
        KeyMaterial::Ed25519Private(signing) => Ok(&**signing),
        _ => Err(CryptoError::InvalidAccess("Ed25519 signing needs a private key".to_string())),
    }
}

pub(crate) fn verifying_key(key: &CryptoKey) -> CryptoResult<&VerifyingKey> {
    match key.material() {
        KeyMaterial::Ed25519Public(verifying) => Ok(verifying),
        _ => Err(CryptoError::InvalidAccess("Ed25519 verification needs a public key".to_string())),
    }
}
