//! NIST curve keys (P-256, P-384) for ECDSA and ECDH.
//!
//! Both curves share one implementation, stamped out per curve crate by
//! `curve_ops!`; the functions at the bottom dispatch on the key material.

use super::{format_mismatch, KeyData};
use crate::algorithm::{Algorithm, KeyFormat, NamedCurve};
use crate::error::{CryptoError, CryptoResult};
use crate::jwk::{JsonWebKey, KTY_EC};
use crate::key::{CryptoKey, CryptoKeyPair, KeyAlgorithm, KeyMaterial, KeyType, KeyUsages};
use zeroize::Zeroizing;

macro_rules! curve_ops {
    ($module:ident, $krate:ident, $curve:expr) => {
        pub(crate) mod $module {
            use super::*;
            use crate::jwk;
            use $krate::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
            use $krate::ecdsa::{Signature, SigningKey, VerifyingKey};
            use $krate::elliptic_curve::sec1::ToEncodedPoint;
            use $krate::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
            use rand::rngs::OsRng;

            pub(crate) use $krate::{PublicKey, SecretKey};

            const CURVE: NamedCurve = $curve;

            pub(crate) fn generate() -> (SecretKey, PublicKey) {
                let secret = SecretKey::random(&mut OsRng);
                let public = secret.public_key();
                (secret, public)
            }

            fn coordinate(jwk: &JsonWebKey, name: &str, value: Option<&String>) -> CryptoResult<Vec<u8>> {
                let bytes = jwk.member(name, value)?;
                if bytes.len() == CURVE.field_len() {
                    Ok(bytes)
                } else {
                    Err(CryptoError::data(format!(
                        "JWK \"{name}\" must be {} bytes for {}",
                        CURVE.field_len(),
                        CURVE
                    )))
                }
            }

            fn public_from_jwk(jwk: &JsonWebKey) -> CryptoResult<PublicKey> {
                let mut sec1 = vec![0x04];
                sec1.extend(coordinate(jwk, "x", jwk.x.as_ref())?);
                sec1.extend(coordinate(jwk, "y", jwk.y.as_ref())?);
                PublicKey::from_sec1_bytes(&sec1)
                    .map_err(|_| CryptoError::data(format!("JWK point is not on {CURVE}")))
            }

            /// Private or public material from key data in `format`.
            pub(crate) fn import(
                format: KeyFormat,
                data: &KeyData,
                private: fn(SecretKey) -> KeyMaterial,
                public: fn(PublicKey) -> KeyMaterial,
            ) -> CryptoResult<KeyMaterial> {
                match format {
                    KeyFormat::Raw => PublicKey::from_sec1_bytes(data.bytes()?)
                        .map(public)
                        .map_err(|_| CryptoError::data(format!("invalid {CURVE} point"))),
                    KeyFormat::Spki => PublicKey::from_public_key_der(data.bytes()?)
                        .map(public)
                        .map_err(|e| CryptoError::data(format!("invalid SPKI {CURVE} key: {e}"))),
                    KeyFormat::Pkcs8 => SecretKey::from_pkcs8_der(data.bytes()?)
                        .map(private)
                        .map_err(|e| CryptoError::data(format!("invalid PKCS#8 {CURVE} key: {e}"))),
                    KeyFormat::Jwk => {
                        let jwk = data.jwk()?;
                        let point = public_from_jwk(jwk)?;
                        let Some(d) = jwk.d.as_ref() else {
                            return Ok(public(point));
                        };
                        let scalar = Zeroizing::new(coordinate(jwk, "d", Some(d))?);
                        let secret = SecretKey::from_slice(&scalar)
                            .map_err(|_| CryptoError::data(format!("invalid {CURVE} private scalar")))?;
                        if secret.public_key() != point {
                            return Err(CryptoError::data("JWK x/y do not match d"));
                        }
                        Ok(private(secret))
                    }
                }
            }

            pub(crate) fn public_jwk(public: &PublicKey) -> CryptoResult<JsonWebKey> {
                let point = public.to_encoded_point(false);
                let (Some(x), Some(y)) = (point.x(), point.y()) else {
                    return Err(CryptoError::OperationError("point at infinity".to_string()));
                };
                let mut jwk = JsonWebKey::new(KTY_EC);
                jwk.crv = Some(CURVE.name().to_string());
                jwk.x = Some(jwk::encode_b64url(x));
                jwk.y = Some(jwk::encode_b64url(y));
                Ok(jwk)
            }

            pub(crate) fn export_public(format: KeyFormat, public: &PublicKey) -> CryptoResult<KeyData> {
                match format {
                    KeyFormat::Raw => Ok(KeyData::Bytes(public.to_encoded_point(false).as_bytes().to_vec())),
                    KeyFormat::Spki => public
                        .to_public_key_der()
                        .map(|der| KeyData::Bytes(der.as_bytes().to_vec()))
                        .map_err(|e| CryptoError::OperationError(format!("SPKI encoding failed: {e}"))),
                    KeyFormat::Jwk => public_jwk(public).map(KeyData::Jwk),
                    KeyFormat::Pkcs8 => Err(format_mismatch(format, KeyType::Public)),
                }
            }

            pub(crate) fn export_private(format: KeyFormat, secret: &SecretKey) -> CryptoResult<KeyData> {
                match format {
                    KeyFormat::Pkcs8 => secret
                        .to_pkcs8_der()
                        .map(|der| KeyData::Bytes(der.as_bytes().to_vec()))
                        .map_err(|e| CryptoError::OperationError(format!("PKCS#8 encoding failed: {e}"))),
                    KeyFormat::Jwk => {
                        let mut jwk = public_jwk(&secret.public_key())?;
                        jwk.d = Some(jwk::encode_b64url(&secret.to_bytes()));
                        Ok(KeyData::Jwk(jwk))
                    }
                    KeyFormat::Raw | KeyFormat::Spki => Err(format_mismatch(format, KeyType::Private)),
                }
            }

            /// ECDSA over an already-computed digest; returns `r || s`.
            pub(crate) fn sign_prehash(secret: &SecretKey, digest: &[u8]) -> CryptoResult<Vec<u8>> {
                let signing_key = SigningKey::from(secret);
                let signature: Signature = signing_key
                    .sign_prehash(digest)
                    .map_err(|e| CryptoError::OperationError(format!("ECDSA signing failed: {e}")))?;
                Ok(signature.to_bytes().to_vec())
            }

            pub(crate) fn verify_prehash(public: &PublicKey, digest: &[u8], signature: &[u8]) -> bool {
                let Ok(signature) = Signature::from_slice(signature) else {
                    return false;
                };
                VerifyingKey::from(public).verify_prehash(digest, &signature).is_ok()
            }

            /// Raw ECDH shared secret (the x coordinate).
            pub(crate) fn agree(secret: &SecretKey, public: &PublicKey) -> Zeroizing<Vec<u8>> {
                let shared = $krate::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
                Zeroizing::new(shared.raw_secret_bytes().to_vec())
            }
        }
    };
}

curve_ops!(p256_ops, p256, NamedCurve::P256);
curve_ops!(p384_ops, p384, NamedCurve::P384);

fn jwk_alg(algorithm: Algorithm, curve: NamedCurve) -> Option<&'static str> {
    match (algorithm, curve) {
        (Algorithm::Ecdsa, NamedCurve::P256) => Some("ES256"),
        (Algorithm::Ecdsa, NamedCurve::P384) => Some("ES384"),
        _ => None,
    }
}

fn key_algorithm(algorithm: Algorithm, named_curve: NamedCurve) -> KeyAlgorithm {
    KeyAlgorithm::Ec {
        name: algorithm,
        named_curve,
    }
}

pub(crate) fn generate(
    algorithm: Algorithm,
    curve: NamedCurve,
    extractable: bool,
    public_usages: KeyUsages,
    private_usages: KeyUsages,
) -> CryptoKeyPair {
    let (private, public) = match curve {
        NamedCurve::P256 => {
            let (secret, public) = p256_ops::generate();
            (KeyMaterial::P256Private(secret), KeyMaterial::P256Public(public))
        }
        NamedCurve::P384 => {
            let (secret, public) = p384_ops::generate();
            (KeyMaterial::P384Private(secret), KeyMaterial::P384Public(public))
        }
    };
    CryptoKeyPair {
        public_key: CryptoKey::new(key_algorithm(algorithm, curve), true, public_usages, public),
        private_key: CryptoKey::new(key_algorithm(algorithm, curve), extractable, private_usages, private),
    }
}

pub(crate) fn import(
    format: KeyFormat,
    data: &KeyData,
    algorithm: Algorithm,
    curve: NamedCurve,
    extractable: bool,
    usages: KeyUsages,
) -> CryptoResult<CryptoKey> {
    if format == KeyFormat::Jwk {
        let jwk = data.jwk()?;
        jwk.check_import(KTY_EC, jwk_alg(algorithm, curve), extractable, usages)?;
        if jwk.crv.as_deref() != Some(curve.name()) {
            return Err(CryptoError::data(format!("JWK crv must be \"{curve}\"")));
        }
    }

    let material = match curve {
        NamedCurve::P256 => p256_ops::import(format, data, KeyMaterial::P256Private, KeyMaterial::P256Public)?,
        NamedCurve::P384 => p384_ops::import(format, data, KeyMaterial::P384Private, KeyMaterial::P384Public)?,
    };
    Ok(CryptoKey::new(key_algorithm(algorithm, curve), extractable, usages, material))
}

pub(crate) fn export(format: KeyFormat, key: &CryptoKey) -> CryptoResult<KeyData> {
    let exported = match key.material() {
        KeyMaterial::P256Private(secret) => p256_ops::export_private(format, secret)?,
        KeyMaterial::P256Public(public) => p256_ops::export_public(format, public)?,
        KeyMaterial::P384Private(secret) => p384_ops::export_private(format, secret)?,
        KeyMaterial::P384Public(public) => p384_ops::export_public(format, public)?,
        _ => return Err(format_mismatch(format, key.key_type())),
    };

    Ok(match exported {
        KeyData::Jwk(mut jwk) => {
            if let KeyAlgorithm::Ec { name, named_curve } = key.algorithm() {
                jwk.alg = jwk_alg(*name, *named_curve).map(str::to_string);
            }
            KeyData::Jwk(jwk)
        }
        bytes => bytes,
    })
}

/// ECDSA signature over `digest` with a private key.
/// ECDSA needs a digest of at least half the field size on both sides.
fn check_prehash(curve: NamedCurve, digest: &[u8]) -> CryptoResult<()> {
    let min = curve.field_len() / 2;
    if digest.len() < min {
        return Err(CryptoError::OperationError(format!(
            "{} ECDSA needs a digest of at least {min} bytes, got {}",
            curve.name(),
            digest.len()
        )));
    }
    Ok(())
}

pub(crate) fn sign_prehash(key: &CryptoKey, digest: &[u8]) -> CryptoResult<Vec<u8>> {
    if let Some(curve) = key.algorithm().named_curve() {
        check_prehash(curve, digest)?;
    }
    match key.material() {
        KeyMaterial::P256Private(secret) => p256_ops::sign_prehash(secret, digest),
        KeyMaterial::P384Private(secret) => p384_ops::sign_prehash(secret, digest),
        _ => Err(CryptoError::InvalidAccess("ECDSA signing needs a private key".to_string())),
    }
}

pub(crate) fn verify_prehash(key: &CryptoKey, digest: &[u8], signature: &[u8]) -> CryptoResult<bool> {
    if let Some(curve) = key.algorithm().named_curve() {
        check_prehash(curve, digest)?;
    }
    match key.material() {
        KeyMaterial::P256Public(public) => Ok(p256_ops::verify_prehash(public, digest, signature)),
        KeyMaterial::P384Public(public) => Ok(p384_ops::verify_prehash(public, digest, signature)),
        _ => Err(CryptoError::InvalidAccess("ECDSA verification needs a public key".to_string())),
    }
}

/// ECDH between a private key and a peer public key on the same curve.
pub(crate) fn agree(private: &CryptoKey, public: &CryptoKey) -> CryptoResult<Zeroizing<Vec<u8>>> {
    match (private.material(), public.material()) {
        (KeyMaterial::P256Private(secret), KeyMaterial::P256Public(peer)) => Ok(p256_ops::agree(secret, peer)),
        (KeyMaterial::P384Private(secret), KeyMaterial::P384Public(peer)) => Ok(p384_ops::agree(secret, peer)),
        _ => Err(CryptoError::InvalidAccess(
            "ECDH needs a private key and a public key on the same curve".to_string(),
        )),
    }
}
