//! RSA keys for RSASSA-PKCS1-v1_5, RSA-PSS and RSA-OAEP.

use super::{format_mismatch, KeyData};
use crate::algorithm::{Algorithm, HashAlgorithm, KeyFormat};
use crate::config::EngineConfig;
use crate::error::{CryptoError, CryptoResult};
use crate::jwk::{self, JsonWebKey, KTY_RSA};
use crate::key::{CryptoKey, CryptoKeyPair, KeyAlgorithm, KeyMaterial, KeyType, KeyUsages};
use crate::params::public_exponent_value;
use rand::rngs::OsRng;
use rsa::pkcs1;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, SubjectPublicKeyInfoRef};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};

fn exponent_u64(e: &BigUint) -> CryptoResult<u64> {
    let bytes = e.to_bytes_be();
    if bytes.len() > 8 {
        return Err(CryptoError::data("RSA public exponent too large"));
    }
    Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn key_algorithm(
    algorithm: Algorithm,
    hash: HashAlgorithm,
    public: &impl PublicKeyParts,
) -> CryptoResult<KeyAlgorithm> {
    Ok(KeyAlgorithm::Rsa {
        name: algorithm,
        modulus_length: public.n().bits(),
        public_exponent: exponent_u64(public.e())?,
        hash,
    })
}

fn check_modulus(public: &impl PublicKeyParts, config: &EngineConfig) -> CryptoResult<()> {
    let bits = public.n().bits();
    if config.rsa_modulus_allowed(bits) {
        Ok(())
    } else {
        Err(CryptoError::data(format!(
            "RSA modulus of {bits} bits outside {}..={}",
            config.min_rsa_modulus_bits, config.max_rsa_modulus_bits
        )))
    }
}

pub(crate) fn generate(
    algorithm: Algorithm,
    modulus_length: usize,
    public_exponent: &[u8],
    hash: HashAlgorithm,
    extractable: bool,
    public_usages: KeyUsages,
    private_usages: KeyUsages,
) -> CryptoResult<CryptoKeyPair> {
    let exponent = BigUint::from(public_exponent_value(public_exponent)?);
    let private = RsaPrivateKey::new_with_exp(&mut OsRng, modulus_length, &exponent)
        .map_err(|e| CryptoError::OperationError(format!("RSA key generation failed: {e}")))?;
    let public = private.to_public_key();
    let alg = key_algorithm(algorithm, hash, &public)?;

    Ok(CryptoKeyPair {
        public_key: CryptoKey::new(
            alg.clone(),
            true,
            public_usages,
            KeyMaterial::RsaPublic(Box::new(public)),
        ),
        private_key: CryptoKey::new(
            alg,
            extractable,
            private_usages,
            KeyMaterial::RsaPrivate(Box::new(private)),
        ),
    })
}

/// Public key with the configured modulus ceiling instead of the primitive's
/// built-in 4096-bit one.
fn public_key(n: BigUint, e: BigUint, config: &EngineConfig) -> CryptoResult<RsaPublicKey> {
    RsaPublicKey::new_with_max_size(n, e, config.max_rsa_modulus_bits)
        .map_err(|e| CryptoError::data(format!("invalid RSA public key: {e}")))
}

fn public_from_spki(der: &[u8], config: &EngineConfig) -> CryptoResult<RsaPublicKey> {
    let malformed = |e: &dyn std::fmt::Display| CryptoError::data(format!("invalid SPKI RSA key: {e}"));
    let spki = SubjectPublicKeyInfoRef::try_from(der).map_err(|e| malformed(&e))?;
    if spki.algorithm.oid != pkcs1::ALGORITHM_OID {
        return Err(CryptoError::data(format!(
            "SPKI algorithm {} is not rsaEncryption",
            spki.algorithm.oid
        )));
    }
    let bits = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| CryptoError::data("SPKI key bit string has unused bits"))?;
    let key = pkcs1::RsaPublicKey::try_from(bits).map_err(|e| malformed(&e))?;
    public_key(
        BigUint::from_bytes_be(key.modulus.as_bytes()),
        BigUint::from_bytes_be(key.public_exponent.as_bytes()),
        config,
    )
}

fn big(jwk: &JsonWebKey, name: &str, value: Option<&String>) -> CryptoResult<BigUint> {
    Ok(BigUint::from_bytes_be(&jwk.member(name, value)?))
}

fn material_from_jwk(jwk: &JsonWebKey, config: &EngineConfig) -> CryptoResult<KeyMaterial> {
    let n = big(jwk, "n", jwk.n.as_ref())?;
    let e = big(jwk, "e", jwk.e.as_ref())?;

    if jwk.d.is_none() {
        return Ok(KeyMaterial::RsaPublic(Box::new(public_key(n, e, config)?)));
    }

    let d = big(jwk, "d", jwk.d.as_ref())?;
    let p = big(jwk, "p", jwk.p.as_ref())?;
    let q = big(jwk, "q", jwk.q.as_ref())?;
    let mut private = RsaPrivateKey::from_components(n, e, d, vec![p, q])
        .map_err(|e| CryptoError::data(format!("invalid RSA private key: {e}")))?;
    private
        .validate()
        .map_err(|e| CryptoError::data(format!("invalid RSA private key: {e}")))?;
    private
        .precompute()
        .map_err(|e| CryptoError::data(format!("invalid RSA private key: {e}")))?;
    Ok(KeyMaterial::RsaPrivate(Box::new(private)))
}

pub(crate) fn import(
    format: KeyFormat,
    data: &KeyData,
    algorithm: Algorithm,
    hash: HashAlgorithm,
    extractable: bool,
    usages: KeyUsages,
    config: &EngineConfig,
) -> CryptoResult<CryptoKey> {
    let material = match format {
        // The primitive applies no modulus ceiling to PKCS#8; bounds are checked below.
        KeyFormat::Pkcs8 => {
            let private = RsaPrivateKey::from_pkcs8_der(data.bytes()?)
                .map_err(|e| CryptoError::data(format!("invalid PKCS#8 RSA key: {e}")))?;
            KeyMaterial::RsaPrivate(Box::new(private))
        }
        KeyFormat::Spki => {
            KeyMaterial::RsaPublic(Box::new(public_from_spki(data.bytes()?, config)?))
        }
        KeyFormat::Jwk => {
            let jwk = data.jwk()?;
            let expected = jwk::rsa_alg(algorithm, hash);
            jwk.check_import(KTY_RSA, expected.as_deref(), extractable, usages)?;
            material_from_jwk(jwk, config)?
        }
        KeyFormat::Raw => return Err(format_mismatch(format, KeyType::Private)),
    };

    let alg = match &material {
        KeyMaterial::RsaPrivate(private) => {
            check_modulus(&**private, config)?;
            key_algorithm(algorithm, hash, &**private)?
        }
        KeyMaterial::RsaPublic(public) => {
            check_modulus(&**public, config)?;
            key_algorithm(algorithm, hash, &**public)?
        }
        _ => return Err(CryptoError::data("not an RSA key")),
    };

    Ok(CryptoKey::new(alg, extractable, usages, material))
}

fn b64(value: &BigUint) -> String {
    jwk::encode_b64url(&value.to_bytes_be())
}

fn public_jwk(public: &impl PublicKeyParts, alg: Option<String>) -> JsonWebKey {
    let mut jwk = JsonWebKey::new(KTY_RSA);
    jwk.alg = alg;
    jwk.n = Some(b64(public.n()));
    jwk.e = Some(b64(public.e()));
    jwk
}

pub(crate) fn export(format: KeyFormat, key: &CryptoKey) -> CryptoResult<KeyData> {
    let alg = match key.algorithm() {
        KeyAlgorithm::Rsa { name, hash, .. } => jwk::rsa_alg(*name, *hash),
        _ => None,
    };

    match (format, key.material()) {
        (KeyFormat::Pkcs8, KeyMaterial::RsaPrivate(private)) => {
            let der = private
                .to_pkcs8_der()
                .map_err(|e| CryptoError::OperationError(format!("PKCS#8 encoding failed: {e}")))?;
            Ok(KeyData::Bytes(der.as_bytes().to_vec()))
        }
        (KeyFormat::Spki, KeyMaterial::RsaPublic(public)) => {
            let der = public
                .to_public_key_der()
                .map_err(|e| CryptoError::OperationError(format!("SPKI encoding failed: {e}")))?;
            Ok(KeyData::Bytes(der.as_bytes().to_vec()))
        }
        (KeyFormat::Jwk, KeyMaterial::RsaPublic(public)) => Ok(KeyData::Jwk(public_jwk(&**public, alg))),
        (KeyFormat::Jwk, KeyMaterial::RsaPrivate(private)) => {
            let mut jwk = public_jwk(&**private, alg);
            jwk.d = Some(b64(private.d()));
            if let [p, q] = private.primes() {
                jwk.p = Some(b64(p));
                jwk.q = Some(b64(q));
            }
            jwk.dp = private.dp().map(b64);
            jwk.dq = private.dq().map(b64);
            jwk.qi = private.crt_coefficient().as_ref().map(b64);
            Ok(KeyData::Jwk(jwk))
        }
        (format, _) => Err(format_mismatch(format, key.key_type())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyUsage;

    const F4: [u8; 3] = [0x01, 0x00, 0x01];

    fn pair() -> CryptoKeyPair {
        generate(
            Algorithm::RsaPss,
            1024,
            &F4,
            HashAlgorithm::Sha256,
            true,
            KeyUsages::of(&[KeyUsage::Verify]),
            KeyUsages::of(&[KeyUsage::Sign]),
        )
        .unwrap()
    }

    #[test]
    fn test_generated_algorithm() {
        let pair = pair();
        assert_eq!(
            pair.public_key.algorithm(),
            &KeyAlgorithm::Rsa {
                name: Algorithm::RsaPss,
                modulus_length: 1024,
                public_exponent: 65537,
                hash: HashAlgorithm::Sha256,
            }
        );
        assert_eq!(pair.private_key.key_type(), KeyType::Private);
    }

    #[test]
    fn test_jwk_private_round_trip() {
        let pair = pair();
        let KeyData::Jwk(jwk) = export(KeyFormat::Jwk, &pair.private_key).unwrap() else {
            panic!("expected a JWK");
        };
        assert_eq!(jwk.alg.as_deref(), Some("PS256"));
        assert!(jwk.qi.is_some());

        let imported = import(
            KeyFormat::Jwk,
            &KeyData::Jwk(jwk),
            Algorithm::RsaPss,
            HashAlgorithm::Sha256,
            true,
            KeyUsages::of(&[KeyUsage::Sign]),
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(
            export(KeyFormat::Pkcs8, &imported).unwrap(),
            export(KeyFormat::Pkcs8, &pair.private_key).unwrap()
        );
    }

    #[test]
    fn test_spki_for_private_key_is_format_error() {
        let pair = pair();
        assert!(matches!(
            export(KeyFormat::Spki, &pair.private_key),
            Err(CryptoError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_import_enforces_modulus_bounds() {
        let pair = pair();
        let spki = export(KeyFormat::Spki, &pair.public_key).unwrap();
        let strict = EngineConfig {
            min_rsa_modulus_bits: 2048,
            ..EngineConfig::default()
        };
        let result = import(
            KeyFormat::Spki,
            &spki,
            Algorithm::RsaPss,
            HashAlgorithm::Sha256,
            true,
            KeyUsages::of(&[KeyUsage::Verify]),
            &strict,
        );
        assert!(matches!(result, Err(CryptoError::DataError(_))));
    }

    /// A 4104-bit public key; only the structure matters for import.
    fn wide_spki() -> KeyData {
        let n = BigUint::from_bytes_be(&[0xc5; 513]);
        let public = RsaPublicKey::new_with_max_size(n, BigUint::from(65537u32), 8192).unwrap();
        KeyData::Bytes(public.to_public_key_der().unwrap().as_bytes().to_vec())
    }

    fn import_spki(spki: &KeyData, config: &EngineConfig) -> CryptoResult<CryptoKey> {
        import(
            KeyFormat::Spki,
            spki,
            Algorithm::RsaPss,
            HashAlgorithm::Sha256,
            true,
            KeyUsages::of(&[KeyUsage::Verify]),
            config,
        )
    }

    #[test]
    fn test_spki_import_beyond_4096_bits() {
        let spki = wide_spki();
        let key = import_spki(&spki, &EngineConfig::default()).unwrap();
        assert_eq!(
            key.algorithm(),
            &KeyAlgorithm::Rsa {
                name: Algorithm::RsaPss,
                modulus_length: 4104,
                public_exponent: 65537,
                hash: HashAlgorithm::Sha256,
            }
        );
        assert_eq!(export(KeyFormat::Spki, &key).unwrap(), spki);

        let KeyData::Jwk(jwk) = export(KeyFormat::Jwk, &key).unwrap() else {
            panic!("expected a JWK");
        };
        let from_jwk = import(
            KeyFormat::Jwk,
            &KeyData::Jwk(jwk),
            Algorithm::RsaPss,
            HashAlgorithm::Sha256,
            true,
            KeyUsages::of(&[KeyUsage::Verify]),
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(from_jwk.algorithm(), key.algorithm());
    }

    #[test]
    fn test_spki_import_respects_configured_ceiling() {
        let capped = EngineConfig {
            max_rsa_modulus_bits: 4096,
            ..EngineConfig::default()
        };
        assert!(matches!(import_spki(&wide_spki(), &capped), Err(CryptoError::DataError(_))));
    }

    #[test]
    fn test_spki_with_foreign_algorithm_is_data_error() {
        let ec = p256::SecretKey::random(&mut OsRng).public_key();
        let der = p256::pkcs8::EncodePublicKey::to_public_key_der(&ec).unwrap();
        let result = import_spki(&KeyData::Bytes(der.as_bytes().to_vec()), &EngineConfig::default());
        assert!(matches!(result, Err(CryptoError::DataError(_))));
    }

    #[test]
    fn test_import_garbage_is_data_error() {
        let result = import(
            KeyFormat::Pkcs8,
            &KeyData::Bytes(vec![0x30, 0x03, 0x02, 0x01]),
            Algorithm::RsaOaep,
            HashAlgorithm::Sha1,
            false,
            KeyUsages::of(&[KeyUsage::Decrypt]),
            &EngineConfig::default(),
        );
        assert!(matches!(result, Err(CryptoError::DataError(_))));
    }
}
