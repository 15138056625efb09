//! Symmetric keys: AES, HMAC and the KDF base keys.

use super::{format_mismatch, KeyData};
use crate::algorithm::{Algorithm, HashAlgorithm, KeyFormat};
use crate::error::{CryptoError, CryptoResult};
use crate::jwk::{self, JsonWebKey, KTY_OCT};
use crate::key::{CryptoKey, KeyAlgorithm, KeyMaterial, KeyType, KeyUsages};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

fn random_secret(len: usize) -> Zeroizing<Vec<u8>> {
    let mut bytes = Zeroizing::new(vec![0u8; len]);
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Zero the bits past `length_bits` in the final byte.
fn mask_trailing_bits(bytes: &mut [u8], length_bits: usize) {
    let spare = bytes.len() * 8 - length_bits;
    if let Some(last) = bytes.last_mut() {
        *last &= 0xffu8 << spare;
    }
}

fn aes_key(
    algorithm: Algorithm,
    bytes: Zeroizing<Vec<u8>>,
    extractable: bool,
    usages: KeyUsages,
) -> CryptoResult<CryptoKey> {
    let length = bytes.len() * 8;
    if !matches!(length, 128 | 192 | 256) {
        return Err(CryptoError::data(format!(
            "AES key must be 16, 24 or 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(CryptoKey::new(
        KeyAlgorithm::Aes {
            name: algorithm,
            length,
        },
        extractable,
        usages,
        KeyMaterial::Secret(bytes),
    ))
}

pub(crate) fn generate_aes(
    algorithm: Algorithm,
    length: usize,
    extractable: bool,
    usages: KeyUsages,
) -> CryptoResult<CryptoKey> {
    aes_key(algorithm, random_secret(length / 8), extractable, usages)
}

pub(crate) fn generate_hmac(
    hash: HashAlgorithm,
    length: Option<usize>,
    extractable: bool,
    usages: KeyUsages,
) -> CryptoResult<CryptoKey> {
    let length = length.unwrap_or(hash.block_len() * 8);
    let mut bytes = random_secret(length.div_ceil(8));
    mask_trailing_bits(&mut bytes, length);
    Ok(CryptoKey::new(
        KeyAlgorithm::Hmac {
            name: Algorithm::Hmac,
            hash,
            length,
        },
        extractable,
        usages,
        KeyMaterial::Secret(bytes),
    ))
}

/// Secret bytes from `raw` or an `oct` JWK.
fn read_secret(
    format: KeyFormat,
    data: &KeyData,
    expected_alg: Option<&str>,
    extractable: bool,
    usages: KeyUsages,
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    match format {
        KeyFormat::Raw => Ok(Zeroizing::new(data.bytes()?.to_vec())),
        KeyFormat::Jwk => {
            let jwk = data.jwk()?;
            jwk.check_import(KTY_OCT, expected_alg, extractable, usages)?;
            Ok(Zeroizing::new(jwk.member("k", jwk.k.as_ref())?))
        }
        other => Err(format_mismatch(other, KeyType::Secret)),
    }
}

pub(crate) fn import_aes(
    format: KeyFormat,
    data: &KeyData,
    algorithm: Algorithm,
    extractable: bool,
    usages: KeyUsages,
) -> CryptoResult<CryptoKey> {
    let bytes = match format {
        KeyFormat::Jwk => {
            // The JWK alg depends on the key length, so decode before checking it.
            let jwk = data.jwk()?;
            let len = jwk.member("k", jwk.k.as_ref())?.len();
            let expected = jwk::aes_alg(algorithm, len * 8);
            read_secret(format, data, expected.as_deref(), extractable, usages)?
        }
        _ => read_secret(format, data, None, extractable, usages)?,
    };
    aes_key(algorithm, bytes, extractable, usages)
}

pub(crate) fn import_hmac(
    format: KeyFormat,
    data: &KeyData,
    hash: HashAlgorithm,
    length: Option<usize>,
    extractable: bool,
    usages: KeyUsages,
) -> CryptoResult<CryptoKey> {
    let alg = jwk::hmac_alg(hash);
    let bytes = read_secret(format, data, Some(&alg), extractable, usages)?;
    if bytes.is_empty() {
        return Err(CryptoError::data("HMAC key must not be empty"));
    }

    let full = bytes.len() * 8;
    let length = match length {
        None => full,
        Some(bits) if bits <= full && bits > full - 8 => bits,
        Some(bits) => {
            return Err(CryptoError::data(format!(
                "HMAC length {bits} does not match {} bytes of key data",
                bytes.len()
            )))
        }
    };

    Ok(CryptoKey::new(
        KeyAlgorithm::Hmac {
            name: Algorithm::Hmac,
            hash,
            length,
        },
        extractable,
        usages,
        KeyMaterial::Secret(bytes),
    ))
}

/// HKDF and PBKDF2 base keys: raw only, never extractable.
pub(crate) fn import_kdf(
    format: KeyFormat,
    data: &KeyData,
    algorithm: Algorithm,
    extractable: bool,
    usages: KeyUsages,
) -> CryptoResult<CryptoKey> {
    if extractable {
        return Err(CryptoError::invalid_params(format!(
            "{algorithm} keys cannot be extractable"
        )));
    }
    if format != KeyFormat::Raw {
        return Err(format_mismatch(format, KeyType::Secret));
    }
    Ok(CryptoKey::new(
        KeyAlgorithm::Plain { name: algorithm },
        false,
        usages,
        KeyMaterial::Secret(Zeroizing::new(data.bytes()?.to_vec())),
    ))
}

pub(crate) fn export(format: KeyFormat, key: &CryptoKey) -> CryptoResult<KeyData> {
    let bytes = key.secret_bytes()?;
    match format {
        KeyFormat::Raw => Ok(KeyData::Bytes(bytes.to_vec())),
        KeyFormat::Jwk => {
            let mut jwk = JsonWebKey::new(KTY_OCT);
            jwk.k = Some(jwk::encode_b64url(bytes));
            jwk.alg = match key.algorithm() {
                KeyAlgorithm::Aes { name, length } => jwk::aes_alg(*name, *length),
                KeyAlgorithm::Hmac { hash, .. } => Some(jwk::hmac_alg(*hash)),
                _ => None,
            };
            Ok(KeyData::Jwk(jwk))
        }
        other => Err(format_mismatch(other, KeyType::Secret)),
    }
}
