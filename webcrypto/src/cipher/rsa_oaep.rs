//! RSA-OAEP with the hash bound to the key.

use crate::digest::dispatch_hash;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{CryptoKey, KeyMaterial, KeyType};
use rand::rngs::OsRng;
use rsa::Oaep;

fn padding(key: &CryptoKey, label: Option<&[u8]>) -> CryptoResult<Oaep> {
    let hash = key
        .algorithm()
        .hash()
        .ok_or_else(|| CryptoError::InvalidAccess("RSA-OAEP key has no hash".to_string()))?;
    let label = label
        .map(|bytes| String::from_utf8(bytes.to_vec()))
        .transpose()
        .map_err(|_| CryptoError::invalid_params("RSA-OAEP label must be valid UTF-8"))?;

    Ok(dispatch_hash!(hash, H => match label {
        Some(label) => Oaep::new_with_label::<H, _>(label),
        None => Oaep::new::<H>(),
    }))
}

pub(crate) fn encrypt(key: &CryptoKey, label: Option<&[u8]>, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let KeyMaterial::RsaPublic(public) = key.material() else {
        return Err(CryptoError::InvalidAccess(format!(
            "RSA-OAEP encryption needs a public key, got a {} key",
            key.key_type().name()
        )));
    };
    public
        .encrypt(&mut OsRng, padding(key, label)?, plaintext)
        .map_err(|e| CryptoError::OperationError(format!("RSA-OAEP encryption failed: {e}")))
}

pub(crate) fn decrypt(key: &CryptoKey, label: Option<&[u8]>, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    key.require_type(KeyType::Private)?;
    let KeyMaterial::RsaPrivate(private) = key.material() else {
        return Err(CryptoError::InvalidAccess("RSA-OAEP decryption needs a private key".to_string()));
    };
    private
        .decrypt_blinded(&mut OsRng, padding(key, label)?, ciphertext)
        .map_err(|_| CryptoError::decryption_failed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{Algorithm, HashAlgorithm};
    use crate::key::{CryptoKeyPair, KeyUsage, KeyUsages};
    use crate::keys::rsa;

    fn pair(hash: HashAlgorithm) -> CryptoKeyPair {
        rsa::generate(
            Algorithm::RsaOaep,
            1024,
            &[0x01, 0x00, 0x01],
            hash,
            true,
            KeyUsages::of(&[KeyUsage::Encrypt]),
            KeyUsages::of(&[KeyUsage::Decrypt]),
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip_with_label() {
        let pair = pair(HashAlgorithm::Sha256);
        let ciphertext = encrypt(&pair.public_key, Some(b"context"), b"secret").unwrap();
        assert_eq!(ciphertext.len(), 128);
        let plaintext = decrypt(&pair.private_key, Some(b"context"), &ciphertext).unwrap();
        assert_eq!(plaintext, b"secret");
    }

    #[test]
    fn test_label_mismatch_fails_generically() {
        let pair = pair(HashAlgorithm::Sha1);
        let ciphertext = encrypt(&pair.public_key, Some(b"a"), b"secret").unwrap();
        let err = decrypt(&pair.private_key, None, &ciphertext).unwrap_err();
        assert_eq!(err.to_string(), CryptoError::decryption_failed().to_string());
    }

    #[test]
    fn test_wrong_key_type() {
        let pair = pair(HashAlgorithm::Sha256);
        assert!(matches!(
            encrypt(&pair.private_key, None, b"x"),
            Err(CryptoError::InvalidAccess(_))
        ));
        assert!(matches!(
            decrypt(&pair.public_key, None, b"x"),
            Err(CryptoError::InvalidAccess(_))
        ));
    }
}
