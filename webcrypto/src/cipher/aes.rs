//! AES modes: GCM, CBC, CTR and key wrap (RFC 3394).
//!
//! GCM, CBC and KW use the RustCrypto mode crates. CTR runs on the bare
//! block cipher because WebCrypto's counter wraps within the low `length` bits.

use crate::error::{CryptoError, CryptoResult};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use aes_kw::{KekAes128, KekAes192, KekAes256};
use aes_gcm::aead::consts::{U12, U13, U14, U15, U16};
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::AesGcm;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

const BLOCK_LEN: usize = 16;

fn invalid_key_length() -> CryptoError {
    CryptoError::data("AES key must be 16, 24 or 32 bytes")
}

/// A keyed AES block cipher of any supported size.
pub(crate) enum AesCipher {
    A128(Aes128),
    A192(Aes192),
    A256(Aes256),
}

impl AesCipher {
    pub(crate) fn new(key: &[u8]) -> CryptoResult<Self> {
        let cipher = match key.len() {
            16 => Aes128::new_from_slice(key).map(Self::A128),
            24 => Aes192::new_from_slice(key).map(Self::A192),
            32 => Aes256::new_from_slice(key).map(Self::A256),
            _ => return Err(invalid_key_length()),
        };
        cipher.map_err(|_| invalid_key_length())
    }

    fn encrypt_block(&self, block: &mut [u8; BLOCK_LEN]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::A128(c) => c.encrypt_block(block),
            Self::A192(c) => c.encrypt_block(block),
            Self::A256(c) => c.encrypt_block(block),
        }
    }
}

// ---------------------------------------------------------------------------
// GCM
// ---------------------------------------------------------------------------

fn gcm_seal<C, T>(key: &[u8], iv: &[u8], aad: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>>
where
    T: aes_gcm::TagSize,
    AesGcm<C, U12, T>: KeyInit + Aead,
{
    let cipher = AesGcm::<C, U12, T>::new_from_slice(key).map_err(|_| invalid_key_length())?;
    let nonce = aes_gcm::aead::Nonce::<AesGcm<C, U12, T>>::from_slice(iv);
    cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::OperationError("AES-GCM encryption failed".to_string()))
}

fn gcm_open<C, T>(key: &[u8], iv: &[u8], aad: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>>
where
    T: aes_gcm::TagSize,
    AesGcm<C, U12, T>: KeyInit + Aead,
{
    let cipher = AesGcm::<C, U12, T>::new_from_slice(key).map_err(|_| invalid_key_length())?;
    let nonce = aes_gcm::aead::Nonce::<AesGcm<C, U12, T>>::from_slice(iv);
    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::decryption_failed())
}

/// Pick the concrete `AesGcm` for a key size and tag length (bits).
macro_rules! gcm_dispatch {
    ($f:ident, $key:expr, $tag_bits:expr, $($arg:expr),+) => {
        match ($key.len(), $tag_bits) {
            (16, 96) => $f::<Aes128, U12>($key, $($arg),+),
            (16, 104) => $f::<Aes128, U13>($key, $($arg),+),
            (16, 112) => $f::<Aes128, U14>($key, $($arg),+),
            (16, 120) => $f::<Aes128, U15>($key, $($arg),+),
            (16, 128) => $f::<Aes128, U16>($key, $($arg),+),
            (24, 96) => $f::<Aes192, U12>($key, $($arg),+),
            (24, 104) => $f::<Aes192, U13>($key, $($arg),+),
            (24, 112) => $f::<Aes192, U14>($key, $($arg),+),
            (24, 120) => $f::<Aes192, U15>($key, $($arg),+),
            (24, 128) => $f::<Aes192, U16>($key, $($arg),+),
            (32, 96) => $f::<Aes256, U12>($key, $($arg),+),
            (32, 104) => $f::<Aes256, U13>($key, $($arg),+),
            (32, 112) => $f::<Aes256, U14>($key, $($arg),+),
            (32, 120) => $f::<Aes256, U15>($key, $($arg),+),
            (32, 128) => $f::<Aes256, U16>($key, $($arg),+),
            (16 | 24 | 32, tag) => Err(CryptoError::invalid_params(format!(
                "unsupported AES-GCM tag length {tag}"
            ))),
            _ => Err(invalid_key_length()),
        }
    };
}

/// Returns ciphertext with the tag appended.
pub(crate) fn gcm_encrypt(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    tag_bits: usize,
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    gcm_dispatch!(gcm_seal, key, tag_bits, iv, aad, plaintext)
}

pub(crate) fn gcm_decrypt(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    tag_bits: usize,
    ciphertext: &[u8],
) -> CryptoResult<Vec<u8>> {
    gcm_dispatch!(gcm_open, key, tag_bits, iv, aad, ciphertext)
}

// ---------------------------------------------------------------------------
// CBC
// ---------------------------------------------------------------------------

pub(crate) fn cbc_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let ciphertext = match key.len() {
        16 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
            .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        24 => cbc::Encryptor::<Aes192>::new_from_slices(key, iv)
            .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        32 => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
            .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        _ => return Err(invalid_key_length()),
    };
    ciphertext.map_err(|_| CryptoError::invalid_params("AES-CBC IV must be 16 bytes"))
}

pub(crate) fn cbc_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    let plaintext = match key.len() {
        16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map(|c| c.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)),
        24 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
            .map(|c| c.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)),
        32 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
            .map(|c| c.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)),
        _ => return Err(invalid_key_length()),
    };
    plaintext
        .map_err(|_| CryptoError::invalid_params("AES-CBC IV must be 16 bytes"))?
        .map_err(|_| CryptoError::decryption_failed())
}

// ---------------------------------------------------------------------------
// CTR
// ---------------------------------------------------------------------------

/// AES-CTR where only the rightmost `length` bits of `counter` increment.
///
/// Encryption and decryption are the same operation.
pub(crate) fn ctr_apply(key: &[u8], counter: &[u8], length: u32, input: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = AesCipher::new(key)?;
    let counter: [u8; BLOCK_LEN] = counter
        .try_into()
        .map_err(|_| CryptoError::invalid_params("AES-CTR counter must be 16 bytes"))?;
    if !(1..=128).contains(&length) {
        return Err(CryptoError::invalid_params("AES-CTR length must be 1..=128"));
    }

    let initial = u128::from_be_bytes(counter);
    let mask = if length == 128 { u128::MAX } else { (1u128 << length) - 1 };
    let nonce = initial & !mask;
    let start = initial & mask;

    let blocks = input.len().div_ceil(BLOCK_LEN) as u128;
    if length < 128 && blocks > (1u128 << length) {
        return Err(CryptoError::OperationError(
            "input would reuse AES-CTR counter values".to_string(),
        ));
    }

    let mut output = Vec::with_capacity(input.len());
    for (i, chunk) in input.chunks(BLOCK_LEN).enumerate() {
        let count = start.wrapping_add(i as u128) & mask;
        let mut keystream = (nonce | count).to_be_bytes();
        cipher.encrypt_block(&mut keystream);
        output.extend(chunk.iter().zip(keystream.iter()).map(|(a, b)| a ^ b));
    }
    Ok(output)
}

// ---------------------------------------------------------------------------
// Key wrap (RFC 3394)
// ---------------------------------------------------------------------------

pub(crate) fn kw_wrap(kek: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    if plaintext.len() % 8 != 0 || plaintext.len() < 16 {
        return Err(CryptoError::OperationError(
            "AES-KW input must be a multiple of 8 bytes and at least 16 bytes".to_string(),
        ));
    }
    let wrapped = match kek.len() {
        16 => KekAes128::try_from(kek).and_then(|kek| kek.wrap_vec(plaintext)),
        24 => KekAes192::try_from(kek).and_then(|kek| kek.wrap_vec(plaintext)),
        32 => KekAes256::try_from(kek).and_then(|kek| kek.wrap_vec(plaintext)),
        _ => return Err(invalid_key_length()),
    };
    wrapped.map_err(|e| CryptoError::OperationError(format!("AES-KW wrap failed: {e}")))
}

pub(crate) fn kw_unwrap(kek: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    if ciphertext.len() % 8 != 0 || ciphertext.len() < 24 {
        return Err(CryptoError::decryption_failed());
    }
    let unwrapped = match kek.len() {
        16 => KekAes128::try_from(kek).and_then(|kek| kek.unwrap_vec(ciphertext)),
        24 => KekAes192::try_from(kek).and_then(|kek| kek.unwrap_vec(ciphertext)),
        32 => KekAes256::try_from(kek).and_then(|kek| kek.unwrap_vec(ciphertext)),
        _ => return Err(invalid_key_length()),
    };
    unwrapped.map_err(|_| CryptoError::decryption_failed())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_128: [u8; 16] = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
    ];

    #[test]
    fn test_gcm_round_trip_every_tag_length() {
        let key = [0x11u8; 32];
        let iv = [0x22u8; 12];
        for tag_bits in [96, 104, 112, 120, 128] {
            let sealed = gcm_encrypt(&key, &iv, b"aad", tag_bits, b"payload").unwrap();
            assert_eq!(sealed.len(), 7 + tag_bits / 8);
            let opened = gcm_decrypt(&key, &iv, b"aad", tag_bits, &sealed).unwrap();
            assert_eq!(opened, b"payload");
        }
    }

    #[test]
    fn test_gcm_wrong_aad_fails_generically() {
        let key = [0x11u8; 16];
        let iv = [0x22u8; 12];
        let sealed = gcm_encrypt(&key, &iv, b"aad", 128, b"payload").unwrap();
        let err = gcm_decrypt(&key, &iv, b"other", 128, &sealed).unwrap_err();
        assert_eq!(err.to_string(), CryptoError::decryption_failed().to_string());
    }

    #[test]
    fn test_gcm_truncated_ciphertext_fails() {
        let key = [0x11u8; 24];
        let iv = [0x22u8; 12];
        assert!(matches!(
            gcm_decrypt(&key, &iv, b"", 128, &[0u8; 8]),
            Err(CryptoError::OperationError(_))
        ));
    }

    // NIST SP 800-38A F.2.1 (CBC-AES128.Encrypt), first block.
    #[test]
    fn test_cbc_known_answer() {
        let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
        let iv = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let plaintext = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
        let ciphertext = cbc_encrypt(&key, &iv, &plaintext).unwrap();
        assert_eq!(hex::encode(&ciphertext[..16]), "7649abac8119b246cee98e9b12e9197d");
        assert_eq!(ciphertext.len(), 32);
        assert_eq!(cbc_decrypt(&key, &iv, &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn test_cbc_bad_padding_fails_generically() {
        let key = [0x33u8; 16];
        let iv = [0u8; 16];
        assert!(matches!(
            cbc_decrypt(&key, &iv, &[0u8; 16]),
            Err(CryptoError::OperationError(_))
        ));
        assert!(matches!(
            cbc_decrypt(&key, &iv, &[0u8; 15]),
            Err(CryptoError::OperationError(_))
        ));
    }

    // NIST SP 800-38A F.5.1 (CTR-AES128.Encrypt), first block.
    #[test]
    fn test_ctr_known_answer() {
        let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
        let counter = hex::decode("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff").unwrap();
        let plaintext = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
        let ciphertext = ctr_apply(&key, &counter, 128, &plaintext).unwrap();
        assert_eq!(hex::encode(&ciphertext), "874d6191b620e3261bef6864990db6ce");
        assert_eq!(ctr_apply(&key, &counter, 128, &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn test_ctr_counter_wraps_within_length() {
        let key = [0x44u8; 16];
        let mut counter = [0xabu8; 16];
        counter[15] = 0xff;

        // With an 8-bit counter, block 2 uses counter byte 0x00 and keeps the prefix.
        let out = ctr_apply(&key, &counter, 8, &[0u8; 32]).unwrap();
        let mut wrapped = counter;
        wrapped[15] = 0x00;
        let expected = ctr_apply(&key, &wrapped, 8, &[0u8; 16]).unwrap();
        assert_eq!(&out[16..], &expected[..]);
    }

    #[test]
    fn test_ctr_rejects_counter_reuse() {
        let key = [0x44u8; 16];
        let counter = [0u8; 16];
        assert!(ctr_apply(&key, &counter, 1, &[0u8; 32]).is_ok());
        assert!(matches!(
            ctr_apply(&key, &counter, 1, &[0u8; 33]),
            Err(CryptoError::OperationError(_))
        ));
    }

    // RFC 3394 section 4.1.
    #[test]
    fn test_kw_known_answer() {
        let data = hex::decode("00112233445566778899aabbccddeeff").unwrap();
        let wrapped = kw_wrap(&KEY_128, &data).unwrap();
        assert_eq!(
            hex::encode(&wrapped),
            "1fa68b0a8112b447aef34bd8fb5a7b829d3e862371d2cfe5"
        );
        assert_eq!(kw_unwrap(&KEY_128, &wrapped).unwrap(), data);
    }

    // RFC 3394 section 4.6: 256-bit data with a 256-bit KEK.
    #[test]
    fn test_kw_known_answer_256() {
        let kek = hex::decode("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f").unwrap();
        let data = hex::decode("00112233445566778899aabbccddeeff000102030405060708090a0b0c0d0e0f").unwrap();
        let wrapped = kw_wrap(&kek, &data).unwrap();
        assert_eq!(
            hex::encode(&wrapped),
            "28c9f404c4b810f4cbccb35cfb87f8263f5786e2d80ed326cbc7f0e71a99f43bfb988b9b7a02dd21"
        );
    }

    #[test]
    fn test_kw_integrity_check() {
        let data = [0x5au8; 24];
        let mut wrapped = kw_wrap(&KEY_128, &data).unwrap();
        wrapped[5] ^= 0x01;
        assert!(matches!(
            kw_unwrap(&KEY_128, &wrapped),
            Err(CryptoError::OperationError(_))
        ));
        assert!(kw_wrap(&KEY_128, &[0u8; 12]).is_err());
    }

    #[test]
    fn test_kw_wrong_kek_fails_like_tampering() {
        let data = [0x11u8; 32];
        let wrapped = kw_wrap(&[0x22; 24], &data).unwrap();
        let error = kw_unwrap(&[0x23; 24], &wrapped).unwrap_err();
        assert_eq!(error.to_string(), CryptoError::decryption_failed().to_string());
        assert!(matches!(kw_wrap(&[0u8; 20], &data), Err(CryptoError::DataError(_))));
    }
}
