//! Digest engine: one-shot hashing and streaming contexts.

use crate::algorithm::HashAlgorithm;
use sha2::digest::DynDigest;
use sha2::Digest;

/// Expand `$body` with `$hash` bound to the concrete hasher type for `$alg`.
macro_rules! dispatch_hash {
    ($alg:expr, $hash:ident => $body:expr) => {
        match $alg {
            $crate::algorithm::HashAlgorithm::Sha1 => {
                type $hash = ::sha1::Sha1;
                $body
            }
            $crate::algorithm::HashAlgorithm::Sha256 => {
                type $hash = ::sha2::Sha256;
                $body
            }
            $crate::algorithm::HashAlgorithm::Sha384 => {
                type $hash = ::sha2::Sha384;
                $body
            }
            $crate::algorithm::HashAlgorithm::Sha512 => {
                type $hash = ::sha2::Sha512;
                $body
            }
        }
    };
}
pub(crate) use dispatch_hash;

/// Hash `data` with `hash`.
pub fn digest(hash: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    tracing::debug!(algorithm = hash.name(), "digest");
    dispatch_hash!(hash, H => H::digest(data).to_vec())
}

/// Incremental hashing for inputs that arrive in pieces.
///
/// Produces exactly what [`digest`] would for the concatenated input.
pub struct DigestContext {
    hash: HashAlgorithm,
    inner: Box<dyn DynDigest + Send + Sync>,
}

impl DigestContext {
    pub fn new(hash: HashAlgorithm) -> Self {
        let inner: Box<dyn DynDigest + Send + Sync> =
            dispatch_hash!(hash, H => Box::new(H::new()));
        Self { hash, inner }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.hash
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> Vec<u8> {
        self.inner.finalize().into_vec()
    }
}

impl std::fmt::Debug for DigestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestContext").field("hash", &self.hash).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // FIPS 180-2 "abc" vectors.
    #[test]
    fn test_known_answers() {
        assert_eq!(
            hex::encode(digest(HashAlgorithm::Sha1, b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            hex::encode(digest(HashAlgorithm::Sha256, b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            hex::encode(digest(HashAlgorithm::Sha384, b"abc")),
            "cb00753f45a35e8bb5a03d699ac65007272c32ab0eded1631a8b605a43ff5bed\
             8086072ba1e7cc2358baeca134c825a7"
        );
        assert_eq!(
            hex::encode(digest(HashAlgorithm::Sha512, b"abc")),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn test_output_lengths() {
        for hash in [
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ] {
            assert_eq!(digest(hash, b"").len(), hash.output_len());
        }
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let data = vec![0x5a; 1000];
        let mut ctx = DigestContext::new(HashAlgorithm::Sha512);
        for chunk in data.chunks(77) {
            ctx.update(chunk);
        }
        assert_eq!(ctx.finalize(), digest(HashAlgorithm::Sha512, &data));
    }
}
