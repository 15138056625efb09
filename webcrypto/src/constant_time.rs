//! Constant-time comparisons.
//!
//! MAC tags, AES-KW integrity values and any other secret-derived bytes are
//! compared through these helpers, never with `==`.

use subtle::ConstantTimeEq;

/// Constant-time comparison of byte slices.
///
/// Length is not secret, so unequal lengths return early.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Verify a computed MAC tag against the one supplied by the caller.
pub fn verify_mac(expected_tag: &[u8], computed_tag: &[u8]) -> bool {
    ct_eq(expected_tag, computed_tag)
}
