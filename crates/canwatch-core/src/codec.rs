//! Encoding primitives for the gateway's web login protocol.
//!
//! The gateway derives every value in its challenge-response login from two
//! operations: a url-safe escaping of base64 text, and a SHA-256 hash over a
//! colon-joined pair of values. Both are pure functions with no I/O.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

/// Escape base64 text into the gateway's url-safe alphabet.
///
/// Substitutes `+` with `-`, `/` with `_`, and `=` with `.`; every other
/// character passes through unchanged. The gateway validates the escaped
/// form byte-for-byte, so the mapping must be exact.
#[must_use]
pub fn url_safe_escape(b64: &str) -> String {
    b64.chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            '=' => '.',
            other => other,
        })
        .collect()
}

/// SHA-256 over `a + ":" + b`, encoded as standard (non-url-safe) base64.
///
/// This is the building block for every derived hash in the web login
/// protocol. The hash is order-sensitive: `pair_hash(a, b)` and
/// `pair_hash(b, a)` differ for distinct inputs.
#[must_use]
pub fn pair_hash(a: &str, b: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(a.as_bytes());
    hasher.update(b":");
    hasher.update(b.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// [`pair_hash`] followed by [`url_safe_escape`], the form the gateway
/// expects for login request fields.
#[must_use]
pub fn url_safe_pair_hash(a: &str, b: &str) -> String {
    url_safe_escape(&pair_hash(a, b))
}
