//! Content-address derivation
//!
//! A fingerprint is the SHA-256 digest of the version salt followed by the
//! input string, rendered as lowercase hex. Hex output contains no slashes
//! or reserved characters, so it is safe as a path component everywhere.

use sha2::{Digest, Sha256};

/// Digest `salt ++ input` into a 64-character lowercase hex fingerprint
pub(crate) fn fingerprint(salt: &str, input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
