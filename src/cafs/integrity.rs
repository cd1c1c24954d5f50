//! Subresource-integrity strings for store content
//!
//! Content is identified by `sha512-<base64 digest>`. The on-disk layout
//! uses the hex form of the same digest.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use sha2::{Digest, Sha512};

const ALGORITHM: &str = "sha512";

/// Shortest decoded digest used as-is
pub const MIN_DIGEST_LEN: usize = 2;

/// Compute the integrity string for a byte buffer
pub fn compute(bytes: &[u8]) -> String {
    let digest = Sha512::digest(bytes);
    format!("{}-{}", ALGORITHM, BASE64_STANDARD.encode(digest))
}

/// Hex form of an integrity string's digest
///
/// Only the first hash of a multi-hash string is used and any `?options`
/// suffix is dropped. A string that does not decode to a digest of at least
/// [`MIN_DIGEST_LEN`] bytes maps to the hex SHA-512 of the string itself, so
/// the result is never shorter than a bucket prefix plus a file name.
pub fn to_hex(integrity: &str) -> String {
    let first = integrity.split_whitespace().next().unwrap_or_default();
    let first = first.split('?').next().unwrap_or_default();

    if let Some((_, encoded)) = first.split_once('-') {
        if let Ok(digest) = BASE64_STANDARD.decode(encoded) {
            if digest.len() >= MIN_DIGEST_LEN {
                return hex::encode(digest);
            }
        }
    }
    hex::encode(Sha512::digest(integrity.as_bytes()))
}
