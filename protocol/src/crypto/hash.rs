//! # Hashing Utilities
//!
//! Every hash in this protocol is SHA-256, used two ways:
//!
//! - **Single** (`sha256_hex`) — block headers, transactions, Merkle leaves
//!   and internal nodes.
//! - **Double** (`double_sha256`) — exposed for callers that want Bitcoin-style
//!   double hashing; unused by consensus-critical paths in this network, but
//!   kept as a primitive since the source protocol defines it alongside
//!   single hashing.
//!
//! ## Canonical JSON
//!
//! `hash_json` hashes the `serde_json` serialization of a value. `serde_json`
//! preserves struct field *declaration* order (not alphabetical, unlike a
//! `BTreeMap`), which is what makes this "canonical": every producer in the
//! network emits the exact same byte string for the same logical value, as
//! long as it serializes through the same struct definition. `serde_json`
//! also never inserts extraneous whitespace when using `to_string`/`to_vec`.
//! Types that need to hash as a JSON *object* (as opposed to a bare string)
//! must derive `Serialize` with fields in the order this spec requires.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input bytes, returned as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the SHA-256 hash of the input bytes, returned as a lowercase hex
/// string. This is the hash representation used everywhere on the wire and
/// in the chain store (header hashes, transaction hashes, Merkle hashes).
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Compute the SHA-256 hash of a value's canonical JSON serialization,
/// returned as a lowercase hex string.
///
/// Used for block headers (`hash_json(&header)` is the header hash checked
/// against [`crate::config::TARGET`]) and for any other structure whose
/// identity is defined by its JSON encoding.
pub fn hash_json<T: Serialize>(value: &T) -> String {
    let encoded = serde_json::to_vec(value).expect("canonical JSON encoding is infallible");
    sha256_hex(&encoded)
}

/// Compute SHA-256 twice over the input bytes, returned as a lowercase hex
/// string.
pub fn double_sha256(data: &[u8]) -> String {
    let first = sha256(data);
    sha256_hex(&first)
}
