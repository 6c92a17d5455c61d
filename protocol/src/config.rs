//! # Protocol Configuration & Constants
//!
//! Every magic number this network depends on lives here. Every node in a
//! single deployment must agree on these bit-for-bit — in particular on
//! [`TARGET`] and the fixed field lengths, since hashes and signatures are
//! compared as raw hex strings across the wire, not renegotiated.

// ---------------------------------------------------------------------------
// Wire-format field lengths
// ---------------------------------------------------------------------------

/// Length, in hex characters, of a SHA-256 digest (32 bytes).
pub const HASH_LEN: usize = 64;

/// Length, in hex characters, of a public key (and of a sender/receiver
/// field on a transaction). NIST P-192 verifying keys serialize as the
/// concatenated `(x, y)` coordinates, 24 bytes each — 96 hex characters.
pub const KEY_LEN: usize = 96;

/// Length, in hex characters, of a signature. NIST P-192 ECDSA signatures
/// are two concatenated 24-byte scalars — 96 hex characters.
pub const SIG_LEN: usize = 96;

/// Length, in hex characters, of a transaction nonce (32 random bytes).
pub const NONCE_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Proof of work
// ---------------------------------------------------------------------------

/// Difficulty target. A header hash (interpreted as a hex string, compared
/// lexicographically — equivalent to numeric comparison since both operands
/// are fixed-width hex) is valid proof of work iff it is strictly less than
/// this string. Five leading non-`f` hex digits followed by 59 `f`s.
pub const TARGET: &str = "00001fffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

/// Fixed coinbase reward paid to a miner for a successfully mined block.
pub const REWARD: u64 = 100;

/// The genesis block's header timestamp. Not derived from wall-clock time —
/// a fixed sentinel so every node's genesis block, and therefore its hash,
/// is byte-identical.
pub const GENESIS_TIMESTAMP: f64 = 1337.0;

// ---------------------------------------------------------------------------
// Networking
// ---------------------------------------------------------------------------

/// Default port the bootstrap rendezvous service listens on.
pub const RENDEZVOUS_DEFAULT_PORT: u16 = 44444;

/// Fixed worker-pool size used for fan-out broadcasts to peers. Small and
/// bounded on purpose: a single slow or unreachable peer must not be able to
/// stall delivery to the rest of the network.
pub const BROADCAST_POOL_SIZE: usize = 5;

/// Maximum size, in bytes, of a single incoming wire frame. Frames are
/// single-shot (tag byte + JSON body) and this is a generous ceiling, not a
/// protocol-level limit — exceeding it is treated as a configuration/
/// resource error, not a malformed-message one.
pub const BUFSIZE: usize = 65536;

/// Name of the sentinel file that gates mining start. All role processes
/// spin-wait for its existence so a demo orchestrator can coordinate a
/// simultaneous start across independently launched processes.
pub const MINE_LOCK_FILENAME: &str = "mine_lock";

/// Interval between polls of [`MINE_LOCK_FILENAME`] while waiting for it
/// to appear.
pub const MINE_LOCK_POLL_INTERVAL_MS: u64 = 500;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_is_hash_len_hex_chars() {
        assert_eq!(TARGET.len(), HASH_LEN);
        assert!(TARGET.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn target_has_five_non_f_leading_digits() {
        assert_eq!(&TARGET[..5], "00001");
        assert!(TARGET[5..].chars().all(|c| c == 'f'));
    }

    #[test]
    fn field_lengths_are_sane() {
        assert_eq!(KEY_LEN, SIG_LEN);
        assert!(NONCE_LEN < KEY_LEN || NONCE_LEN == HASH_LEN);
        assert_eq!(HASH_LEN, 64);
    }

    #[test]
    fn reward_is_positive() {
        assert!(REWARD > 0);
    }
}
