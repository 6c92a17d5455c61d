//! # Cryptographic Primitives
//!
//! Every signing operation and every hash used for consensus flows through
//! here. We deliberately chose boring cryptography:
//!
//! - **NIST P-192 ECDSA** for signatures — fixed at this curve because the
//!   wire format (96-hex-char keys and signatures) is shared by every node
//!   in a deployment and is not renegotiated.
//! - **SHA-256** for hashing — single and double, over canonical JSON.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. Everything here is a thin wrapper around audited
//! implementations (`sha2`, `p192`/`ecdsa`). If you're tempted to optimize
//! these functions, please reconsider.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{double_sha256, hash_json, sha256, sha256_hex};
pub use keys::{NovaKeypair, NovaPublicKey, NovaSignature};
pub use signatures::{sign, verify, CryptoError};
