//! # Key Management
//!
//! ECDSA keypair generation and hex serialization for network identities.
//!
//! Every participant — honest miner, SPV client, or adversary — has exactly
//! one keypair for its lifetime. There is no key rotation or recovery; this
//! is a demo network, not a wallet product.
//!
//! ## Why NIST P-192?
//!
//! Not because it's the strongest curve available — it isn't, by a wide
//! margin — but because the wire format this network shares fixes
//! [`crate::config::KEY_LEN`] and [`crate::config::SIG_LEN`] at 96 hex
//! characters, which is exactly what a P-192 verifying key (two concatenated
//! 24-byte field elements) and a P-192 ECDSA signature (two concatenated
//! 24-byte scalars) serialize to. Swapping curves means every node in a
//! deployment re-agrees on a new fixed length; this one is kept so that an
//! existing deployment's wire format doesn't shift under it.
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop.
//! - We use the OS RNG (`OsRng`) for key generation.
//! - Key bytes are never logged.

use std::fmt;

use p192::NistP192;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

use ecdsa::signature::{Signer, Verifier};
use ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid private key bytes: wrong length or not a valid scalar")]
    InvalidPrivateKey,

    #[error("invalid public key hex: wrong length ({0} expected {1} hex chars)")]
    InvalidPublicKeyLength(usize, usize),

    #[error("invalid public key bytes: not a valid curve point")]
    InvalidPublicKeyPoint,

    #[error("invalid signature hex: wrong length ({0} expected {1} hex chars)")]
    InvalidSignatureLength(usize, usize),

    #[error("hex decoding failed: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

/// A network identity keypair wrapping a P-192 ECDSA signing key.
///
/// Every address, every signature traces back to one of these.
pub struct NovaKeypair {
    signing_key: SigningKey<NistP192>,
}

/// The public half of an identity. Serialized on the wire as a 96-hex-char
/// string — `sender`/`receiver` fields on a transaction are exactly this,
/// hex-encoded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NovaPublicKey {
    #[serde(with = "hex_string")]
    bytes: Vec<u8>,
}

/// An ECDSA signature over a message. 96 hex characters ([`crate::config::SIG_LEN`]).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NovaSignature {
    #[serde(with = "hex_string")]
    bytes: Vec<u8>,
}

mod hex_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

impl NovaKeypair {
    /// Generate a fresh keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::<NistP192>::random(&mut OsRng);
        Self { signing_key }
    }

    /// Reconstruct a keypair from raw private-key scalar bytes (24 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let signing_key =
            SigningKey::<NistP192>::from_slice(bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Raw private-key scalar bytes. Handle with care; never logged.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }

    /// The public half of this keypair.
    pub fn public_key(&self) -> NovaPublicKey {
        let verifying_key = VerifyingKey::from(&self.signing_key);
        let point = verifying_key.to_encoded_point(false);
        // Drop the leading 0x04 uncompressed-point tag: the wire format is
        // the bare concatenated (x, y) coordinates, matching the source
        // library's `VerifyingKey.to_string()`.
        let bytes = point.as_bytes()[1..].to_vec();
        NovaPublicKey { bytes }
    }

    /// Sign a message, returning a fixed-length hex-encodable signature.
    pub fn sign(&self, message: &[u8]) -> NovaSignature {
        let sig: EcdsaSignature<NistP192> = self.signing_key.sign(message);
        NovaSignature {
            bytes: sig.to_bytes().to_vec(),
        }
    }
}

impl Drop for NovaKeypair {
    fn drop(&mut self) {
        // SigningKey zeroizes internally on drop for curves backed by
        // `elliptic_curve`'s `SecretKey`; this extra scrub covers any
        // transient copies this wrapper has made.
        let mut scratch = self.signing_key.to_bytes();
        scratch.zeroize();
    }
}

impl fmt::Debug for NovaKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NovaKeypair").field("signing_key", &"<redacted>").finish()
    }
}

impl NovaPublicKey {
    /// Parse a public key from its 96-hex-char wire representation.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        if s.len() != crate::config::KEY_LEN {
            return Err(KeyError::InvalidPublicKeyLength(s.len(), crate::config::KEY_LEN));
        }
        let bytes = hex::decode(s)?;
        // Validate the point actually lies on the curve.
        let mut uncompressed = Vec::with_capacity(bytes.len() + 1);
        uncompressed.push(0x04);
        uncompressed.extend_from_slice(&bytes);
        VerifyingKey::<NistP192>::from_sec1_bytes(&uncompressed)
            .map_err(|_| KeyError::InvalidPublicKeyPoint)?;
        Ok(Self { bytes })
    }

    /// Render as the 96-hex-char wire representation.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    fn to_verifying_key(&self) -> Result<VerifyingKey<NistP192>, KeyError> {
        let mut uncompressed = Vec::with_capacity(self.bytes.len() + 1);
        uncompressed.push(0x04);
        uncompressed.extend_from_slice(&self.bytes);
        VerifyingKey::<NistP192>::from_sec1_bytes(&uncompressed)
            .map_err(|_| KeyError::InvalidPublicKeyPoint)
    }

    /// Verify a signature over `message` under this public key.
    pub fn verify(&self, message: &[u8], signature: &NovaSignature) -> bool {
        let verifying_key = match self.to_verifying_key() {
            Ok(k) => k,
            Err(_) => return false,
        };
        let sig = match EcdsaSignature::<NistP192>::from_slice(&signature.bytes) {
            Ok(s) => s,
            Err(_) => return false,
        };
        verifying_key.verify(message, &sig).is_ok()
    }
}

impl fmt::Debug for NovaPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NovaPublicKey({})", self.to_hex())
    }
}

impl NovaSignature {
    /// Parse a signature from its 96-hex-char wire representation.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        if s.len() != crate::config::SIG_LEN {
            return Err(KeyError::InvalidSignatureLength(s.len(), crate::config::SIG_LEN));
        }
        let bytes = hex::decode(s)?;
        Ok(Self { bytes })
    }

    /// Render as the 96-hex-char wire representation.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for NovaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NovaSignature({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_public_key_has_wire_length() {
        let kp = NovaKeypair::generate();
        assert_eq!(kp.public_key().to_hex().len(), crate::config::KEY_LEN);
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let kp = NovaKeypair::generate();
        let msg = b"send 100 to alice";
        let sig = kp.sign(msg);
        assert_eq!(sig.to_hex().len(), crate::config::SIG_LEN);
        assert!(kp.public_key().verify(msg, &sig));
    }

    #[test]
    fn verify_fails_on_tampered_message() {
        let kp = NovaKeypair::generate();
        let sig = kp.sign(b"original");
        assert!(!kp.public_key().verify(b"tampered", &sig));
    }

    #[test]
    fn verify_fails_under_wrong_key() {
        let kp_a = NovaKeypair::generate();
        let kp_b = NovaKeypair::generate();
        let sig = kp_a.sign(b"hello");
        assert!(!kp_b.public_key().verify(b"hello", &sig));
    }

    #[test]
    fn public_key_hex_round_trips() {
        let kp = NovaKeypair::generate();
        let hex = kp.public_key().to_hex();
        let parsed = NovaPublicKey::from_hex(&hex).unwrap();
        assert_eq!(parsed, kp.public_key());
    }

    #[test]
    fn public_key_rejects_wrong_length() {
        assert!(NovaPublicKey::from_hex("abcd").is_err());
    }

    #[test]
    fn keypair_debug_redacts_secret() {
        let kp = NovaKeypair::generate();
        assert!(format!("{:?}", kp).contains("redacted"));
    }
}
