//! # Digital Signatures
//!
//! NIST P-192 ECDSA signing and verification — the backbone of authentication
//! in NOVA.
//!
//! Every transaction and every peer handshake is authenticated with a
//! signature over its canonical JSON encoding. This module provides the
//! free-function signing and verification API that the rest of the crate
//! calls, wrapping the typed operations on [`NovaKeypair`]/[`NovaPublicKey`].
//!
//! ## Why not just use the curve crate directly?
//!
//! We could, and in some internal code we do. But wrapping the operations
//! gives us:
//!
//! 1. A single place to audit all signing operations.
//! 2. Consistent error types across the codebase.
//! 3. Type safety — you can't accidentally pass a hash where a message goes.

use thiserror::Error;

use super::keys::{KeyError, NovaKeypair, NovaPublicKey, NovaSignature};

/// Errors during signature operations.
///
/// Intentionally vague on verification failure — we don't tell attackers
/// why a signature didn't check out, only that it didn't.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Sign a message using a NOVA keypair.
///
/// # Arguments
///
/// * `keypair` — The signer's keypair. Only the signing key is used, but
///   we take the full keypair to prevent callers from forgetting they need
///   the private key.
/// * `message` — The message bytes to sign. Can be any length.
///
/// # Example
///
/// ```
/// use nova_protocol::crypto::{NovaKeypair, sign, verify};
///
/// let keypair = NovaKeypair::generate();
/// let message = b"send 100 to alice";
/// let signature = sign(&keypair, message);
///
/// assert!(verify(&keypair.public_key(), message, &signature));
/// ```
pub fn sign(keypair: &NovaKeypair, message: &[u8]) -> NovaSignature {
    keypair.sign(message)
}

/// Verify a signature against a public key and message.
///
/// Returns `true` if the signature is valid, `false` otherwise.
/// We intentionally don't distinguish between "invalid signature" and
/// "wrong public key" — both are just "nope." Giving callers a detailed
/// error oracle is a bad idea.
///
/// # Arguments
///
/// * `public_key` — The signer's public key.
/// * `message` — The original message bytes.
/// * `signature` — The signature to verify.
pub fn verify(public_key: &NovaPublicKey, message: &[u8], signature: &NovaSignature) -> bool {
    public_key.verify(message, signature)
}

/// Verify a signature, returning `Err(CryptoError::VerificationFailed)`
/// instead of `false` on mismatch. Convenient inside `?`-chained validation
/// such as [`crate::transaction::Transaction::verify`].
pub fn verify_or_err(
    public_key: &NovaPublicKey,
    message: &[u8],
    signature: &NovaSignature,
) -> Result<(), CryptoError> {
    if verify(public_key, message, signature) {
        Ok(())
    } else {
        Err(CryptoError::VerificationFailed)
    }
}

/// Sign a message and return the signature as raw bytes.
///
/// Convenience function for when you need bytes instead of a `NovaSignature`
/// struct. Common in serialization paths where you're building wire-format
/// messages and don't want to round-trip through the typed wrapper.
pub fn sign_to_bytes(keypair: &NovaKeypair, message: &[u8]) -> Vec<u8> {
    let sig = sign(keypair, message);
    hex::decode(sig.to_hex()).expect("sign() always produces valid hex")
}

/// Batch-verify multiple signatures.
///
/// All signatures must be valid for this to return `Ok`. If any single
/// signature fails, the entire batch fails — we don't tell you which one.
/// If you need to know which signature is bad, verify them individually.
///
/// Sequential under the hood; P-192 verification is cheap enough that a
/// typical block's worth of transactions verifies well under a millisecond
/// per signature.
///
/// # Arguments
///
/// * `items` — A slice of (public_key, message, signature) tuples.
pub fn batch_verify(
    items: &[(NovaPublicKey, Vec<u8>, NovaSignature)],
) -> Result<(), CryptoError> {
    for (pubkey, message, signature) in items {
        if !verify(pubkey, message, signature) {
            return Err(CryptoError::VerificationFailed);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let kp = NovaKeypair::generate();
        let msg = b"hello, world";
        let sig = sign(&kp, msg);
        assert!(verify(&kp.public_key(), msg, &sig));
    }

    #[test]
    fn test_wrong_message_fails() {
        let kp = NovaKeypair::generate();
        let sig = sign(&kp, b"correct message");
        assert!(!verify(&kp.public_key(), b"wrong message", &sig));
    }

    #[test]
    fn test_wrong_key_fails() {
        let kp1 = NovaKeypair::generate();
        let kp2 = NovaKeypair::generate();
        let msg = b"test message";
        let sig = sign(&kp1, msg);
        assert!(!verify(&kp2.public_key(), msg, &sig));
    }

    #[test]
    fn test_verify_or_err_maps_failure() {
        let kp = NovaKeypair::generate();
        let sig = sign(&kp, b"original");
        let err = verify_or_err(&kp.public_key(), b"tampered", &sig).unwrap_err();
        assert!(matches!(err, CryptoError::VerificationFailed));
    }

    #[test]
    fn test_sign_to_bytes_roundtrip() {
        let kp = NovaKeypair::generate();
        let msg = b"bytes go in, bytes come out";
        let sig_bytes = sign_to_bytes(&kp, msg);
        assert_eq!(sig_bytes.len(), crate::config::SIG_LEN / 2);
    }

    #[test]
    fn test_empty_message() {
        let kp = NovaKeypair::generate();
        let sig = sign(&kp, b"");
        assert!(verify(&kp.public_key(), b"", &sig));
    }

    #[test]
    fn test_large_message() {
        let kp = NovaKeypair::generate();
        let msg = vec![0xAB; 1_000_000];
        let sig = sign(&kp, &msg);
        assert!(verify(&kp.public_key(), &msg, &sig));
    }

    #[test]
    fn test_batch_verify_success() {
        let items: Vec<(NovaPublicKey, Vec<u8>, NovaSignature)> = (0..10)
            .map(|i| {
                let kp = NovaKeypair::generate();
                let msg = format!("message number {}", i).into_bytes();
                let sig = sign(&kp, &msg);
                (kp.public_key(), msg, sig)
            })
            .collect();

        assert!(batch_verify(&items).is_ok());
    }

    #[test]
    fn test_batch_verify_one_bad_apple() {
        let kp1 = NovaKeypair::generate();
        let kp2 = NovaKeypair::generate();

        let msg1 = b"valid".to_vec();
        let sig1 = sign(&kp1, &msg1);

        let msg2 = b"also valid".to_vec();
        let sig2 = sign(&kp2, &msg2);

        // Swap the public key on the second one to make it invalid.
        let items = vec![
            (kp1.public_key(), msg1, sig1),
            (kp1.public_key(), msg2, sig2),
        ];

        assert!(batch_verify(&items).is_err());
    }

    #[test]
    fn test_batch_verify_empty() {
        assert!(batch_verify(&[]).is_ok());
    }
}
