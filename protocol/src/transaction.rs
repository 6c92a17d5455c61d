//! # Transactions
//!
//! A transaction is a signed instruction to move `amount` from `sender` to
//! `receiver`. There is no account nesting, no multi-output model, no fee
//! market — `sender` pays `receiver` exactly `amount`, full stop. Balance
//! bookkeeping (does `sender` actually have `amount`) is deliberately not
//! this type's job; it lives in [`crate::mempool`], which has visibility
//! into the whole chain state a single transaction does not.
//!
//! ## Canonical form
//!
//! The signature covers the transaction's own canonical JSON encoding with
//! the `signature` field held at `null`. Every node must serialize through
//! this exact struct (field order: sender, receiver, amount, comment,
//! nonce, signature) for signatures to verify identically everywhere — see
//! [`crate::crypto::hash_json`] for why `serde_json`'s declaration-order
//! behavior is what makes this work.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{KEY_LEN, NONCE_LEN, SIG_LEN};
use crate::crypto::{sign as crypto_sign, verify as crypto_verify};
use crate::crypto::{NovaKeypair, NovaPublicKey, NovaSignature};

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("sender key has wrong length: {0} (expected {1})")]
    BadSenderLength(usize, usize),

    #[error("receiver key has wrong length: {0} (expected {1})")]
    BadReceiverLength(usize, usize),

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    #[error("signature has wrong length: {0} (expected {1})")]
    BadSignatureLength(usize, usize),

    #[error("nonce has wrong length: {0} (expected {1})")]
    BadNonceLength(usize, usize),

    #[error("transaction is unsigned")]
    Unsigned,

    #[error("signature does not verify against sender's public key")]
    BadSignature,

    #[error(transparent)]
    Key(#[from] crate::crypto::keys::KeyError),
}

/// A signed value transfer.
///
/// `sender`/`receiver` are hex-encoded public keys
/// ([`crate::config::KEY_LEN`] chars each); `signature` is a hex-encoded
/// ECDSA signature ([`crate::config::SIG_LEN`] chars) over the transaction's
/// own canonical JSON with `signature` set to `None`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: i64,
    #[serde(default)]
    pub comment: String,
    /// Random per-transaction nonce, hex-encoded ([`crate::config::NONCE_LEN`]
    /// chars). Exists purely so two transactions with identical
    /// sender/receiver/amount/comment don't collide to the same hash and
    /// the same signature.
    pub nonce: String,
    pub signature: Option<String>,
}

impl Transaction {
    /// Construct an unsigned transaction. Use [`Transaction::new`] to build
    /// a signed, validated one in a single step.
    pub fn unsigned(sender: String, receiver: String, amount: i64, comment: String) -> Self {
        let mut nonce_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        Self {
            sender,
            receiver,
            amount,
            comment,
            nonce: hex::encode(nonce_bytes),
            signature: None,
        }
    }

    /// Build, sign, and validate a transaction in one step. Mirrors the
    /// source network's `Transaction.new` classmethod, which refuses to
    /// hand back a transaction that doesn't pass its own `validate()`.
    pub fn new(
        sender_keypair: &NovaKeypair,
        receiver: &NovaPublicKey,
        amount: i64,
        comment: impl Into<String>,
    ) -> Result<Self, TransactionError> {
        let sender_hex = sender_keypair.public_key().to_hex();
        let mut tx = Self::unsigned(sender_hex, receiver.to_hex(), amount, comment.into());
        tx.sign(sender_keypair);
        tx.validate()?;
        Ok(tx)
    }

    /// The bytes a signature is computed over: this transaction's own
    /// canonical JSON with `signature` forced to `None`.
    fn signable_bytes(&self) -> Vec<u8> {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        serde_json::to_vec(&unsigned).expect("canonical JSON encoding is infallible")
    }

    /// Sign this transaction in place with `keypair`. The caller is
    /// responsible for ensuring `keypair`'s public key matches `sender`.
    pub fn sign(&mut self, keypair: &NovaKeypair) {
        let sig = crypto_sign(keypair, &self.signable_bytes());
        self.signature = Some(sig.to_hex());
    }

    /// Verify the embedded signature against `sender`.
    pub fn verify(&self) -> Result<(), TransactionError> {
        let sig_hex = self.signature.as_deref().ok_or(TransactionError::Unsigned)?;
        let signature = NovaSignature::from_hex(sig_hex)?;
        let sender_key = NovaPublicKey::from_hex(&self.sender)?;
        if crypto_verify(&sender_key, &self.signable_bytes(), &signature) {
            Ok(())
        } else {
            Err(TransactionError::BadSignature)
        }
    }

    /// Structural validation: field lengths and a positive amount. Does
    /// NOT check the signature — call [`Transaction::verify`] for that, or
    /// [`Transaction::validate_and_verify`] for both.
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.sender.len() != KEY_LEN {
            return Err(TransactionError::BadSenderLength(self.sender.len(), KEY_LEN));
        }
        if self.receiver.len() != KEY_LEN {
            return Err(TransactionError::BadReceiverLength(self.receiver.len(), KEY_LEN));
        }
        if self.amount <= 0 {
            return Err(TransactionError::NonPositiveAmount(self.amount));
        }
        if self.nonce.len() != NONCE_LEN {
            return Err(TransactionError::BadNonceLength(self.nonce.len(), NONCE_LEN));
        }
        match &self.signature {
            Some(sig) if sig.len() == SIG_LEN => Ok(()),
            Some(sig) => Err(TransactionError::BadSignatureLength(sig.len(), SIG_LEN)),
            None => Err(TransactionError::Unsigned),
        }
    }

    /// Structural validation plus signature verification — the full check
    /// a node runs before admitting a transaction into its mempool.
    pub fn validate_and_verify(&self) -> Result<(), TransactionError> {
        self.validate()?;
        self.verify()
    }

    /// Serialize to the canonical wire JSON string. This is also the
    /// string hashed as a Merkle leaf and used as the mempool's dedup key.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("canonical JSON encoding is infallible")
    }

    /// Parse and fully validate a transaction from its wire JSON string.
    pub fn from_json(s: &str) -> Result<Self, TransactionError> {
        let tx: Transaction =
            serde_json::from_str(s).map_err(|_| TransactionError::BadSignature)?;
        tx.validate_and_verify()?;
        Ok(tx)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> NovaKeypair {
        NovaKeypair::generate()
    }

    #[test]
    fn new_produces_valid_verified_transaction() {
        let sender = keypair();
        let receiver = keypair();
        let tx = Transaction::new(&sender, &receiver.public_key(), 10, "hello world").unwrap();
        assert!(tx.validate_and_verify().is_ok());
    }

    #[test]
    fn json_round_trip_preserves_validity() {
        let sender = keypair();
        let receiver = keypair();
        let tx = Transaction::new(&sender, &receiver.public_key(), 42, "").unwrap();
        let json = tx.to_json();
        let parsed = Transaction::from_json(&json).unwrap();
        assert_eq!(tx, parsed);
    }

    #[test]
    fn nonpositive_amount_rejected() {
        let sender = keypair();
        let receiver = keypair();
        let err = Transaction::new(&sender, &receiver.public_key(), 0, "").unwrap_err();
        assert!(matches!(err, TransactionError::NonPositiveAmount(0)));
    }

    #[test]
    fn tampered_amount_fails_signature_verification() {
        let sender = keypair();
        let receiver = keypair();
        let mut tx = Transaction::new(&sender, &receiver.public_key(), 10, "").unwrap();
        tx.amount = 10_000;
        assert!(matches!(tx.verify(), Err(TransactionError::BadSignature)));
    }

    #[test]
    fn two_transactions_with_same_fields_differ_by_nonce() {
        let sender = keypair();
        let receiver = keypair();
        let t1 = Transaction::new(&sender, &receiver.public_key(), 5, "x").unwrap();
        let t2 = Transaction::new(&sender, &receiver.public_key(), 5, "x").unwrap();
        assert_ne!(t1.nonce, t2.nonce);
        assert_ne!(t1.to_json(), t2.to_json());
    }

    #[test]
    fn wrong_length_sender_rejected() {
        let mut tx = Transaction::unsigned(
            "ab".to_string(),
            "c".repeat(KEY_LEN),
            1,
            String::new(),
        );
        tx.signature = Some("d".repeat(SIG_LEN));
        assert!(matches!(tx.validate(), Err(TransactionError::BadSenderLength(2, KEY_LEN))));
    }
}
