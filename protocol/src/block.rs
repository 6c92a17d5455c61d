//! # Blocks
//!
//! A block is a header (previous-block link, Merkle root, timestamp, nonce)
//! plus an ordered list of transactions whose first entry is always the
//! coinbase: the miner paying itself [`crate::config::REWARD`].
//!
//! ## Proof of work
//!
//! [`Block::mine`] repeatedly re-hashes the header with a fresh random
//! nonce until the header's [`crate::crypto::hash_json`] value, read as a
//! hex string, is lexicographically less than [`crate::config::TARGET`].
//! Fixed-width hex strings compare lexicographically exactly like the
//! numbers they represent, so this is the usual "hash below a difficulty
//! target" check without needing a bignum type.
//!
//! Mining is cooperatively cancellable: callers pass a [`MiningControl`]
//! that [`crate::miner`] flips when a block from a peer makes the in-flight
//! one moot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{HASH_LEN, NONCE_LEN, REWARD, TARGET};
use crate::crypto::hash_json;
use crate::merkle::{self, MerkleTree};
use crate::transaction::{Transaction, TransactionError};

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("block has no transactions")]
    Empty,

    #[error("previous-hash field has wrong length: {0} (expected {1})")]
    BadPrevHashLength(usize, usize),

    #[error("merkle root field has wrong length: {0} (expected {1})")]
    BadRootLength(usize, usize),

    #[error("nonce field has wrong length: {0} (expected {1})")]
    BadNonceLength(usize, usize),

    #[error("timestamp must be positive")]
    BadTimestamp,

    #[error("header hash does not meet the difficulty target")]
    InsufficientWork,

    #[error("stored merkle root does not match recomputed root")]
    RootMismatch,

    #[error("duplicate transactions in block")]
    DuplicateTransactions,

    #[error("coinbase transaction does not pay the fixed reward to its own sender")]
    BadCoinbase,

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Merkle(#[from] merkle::MerkleError),
}

/// Shared cancellation flag for an in-flight [`Block::mine`] call. Cloning
/// is cheap (an `Arc`); clone it into the mining thread and keep the
/// original to call [`MiningControl::cancel`] from the control loop.
#[derive(Clone, Default)]
pub struct MiningControl {
    stop: Arc<AtomicBool>,
}

impl MiningControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the in-flight mining loop to give up and return `None`.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Reset the flag so the next mining attempt is not cancelled before it
    /// starts. Called by a listener once it finishes integrating the
    /// foreign block that caused the cancellation.
    pub fn clear(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// A block header. Hashed via [`crate::crypto::hash_json`] over exactly
/// these fields, in this field order — changing the order or adding a
/// field changes every header hash in the network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub prev_hash: String,
    pub root: String,
    pub timestamp: f64,
    pub nonce: String,
}

impl BlockHeader {
    /// This header's hash, hex-encoded.
    pub fn hash(&self) -> String {
        hash_json(self)
    }

    fn meets_target(&self) -> bool {
        self.hash().as_str() < TARGET
    }
}

/// A full block: header plus the ordered transaction list (each stored as
/// its canonical JSON string, matching the Merkle tree's leaf encoding).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<String>,
}

impl Block {
    /// The network's genesis block: a fixed sentinel every honest node
    /// constructs identically, so its hash is the same everywhere without
    /// needing to exchange it first.
    pub fn genesis() -> Self {
        Self {
            header: BlockHeader {
                prev_hash: "0".repeat(HASH_LEN),
                root: "f".repeat(HASH_LEN),
                timestamp: crate::config::GENESIS_TIMESTAMP,
                nonce: "0".repeat(NONCE_LEN),
            },
            transactions: Vec::new(),
        }
    }

    /// Mine a new block extending `prev_hash` over `transactions`
    /// (`transactions[0]` must be the coinbase). Returns `None` if
    /// `control` is cancelled before a valid nonce is found.
    pub fn mine(
        prev_hash: String,
        transactions: Vec<String>,
        control: &MiningControl,
    ) -> Result<Option<Self>, BlockError> {
        if transactions.is_empty() {
            return Err(BlockError::Empty);
        }
        let owned: Vec<String> = transactions.clone();
        let tree = MerkleTree::build(&owned)?;
        let root = tree.root().to_string();

        let mut header = BlockHeader {
            prev_hash,
            root,
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            nonce: random_nonce(),
        };

        while !control.is_cancelled() {
            if header.meets_target() {
                return Ok(Some(Self { header, transactions }));
            }
            header.nonce = random_nonce();
        }
        Ok(None)
    }

    /// Structural validation of the header/transaction-list shape. Does
    /// not check proof of work, the Merkle root, or transaction
    /// signatures — see [`Block::verify`] for the full check.
    pub fn validate(&self) -> Result<(), BlockError> {
        if self.header.prev_hash.len() != HASH_LEN {
            return Err(BlockError::BadPrevHashLength(self.header.prev_hash.len(), HASH_LEN));
        }
        if self.header.root.len() != HASH_LEN {
            return Err(BlockError::BadRootLength(self.header.root.len(), HASH_LEN));
        }
        if self.header.nonce.len() != NONCE_LEN {
            return Err(BlockError::BadNonceLength(self.header.nonce.len(), NONCE_LEN));
        }
        if self.header.timestamp <= 0.0 {
            return Err(BlockError::BadTimestamp);
        }
        Ok(())
    }

    fn check_root(&self) -> Result<bool, BlockError> {
        if self.transactions.is_empty() {
            return Ok(self.header.root == "f".repeat(HASH_LEN));
        }
        let tree = MerkleTree::build(&self.transactions)?;
        Ok(tree.root() == self.header.root)
    }

    fn verify_transactions(&self) -> Result<bool, BlockError> {
        for (i, tx_json) in self.transactions.iter().enumerate() {
            if i == 0 {
                // The coinbase's signature field is present for shape
                // compatibility but is never checked — only that it pays
                // the fixed reward to its own sender.
                let tx: Transaction =
                    serde_json::from_str(tx_json).map_err(|_| TransactionError::Unsigned)?;
                if tx.amount != REWARD as i64 {
                    return Ok(false);
                }
                if tx.sender != tx.receiver {
                    return Ok(false);
                }
                continue;
            }
            let tx = Transaction::from_json(tx_json)?;
            tx.verify()?;
        }
        Ok(true)
    }

    fn check_duplicate_transactions(&self) -> bool {
        let mut seen = std::collections::HashSet::with_capacity(self.transactions.len());
        self.transactions.iter().all(|t| seen.insert(t))
    }

    /// Full, self-contained verification: proof of work, Merkle root
    /// consistency, per-transaction signatures (except the coinbase's),
    /// coinbase discipline, and no duplicate transactions. The genesis
    /// block is trivially valid.
    pub fn verify(&self) -> Result<(), BlockError> {
        if *self == Block::genesis() {
            return Ok(());
        }
        self.validate()?;
        if !self.header.meets_target() {
            return Err(BlockError::InsufficientWork);
        }
        if !self.check_root()? {
            return Err(BlockError::RootMismatch);
        }
        if !self.verify_transactions()? {
            return Err(BlockError::BadCoinbase);
        }
        if !self.check_duplicate_transactions() {
            return Err(BlockError::DuplicateTransactions);
        }
        Ok(())
    }

    /// Build and sign the coinbase transaction a miner pays itself:
    /// `REWARD` from and to the miner's own public key, signed with the
    /// miner's own key exactly like an ordinary transaction.
    pub fn coinbase_for(miner: &crate::crypto::NovaKeypair) -> Transaction {
        let pubkey = miner.public_key();
        Transaction::new(miner, &pubkey, REWARD as i64, "")
            .expect("coinbase fields are always well-formed")
    }

    /// Membership proof for the transaction whose JSON-string hash equals
    /// `tx_hash`, or `None` if no such transaction is in this block.
    pub fn transaction_proof(&self, tx_hash: &str) -> Result<Option<Vec<merkle::ProofStep>>, BlockError> {
        for tx_json in &self.transactions {
            if crate::crypto::sha256_hex(tx_json.as_bytes()) == tx_hash {
                let tree = MerkleTree::build(&self.transactions)?;
                return Ok(Some(tree.proof(tx_json)?));
            }
        }
        Ok(None)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("canonical JSON encoding is infallible")
    }

    pub fn from_json(s: &str) -> Result<Self, BlockError> {
        let block: Block = serde_json::from_str(s).map_err(|_| BlockError::Empty)?;
        block.validate()?;
        Ok(block)
    }
}

fn random_nonce() -> String {
    let mut bytes = vec![0u8; NONCE_LEN / 2];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::NovaKeypair;

    fn signed_tx(sender: &NovaKeypair, receiver_hex: &str, amount: i64) -> String {
        let receiver = crate::crypto::NovaPublicKey::from_hex(receiver_hex).unwrap();
        Transaction::new(sender, &receiver, amount, "").unwrap().to_json()
    }

    #[test]
    fn genesis_is_well_formed_and_verifies() {
        let g = Block::genesis();
        assert!(g.validate().is_ok());
        assert!(g.verify().is_ok());
    }

    #[test]
    fn mined_block_meets_target() {
        let miner = NovaKeypair::generate();
        let coinbase = Block::coinbase_for(&miner).to_json();
        let control = MiningControl::new();
        let block = Block::mine(Block::genesis().header.hash(), vec![coinbase], &control)
            .unwrap()
            .expect("mining should not be cancelled");
        assert!(block.header.hash().as_str() < TARGET);
    }

    #[test]
    fn mined_block_round_trips_through_json() {
        let miner = NovaKeypair::generate();
        let coinbase = Block::coinbase_for(&miner).to_json();
        let control = MiningControl::new();
        let block = Block::mine(Block::genesis().header.hash(), vec![coinbase], &control)
            .unwrap()
            .unwrap();
        let parsed = Block::from_json(&block.to_json()).unwrap();
        assert_eq!(block, parsed);
    }

    #[test]
    fn mine_returns_none_when_cancelled_immediately() {
        let miner = NovaKeypair::generate();
        let coinbase = Block::coinbase_for(&miner).to_json();
        let control = MiningControl::new();
        control.cancel();
        let result = Block::mine(Block::genesis().header.hash(), vec![coinbase], &control).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn mine_rejects_empty_transaction_list() {
        let control = MiningControl::new();
        let err = Block::mine(Block::genesis().header.hash(), vec![], &control).unwrap_err();
        assert!(matches!(err, BlockError::Empty));
    }

    #[test]
    fn verify_detects_tampered_root() {
        let miner = NovaKeypair::generate();
        let coinbase = Block::coinbase_for(&miner).to_json();
        let control = MiningControl::new();
        let mut block =
            Block::mine(Block::genesis().header.hash(), vec![coinbase], &control).unwrap().unwrap();
        block.header.root = "0".repeat(HASH_LEN);
        assert!(matches!(block.verify(), Err(BlockError::RootMismatch)));
    }

    #[test]
    fn verify_detects_duplicate_transactions() {
        let miner = NovaKeypair::generate();
        let other = NovaKeypair::generate();
        let coinbase = Block::coinbase_for(&miner).to_json();
        let tx = signed_tx(&miner, &other.public_key().to_hex(), 1);
        let control = MiningControl::new();
        let block = Block::mine(
            Block::genesis().header.hash(),
            vec![coinbase, tx.clone(), tx],
            &control,
        )
        .unwrap()
        .unwrap();
        assert!(matches!(block.verify(), Err(BlockError::DuplicateTransactions)));
    }

    #[test]
    fn verify_detects_bad_coinbase_amount() {
        let miner = NovaKeypair::generate();
        let miner_pub = miner.public_key();
        let coinbase_tx = Transaction::new(&miner, &miner_pub, 999, "").unwrap();
        let control = MiningControl::new();
        let block = Block::mine(
            Block::genesis().header.hash(),
            vec![coinbase_tx.to_json()],
            &control,
        )
        .unwrap()
        .unwrap();
        assert!(matches!(block.verify(), Err(BlockError::BadCoinbase)));
    }

    #[test]
    fn transaction_proof_found_and_verifies() {
        let miner = NovaKeypair::generate();
        let other = NovaKeypair::generate();
        let coinbase = Block::coinbase_for(&miner).to_json();
        let tx = signed_tx(&miner, &other.public_key().to_hex(), 3);
        let control = MiningControl::new();
        let block =
            Block::mine(Block::genesis().header.hash(), vec![coinbase, tx.clone()], &control)
                .unwrap()
                .unwrap();
        let tx_hash = crate::crypto::sha256_hex(tx.as_bytes());
        let proof = block.transaction_proof(&tx_hash).unwrap().expect("tx is in block");
        assert!(merkle::verify_proof(&tx, &proof, &block.header.root));
    }
}
