//! # Chain Store
//!
//! A content-addressed block DAG keyed by header hash, with fork tracking
//! and longest-chain resolution. Nothing is ever pruned: blocks that lose a
//! fork race stay in the store, reachable by hash, in case a later block
//! extends them back into the winning chain.
//!
//! ## Fork resolution
//!
//! Every chain tip (a block hash with no known child yet) is tracked
//! alongside its chain length. [`Chain::resolve`] picks the tip with the
//! greatest length; ties are broken by summed proof-of-work across the
//! whole fork — the sum of each header hash interpreted as a 256-bit
//! integer, matching the source network's `_get_chain_pow`.
//!
//! ## A performance note
//!
//! The source network's `_get_chain_length`/`_get_chain_pow` walk the
//! parent chain by **linearly scanning every known block** on each hop,
//! looking for the one whose hash matches `prev_hash`. That's quadratic in
//! chain length for no reason — we keep a `HashMap<hash, Block>` here
//! specifically so each hop is an O(1) lookup instead. The resulting chain
//! length and PoW sum are identical; only the plumbing to get there is
//! faster.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::block::{Block, BlockError};
use crate::merkle;
use crate::transaction::{Transaction, TransactionError};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("previous block {0} does not exist in the chain store")]
    PrevBlockUnknown(String),

    #[error("previous block is invalid")]
    PrevBlockInvalid,

    #[error("block timestamp does not exceed its parent's timestamp")]
    TimestampNotIncreasing,

    #[error("block reuses a transaction already present in its fork")]
    TransactionReused,

    #[error("fork balance replay went negative for an account")]
    InconsistentFork,

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Merkle(#[from] merkle::MerkleError),
}

/// The fork-aware block store. A single miner, SPV client, or adversary
/// role owns one of these and mutates it under the lock ordering documented
/// in [`crate::miner`].
pub struct Chain {
    blocks: HashMap<String, Block>,
    /// Chain tips: hash of a block with no known child yet, mapped to its
    /// chain length (blocks since genesis, genesis itself counting as 0).
    tips: HashMap<String, u64>,
    genesis_hash: String,
}

impl Chain {
    /// A fresh chain containing only the genesis block.
    pub fn new() -> Self {
        let genesis = Block::genesis();
        let genesis_hash = genesis.header.hash();
        let mut blocks = HashMap::new();
        blocks.insert(genesis_hash.clone(), genesis);
        let mut tips = HashMap::new();
        tips.insert(genesis_hash.clone(), 0);
        Self { blocks, tips, genesis_hash }
    }

    pub fn genesis_hash(&self) -> &str {
        &self.genesis_hash
    }

    /// Look up a block by its header hash.
    pub fn get(&self, hash: &str) -> Option<&Block> {
        self.blocks.get(hash)
    }

    fn chain_length(&self, block: &Block) -> u64 {
        let mut prev_hash = block.header.prev_hash.clone();
        let mut len = 0u64;
        while prev_hash != Block::genesis().header.prev_hash {
            let blk = &self.blocks[&prev_hash];
            prev_hash = blk.header.prev_hash.clone();
            len += 1;
        }
        len
    }

    fn chain_pow(&self, block: &Block) -> num_bigint_like::U256Sum {
        let mut sum = num_bigint_like::U256Sum::from_hex(&block.header.hash());
        let mut prev_hash = block.header.prev_hash.clone();
        while prev_hash != Block::genesis().header.prev_hash {
            let blk = &self.blocks[&prev_hash];
            sum = sum.add_hex(&blk.header.hash());
            prev_hash = blk.header.prev_hash.clone();
        }
        sum
    }

    /// Verify `block` is a legal extension of the chain: its parent is
    /// known and valid, its timestamp strictly increases over its parent's,
    /// the block is internally valid, and it doesn't reuse a transaction
    /// already committed on its own fork.
    pub fn verify(&self, block: &Block) -> Result<(), ChainError> {
        let parent = self
            .blocks
            .get(&block.header.prev_hash)
            .ok_or_else(|| ChainError::PrevBlockUnknown(block.header.prev_hash.clone()))?;

        parent.validate().map_err(|_| ChainError::PrevBlockInvalid)?;
        parent.verify().map_err(|_| ChainError::PrevBlockInvalid)?;

        if block.header.timestamp <= parent.header.timestamp {
            return Err(ChainError::TimestampNotIncreasing);
        }

        block.validate()?;
        block.verify()?;

        let existing: HashSet<&String> =
            self.transactions_on_fork(&block.header.prev_hash)?.into_iter().collect();
        // transactions_on_fork returns owned Strings; re-collect as a set
        // of references is awkward, so just rebuild as an owned HashSet.
        let existing: HashSet<String> = existing.into_iter().cloned().collect();
        for tx in &block.transactions {
            if existing.contains(tx) {
                return Err(ChainError::TransactionReused);
            }
        }

        Ok(())
    }

    /// Verify and add `block` to the store, updating tip tracking.
    pub fn add(&mut self, block: Block) -> Result<(), ChainError> {
        self.verify(&block)?;
        let curr_hash = block.header.hash();
        let prev_hash = block.header.prev_hash.clone();

        if let Some(len) = self.tips.remove(&prev_hash) {
            self.tips.insert(curr_hash.clone(), len + 1);
        } else {
            let len = self.chain_length(&block);
            self.tips.insert(curr_hash.clone(), len);
        }
        self.blocks.insert(curr_hash, block);
        Ok(())
    }

    /// The hash of the block at the tip of the winning fork: longest chain
    /// first, summed-PoW tiebreak second.
    pub fn resolve(&self) -> &str {
        if self.tips.len() == 1 {
            return self.tips.keys().next().expect("non-empty tips");
        }
        let longest = *self.tips.values().max().expect("non-empty tips");
        let mut candidates: Vec<&String> =
            self.tips.iter().filter(|(_, &len)| len == longest).map(|(h, _)| h).collect();

        if candidates.len() > 1 {
            candidates.sort_by(|a, b| {
                let pow_a = self.chain_pow(&self.blocks[*a]);
                let pow_b = self.chain_pow(&self.blocks[*b]);
                pow_b.cmp(&pow_a)
            });
        }
        candidates[0]
    }

    /// All blocks on the fork ending at `tip_hash`, from `tip_hash` back to
    /// (but excluding) genesis, ordered tip-first.
    pub fn blocks_on_fork(&self, tip_hash: &str) -> Result<Vec<&Block>, ChainError> {
        let mut blocks = Vec::new();
        let mut curr_hash = tip_hash.to_string();
        loop {
            let block = self
                .blocks
                .get(&curr_hash)
                .ok_or_else(|| ChainError::PrevBlockUnknown(curr_hash.clone()))?;
            if *block == Block::genesis() {
                break;
            }
            blocks.push(block);
            curr_hash = block.header.prev_hash.clone();
        }
        Ok(blocks)
    }

    /// All transaction JSON strings on the fork ending at `tip_hash`.
    pub fn transactions_on_fork(&self, tip_hash: &str) -> Result<Vec<String>, ChainError> {
        let mut out = Vec::new();
        for block in self.blocks_on_fork(tip_hash)? {
            out.extend(block.transactions.iter().cloned());
        }
        Ok(out)
    }

    /// Account balances after replaying every transaction on the fork
    /// ending at `tip_hash`, coinbase-first per block.
    pub fn balance_on_fork(&self, tip_hash: &str) -> Result<HashMap<String, i64>, ChainError> {
        let mut balance: HashMap<String, i64> = HashMap::new();
        // blocks_on_fork returns tip-first; replay oldest-first.
        let mut blocks = self.blocks_on_fork(tip_hash)?;
        blocks.reverse();
        for block in blocks {
            for (i, tx_json) in block.transactions.iter().enumerate() {
                let tx = Transaction::from_json(tx_json)?;
                balance.entry(tx.sender.clone()).or_insert(0);
                balance.entry(tx.receiver.clone()).or_insert(0);
                if i == 0 && tx.sender == tx.receiver {
                    *balance.get_mut(&tx.receiver).unwrap() += tx.amount;
                } else {
                    *balance.get_mut(&tx.sender).unwrap() -= tx.amount;
                    *balance.get_mut(&tx.receiver).unwrap() += tx.amount;
                }
            }
        }
        if balance.values().any(|&amt| amt < 0) {
            return Err(ChainError::InconsistentFork);
        }
        Ok(balance)
    }

    /// Locate the membership proof for the transaction hashing to
    /// `tx_hash`, searching the fork ending at `tip_hash` from the tip
    /// backwards. Returns the containing block's header hash and the proof.
    pub fn transaction_proof_on_fork(
        &self,
        tx_hash: &str,
        tip_hash: &str,
    ) -> Result<Option<(String, Vec<merkle::ProofStep>)>, ChainError> {
        for block in self.blocks_on_fork(tip_hash)? {
            if let Some(proof) = block.transaction_proof(tx_hash)? {
                return Ok(Some((block.header.hash(), proof)));
            }
        }
        Ok(None)
    }

    /// Snapshot of every known chain tip and its length. Exposed for
    /// diagnostics and tests; not used in consensus decisions directly
    /// (see [`Chain::resolve`]).
    pub fn tips(&self) -> &HashMap<String, u64> {
        &self.tips
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

/// A minimal fixed-width unsigned integer, just big enough to sum 256-bit
/// hex digests without overflow, for the PoW tiebreak in [`Chain::resolve`].
/// Not a general-purpose bignum — addition only, no subtraction or
/// multiplication, because that's all fork resolution ever needs.
mod num_bigint_like {
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
    pub struct U256Sum {
        // Little-endian 32-bit limbs, widened to avoid overflow when
        // summing many 256-bit values.
        limbs: [u64; 5],
    }

    impl U256Sum {
        pub fn from_hex(hex: &str) -> Self {
            let mut s = Self::default();
            s.add_hex(hex)
        }

        pub fn add_hex(&self, hex: &str) -> Self {
            let bytes = hex::decode(hex).expect("header hash is always valid hex");
            let mut limbs = self.limbs;
            // Split the 32-byte digest into four 64-bit big-endian chunks
            // and add them into the low four limbs, propagating carry into
            // the fifth (overflow-guard) limb.
            for (i, chunk) in bytes.chunks(8).enumerate() {
                let mut padded = [0u8; 8];
                padded[..chunk.len()].copy_from_slice(chunk);
                let value = u64::from_be_bytes(padded);
                let (sum, carry) = limbs[i].overflowing_add(value);
                limbs[i] = sum;
                if carry {
                    limbs[4] = limbs[4].wrapping_add(1);
                }
            }
            Self { limbs }
        }
    }
}
