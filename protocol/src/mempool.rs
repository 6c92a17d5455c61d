//! # Mempool / Account Engine
//!
//! Tracks every signature-verified transaction a node has seen (`all_tx`)
//! alongside the subset already committed on the current best fork
//! (`added_tx`, derived — never written to directly). The difference is
//! the pending pool a miner draws a candidate block from.
//!
//! ## Derived, not authoritative
//!
//! [`Mempool::update`] is the only thing that ever repopulates `added_tx`
//! and the balance cache, and it does so by asking [`crate::chain::Chain`]
//! — the sole source of truth — to replay the winning fork. This follows
//! option (a) of the source network's two documented designs: no
//! incremental balance application, no undo log for re-orgs. A re-org just
//! means the next `update()` call replays a different fork from scratch.
//!
//! ## Candidate selection
//!
//! [`Mempool::gather`] can't just hand every pending transaction to the
//! miner — pending may contain a double-spend or a transaction spending
//! more than its sender has. Rather than writing a conflict resolver, it
//! simulates the full pending set against a balance snapshot and, on
//! failure, shrinks to a uniformly-random subset one transaction smaller,
//! repeating until a feasible subset (possibly empty) is found.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::block::Block;
use crate::chain::{Chain, ChainError};
use crate::crypto::NovaKeypair;
use crate::transaction::{Transaction, TransactionError};

#[derive(Debug, Error)]
pub enum MempoolError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// A node's view of outstanding transactions and the account balances on
/// its current best fork.
///
/// Lock ordering, matching the source network's documented discipline:
/// [`Mempool::update`] takes `added_tx` then `balance`; `all_tx` is always
/// acquired alone or as the innermost lock. Never hold two of these locks
/// across an `.await` or blocking call — there are none in this crate, but
/// keep it that way.
pub struct Mempool {
    all_tx: RwLock<HashSet<String>>,
    added_tx: RwLock<HashSet<String>>,
    balance: RwLock<HashMap<String, i64>>,
}

impl Mempool {
    pub fn new() -> Self {
        Self {
            all_tx: RwLock::new(HashSet::new()),
            added_tx: RwLock::new(HashSet::new()),
            balance: RwLock::new(HashMap::new()),
        }
    }

    /// Verify and admit a transaction into `all_tx`. Idempotent: a
    /// transaction already present (by JSON-string equality) is silently
    /// dropped, matching the source network's `add_transaction`.
    pub fn add_transaction(&self, tx_json: String) -> Result<(), MempoolError> {
        Transaction::from_json(&tx_json)?;
        self.all_tx.write().insert(tx_json);
        Ok(())
    }

    /// Recompute `added_tx` and the balance cache from `chain`'s current
    /// best fork. Returns the resolved tip hash. Call this before any
    /// decision that depends on "current state" — candidate gathering,
    /// balance queries, pending-set computation.
    pub fn update(&self, chain: &Chain) -> Result<String, MempoolError> {
        let tip = chain.resolve().to_string();
        let added: HashSet<String> = chain.transactions_on_fork(&tip)?.into_iter().collect();
        let balance = chain.balance_on_fork(&tip)?;
        *self.added_tx.write() = added;
        *self.balance.write() = balance;
        Ok(tip)
    }

    /// `all_tx \ added_tx` as of the last [`Mempool::update`].
    pub fn pending(&self) -> Vec<String> {
        let all = self.all_tx.read();
        let added = self.added_tx.read();
        all.difference(&added).cloned().collect()
    }

    /// A copy of the balance cache as of the last [`Mempool::update`].
    pub fn balance(&self) -> HashMap<String, i64> {
        self.balance.read().clone()
    }

    /// Balance of a single account, `0` if never seen.
    pub fn balance_of(&self, pubkey: &str) -> i64 {
        *self.balance.read().get(pubkey).unwrap_or(&0)
    }

    /// Build the candidate transaction list for a new block: a fresh
    /// coinbase paying `miner` the block reward, followed by the largest
    /// uniformly-sampled subset of pending transactions that doesn't drive
    /// any account negative when applied to the current balance snapshot.
    pub fn gather(&self, miner: &NovaKeypair) -> Vec<String> {
        self.gather_from(miner, self.pending())
    }

    /// Like [`Mempool::gather`], but `excluded` is subtracted from the
    /// pending set before sampling. Used by the double-spend miner to keep
    /// a vendor payment out of its own candidate blocks (§4.9) without
    /// touching `all_tx`/`added_tx` themselves.
    pub fn gather_excluding(&self, miner: &NovaKeypair, excluded: &HashSet<String>) -> Vec<String> {
        let pending: Vec<String> =
            self.pending().into_iter().filter(|tx| !excluded.contains(tx)).collect();
        self.gather_from(miner, pending)
    }

    fn gather_from(&self, miner: &NovaKeypair, pending: Vec<String>) -> Vec<String> {
        let coinbase = Block::coinbase_for(miner).to_json();
        if pending.is_empty() {
            return vec![coinbase];
        }

        let balance_snapshot = self.balance();
        let mut rng = rand::thread_rng();
        let mut sample_size = pending.len();
        loop {
            if sample_size == 0 {
                return vec![coinbase];
            }
            let sample: Vec<String> =
                pending.choose_multiple(&mut rng, sample_size).cloned().collect();
            if simulate_balance(&balance_snapshot, &sample) {
                let mut gathered = Vec::with_capacity(sample.len() + 1);
                gathered.push(coinbase);
                gathered.extend(sample);
                return gathered;
            }
            sample_size -= 1;
        }
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

/// `true` iff applying `txs` in order to a clone of `balance` never drives
/// any account negative. An unseen sender (no account at all) also fails —
/// you can't spend from an account with no history on this fork.
fn simulate_balance(balance: &HashMap<String, i64>, txs: &[String]) -> bool {
    let mut balance = balance.clone();
    for tx_json in txs {
        let tx = match Transaction::from_json(tx_json) {
            Ok(tx) => tx,
            Err(_) => return false,
        };
        if !balance.contains_key(&tx.sender) {
            return false;
        }
        balance.entry(tx.receiver.clone()).or_insert(0);
        *balance.get_mut(&tx.sender).unwrap() -= tx.amount;
        *balance.get_mut(&tx.receiver).unwrap() += tx.amount;
        if balance[&tx.sender] < 0 || balance[&tx.receiver] < 0 {
            return false;
        }
    }
    true
}
