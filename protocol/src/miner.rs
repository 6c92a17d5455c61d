//! # Miner Control Loop
//!
//! An honest miner repeatedly mines against its current best fork while
//! concurrently admitting transactions and blocks from peers. This module
//! owns all of that state — the chain, the mempool, the cancellation flag
//! — and exposes pure domain operations. `crate::net` supplies the bytes
//! on and off the wire and calls straight into these methods; networking
//! never reimplements consensus logic.
//!
//! ## Cancellation protocol
//!
//! [`Miner::receive_block`] is what a listener thread calls on an inbound
//! foreign block: it raises the cancellation flag, integrates the block,
//! then lowers the flag again. An in-flight [`Miner::create_block`] call
//! notices the raised flag inside [`crate::block::Block::mine`]'s nonce
//! loop and returns `None` almost immediately — no uninterruptible mining
//! section ever blocks a re-org from landing.

use std::net::TcpStream;

use parking_lot::RwLock;
use thiserror::Error;

use crate::block::{Block, BlockError, MiningControl};
use crate::chain::{Chain, ChainError};
use crate::crypto::{NovaKeypair, NovaPublicKey};
use crate::mempool::{Mempool, MempoolError};
use crate::merkle::ProofStep;
use crate::net::wire::{BalanceRequestBody, BlockBody, ProofReplyBody, ProofRequestBody, TransactionBody};
use crate::net::{write_reply, Frame, NetNode, NodeRole, PeerRecord, Tag};
use crate::transaction::{Transaction, TransactionError};

#[derive(Debug, Error)]
pub enum MinerError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Mempool(#[from] MempoolError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// A transaction's inclusion proof as returned over the wire: the hash of
/// the block that contains it, the Merkle proof itself, and the hash of
/// the fork tip the proof was computed against. SPV clients require both
/// hashes to already be known headers before trusting the proof — see
/// [`crate::spv`].
#[derive(Debug, Clone)]
pub struct TransactionProof {
    pub block_hash: String,
    pub proof: Vec<ProofStep>,
    pub last_block_hash: String,
}

/// An honest mining node: one identity, one chain view, one mempool.
pub struct Miner {
    keypair: NovaKeypair,
    chain: RwLock<Chain>,
    mempool: Mempool,
    control: MiningControl,
}

impl Miner {
    pub fn new(keypair: NovaKeypair) -> Self {
        Self {
            keypair,
            chain: RwLock::new(Chain::new()),
            mempool: Mempool::new(),
            control: MiningControl::new(),
        }
    }

    pub fn public_key(&self) -> NovaPublicKey {
        self.keypair.public_key()
    }

    pub fn keypair(&self) -> &NovaKeypair {
        &self.keypair
    }

    pub fn chain(&self) -> &RwLock<Chain> {
        &self.chain
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    /// This miner's cancellation flag, shared with whatever drives
    /// [`Miner::create_block`] on a dedicated thread.
    pub fn control(&self) -> &MiningControl {
        &self.control
    }

    /// Admit a transaction into the mempool. Idempotent on content.
    pub fn add_transaction(&self, tx_json: String) -> Result<(), MinerError> {
        self.mempool.add_transaction(tx_json)?;
        Ok(())
    }

    /// Verify and add a block, refreshing the mempool's view of the best
    /// fork afterward. Used both for our own freshly-mined blocks and,
    /// via [`Miner::receive_block`], for blocks from peers.
    pub fn add_block(&self, block_json: &str) -> Result<(), MinerError> {
        let block = Block::from_json(block_json)?;
        self.chain.write().add(block)?;
        self.mempool.update(&self.chain.read())?;
        Ok(())
    }

    /// Integrate a block received from a peer. Raises the cancellation
    /// flag first so an in-flight mining attempt on the (possibly now
    /// stale) tip gives up promptly, then lowers it again once the block
    /// is in and the mempool view is refreshed.
    pub fn receive_block(&self, block_json: &str) -> Result<(), MinerError> {
        self.control.cancel();
        let result = self.add_block(block_json);
        self.control.clear();
        result
    }

    /// Attempt to mine one block extending the current best fork.
    ///
    /// Returns `Ok(None)` if a foreign block cancelled this attempt (the
    /// caller should simply loop and try again against the updated tip).
    /// The returned block has already been added to this miner's own
    /// chain; the caller is responsible for broadcasting it (protocol tag
    /// `b`) and its header (tag `h`) to peers.
    pub fn create_block(&self) -> Result<Option<Block>, MinerError> {
        let prev_hash = self.mempool.update(&self.chain.read())?;
        let gathered = self.mempool.gather(&self.keypair);

        let block = match Block::mine(prev_hash, gathered, &self.control)? {
            Some(block) => block,
            None => return Ok(None),
        };

        self.chain.write().add(block.clone())?;
        self.mempool.update(&self.chain.read())?;
        Ok(Some(block))
    }

    /// This miner's own up-to-date balance.
    pub fn balance(&self) -> Result<i64, MinerError> {
        self.mempool.update(&self.chain.read())?;
        Ok(self.mempool.balance_of(&self.public_key().to_hex()))
    }

    /// Any account's up-to-date balance (0 if never seen on this fork).
    pub fn balance_of(&self, pubkey: &str) -> Result<i64, MinerError> {
        self.mempool.update(&self.chain.read())?;
        Ok(self.mempool.balance_of(pubkey))
    }

    /// Locate a transaction's inclusion proof on the current best fork.
    pub fn transaction_proof(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TransactionProof>, MinerError> {
        let chain = self.chain.read();
        let tip = chain.resolve().to_string();
        match chain.transaction_proof_on_fork(tx_hash, &tip)? {
            Some((block_hash, proof)) => {
                Ok(Some(TransactionProof { block_hash, proof, last_block_hash: tip }))
            }
            None => Ok(None),
        }
    }
}

/// Build the `r`-reply body for `tx_hash` against `miner`'s current best
/// fork: the proof fields if found, "all-nulls" (§6.1) otherwise.
pub fn proof_reply_body(miner: &Miner, tx_hash: &str) -> ProofReplyBody {
    match miner.transaction_proof(tx_hash) {
        Ok(Some(proof)) => ProofReplyBody {
            blk_hash: Some(proof.block_hash),
            proof: Some(proof.proof),
            last_blk_hash: Some(proof.last_block_hash),
        },
        _ => ProofReplyBody { blk_hash: None, proof: None, last_blk_hash: None },
    }
}

/// An honest miner wired to the network: [`Miner`]'s domain logic plus a
/// peer list and the inbound-frame dispatch table from §4.7. Kept
/// separate from [`Miner`] itself so the pure control-loop logic stays
/// testable without a socket in sight.
pub struct MinerNode {
    miner: Miner,
    net: NetNode,
}

impl MinerNode {
    pub fn new(keypair: NovaKeypair, port: u16) -> Self {
        let pubkey = keypair.public_key().to_hex();
        let net = NetNode::new(NodeRole::Miner, format!("miner-{port}"), port, pubkey);
        Self { miner: Miner::new(keypair), net }
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    pub fn net(&self) -> &NetNode {
        &self.net
    }

    /// Build, sign, admit into this miner's own mempool, and broadcast
    /// (`t`) a fresh transaction. Mirrors an SPV client's
    /// [`crate::spv::SpvClient::create_transaction`] — a miner is also
    /// just an account that can pay another account.
    pub fn create_transaction(
        &self,
        receiver: &NovaPublicKey,
        amount: i64,
        comment: impl Into<String>,
    ) -> Result<Transaction, MinerError> {
        let tx = Transaction::new(self.miner.keypair(), receiver, amount, comment)?;
        let tx_json = tx.to_json();
        self.miner.add_transaction(tx_json.clone())?;
        self.net.broadcast(&Frame::new(Tag::Transaction, &TransactionBody { tx_json }));
        Ok(tx)
    }

    /// Mine one block and, on success, broadcast it (`b`) and its header
    /// (`h`) to every peer.
    pub fn create_and_broadcast(&self) -> Result<Option<Block>, MinerError> {
        match self.miner.create_block()? {
            Some(block) => {
                let blk_json = block.to_json();
                self.net.broadcast(&Frame::new(Tag::Block, &BlockBody { blk_json }));
                self.net.broadcast(&Frame::new(Tag::Header, &block.header));
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    /// Dispatch an inbound frame per §4.7. Miner tags handled: `n`, `b`,
    /// `h` (ignored), `t`, `r`, `x`.
    pub fn handle_frame(&self, frame: Frame, mut stream: TcpStream) {
        match frame.tag {
            Tag::NewPeer => {
                if let Ok(peer) = frame.parse_body::<PeerRecord>() {
                    self.net.add_peer(peer);
                }
            }
            Tag::Block => {
                if let Ok(body) = frame.parse_body::<BlockBody>() {
                    if let Err(err) = self.miner.receive_block(&body.blk_json) {
                        tracing::warn!(error = %err, "rejected inbound block");
                    }
                }
            }
            Tag::Header => {}
            Tag::Transaction => {
                if let Ok(body) = frame.parse_body::<TransactionBody>() {
                    if let Err(err) = self.miner.add_transaction(body.tx_json) {
                        tracing::warn!(error = %err, "rejected inbound transaction");
                    }
                }
            }
            Tag::ProofRequest => {
                if let Ok(body) = frame.parse_body::<ProofRequestBody>() {
                    let reply = proof_reply_body(&self.miner, &body.tx_hash);
                    let json = serde_json::to_string(&reply).expect("reply body always encodes");
                    let _ = write_reply(&mut stream, &json);
                }
            }
            Tag::BalanceRequest => {
                if let Ok(body) = frame.parse_body::<BalanceRequestBody>() {
                    let balance = self.miner.balance_of(&body.identifier).unwrap_or(0);
                    let _ = write_reply(&mut stream, &balance.to_string());
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;

    #[test]
    fn fresh_miner_mines_solo_coinbase_block() {
        let miner = Miner::new(NovaKeypair::generate());
        let block = miner.create_block().unwrap().expect("mining should not be cancelled");
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(miner.balance().unwrap(), crate::config::REWARD as i64);
    }

    #[test]
    fn transaction_proof_found_after_mining() {
        let miner = Miner::new(NovaKeypair::generate());
        let other = NovaKeypair::generate();
        let tx =
            Transaction::new(&miner.keypair(), &other.public_key(), 1, "").unwrap().to_json();
        miner.add_transaction(tx.clone()).unwrap();
        miner.create_block().unwrap().unwrap();

        let tx_hash = crate::crypto::sha256_hex(tx.as_bytes());
        let proof = miner.transaction_proof(&tx_hash).unwrap().expect("tx should be included");
        let block = miner.chain().read().get(&proof.block_hash).unwrap().clone();
        assert!(crate::merkle::verify_proof(&tx, &proof.proof, &block.header.root));
    }

    #[test]
    fn receive_block_integrates_and_clears_control() {
        let miner = Miner::new(NovaKeypair::generate());
        let other_miner = Miner::new(NovaKeypair::generate());
        let block = other_miner.create_block().unwrap().unwrap();
        miner.receive_block(&block.to_json()).unwrap();
        assert_eq!(miner.balance_of(&other_miner.public_key().to_hex()).unwrap(), crate::config::REWARD as i64);
    }

    #[test]
    fn add_transaction_rejects_malformed_json() {
        let miner = Miner::new(NovaKeypair::generate());
        assert!(miner.add_transaction("not json".to_string()).is_err());
    }

    #[test]
    fn proof_reply_body_is_all_nulls_for_unknown_transaction() {
        let miner = Miner::new(NovaKeypair::generate());
        let reply = proof_reply_body(&miner, &"0".repeat(64));
        assert!(reply.blk_hash.is_none());
        assert!(reply.proof.is_none());
        assert!(reply.last_blk_hash.is_none());
    }

    #[test]
    fn miner_node_create_and_broadcast_with_no_peers_still_mines() {
        let node = MinerNode::new(NovaKeypair::generate(), 0);
        let block = node.create_and_broadcast().unwrap().expect("mining should not be cancelled");
        assert_eq!(block.transactions.len(), 1);
    }
}
