//! # SPV Light Client
//!
//! A node that verifies payments without ever storing a full block: it
//! keeps only block headers (seeded with genesis) and the transactions
//! that concern it directly (`own_tx`, keyed by the SHA-256 of their
//! canonical JSON). Inclusion is proven on demand by asking the full
//! network for a Merkle proof and voting across the replies.
//!
//! ## Quorum and the eclipse defense
//!
//! A request fans out to every known peer. Miners answer with real data;
//! other SPV clients answer with the literal string `"spv"`, which is
//! filtered out before voting (see [`process_replies`]) — otherwise a
//! network dominated by light clients could never produce a majority
//! answer. The modal (most common) real reply wins.
//!
//! A reply is trusted only if its `block_hash` *and* `last_block_hash`
//! are both already known local headers. Requiring two independently
//! corroborated hashes, rather than one, is the documented defense
//! against an eclipse attack feeding a single fabricated header.

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;

use crate::block::{Block, BlockError, BlockHeader};
use crate::config::TARGET;
use crate::crypto::{sha256_hex, NovaKeypair, NovaPublicKey};
use crate::merkle::{self, MerkleError};
use crate::net::wire::{
    BalanceRequestBody, ProofReplyBody, ProofRequestBody, TransactionBody,
};
use crate::net::{Frame, NetError, NetNode, NodeRole, PeerRecord, Tag};
use crate::transaction::{Transaction, TransactionError};
use std::net::TcpStream;

#[derive(Debug, Error)]
pub enum SpvError {
    #[error("block header hash does not meet the difficulty target")]
    InsufficientWork,

    #[error("header's previous block {0} is not a known local header")]
    UnknownParent(String),

    #[error("no miner replied to the request (only SPV stubs, or nothing)")]
    NoQuorum,

    #[error("reply did not parse as the expected shape")]
    MalformedReply,

    #[error("eclipse suspected: referenced block hash is not a known local header")]
    EclipseSuspected,

    #[error("transaction {0} is not one of this client's own transactions")]
    UnknownTransaction(String),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    Net(#[from] NetError),
}

/// A light client: one identity, a growing header chain, and its own
/// transaction history. Never stores a full block.
pub struct SpvClient {
    keypair: NovaKeypair,
    net: NetNode,
    headers: RwLock<HashMap<String, BlockHeader>>,
    own_tx: RwLock<HashMap<String, String>>,
}

impl SpvClient {
    pub fn new(keypair: NovaKeypair, port: u16) -> Self {
        Self::with_role(keypair, port, NodeRole::SpvClient)
    }

    /// Construct with an explicit role, so the colluding SPV variant in
    /// [`crate::adversary`] can reuse this same machinery under a
    /// different peer-list identity.
    pub fn with_role(keypair: NovaKeypair, port: u16, role: NodeRole) -> Self {
        let pubkey = keypair.public_key().to_hex();
        let net = NetNode::new(role, format!("spv-{port}"), port, pubkey);
        let genesis = Block::genesis();
        let mut headers = HashMap::new();
        headers.insert(genesis.header.hash(), genesis.header);
        Self {
            keypair,
            net,
            headers: RwLock::new(headers),
            own_tx: RwLock::new(HashMap::new()),
        }
    }

    pub fn net(&self) -> &NetNode {
        &self.net
    }

    pub fn public_key(&self) -> NovaPublicKey {
        self.keypair.public_key()
    }

    pub fn keypair(&self) -> &NovaKeypair {
        &self.keypair
    }

    pub fn headers(&self) -> HashMap<String, BlockHeader> {
        self.headers.read().clone()
    }

    pub fn own_transactions(&self) -> HashMap<String, String> {
        self.own_tx.read().clone()
    }

    /// Build, sign, remember, and broadcast a fresh transaction.
    pub fn create_transaction(
        &self,
        receiver: &NovaPublicKey,
        amount: i64,
        comment: impl Into<String>,
    ) -> Result<Transaction, SpvError> {
        let tx = Transaction::new(&self.keypair, receiver, amount, comment)?;
        let tx_json = tx.to_json();
        let tx_hash = sha256_hex(tx_json.as_bytes());
        self.own_tx.write().insert(tx_hash, tx_json.clone());
        self.net.broadcast(&Frame::new(Tag::Transaction, &TransactionBody { tx_json }));
        Ok(tx)
    }

    /// Admit an inbound transaction into `own_tx` iff it concerns this
    /// client directly (it is the sender or the receiver); anything else
    /// is silently discarded, matching the source client's filtering.
    pub fn add_transaction(&self, tx_json: String) -> Result<(), SpvError> {
        let tx = Transaction::from_json(&tx_json)?;
        let own_key = self.public_key().to_hex();
        if tx.sender != own_key && tx.receiver != own_key {
            return Ok(());
        }
        let tx_hash = sha256_hex(tx_json.as_bytes());
        self.own_tx.write().insert(tx_hash, tx_json);
        Ok(())
    }

    /// Admit an inbound header. Rejects a hash that doesn't meet the
    /// difficulty target or whose parent is not already a known header —
    /// a light client cannot verify anything stronger than chained PoW.
    pub fn add_header(&self, header: BlockHeader) -> Result<(), SpvError> {
        if header.hash().as_str() >= TARGET {
            return Err(SpvError::InsufficientWork);
        }
        let mut headers = self.headers.write();
        if !headers.contains_key(&header.prev_hash) {
            return Err(SpvError::UnknownParent(header.prev_hash));
        }
        let hash = header.hash();
        headers.insert(hash, header);
        Ok(())
    }

    /// Quorum-vote `self`'s balance across every known peer.
    pub fn request_balance(&self) -> Result<i64, SpvError> {
        let body = BalanceRequestBody { identifier: self.public_key().to_hex() };
        let replies = self.net.broadcast_request(&Frame::new(Tag::BalanceRequest, &body));
        let valid = process_replies(&replies)?;
        valid.trim().parse::<i64>().map_err(|_| SpvError::MalformedReply)
    }

    /// Quorum-vote whether the transaction hashing to `tx_hash` (which
    /// must be one of this client's own transactions) is included on the
    /// network's best fork.
    pub fn verify_transaction_proof(&self, tx_hash: &str) -> Result<bool, SpvError> {
        let body = ProofRequestBody { tx_hash: tx_hash.to_string() };
        let replies = self.net.broadcast_request(&Frame::new(Tag::ProofRequest, &body));
        let valid = process_replies(&replies)?;
        let reply: ProofReplyBody =
            serde_json::from_str(&valid).map_err(|_| SpvError::MalformedReply)?;

        let (blk_hash, proof, last_blk_hash) =
            match (reply.blk_hash, reply.proof, reply.last_blk_hash) {
                (Some(b), Some(p), Some(l)) => (b, p, l),
                _ => return Ok(false),
            };

        let headers = self.headers.read();
        if !headers.contains_key(&blk_hash) || !headers.contains_key(&last_blk_hash) {
            return Err(SpvError::EclipseSuspected);
        }
        let own_tx = self.own_tx.read();
        let tx_json = own_tx
            .get(tx_hash)
            .ok_or_else(|| SpvError::UnknownTransaction(tx_hash.to_string()))?;
        let root = &headers[&blk_hash].root;
        Ok(merkle::verify_proof(tx_json, &proof, root))
    }

    /// Dispatch an inbound frame per §4.7: `n`, `h`, `t` update local
    /// state; `r`/`x` get the `"spv"` stub reply that lets requesters
    /// exclude this client from their quorum.
    pub fn handle_frame(&self, frame: Frame, mut stream: TcpStream) {
        match frame.tag {
            Tag::NewPeer => {
                if let Ok(peer) = frame.parse_body::<PeerRecord>() {
                    self.net.add_peer(peer);
                }
            }
            Tag::Header => {
                if let Ok(header) = frame.parse_body::<BlockHeader>() {
                    if let Err(err) = self.add_header(header) {
                        tracing::warn!(error = %err, "rejected inbound header");
                    }
                }
            }
            Tag::Transaction => {
                if let Ok(body) = frame.parse_body::<TransactionBody>() {
                    if let Err(err) = self.add_transaction(body.tx_json) {
                        tracing::warn!(error = %err, "rejected inbound transaction");
                    }
                }
            }
            Tag::ProofRequest | Tag::BalanceRequest => {
                let _ = crate::net::write_reply(&mut stream, "spv");
            }
            _ => {}
        }
    }
}

/// Filter out `"spv"` stub replies and return the modal (majority)
/// surviving reply. Errors if nothing but stubs (or nothing at all) came
/// back.
pub fn process_replies(replies: &[String]) -> Result<String, SpvError> {
    let real: Vec<&String> = replies.iter().filter(|r| !r.eq_ignore_ascii_case("spv")).collect();
    if real.is_empty() {
        return Err(SpvError::NoQuorum);
    }
    let mut counts: HashMap<&String, usize> = HashMap::new();
    for reply in &real {
        *counts.entry(*reply).or_insert(0) += 1;
    }
    let winner = counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(reply, _)| reply.clone())
        .expect("real replies is non-empty");
    Ok(winner)
}
