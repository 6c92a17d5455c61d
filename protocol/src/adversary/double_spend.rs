//! # Double-Spend Mining
//!
//! A three-state race against the honest chain, staged around a single
//! vendor purchase:
//!
//! - `Init`: mine and publish honestly, watching every inbound block for a
//!   self-paid transaction to the designated colluding SPV client. Seeing
//!   one means the payment that will later fund the double spend has
//!   landed, so fork: keep mining, but stop publishing.
//! - `Fork`: withhold every newly mined block instead of broadcasting it,
//!   counting how many blocks the honest network publishes in the
//!   meantime. Exclude the colluding SPV's payment to the vendor from this
//!   miner's own mempool view — it must not also confirm that spend on the
//!   private fork. A refund transaction from the colluding SPV back to this
//!   miner (the signal that the vendor shipped) moves to `Fire`.
//! - `Fire`: keep withholding and counting, but after every new private or
//!   observed public block, check whether the private lead has overtaken
//!   the public count. Once it has, publish the whole withheld queue in
//!   order — the private fork is now guaranteed to win resolution — and
//!   reset to `Init`.
//!
//! A colluding SPV client ([`DoubleSpendSpvClient`]) and the vendor it buys
//! from ([`Vendor`]) round out the scenario: the vendor announces delivery
//! over the wire (tag `p`) instead of only printing it, and the colluding
//! client reacts to that notice by firing the refund automatically.

use std::collections::HashSet;
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::block::Block;
use crate::crypto::{NovaKeypair, NovaPublicKey};
use crate::miner::{proof_reply_body, Miner, MinerError};
use crate::net::wire::{
    BalanceRequestBody, BlockBody, ProductDeliveredBody, ProofRequestBody, TransactionBody,
};
use crate::net::{write_reply, Frame, NetNode, NodeRole, PeerRecord, Tag};
use crate::spv::SpvClient;
use crate::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleSpendMode {
    Init,
    Fork,
    Fire,
}

pub struct DoubleSpendMiner {
    miner: Miner,
    net: NetNode,
    mode: Mutex<DoubleSpendMode>,
    withheld: Mutex<Vec<Block>>,
    excluded: RwLock<HashSet<String>>,
    pubchain_count: AtomicU64,
}

impl DoubleSpendMiner {
    pub fn new(keypair: NovaKeypair, port: u16) -> Self {
        let pubkey = keypair.public_key().to_hex();
        let net = NetNode::new(NodeRole::DoubleSpendMiner, format!("double-spend-{port}"), port, pubkey);
        Self {
            miner: Miner::new(keypair),
            net,
            mode: Mutex::new(DoubleSpendMode::Init),
            withheld: Mutex::new(Vec::new()),
            excluded: RwLock::new(HashSet::new()),
            pubchain_count: AtomicU64::new(0),
        }
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    pub fn net(&self) -> &NetNode {
        &self.net
    }

    pub fn mode(&self) -> DoubleSpendMode {
        *self.mode.lock()
    }

    pub fn withheld_len(&self) -> usize {
        self.withheld.lock().len()
    }

    /// Mine one block. Outside `Init`, mines on top of the private tip
    /// (falling back to the publicly resolved tip the first time there is
    /// no private block yet) and excludes the vendor payment from its
    /// candidate set; the result joins the withheld queue instead of being
    /// broadcast. In `Fire`, also re-checks whether the private lead has
    /// overtaken the public count.
    pub fn create_block(&self) -> Result<Option<Block>, MinerError> {
        let mode = self.mode();
        let prev_override = if mode == DoubleSpendMode::Init {
            None
        } else {
            self.withheld.lock().last().map(|b| b.header.hash())
        };

        let block = match self.mine_once(prev_override)? {
            Some(block) => block,
            None => return Ok(None),
        };

        match mode {
            DoubleSpendMode::Init => self.broadcast_block(&block),
            DoubleSpendMode::Fork => {
                self.withheld.lock().push(block.clone());
            }
            DoubleSpendMode::Fire => {
                self.withheld.lock().push(block.clone());
                self.maybe_fire();
            }
        }
        Ok(Some(block))
    }

    fn mine_once(&self, prev_hash_override: Option<String>) -> Result<Option<Block>, MinerError> {
        let resolved_tip = self.miner.mempool().update(&self.miner.chain().read())?;
        let prev_hash = prev_hash_override.unwrap_or(resolved_tip);
        let excluded = self.excluded.read().clone();
        let gathered = self.miner.mempool().gather_excluding(self.miner.keypair(), &excluded);

        let block = match Block::mine(prev_hash, gathered, self.miner.control())? {
            Some(block) => block,
            None => return Ok(None),
        };

        self.miner.chain().write().add(block.clone())?;
        self.miner.mempool().update(&self.miner.chain().read())?;
        Ok(Some(block))
    }

    fn broadcast_block(&self, block: &Block) {
        let blk_json = block.to_json();
        self.net.broadcast(&Frame::new(Tag::Block, &BlockBody { blk_json }));
        self.net.broadcast(&Frame::new(Tag::Header, &block.header));
    }

    /// Publish the whole withheld queue in order and reset to `Init`.
    pub fn push_blocks(&self) {
        let blocks: Vec<Block> = std::mem::take(&mut *self.withheld.lock());
        for block in &blocks {
            self.broadcast_block(block);
        }
        *self.mode.lock() = DoubleSpendMode::Init;
        self.excluded.write().clear();
        self.pubchain_count.store(0, Ordering::SeqCst);
    }

    fn maybe_fire(&self) {
        let lead = self.withheld.lock().len() as u64;
        if lead > self.pubchain_count.load(Ordering::SeqCst) {
            self.push_blocks();
        }
    }

    fn maybe_enter_fork(&self, block: &Block) {
        let Some(colluder) = self.net.peer_with_role(NodeRole::DoubleSpendSpvClient) else {
            return;
        };
        let self_pubkey = self.miner.public_key().to_hex();
        let pays_colluder = block.transactions.iter().any(|tx_json| {
            Transaction::from_json(tx_json)
                .map(|tx| tx.sender == self_pubkey && tx.receiver == colluder.pubkey)
                .unwrap_or(false)
        });
        if pays_colluder {
            *self.mode.lock() = DoubleSpendMode::Fork;
        }
    }

    /// Integrate an inbound block from the network. Drives the
    /// `Init` → `Fork` transition and the public-continuation count,
    /// then integrates the block into this miner's own chain exactly like
    /// an honest miner would.
    pub fn handle_foreign_block(&self, block_json: &str) -> Result<(), MinerError> {
        match self.mode() {
            DoubleSpendMode::Init => {
                if let Ok(block) = Block::from_json(block_json) {
                    self.maybe_enter_fork(&block);
                }
            }
            DoubleSpendMode::Fork | DoubleSpendMode::Fire => {
                self.pubchain_count.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.miner.receive_block(block_json)?;
        if self.mode() == DoubleSpendMode::Fire {
            self.maybe_fire();
        }
        Ok(())
    }

    /// Admit an inbound transaction, applying the `Fork` → `Fire`
    /// transition and the vendor-payment exclusion before it ever reaches
    /// the mempool.
    pub fn handle_foreign_transaction(&self, tx_json: String) {
        let tx = match Transaction::from_json(&tx_json) {
            Ok(tx) => tx,
            Err(_) => return,
        };
        let colluder_pubkey = self.net.peer_with_role(NodeRole::DoubleSpendSpvClient).map(|p| p.pubkey);
        let vendor_pubkey = self.net.peer_with_role(NodeRole::Vendor).map(|p| p.pubkey);
        let self_pubkey = self.miner.public_key().to_hex();

        if self.mode() == DoubleSpendMode::Fork
            && colluder_pubkey.as_deref() == Some(tx.sender.as_str())
            && tx.receiver == self_pubkey
        {
            *self.mode.lock() = DoubleSpendMode::Fire;
        }

        if colluder_pubkey.as_deref() == Some(tx.sender.as_str())
            && vendor_pubkey.as_deref() == Some(tx.receiver.as_str())
        {
            self.excluded.write().insert(tx_json);
            return;
        }

        if let Err(err) = self.miner.add_transaction(tx_json) {
            tracing::warn!(error = %err, "rejected inbound transaction");
        }
    }

    pub fn handle_frame(&self, frame: Frame, mut stream: TcpStream) {
        match frame.tag {
            Tag::NewPeer => {
                if let Ok(peer) = frame.parse_body::<PeerRecord>() {
                    self.net.add_peer(peer);
                }
            }
            Tag::Block => {
                if let Ok(body) = frame.parse_body::<BlockBody>() {
                    if let Err(err) = self.handle_foreign_block(&body.blk_json) {
                        tracing::warn!(error = %err, "rejected inbound block");
                    }
                }
            }
            Tag::Header => {}
            Tag::Transaction => {
                if let Ok(body) = frame.parse_body::<TransactionBody>() {
                    self.handle_foreign_transaction(body.tx_json);
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

/// An SPV client that colludes with [`DoubleSpendMiner`]: it buys from the
/// vendor using funds from the adversary miner, then refunds the miner the
/// instant it learns the product shipped, so the miner can safely reverse
/// the purchase on its private fork.
pub struct DoubleSpendSpvClient {
    inner: SpvClient,
}

impl DoubleSpendSpvClient {
    pub fn new(keypair: NovaKeypair, port: u16) -> Self {
        Self { inner: SpvClient::with_role(keypair, port, NodeRole::DoubleSpendSpvClient) }
    }

    pub fn inner(&self) -> &SpvClient {
        &self.inner
    }

    pub fn net(&self) -> &NetNode {
        self.inner.net()
    }

    fn handle_product_delivered(&self, body: ProductDeliveredBody) {
        if !self.inner.own_transactions().contains_key(&body.tx_hash) {
            return;
        }
        let Some(miner) = self.net().peer_with_role(NodeRole::DoubleSpendMiner) else {
            return;
        };
        let Ok(miner_pubkey) = NovaPublicKey::from_hex(&miner.pubkey) else {
            return;
        };
        let amount = self
            .inner
            .own_transactions()
            .get(&body.tx_hash)
            .and_then(|tx_json| Transaction::from_json(tx_json).ok())
            .map(|tx| tx.amount);
        let Some(amount) = amount else {
            return;
        };
        if let Err(err) = self.inner.create_transaction(&miner_pubkey, amount, "refund") {
            tracing::warn!(error = %err, "failed to send double-spend refund");
        }
    }

    pub fn handle_frame(&self, frame: Frame, stream: TcpStream) {
        if frame.tag == Tag::ProductDelivered {
            if let Ok(body) = frame.parse_body::<ProductDeliveredBody>() {
                self.handle_product_delivered(body);
            }
            return;
        }
        self.inner.handle_frame(frame, stream);
    }
}

/// A merchant that sells to SPV clients and announces delivery over the
/// wire instead of only logging it, so a colluding buyer's listener can
/// react to the notice directly (§4.9).
pub struct Vendor {
    inner: SpvClient,
}

impl Vendor {
    pub fn new(keypair: NovaKeypair, port: u16) -> Self {
        Self { inner: SpvClient::with_role(keypair, port, NodeRole::Vendor) }
    }

    pub fn inner(&self) -> &SpvClient {
        &self.inner
    }

    pub fn net(&self) -> &NetNode {
        self.inner.net()
    }

    /// Announce that the product paid for by `tx_hash` has been delivered.
    /// Broadcast, not addressed — every peer receives it, but only the
    /// buyer (the one with `tx_hash` in its own transaction history) acts
    /// on it.
    pub fn send_product(&self, tx_hash: impl Into<String>) {
        let body = ProductDeliveredBody { tx_hash: tx_hash.into() };
        self.net().broadcast(&Frame::new(Tag::ProductDelivered, &body));
    }

    pub fn handle_frame(&self, frame: Frame, stream: TcpStream) {
        self.inner.handle_frame(frame, stream);
    }
}
