//! # Selfish Mining
//!
//! A miner that mines honestly but never publishes immediately. Every
//! freshly mined block is privately withheld in FIFO order. On observing
//! a foreign block, the selfish miner releases just enough of its private
//! lead to stay matched with the honest network one-for-one — collapsing
//! the lead only once it has grown dangerous (three or more blocks
//! ahead), at which point it dumps down to a lead of one.

use std::collections::VecDeque;
use std::net::TcpStream;

use parking_lot::Mutex;

use crate::block::Block;
use crate::crypto::NovaKeypair;
use crate::miner::{proof_reply_body, Miner, MinerError};
use crate::net::wire::{BalanceRequestBody, BlockBody, ProofRequestBody, TransactionBody};
use crate::net::{write_reply, Frame, NetNode, NodeRole, PeerRecord, Tag};

/// Release at most 2 withheld blocks once the private lead reaches this
/// many blocks; otherwise release the whole (smaller) lead. Matches the
/// source network's fixed `qlen >= 3` threshold.
const RELEASE_THRESHOLD: usize = 3;
const RELEASE_ON_THRESHOLD: usize = 2;

pub struct SelfishMiner {
    miner: Miner,
    net: NetNode,
    withheld: Mutex<VecDeque<Block>>,
}

impl SelfishMiner {
    pub fn new(keypair: NovaKeypair, port: u16) -> Self {
        let pubkey = keypair.public_key().to_hex();
        let net = NetNode::new(NodeRole::SelfishMiner, format!("selfish-{port}"), port, pubkey);
        Self { miner: Miner::new(keypair), net, withheld: Mutex::new(VecDeque::new()) }
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    pub fn net(&self) -> &NetNode {
        &self.net
    }

    pub fn withheld_len(&self) -> usize {
        self.withheld.lock().len()
    }

    /// Mine one block against the current best fork. On success the
    /// block joins the private withheld queue instead of being
    /// broadcast — the caller never needs to publish it itself.
    pub fn create_block(&self) -> Result<Option<Block>, MinerError> {
        match self.miner.create_block()? {
            Some(block) => {
                self.withheld.lock().push_back(block.clone());
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    /// Broadcast the oldest `count` withheld blocks, in order, as both
    /// `b` (full block) and `h` (header).
    pub fn release(&self, count: usize) {
        let released: Vec<Block> = {
            let mut withheld = self.withheld.lock();
            let n = count.min(withheld.len());
            withheld.drain(..n).collect()
        };
        for block in released {
            let blk_json = block.to_json();
            self.net.broadcast(&Frame::new(Tag::Block, &BlockBody { blk_json }));
            self.net.broadcast(&Frame::new(Tag::Header, &block.header));
        }
    }

    /// On a foreign block: release 2 if the private lead has reached the
    /// danger threshold, release everything if there's a smaller lead,
    /// release nothing if there's no lead at all — then integrate the
    /// foreign block exactly like an honest miner would.
    fn release_on_foreign_block(&self) {
        let qlen = self.withheld_len();
        if qlen >= RELEASE_THRESHOLD {
            self.release(RELEASE_ON_THRESHOLD);
        } else if qlen != 0 {
            self.release(qlen);
        }
    }

    pub fn handle_foreign_block(&self, block_json: &str) -> Result<(), MinerError> {
        self.release_on_foreign_block();
        self.miner.receive_block(block_json)
    }

    /// Dispatch an inbound frame, matching an honest miner's table except
    /// that `b` first runs the release policy above.
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
