// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Honest Miner
//!
//! Registers with the rendezvous, then repeatedly mines against its
//! current best fork while a listener thread admits foreign blocks and
//! transactions (§4.6). Occasionally pays a random peer out of its own
//! balance, purely so the demo network has transactions to mine.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use rand::seq::SliceRandom;

use nova_node::cli::NodeArgs;
use nova_node::logging::{self, LogFormat};
use nova_node::{mine_lock, rendezvous_address};
use nova_protocol::config::REWARD;
use nova_protocol::crypto::{NovaKeypair, NovaPublicKey};
use nova_protocol::miner::MinerNode;
use nova_protocol::net::serve;

/// A miner only pays a peer once its own balance clears this much, so it
/// never tries to send more than it has.
const SEND_THRESHOLD: i64 = 50;
const SEND_AMOUNT: i64 = 50;

fn main() -> anyhow::Result<()> {
    logging::init_logging("info", LogFormat::Pretty);
    let args = NodeArgs::parse();

    let node = Arc::new(MinerNode::new(NovaKeypair::generate(), args.port));
    tracing::info!(port = args.port, pubkey = %node.miner().public_key().to_hex(), "miner starting");

    {
        let node = Arc::clone(&node);
        let port = args.port;
        thread::spawn(move || {
            if let Err(err) = serve(port, move |frame, stream| node.handle_frame(frame, stream)) {
                tracing::error!(error = %err, "listener exited");
            }
        });
    }
    // Give the listener thread a moment to bind before announcing
    // ourselves, so an early forwarded peer announcement isn't dropped.
    thread::sleep(Duration::from_millis(100));

    node.net().register_with_rendezvous(&rendezvous_address())?;
    tracing::info!(peers = node.net().peers().len(), "connected to network");

    mine_lock::wait_for_mine_lock();

    loop {
        maybe_pay_a_peer(&node);
        match node.create_and_broadcast() {
            Ok(Some(block)) => tracing::info!(
                hash = %block.header.hash(),
                transactions = block.transactions.len(),
                balance = node.miner().balance().unwrap_or_default(),
                "mined block"
            ),
            Ok(None) => tracing::debug!("mining attempt cancelled by a foreign block"),
            Err(err) => tracing::warn!(error = %err, "mining attempt failed"),
        }
    }
}

fn maybe_pay_a_peer(node: &MinerNode) {
    let Ok(balance) = node.miner().balance() else { return };
    if balance < SEND_THRESHOLD + REWARD as i64 {
        return;
    }
    let peers = node.net().peers();
    let Some(peer) = peers.choose(&mut rand::thread_rng()) else { return };
    let Ok(receiver) = NovaPublicKey::from_hex(&peer.pubkey) else { return };
    match node.create_transaction(&receiver, SEND_AMOUNT, "") {
        Ok(_) => tracing::info!(to = %peer.name, amount = SEND_AMOUNT, "sent transaction"),
        Err(err) => tracing::warn!(error = %err, "failed to send transaction"),
    }
}
