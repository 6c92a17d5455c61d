// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Double-Spend Miner
//!
//! Mines honestly until it funds its colluding SPV client, then races a
//! private fork against the honest chain once that client's purchase has
//! shipped (§4.9). Funding the colluder is the one step this binary
//! drives explicitly — everything after that (forking, withholding,
//! firing) happens inside [`nova_protocol::adversary::DoubleSpendMiner`]
//! in reaction to wire traffic.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;

use nova_node::cli::NodeArgs;
use nova_node::logging::{self, LogFormat};
use nova_node::{mine_lock, rendezvous_address};
use nova_protocol::adversary::DoubleSpendMiner;
use nova_protocol::config::REWARD;
use nova_protocol::crypto::{NovaKeypair, NovaPublicKey};
use nova_protocol::net::{serve, NodeRole};

/// Amount funded to the colluding SPV client to finance its purchase.
const FUNDING_AMOUNT: i64 = 50;

fn main() -> anyhow::Result<()> {
    logging::init_logging("info", LogFormat::Pretty);
    let args = NodeArgs::parse();

    let node = Arc::new(DoubleSpendMiner::new(NovaKeypair::generate(), args.port));
    tracing::info!(port = args.port, pubkey = %node.miner().public_key().to_hex(), "double-spend miner starting");

    {
        let node = Arc::clone(&node);
        let port = args.port;
        thread::spawn(move || {
            if let Err(err) = serve(port, move |frame, stream| node.handle_frame(frame, stream)) {
                tracing::error!(error = %err, "listener exited");
            }
        });
    }
    thread::sleep(Duration::from_millis(100));

    node.net().register_with_rendezvous(&rendezvous_address())?;
    tracing::info!(peers = node.net().peers().len(), "connected to network");

    mine_lock::wait_for_mine_lock();

    let mut funded = false;
    let mut last_mode = node.mode();
    loop {
        if !funded {
            fund_colluder(&node, &mut funded);
        }
        match node.create_block() {
            Ok(Some(block)) => {
                tracing::info!(hash = %block.header.hash(), mode = ?node.mode(), "mined block");
            }
            Ok(None) => tracing::debug!("mining attempt cancelled by a foreign block"),
            Err(err) => tracing::warn!(error = %err, "mining attempt failed"),
        }
        let mode = node.mode();
        if mode != last_mode {
            tracing::info!(from = ?last_mode, to = ?mode, withheld = node.withheld_len(), "mode transition");
            last_mode = mode;
        }
    }
}

fn fund_colluder(node: &DoubleSpendMiner, funded: &mut bool) {
    let Ok(balance) = node.miner().balance() else { return };
    if balance < FUNDING_AMOUNT + REWARD as i64 {
        return;
    }
    let Some(colluder) = node.net().peer_with_role(NodeRole::DoubleSpendSpvClient) else { return };
    let Ok(receiver) = NovaPublicKey::from_hex(&colluder.pubkey) else { return };
    let tx_json = match nova_protocol::transaction::Transaction::new(
        node.miner().keypair(),
        &receiver,
        FUNDING_AMOUNT,
        "",
    ) {
        Ok(tx) => tx.to_json(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to build funding transaction");
            return;
        }
    };
    if node.miner().add_transaction(tx_json.clone()).is_ok() {
        node.net().broadcast(&nova_protocol::net::Frame::new(
            nova_protocol::net::Tag::Transaction,
            &nova_protocol::net::wire::TransactionBody { tx_json },
        ));
        tracing::info!(to = %colluder.name, amount = FUNDING_AMOUNT, "funded colluding SPV client");
        *funded = true;
    }
}
