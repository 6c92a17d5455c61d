// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Selfish Miner
//!
//! Mines like an honest miner but never publishes immediately: every
//! freshly mined block joins a private withheld queue, released only in
//! response to the honest network's own publications (§4.9).

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;

use nova_node::cli::NodeArgs;
use nova_node::logging::{self, LogFormat};
use nova_node::{mine_lock, rendezvous_address};
use nova_protocol::adversary::SelfishMiner;
use nova_protocol::crypto::NovaKeypair;
use nova_protocol::net::serve;

fn main() -> anyhow::Result<()> {
    logging::init_logging("info", LogFormat::Pretty);
    let args = NodeArgs::parse();

    let node = Arc::new(SelfishMiner::new(NovaKeypair::generate(), args.port));
    tracing::info!(port = args.port, pubkey = %node.miner().public_key().to_hex(), "selfish miner starting");

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

    loop {
        match node.create_block() {
            Ok(Some(block)) => tracing::info!(
                hash = %block.header.hash(),
                withheld = node.withheld_len(),
                "mined block, withholding"
            ),
            Ok(None) => tracing::debug!("mining attempt cancelled by a foreign block"),
            Err(err) => tracing::warn!(error = %err, "mining attempt failed"),
        }
    }
}
