// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Vendor
//!
//! Sells to SPV clients. On confirming a purchase via Merkle inclusion
//! proof, announces delivery over the wire (tag `p`) instead of only
//! logging it, so a colluding buyer's listener can react automatically
//! (§4.9).

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use parking_lot::Mutex;

use nova_node::cli::NodeArgs;
use nova_node::logging::{self, LogFormat};
use nova_node::rendezvous_address;
use nova_protocol::adversary::Vendor;
use nova_protocol::crypto::NovaKeypair;
use nova_protocol::net::serve;
use nova_protocol::transaction::Transaction;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    logging::init_logging("info", LogFormat::Pretty);
    let args = NodeArgs::parse();

    let vendor = Arc::new(Vendor::new(NovaKeypair::generate(), args.port));
    tracing::info!(port = args.port, pubkey = %vendor.inner().public_key().to_hex(), "vendor starting");

    {
        let vendor = Arc::clone(&vendor);
        let port = args.port;
        thread::spawn(move || {
            if let Err(err) = serve(port, move |frame, stream| vendor.handle_frame(frame, stream)) {
                tracing::error!(error = %err, "listener exited");
            }
        });
    }
    thread::sleep(Duration::from_millis(100));

    vendor.net().register_with_rendezvous(&rendezvous_address())?;
    tracing::info!(peers = vendor.net().peers().len(), "connected to network");

    let delivered = Mutex::new(HashSet::<String>::new());
    let self_pubkey = vendor.inner().public_key().to_hex();

    loop {
        for (tx_hash, tx_json) in vendor.inner().own_transactions() {
            if delivered.lock().contains(&tx_hash) {
                continue;
            }
            let Ok(tx) = Transaction::from_json(&tx_json) else { continue };
            if tx.receiver != self_pubkey {
                continue;
            }
            match vendor.inner().verify_transaction_proof(&tx_hash) {
                Ok(true) => {
                    tracing::info!(tx_hash = %tx_hash, from = %tx.sender, "purchase confirmed, shipping");
                    vendor.send_product(tx_hash.clone());
                    delivered.lock().insert(tx_hash);
                }
                Ok(false) => {}
                Err(err) => tracing::debug!(tx_hash = %tx_hash, error = %err, "proof check failed"),
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}
