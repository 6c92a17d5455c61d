// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SPV Light Client
//!
//! Stores only headers and its own transactions (§4.8). Periodically
//! checks one of its own transactions for inclusion via a quorum Merkle
//! proof, requests its quorum-voted balance, and pays a random peer once
//! it has enough to spare.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use rand::seq::SliceRandom;

use nova_node::cli::NodeArgs;
use nova_node::logging::{self, LogFormat};
use nova_node::rendezvous_address;
use nova_protocol::crypto::{sha256_hex, NovaKeypair, NovaPublicKey};
use nova_protocol::net::serve;
use nova_protocol::spv::SpvClient;

const SEND_THRESHOLD: i64 = 10;
const SEND_AMOUNT: i64 = 10;
const POLL_INTERVAL: Duration = Duration::from_secs(2);

fn main() -> anyhow::Result<()> {
    logging::init_logging("info", LogFormat::Pretty);
    let args = NodeArgs::parse();

    let client = Arc::new(SpvClient::new(NovaKeypair::generate(), args.port));
    tracing::info!(port = args.port, pubkey = %client.public_key().to_hex(), "SPV client starting");

    {
        let client = Arc::clone(&client);
        let port = args.port;
        thread::spawn(move || {
            if let Err(err) = serve(port, move |frame, stream| client.handle_frame(frame, stream)) {
                tracing::error!(error = %err, "listener exited");
            }
        });
    }
    thread::sleep(Duration::from_millis(100));

    client.net().register_with_rendezvous(&rendezvous_address())?;
    tracing::info!(peers = client.net().peers().len(), "connected to network");

    loop {
        check_one_own_transaction(&client);
        maybe_pay_a_peer(&client);
        thread::sleep(POLL_INTERVAL);
    }
}

fn check_one_own_transaction(client: &SpvClient) {
    let own_tx = client.own_transactions();
    let Some((tx_hash, _)) = own_tx.iter().next() else { return };
    match client.verify_transaction_proof(tx_hash) {
        Ok(included) => tracing::info!(tx_hash = %tx_hash, included, "checked transaction inclusion"),
        Err(err) => tracing::debug!(tx_hash = %tx_hash, error = %err, "inclusion check failed"),
    }
}

fn maybe_pay_a_peer(client: &SpvClient) {
    let balance = match client.request_balance() {
        Ok(balance) => balance,
        Err(err) => {
            tracing::debug!(error = %err, "balance quorum failed");
            return;
        }
    };
    if balance < SEND_THRESHOLD {
        return;
    }
    let peers = client.net().peers();
    let Some(peer) = peers.choose(&mut rand::thread_rng()) else { return };
    let Ok(receiver) = NovaPublicKey::from_hex(&peer.pubkey) else { return };
    match client.create_transaction(&receiver, SEND_AMOUNT, "") {
        Ok(tx) => tracing::info!(
            to = %peer.name,
            tx_hash = %sha256_hex(tx.to_json().as_bytes()),
            "sent transaction"
        ),
        Err(err) => tracing::warn!(error = %err, "failed to send transaction"),
    }
}
