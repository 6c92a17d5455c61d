// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Colluding SPV Client
//!
//! Buys from the vendor using funds from the double-spend miner, then
//! refunds the miner the instant it learns the product shipped (a `p`
//! frame it reacts to automatically — see
//! [`nova_protocol::adversary::DoubleSpendSpvClient`]). This binary only
//! drives the one step that isn't reactive: making the initial purchase
//! once it has been funded.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;

use nova_node::cli::NodeArgs;
use nova_node::logging::{self, LogFormat};
use nova_node::rendezvous_address;
use nova_protocol::adversary::DoubleSpendSpvClient;
use nova_protocol::crypto::{NovaKeypair, NovaPublicKey};
use nova_protocol::net::{serve, NodeRole};

const PURCHASE_AMOUNT: i64 = 50;
const POLL_INTERVAL: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    logging::init_logging("info", LogFormat::Pretty);
    let args = NodeArgs::parse();

    let client = Arc::new(DoubleSpendSpvClient::new(NovaKeypair::generate(), args.port));
    tracing::info!(port = args.port, pubkey = %client.inner().public_key().to_hex(), "colluding SPV client starting");

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

    let mut purchased = false;
    loop {
        if !purchased {
            maybe_purchase(&client, &mut purchased);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn maybe_purchase(client: &DoubleSpendSpvClient, purchased: &mut bool) {
    let balance = match client.inner().request_balance() {
        Ok(balance) => balance,
        Err(_) => return,
    };
    if balance < PURCHASE_AMOUNT {
        return;
    }
    let Some(vendor) = client.net().peer_with_role(NodeRole::Vendor) else { return };
    let Ok(receiver) = NovaPublicKey::from_hex(&vendor.pubkey) else { return };
    match client.inner().create_transaction(&receiver, PURCHASE_AMOUNT, "Buy") {
        Ok(_) => {
            tracing::info!(to = %vendor.name, amount = PURCHASE_AMOUNT, "purchased from vendor");
            *purchased = true;
        }
        Err(err) => tracing::warn!(error = %err, "failed to purchase from vendor"),
    }
}
