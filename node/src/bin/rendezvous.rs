// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Rendezvous Bootstrap Service
//!
//! The single well-known address every role dials to discover the
//! current peer set (§6.2). Not fault-tolerant, not dynamic — one
//! process, one in-memory registry, forwarding each new announcement to
//! everyone already registered.

use clap::Parser;

use nova_node::cli::NodeArgs;
use nova_node::logging::{self, LogFormat};
use nova_protocol::net::wire::AddressesReplyBody;
use nova_protocol::net::{serve, write_reply, Frame, PeerRecord, Rendezvous, Tag};

fn main() -> anyhow::Result<()> {
    logging::init_logging("info", LogFormat::Pretty);
    let args = NodeArgs::parse();

    let rendezvous = Rendezvous::new();
    tracing::info!(port = args.port, "rendezvous listening");

    serve(args.port, move |frame: Frame, mut stream| match frame.tag {
        Tag::Addresses => {
            let body = AddressesReplyBody { addresses: rendezvous.addresses() };
            // The `a` reply keeps its tag byte, unlike every other reply
            // on the wire (§6.1).
            let reply =
                format!("a{}", serde_json::to_string(&body).expect("addresses reply always encodes"));
            let _ = write_reply(&mut stream, &reply);
        }
        Tag::NewPeer => {
            if let Ok(peer) = frame.parse_body::<PeerRecord>() {
                let previously_registered = rendezvous.register(peer.clone());
                tracing::info!(peer = %peer.addr_string(), name = %peer.name, "peer registered");
                Rendezvous::forward(&peer, &previously_registered);
            }
        }
        _ => {}
    })?;

    Ok(())
}
