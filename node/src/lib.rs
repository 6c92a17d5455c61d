// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # NOVA Node — Shared Binary Scaffolding
//!
//! Every role binary under `src/bin/` is a thin `main()` wrapping
//! [`nova_protocol`] domain types: parse the single positional port
//! argument (§6.3), initialize logging, spin up the listener thread,
//! register with the rendezvous, and run whatever loop the role calls
//! for. This crate holds only what every one of those `main()`s repeats.

pub mod cli;
pub mod logging;
pub mod mine_lock;

use nova_protocol::config::RENDEZVOUS_DEFAULT_PORT;

/// The single well-known rendezvous address every role dials to bootstrap
/// its peer list (§6.2). Not configurable — the rendezvous contract is a
/// fixed bootstrap point, not a discoverable service.
pub fn rendezvous_address() -> String {
    format!("127.0.0.1:{RENDEZVOUS_DEFAULT_PORT}")
}
