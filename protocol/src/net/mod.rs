//! # Network Layer
//!
//! Single-tag-byte-plus-JSON-body framing over blocking TCP. There is no
//! single event loop (§5 of the network's concurrency model): each node
//! runs an acceptor thread that spawns one handler thread per inbound
//! connection, plus whatever mining-driver and outbound-broadcast threads
//! its role needs.
//!
//! | Tag | Direction | Reply |
//! |---|---|---|
//! | `a` | node → rendezvous | address list |
//! | `n` | rendezvous → peers, node → rendezvous | none |
//! | `t` | any → node | none |
//! | `b` | miner → miners | none |
//! | `h` | miner → SPVs | none |
//! | `r` | any → miner | proof or all-nulls |
//! | `x` | any → miner | ASCII integer balance |
//! | `p` | vendor → colluding SPV | none |
//!
//! This module supplies the framing, the peer-list/broadcast base
//! ([`NetNode`]), and the rendezvous-side registry ([`rendezvous`]).
//! Role-specific dispatch (what to do with a `b` versus an `r`) lives in
//! [`crate::miner`], [`crate::spv`], and [`crate::adversary`] — this
//! module never reimplements consensus logic, it only carries bytes.

pub mod node;
pub mod peer;
pub mod rendezvous;
pub mod wire;

pub use node::{serve, NetError, NetNode};
pub use peer::{NodeRole, PeerRecord};
pub use rendezvous::Rendezvous;
pub use wire::{
    read_frame, send_message, send_request, write_reply, Frame, ProductDeliveredBody, Tag,
    WireError,
};
