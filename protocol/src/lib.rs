// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # NOVA Protocol — Core Library
//!
//! A peer-to-peer proof-of-work payment network: signed value transfers, a
//! content-addressed block DAG with fork resolution, a mining control loop,
//! and a lightweight (SPV) client that verifies inclusion via Merkle proofs
//! without storing full blocks.
//!
//! ## Architecture
//!
//! - **crypto** — SHA-256 hashing and ECDSA sign/verify over fixed-length
//!   hex-encoded keys.
//! - **merkle** — the transaction Merkle tree: build, proof, verify.
//! - **transaction** — the signed value-transfer record.
//! - **block** — block header, proof-of-work mining, block-level validation.
//! - **chain** — the fork-aware block store and longest-chain resolution.
//! - **mempool** — per-miner transaction pool and candidate selection.
//! - **miner** — the mining control loop.
//! - **net** — wire framing and the shared network-node base.
//! - **spv** — the light client.
//! - **adversary** — selfish-mining and double-spend variants.
//! - **config** — wire-format constants every node in a deployment must agree on.
//!
//! ## Design philosophy
//!
//! 1. Correctness over performance (but we're still fast).
//! 2. No unsafe code in crypto paths — we sleep at night.
//! 3. Every public API is documented. Internal shame is documented too.
//! 4. If it touches money, it has tests. Plural.
//! 5. Nothing is ever deleted: blocks that lose a fork race are kept, not pruned.

pub mod adversary;
pub mod block;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod mempool;
pub mod merkle;
pub mod miner;
pub mod net;
pub mod spv;
pub mod transaction;
