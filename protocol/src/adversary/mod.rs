//! # Adversary Variants
//!
//! Two attacks built by reusing the honest node's machinery rather than
//! reimplementing it: [`selfish`] mining withholds blocks to keep a private
//! lead over the public chain, and [`double_spend`] mining forks privately
//! around a single vendor purchase and races to reverse it.

pub mod double_spend;
pub mod selfish;

pub use double_spend::{DoubleSpendMiner, DoubleSpendMode, DoubleSpendSpvClient, Vendor};
pub use selfish::SelfishMiner;
