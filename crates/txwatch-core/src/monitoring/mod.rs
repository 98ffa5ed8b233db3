//! Per-chain monitoring tasks.
//!
//! `BlockWatcher` follows a chain's block height and connectivity, and
//! `CheckScheduler` turns each new block into a batch of receipt lookups.

pub mod block;
pub mod checker;

pub use block::BlockWatcher;
pub use checker::{CheckReport, CheckScheduler, ConfirmationListener};
