//! Common types module for the txwatch transaction tracker.
//!
//! This module defines the core data types shared by every txwatch crate:
//! tracked transactions and their receipts, the per-chain state aggregates,
//! tracker events and the configuration validation framework.

/// Tracker events published on the event bus.
pub mod events;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Per-chain and global transaction state aggregates.
pub mod state;
/// Storage types for managing persistent data.
pub mod storage;
/// Tracked transaction entities and receipts.
pub mod transaction;
/// Utility functions for display formatting.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use events::*;
pub use registry::ImplementationRegistry;
pub use state::*;
pub use storage::*;
pub use transaction::*;
pub use utils::truncate_id;
pub use validation::*;
