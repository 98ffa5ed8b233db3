//! Event types for inter-service communication.
//!
//! Events are published on the tracker's event bus whenever a receipt check
//! resolves a transaction, so that consumers can react to confirmations
//! without polling the state.

use crate::{ChainId, TrackedTransaction};
use serde::{Deserialize, Serialize};

/// Which confirmation a receipt resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationStage {
	/// The on-chain receipt of the transaction.
	Base,
	/// The oracle receipt of an oracle transaction.
	Oracle,
}

/// Main event type encompassing all tracker events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrackerEvent {
	/// A receipt reported a successful execution.
	TransactionSucceeded {
		chain_id: ChainId,
		stage: ConfirmationStage,
		transaction: TrackedTransaction,
	},
	/// A receipt reported a failed execution.
	TransactionFailed {
		chain_id: ChainId,
		stage: ConfirmationStage,
		transaction: TrackedTransaction,
	},
}
