//! Persistence mirror for the transactions state.
//!
//! The whole `TransactionsState` is stored as one JSON document. Loading
//! degrades to the empty state when nothing was stored yet or the stored
//! document cannot be decoded.

use crate::{StorageError, StorageService};
use std::sync::Arc;
use txwatch_types::{StorageKey, TransactionsState};

/// Key under which the state is stored when none is configured.
pub const DEFAULT_STATE_KEY: &str = "pending-transactions-state";

/// Reads and writes the serialized transactions state under a fixed key.
#[derive(Clone)]
pub struct StateMirror {
	storage: Arc<StorageService>,
	key: String,
}

impl StateMirror {
	pub fn new(storage: Arc<StorageService>, key: impl Into<String>) -> Self {
		Self {
			storage,
			key: key.into(),
		}
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	/// Overwrites the stored document with `state`.
	pub async fn save(&self, state: &TransactionsState) -> Result<(), StorageError> {
		self.storage
			.store(StorageKey::TransactionsState.as_str(), &self.key, state)
			.await
	}

	/// Loads the stored state, or the empty state if it is absent or unreadable.
	pub async fn load(&self) -> TransactionsState {
		match self
			.storage
			.retrieve::<TransactionsState>(StorageKey::TransactionsState.as_str(), &self.key)
			.await
		{
			Ok(state) => state,
			Err(StorageError::NotFound) => {
				tracing::debug!(key = %self.key, "No stored transactions state");
				TransactionsState::default()
			},
			Err(e) => {
				tracing::warn!(
					key = %self.key,
					error = %e,
					"Discarding unreadable transactions state"
				);
				TransactionsState::default()
			},
		}
	}
}
