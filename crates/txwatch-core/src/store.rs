//! State container for the transactions state.
//!
//! The current snapshot lives in an `ArcSwap`. Every action runs its reducer
//! against the latest snapshot and installs the result with compare-and-swap,
//! re-running the reducer if another writer got there first. Installed
//! snapshots are mirrored to storage; reducer no-ops are neither installed
//! nor mirrored.

use crate::clock::Clock;
use crate::state::{actions, matchers, selectors};
use crate::state::{
	AddTransactionPayload, ClearAllChainTransactionsPayload, ConfirmOracleTransactionPayload,
	ConfirmTransactionPayload, DuplicateHashError, UpdateTransactionLastCheckedPayload,
};
use arc_swap::{ArcSwap, Guard};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::Mutex;
use txwatch_storage::StateMirror;
use txwatch_types::{truncate_id, ChainId, ChainTransactionsState, TrackedTransaction, TransactionsState};

pub struct TransactionsStore {
	current: ArcSwap<TransactionsState>,
	clock: Arc<dyn Clock>,
	mirror: Option<StateMirror>,
	/// Serializes writes to the mirror.
	persist_lock: Mutex<()>,
}

impl TransactionsStore {
	/// Creates a store holding `initial`, mirrored to `mirror` if given.
	pub fn new(
		initial: TransactionsState,
		clock: Arc<dyn Clock>,
		mirror: Option<StateMirror>,
	) -> Self {
		Self {
			current: ArcSwap::from_pointee(initial),
			clock,
			mirror,
			persist_lock: Mutex::new(()),
		}
	}

	/// Creates a store holding the state previously saved to `mirror`.
	///
	/// An absent or unreadable saved state yields an empty store.
	pub async fn rehydrate(mirror: StateMirror, clock: Arc<dyn Clock>) -> Self {
		let initial = mirror.load().await;
		tracing::info!(
			key = %mirror.key(),
			chains = initial.chain_ids().count(),
			"Rehydrated transactions state"
		);
		Self::new(initial, clock, Some(mirror))
	}

	/// The current snapshot.
	pub fn snapshot(&self) -> Arc<TransactionsState> {
		self.current.load_full()
	}

	/// Installs `reduce(latest)` unless it returns the latest snapshot itself.
	///
	/// Returns whether a new snapshot was installed.
	fn install<E>(
		&self,
		mut reduce: impl FnMut(&Arc<TransactionsState>) -> Result<Arc<TransactionsState>, E>,
	) -> Result<bool, E> {
		let mut current = self.current.load_full();
		loop {
			let next = reduce(&current)?;
			if Arc::ptr_eq(&next, &current) {
				return Ok(false);
			}

			let previous = self.current.compare_and_swap(&current, next);
			if Arc::ptr_eq(&*previous, &current) {
				return Ok(true);
			}

			// Lost the race: retry against the snapshot that won
			current = Guard::into_inner(previous);
		}
	}

	async fn apply(&self, mut reduce: impl FnMut(&Arc<TransactionsState>) -> Arc<TransactionsState>) {
		let installed = self
			.install(|state| Ok::<_, Infallible>(reduce(state)))
			.unwrap_or_else(|never| match never {});
		if installed {
			self.persist().await;
		}
	}

	/// Writes the latest snapshot to the mirror. Failures are logged only.
	async fn persist(&self) {
		let Some(mirror) = &self.mirror else {
			return;
		};

		let _guard = self.persist_lock.lock().await;
		let snapshot = self.snapshot();
		if let Err(e) = mirror.save(&snapshot).await {
			tracing::warn!(key = %mirror.key(), error = %e, "Failed to mirror transactions state");
		}
	}

	pub async fn add_transaction(
		&self,
		payload: &AddTransactionPayload,
	) -> Result<(), DuplicateHashError> {
		self.install(|state| actions::add_transaction(state, payload, self.clock.as_ref()))?;
		tracing::info!(
			chain_id = payload.chain_id,
			tx_hash = %truncate_id(&payload.hash),
			tx_type = %payload.info.kind,
			"Tracking transaction"
		);
		self.persist().await;
		Ok(())
	}

	pub async fn add_oracle_transaction(
		&self,
		payload: &AddTransactionPayload,
	) -> Result<(), DuplicateHashError> {
		self.install(|state| actions::add_oracle_transaction(state, payload, self.clock.as_ref()))?;
		tracing::info!(
			chain_id = payload.chain_id,
			tx_hash = %truncate_id(&payload.hash),
			tx_type = %payload.info.kind,
			"Tracking oracle transaction"
		);
		self.persist().await;
		Ok(())
	}

	pub async fn confirm_transaction(&self, payload: &ConfirmTransactionPayload) {
		self.apply(|state| actions::confirm_transaction(state, payload, self.clock.as_ref()))
			.await;
	}

	pub async fn confirm_oracle_transaction(&self, payload: &ConfirmOracleTransactionPayload) {
		self.apply(|state| {
			actions::confirm_oracle_transaction(state, payload, self.clock.as_ref())
		})
		.await;
	}

	pub async fn update_transaction_last_checked(
		&self,
		payload: &UpdateTransactionLastCheckedPayload,
	) {
		self.apply(|state| actions::update_transaction_last_checked(state, payload))
			.await;
	}

	pub async fn clear_all_chain_transactions(&self, payload: &ClearAllChainTransactionsPayload) {
		self.apply(|state| actions::clear_all_chain_transactions(state, payload))
			.await;
	}

	pub fn get_all_chain_transactions(&self, chain_id: ChainId) -> Arc<ChainTransactionsState> {
		selectors::get_all_chain_transactions(&self.current.load(), chain_id)
	}

	pub fn get_chain_transaction(
		&self,
		chain_id: ChainId,
		hash: &str,
	) -> Option<Arc<TrackedTransaction>> {
		selectors::get_chain_transaction(&self.current.load(), chain_id, hash)
	}

	pub fn is_transaction_pending(&self, chain_id: ChainId, hash: &str) -> bool {
		matchers::is_transaction_pending(&self.current.load(), chain_id, hash)
	}

	pub fn is_transaction_confirmed(&self, chain_id: ChainId, hash: &str) -> bool {
		matchers::is_transaction_confirmed(&self.current.load(), chain_id, hash)
	}

	pub fn is_oracle_transaction_pending(&self, chain_id: ChainId, hash: &str) -> bool {
		matchers::is_oracle_transaction_pending(&self.current.load(), chain_id, hash)
	}

	pub fn is_oracle_transaction_confirmed(&self, chain_id: ChainId, hash: &str) -> bool {
		matchers::is_oracle_transaction_confirmed(&self.current.load(), chain_id, hash)
	}
}
