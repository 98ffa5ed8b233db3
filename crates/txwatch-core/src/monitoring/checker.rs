//! Receipt check scheduler for one chain.
//!
//! Each observed block (and each time the gate re-opens) starts a batch: the
//! chain's transactions are split into base checks and oracle checks, every
//! eligible transaction is looked up concurrently, and each resolution feeds
//! a reducer through the store. Batches for different blocks run
//! independently and are never cancelled by newer ones.

use crate::signals::Gate;
use crate::state::matchers::{has_oracle_transaction_to_be_checked, has_transaction_to_be_checked};
use crate::state::{
	ConfirmOracleTransactionPayload, ConfirmTransactionPayload,
	UpdateTransactionLastCheckedPayload,
};
use crate::store::TransactionsStore;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;
use txwatch_receipts::{OracleReceiptSource, ReceiptSource};
use txwatch_types::{truncate_id, ChainId, ConfirmationStage, TrackedTransaction};

/// Receives the outcome of every receipt that resolved a transaction.
///
/// `transaction` is the transaction as it was when its lookup was issued.
#[async_trait]
pub trait ConfirmationListener: Send + Sync {
	async fn on_success(
		&self,
		chain_id: ChainId,
		stage: ConfirmationStage,
		transaction: &TrackedTransaction,
	);

	async fn on_failure(
		&self,
		chain_id: ChainId,
		stage: ConfirmationStage,
		transaction: &TrackedTransaction,
	);
}

/// Summary of one check batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
	pub block_number: u64,
	/// The gate was closed and no lookups were issued.
	pub gated: bool,
	pub base_checks: usize,
	pub oracle_checks: usize,
	/// Lookups that found no receipt yet.
	pub not_found: usize,
	/// Lookups that returned a receipt.
	pub resolved: usize,
	/// Lookups whose source returned an error.
	pub fetch_errors: usize,
}

enum Outcome {
	NotFound,
	Resolved,
	FetchError,
}

pub struct CheckScheduler {
	chain_id: ChainId,
	store: Arc<TransactionsStore>,
	receipts: Arc<dyn ReceiptSource>,
	oracle_receipts: Option<Arc<dyn OracleReceiptSource>>,
	listener: Arc<dyn ConfirmationListener>,
	gate: Gate,
}

impl CheckScheduler {
	pub fn new(
		chain_id: ChainId,
		store: Arc<TransactionsStore>,
		receipts: Arc<dyn ReceiptSource>,
		oracle_receipts: Option<Arc<dyn OracleReceiptSource>>,
		listener: Arc<dyn ConfirmationListener>,
		gate: Gate,
	) -> Self {
		Self {
			chain_id,
			store,
			receipts,
			oracle_receipts,
			listener,
			gate,
		}
	}

	pub fn chain_id(&self) -> ChainId {
		self.chain_id
	}

	/// Runs one check batch for `block_number` to completion.
	#[instrument(skip_all, fields(chain_id = self.chain_id, block_number = block_number))]
	pub async fn check_block(&self, block_number: u64) -> CheckReport {
		let mut report = CheckReport {
			block_number,
			..CheckReport::default()
		};

		if !self.gate.is_open() {
			tracing::debug!("Gate closed, skipping checks");
			report.gated = true;
			return report;
		}

		let chain = self.store.get_all_chain_transactions(self.chain_id);

		let base: Vec<_> = chain
			.values()
			.filter(|tx| has_transaction_to_be_checked(tx.base(), block_number))
			.cloned()
			.collect();

		let oracle: Vec<_> = match &self.oracle_receipts {
			Some(source) => chain
				.values()
				.filter(|tx| {
					tx.as_oracle()
						.is_some_and(|oracle| has_oracle_transaction_to_be_checked(oracle, block_number))
				})
				.map(|tx| (Arc::clone(source), Arc::clone(tx)))
				.collect(),
			None => {
				let waiting = chain
					.values()
					.filter_map(|tx| tx.as_oracle())
					.filter(|oracle| has_oracle_transaction_to_be_checked(oracle, block_number))
					.count();
				if waiting > 0 {
					tracing::warn!(
						waiting,
						"Oracle transactions await an oracle receipt but no oracle source is configured"
					);
				}
				Vec::new()
			},
		};

		report.base_checks = base.len();
		report.oracle_checks = oracle.len();
		if base.is_empty() && oracle.is_empty() {
			return report;
		}

		tracing::debug!(
			base_checks = report.base_checks,
			oracle_checks = report.oracle_checks,
			"Checking transactions"
		);

		let base_lookups = base
			.into_iter()
			.map(|tx| self.check_base(tx, block_number));
		let oracle_lookups = oracle
			.into_iter()
			.map(|(source, tx)| self.check_oracle(source, tx, block_number));

		let (base_outcomes, oracle_outcomes) =
			futures::join!(join_all(base_lookups), join_all(oracle_lookups));

		for outcome in base_outcomes.into_iter().chain(oracle_outcomes) {
			match outcome {
				Outcome::NotFound => report.not_found += 1,
				Outcome::Resolved => report.resolved += 1,
				Outcome::FetchError => report.fetch_errors += 1,
			}
		}

		report
	}

	/// Starts a check batch without waiting for it.
	pub fn trigger(self: &Arc<Self>, block_number: u64) -> JoinHandle<CheckReport> {
		let scheduler = Arc::clone(self);
		tokio::spawn(async move { scheduler.check_block(block_number).await })
	}

	/// Triggers a batch for every new block number and whenever the gate
	/// re-opens while a block is known. Returns when `blocks` closes.
	pub async fn run(self: Arc<Self>, mut blocks: watch::Receiver<Option<u64>>) {
		let mut gate = self.gate.clone();
		let mut gate_live = true;
		let mut was_open = gate.is_open();

		if let Some(block_number) = *blocks.borrow_and_update() {
			self.trigger(block_number);
		}

		loop {
			tokio::select! {
				changed = blocks.changed() => {
					if changed.is_err() {
						break;
					}
					if let Some(block_number) = *blocks.borrow_and_update() {
						self.trigger(block_number);
					}
				},
				live = gate.changed(), if gate_live => {
					gate_live = live;
					let is_open = gate.is_open();
					if is_open && !was_open {
						if let Some(block_number) = *blocks.borrow() {
							tracing::debug!(chain_id = self.chain_id, "Gate re-opened");
							self.trigger(block_number);
						}
					}
					was_open = is_open;
				},
			}
		}
	}

	async fn check_base(&self, tx: Arc<TrackedTransaction>, block_number: u64) -> Outcome {
		let hash = tx.hash().to_string();

		match self.receipts.get_receipt(tx.base(), block_number).await {
			Ok(None) => {
				self.store
					.update_transaction_last_checked(&UpdateTransactionLastCheckedPayload {
						chain_id: self.chain_id,
						hash,
						block_number,
					})
					.await;
				Outcome::NotFound
			},
			Ok(Some(receipt)) => {
				let had_success = receipt.had_success;
				self.store
					.confirm_transaction(&ConfirmTransactionPayload {
						chain_id: self.chain_id,
						hash,
						receipt,
					})
					.await;
				self.notify(ConfirmationStage::Base, &tx, had_success).await;
				Outcome::Resolved
			},
			Err(e) => {
				tracing::warn!(
					tx_hash = %truncate_id(&hash),
					error = %e,
					"Receipt lookup failed"
				);
				Outcome::FetchError
			},
		}
	}

	async fn check_oracle(
		&self,
		source: Arc<dyn OracleReceiptSource>,
		tx: Arc<TrackedTransaction>,
		block_number: u64,
	) -> Outcome {
		let Some(oracle) = tx.as_oracle() else {
			return Outcome::NotFound;
		};
		let hash = tx.hash().to_string();

		match source.get_oracle_receipt(oracle, block_number).await {
			Ok(None) => {
				self.store
					.update_transaction_last_checked(&UpdateTransactionLastCheckedPayload {
						chain_id: self.chain_id,
						hash,
						block_number,
					})
					.await;
				Outcome::NotFound
			},
			Ok(Some(oracle_receipt)) => {
				let had_success = oracle_receipt.had_success;
				self.store
					.confirm_oracle_transaction(&ConfirmOracleTransactionPayload {
						chain_id: self.chain_id,
						hash,
						oracle_receipt,
					})
					.await;
				self.notify(ConfirmationStage::Oracle, &tx, had_success).await;
				Outcome::Resolved
			},
			Err(e) => {
				tracing::warn!(
					tx_hash = %truncate_id(&hash),
					error = %e,
					"Oracle receipt lookup failed"
				);
				Outcome::FetchError
			},
		}
	}

	async fn notify(&self, stage: ConfirmationStage, tx: &TrackedTransaction, had_success: bool) {
		if had_success {
			tracing::info!(tx_hash = %truncate_id(tx.hash()), ?stage, "Transaction succeeded");
			self.listener.on_success(self.chain_id, stage, tx).await;
		} else {
			tracing::info!(tx_hash = %truncate_id(tx.hash()), ?stage, "Transaction failed");
			self.listener.on_failure(self.chain_id, stage, tx).await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;
	use crate::engine::EventBus;
	use crate::state::AddTransactionPayload;
	use mockall::mock;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;
	use tokio::sync::{broadcast, Barrier};
	use txwatch_receipts::ReceiptError;
	use txwatch_types::{
		OracleTransaction, Transaction, TransactionInfo, TransactionReceipt, TransactionsState,
		TrackerEvent,
	};

	const H1: &str = "0x1000000000000000000000000000000000000000000000000000000000000011";
	const H2: &str = "0x1000000000000000000000000000000000000000000000000000000000000022";
	const O1: &str = "0x1000000000000000000000000000000000000000000000000000000000000033";

	mock! {
		pub Receipts {}

		#[async_trait]
		impl ReceiptSource for Receipts {
			async fn get_receipt(
				&self,
				transaction: &Transaction,
				block_number: u64,
			) -> Result<Option<TransactionReceipt>, ReceiptError>;
		}
	}

	mock! {
		pub OracleReceipts {}

		#[async_trait]
		impl OracleReceiptSource for OracleReceipts {
			async fn get_oracle_receipt(
				&self,
				transaction: &OracleTransaction,
				block_number: u64,
			) -> Result<Option<TransactionReceipt>, ReceiptError>;
		}
	}

	fn receipt(hash: &str, had_success: bool) -> TransactionReceipt {
		TransactionReceipt {
			from: "0x0000000000000000000000000000000000000012".to_string(),
			to: None,
			contract_address: None,
			transaction_index: 0,
			transaction_hash: hash.to_string(),
			block_hash: "0x888".to_string(),
			block_number: 100,
			had_success,
		}
	}

	fn add_payload(hash: &str) -> AddTransactionPayload {
		AddTransactionPayload {
			chain_id: 1,
			from: "0x0000000000000000000000000000000000000012".to_string(),
			hash: hash.to_string(),
			info: TransactionInfo::new("test-type"),
		}
	}

	fn store() -> Arc<TransactionsStore> {
		Arc::new(TransactionsStore::new(
			TransactionsState::new(),
			Arc::new(ManualClock::new(1_000)),
			None,
		))
	}

	fn scheduler(
		store: &Arc<TransactionsStore>,
		receipts: impl ReceiptSource + 'static,
		oracle: Option<Arc<dyn OracleReceiptSource>>,
		bus: &EventBus,
		gate: Gate,
	) -> CheckScheduler {
		CheckScheduler::new(
			1,
			Arc::clone(store),
			Arc::new(receipts),
			oracle,
			Arc::new(bus.clone()),
			gate,
		)
	}

	async fn next_event(receiver: &mut broadcast::Receiver<TrackerEvent>) -> TrackerEvent {
		tokio::time::timeout(Duration::from_secs(5), receiver.recv())
			.await
			.expect("event timeout")
			.expect("bus closed")
	}

	#[tokio::test]
	async fn test_closed_gate_issues_no_lookups() {
		let store = store();
		store.add_transaction(&add_payload(H1)).await.unwrap();

		let mut receipts = MockReceipts::new();
		receipts.expect_get_receipt().times(0);

		let (_active_tx, active) = watch::channel(false);
		let (_online_tx, online) = watch::channel(true);
		let scheduler = scheduler(
			&store,
			receipts,
			None,
			&EventBus::new(8),
			Gate::new(active, online),
		);

		let report = scheduler.check_block(100).await;
		assert!(report.gated);
		assert_eq!(report.base_checks, 0);
		assert_eq!(
			store
				.get_chain_transaction(1, H1)
				.unwrap()
				.base()
				.last_checked_block_number,
			None
		);
	}

	#[tokio::test]
	async fn test_one_lookup_per_block() {
		let store = store();
		store.add_transaction(&add_payload(H1)).await.unwrap();

		let mut receipts = MockReceipts::new();
		receipts
			.expect_get_receipt()
			.times(2)
			.returning(|_, _| Ok(None));
		let scheduler = scheduler(&store, receipts, None, &EventBus::new(8), Gate::open());

		let first = scheduler.check_block(100).await;
		assert_eq!((first.base_checks, first.not_found), (1, 1));
		assert_eq!(
			store
				.get_chain_transaction(1, H1)
				.unwrap()
				.base()
				.last_checked_block_number,
			Some(100)
		);

		// Same block again is skipped
		let repeat = scheduler.check_block(100).await;
		assert_eq!(repeat.base_checks, 0);

		let next = scheduler.check_block(101).await;
		assert_eq!(next.base_checks, 1);
		assert!(store.is_transaction_pending(1, H1));
	}

	#[tokio::test]
	async fn test_receipts_confirm_and_notify() {
		let store = store();
		store.add_transaction(&add_payload(H1)).await.unwrap();
		store.add_transaction(&add_payload(H2)).await.unwrap();

		let mut receipts = MockReceipts::new();
		receipts.expect_get_receipt().returning(|tx, _| {
			Ok(Some(receipt(&tx.hash, tx.hash == H1)))
		});
		let bus = EventBus::new(8);
		let mut events = bus.subscribe();
		let scheduler = scheduler(&store, receipts, None, &bus, Gate::open());

		let report = scheduler.check_block(100).await;
		assert_eq!(report.resolved, 2);
		assert!(store.is_transaction_confirmed(1, H1));
		assert!(store.is_transaction_confirmed(1, H2));

		let mut succeeded = Vec::new();
		let mut failed = Vec::new();
		for _ in 0..2 {
			match next_event(&mut events).await {
				TrackerEvent::TransactionSucceeded {
					stage, transaction, ..
				} => {
					assert_eq!(stage, ConfirmationStage::Base);
					// Listeners see the transaction as it was before confirmation
					assert!(transaction.base().is_pending());
					succeeded.push(transaction.hash().to_string());
				},
				TrackerEvent::TransactionFailed { transaction, .. } => {
					failed.push(transaction.hash().to_string());
				},
			}
		}
		assert_eq!(succeeded, vec![H1.to_string()]);
		assert_eq!(failed, vec![H2.to_string()]);

		// Confirmed transactions are not looked up again
		assert_eq!(scheduler.check_block(101).await.base_checks, 0);
	}

	#[tokio::test]
	async fn test_fetch_error_leaves_transaction_for_retry() {
		let store = store();
		store.add_transaction(&add_payload(H1)).await.unwrap();

		let mut receipts = MockReceipts::new();
		receipts
			.expect_get_receipt()
			.times(1)
			.returning(|_, _| Err(ReceiptError::Network("connection refused".to_string())));
		receipts
			.expect_get_receipt()
			.times(1)
			.returning(|tx, _| Ok(Some(receipt(&tx.hash, true))));
		let scheduler = scheduler(&store, receipts, None, &EventBus::new(8), Gate::open());

		let failed = scheduler.check_block(100).await;
		assert_eq!(failed.fetch_errors, 1);
		let tx = store.get_chain_transaction(1, H1).unwrap();
		assert!(tx.base().is_pending());
		assert_eq!(tx.base().last_checked_block_number, None);

		// The same block is retried
		let retried = scheduler.check_block(100).await;
		assert_eq!(retried.resolved, 1);
		assert!(store.is_transaction_confirmed(1, H1));
	}

	#[tokio::test]
	async fn test_oracle_stage_follows_base_confirmation() {
		let store = store();
		store.add_oracle_transaction(&add_payload(O1)).await.unwrap();

		let mut receipts = MockReceipts::new();
		receipts
			.expect_get_receipt()
			.times(1)
			.returning(|tx, _| Ok(Some(receipt(&tx.hash, true))));
		let mut oracle = MockOracleReceipts::new();
		oracle
			.expect_get_oracle_receipt()
			.times(1)
			.returning(|tx, _| Ok(Some(receipt(&tx.transaction.hash, false))));

		let bus = EventBus::new(8);
		let mut events = bus.subscribe();
		let scheduler = scheduler(&store, receipts, Some(Arc::new(oracle)), &bus, Gate::open());

		// Base still pending: only the base receipt is looked up
		let first = scheduler.check_block(100).await;
		assert_eq!((first.base_checks, first.oracle_checks), (1, 0));
		assert!(store.is_transaction_confirmed(1, O1));
		assert!(store.is_oracle_transaction_pending(1, O1));
		assert!(matches!(
			next_event(&mut events).await,
			TrackerEvent::TransactionSucceeded {
				stage: ConfirmationStage::Base,
				..
			}
		));

		let second = scheduler.check_block(101).await;
		assert_eq!((second.base_checks, second.oracle_checks), (0, 1));
		assert!(store.is_oracle_transaction_confirmed(1, O1));
		assert!(matches!(
			next_event(&mut events).await,
			TrackerEvent::TransactionFailed {
				stage: ConfirmationStage::Oracle,
				..
			}
		));

		let third = scheduler.check_block(102).await;
		assert_eq!((third.base_checks, third.oracle_checks), (0, 0));
	}

	#[tokio::test]
	async fn test_oracle_not_found_records_block() {
		let store = store();
		store.add_oracle_transaction(&add_payload(O1)).await.unwrap();
		store
			.confirm_transaction(&ConfirmTransactionPayload {
				chain_id: 1,
				hash: O1.to_string(),
				receipt: receipt(O1, true),
			})
			.await;

		let mut receipts = MockReceipts::new();
		receipts.expect_get_receipt().times(0);
		let mut oracle = MockOracleReceipts::new();
		oracle
			.expect_get_oracle_receipt()
			.times(1)
			.returning(|_, _| Ok(None));
		let scheduler = scheduler(
			&store,
			receipts,
			Some(Arc::new(oracle)),
			&EventBus::new(8),
			Gate::open(),
		);

		assert_eq!(scheduler.check_block(100).await.not_found, 1);
		assert_eq!(scheduler.check_block(100).await.oracle_checks, 0);
		assert!(store.is_oracle_transaction_pending(1, O1));
	}

	struct RendezvousReceipts {
		barrier: Barrier,
	}

	#[async_trait]
	impl ReceiptSource for RendezvousReceipts {
		async fn get_receipt(
			&self,
			_transaction: &Transaction,
			_block_number: u64,
		) -> Result<Option<TransactionReceipt>, ReceiptError> {
			self.barrier.wait().await;
			Ok(None)
		}
	}

	#[tokio::test]
	async fn test_lookups_within_a_batch_run_concurrently() {
		let store = store();
		store.add_transaction(&add_payload(H1)).await.unwrap();
		store.add_transaction(&add_payload(H2)).await.unwrap();

		// Both lookups must be in flight at once for either to finish
		let receipts = RendezvousReceipts {
			barrier: Barrier::new(2),
		};
		let scheduler = scheduler(&store, receipts, None, &EventBus::new(8), Gate::open());

		let report = tokio::time::timeout(Duration::from_secs(5), scheduler.check_block(100))
			.await
			.expect("lookups ran sequentially");
		assert_eq!(report.not_found, 2);
	}

	#[derive(Default)]
	struct CountingReceipts {
		calls: Arc<AtomicUsize>,
	}

	#[async_trait]
	impl ReceiptSource for CountingReceipts {
		async fn get_receipt(
			&self,
			_transaction: &Transaction,
			_block_number: u64,
		) -> Result<Option<TransactionReceipt>, ReceiptError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(None)
		}
	}

	async fn wait_for_calls(calls: &AtomicUsize, expected: usize) {
		tokio::time::timeout(Duration::from_secs(5), async {
			while calls.load(Ordering::SeqCst) < expected {
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.expect("lookup timeout");
	}

	#[tokio::test]
	async fn test_run_checks_every_new_block() {
		let store = store();
		store.add_transaction(&add_payload(H1)).await.unwrap();

		let receipts = CountingReceipts::default();
		let calls = Arc::clone(&receipts.calls);
		let scheduler = Arc::new(scheduler(
			&store,
			receipts,
			None,
			&EventBus::new(8),
			Gate::open(),
		));

		let (blocks_tx, blocks) = watch::channel(None);
		let handle = tokio::spawn(Arc::clone(&scheduler).run(blocks));

		blocks_tx.send(Some(100)).unwrap();
		wait_for_calls(&calls, 1).await;
		blocks_tx.send(Some(101)).unwrap();
		wait_for_calls(&calls, 2).await;

		drop(blocks_tx);
		tokio::time::timeout(Duration::from_secs(5), handle)
			.await
			.expect("run did not stop")
			.unwrap();
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn test_run_rechecks_when_gate_reopens() {
		let store = store();
		store.add_transaction(&add_payload(H1)).await.unwrap();

		let receipts = CountingReceipts::default();
		let calls = Arc::clone(&receipts.calls);
		let (active_tx, active) = watch::channel(false);
		let (_online_tx, online) = watch::channel(true);
		let scheduler = Arc::new(scheduler(
			&store,
			receipts,
			None,
			&EventBus::new(8),
			Gate::new(active, online),
		));

		let (_blocks_tx, blocks) = watch::channel(Some(100));
		let handle = tokio::spawn(Arc::clone(&scheduler).run(blocks));

		tokio::time::sleep(Duration::from_millis(20)).await;
		assert_eq!(calls.load(Ordering::SeqCst), 0);

		active_tx.send(true).unwrap();
		wait_for_calls(&calls, 1).await;
		tokio::time::timeout(Duration::from_secs(5), async {
			while store
				.get_chain_transaction(1, H1)
				.and_then(|tx| tx.base().last_checked_block_number)
				.is_none()
			{
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.expect("block was not recorded");
		handle.abort();
	}
}
