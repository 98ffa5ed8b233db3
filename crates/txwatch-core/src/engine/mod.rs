//! Tracker engine running the per-chain monitoring tasks.
//!
//! Each configured chain gets a `BlockWatcher` feeding a `CheckScheduler`.
//! All schedulers share one store and report resolutions on one event bus.

pub mod event_bus;

pub use event_bus::EventBus;

use crate::monitoring::{BlockWatcher, CheckScheduler};
use crate::store::TransactionsStore;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use txwatch_types::{truncate_id, ChainId, TrackerEvent};

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

/// Monitoring tasks of one chain.
pub(crate) struct ChainTasks {
	pub(crate) scheduler: Arc<CheckScheduler>,
	pub(crate) watcher: BlockWatcher,
}

pub struct TrackerEngine {
	store: Arc<TransactionsStore>,
	event_bus: EventBus,
	/// Activity signal shared by every chain's gate and watcher.
	active: watch::Sender<bool>,
	chains: Vec<ChainTasks>,
}

impl TrackerEngine {
	pub(crate) fn new(
		store: Arc<TransactionsStore>,
		event_bus: EventBus,
		active: watch::Sender<bool>,
		chains: Vec<ChainTasks>,
	) -> Self {
		Self {
			store,
			event_bus,
			active,
			chains,
		}
	}

	pub fn store(&self) -> &Arc<TransactionsStore> {
		&self.store
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn chain_ids(&self) -> Vec<ChainId> {
		self.chains
			.iter()
			.map(|chain| chain.scheduler.chain_id())
			.collect()
	}

	/// Runs all chains until `shutdown` resolves.
	pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<(), EngineError> {
		if self.chains.is_empty() {
			return Err(EngineError::Config("No chains to monitor".to_string()));
		}

		let mut events = self.event_bus.subscribe();
		let mut handles = Vec::with_capacity(self.chains.len() * 2);

		for ChainTasks { scheduler, watcher } in self.chains {
			tracing::info!(chain_id = scheduler.chain_id(), "Monitoring chain");
			let blocks = watcher.blocks();
			handles.push(tokio::spawn(watcher.run()));
			handles.push(tokio::spawn(scheduler.run(blocks)));
		}

		tokio::pin!(shutdown);
		loop {
			tokio::select! {
				event = events.recv() => match event {
					Ok(event) => log_event(&event),
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "Event log lagged behind");
					},
					Err(broadcast::error::RecvError::Closed) => {
						return Err(EngineError::Service("Event bus closed".to_string()));
					},
				},
				_ = &mut shutdown => break,
			}
		}

		tracing::info!("Stopping tracker");
		self.active.send_replace(false);
		for handle in handles {
			handle.abort();
		}

		Ok(())
	}
}

fn log_event(event: &TrackerEvent) {
	match event {
		TrackerEvent::TransactionSucceeded {
			chain_id,
			stage,
			transaction,
		} => {
			tracing::info!(
				chain_id,
				?stage,
				tx_hash = %truncate_id(transaction.hash()),
				tx_type = %transaction.base().info.kind,
				"Confirmed"
			);
		},
		TrackerEvent::TransactionFailed {
			chain_id,
			stage,
			transaction,
		} => {
			tracing::warn!(
				chain_id,
				?stage,
				tx_hash = %truncate_id(transaction.hash()),
				tx_type = %transaction.base().info.kind,
				"Reverted"
			);
		},
	}
}
