//! Block number polling for one chain.
//!
//! The watcher publishes the latest block number and whether the chain's node
//! answered its last poll. Polling pauses while the tracker is inactive.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use txwatch_receipts::BlockNumberSource;
use txwatch_types::ChainId;

pub struct BlockWatcher {
	chain_id: ChainId,
	source: Arc<dyn BlockNumberSource>,
	poll_interval: Duration,
	blocks: watch::Sender<Option<u64>>,
	online: watch::Sender<bool>,
	active: watch::Receiver<bool>,
}

impl BlockWatcher {
	/// Creates a watcher polling `source` every `poll_interval` while
	/// `active` is `true`. The chain starts out online.
	pub fn new(
		chain_id: ChainId,
		source: Arc<dyn BlockNumberSource>,
		poll_interval: Duration,
		active: watch::Receiver<bool>,
	) -> Self {
		let (blocks, _) = watch::channel(None);
		let (online, _) = watch::channel(true);
		Self {
			chain_id,
			source,
			poll_interval,
			blocks,
			online,
			active,
		}
	}

	/// Latest observed block number, `None` until the first successful poll.
	pub fn blocks(&self) -> watch::Receiver<Option<u64>> {
		self.blocks.subscribe()
	}

	/// Whether the last poll reached the node.
	pub fn online(&self) -> watch::Receiver<bool> {
		self.online.subscribe()
	}

	/// Polls the node once.
	///
	/// Only block numbers above the last published one are published.
	pub async fn poll_once(&self) {
		match self.source.get_block_number().await {
			Ok(block_number) => {
				self.online.send_if_modified(|online| !std::mem::replace(online, true));
				let advanced = self.blocks.send_if_modified(|latest| {
					if latest.is_some_and(|latest| latest >= block_number) {
						false
					} else {
						*latest = Some(block_number);
						true
					}
				});
				if advanced {
					tracing::debug!(chain_id = self.chain_id, block_number, "New block");
				}
			},
			Err(e) => {
				let was_online = self.online.send_replace(false);
				if was_online {
					tracing::warn!(chain_id = self.chain_id, error = %e, "Chain went offline");
				} else {
					tracing::debug!(chain_id = self.chain_id, error = %e, "Chain still offline");
				}
			},
		}
	}

	/// Polls until the activity sender is dropped.
	pub async fn run(mut self) {
		let mut interval = tokio::time::interval(self.poll_interval);
		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			if !*self.active.borrow_and_update() {
				tracing::debug!(chain_id = self.chain_id, "Block polling paused");
				if self.active.changed().await.is_err() {
					break;
				}
				interval.reset_immediately();
				continue;
			}

			tokio::select! {
				_ = interval.tick() => self.poll_once().await,
				changed = self.active.changed() => {
					if changed.is_err() {
						break;
					}
				},
			}
		}

		tracing::debug!(chain_id = self.chain_id, "Block watcher stopped");
	}
}
