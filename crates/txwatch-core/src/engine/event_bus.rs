//! Broadcast bus for tracker events.

use crate::monitoring::ConfirmationListener;
use async_trait::async_trait;
use tokio::sync::broadcast;
use txwatch_types::{ChainId, ConfirmationStage, TrackedTransaction, TrackerEvent};

/// Fan-out channel for `TrackerEvent`s. Clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<TrackerEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
		self.sender.subscribe()
	}

	/// Publishes `event` to all current subscribers.
	///
	/// Fails only when there are no subscribers.
	pub fn publish(
		&self,
		event: TrackerEvent,
	) -> Result<usize, broadcast::error::SendError<TrackerEvent>> {
		self.sender.send(event)
	}
}

#[async_trait]
impl ConfirmationListener for EventBus {
	async fn on_success(
		&self,
		chain_id: ChainId,
		stage: ConfirmationStage,
		transaction: &TrackedTransaction,
	) {
		self.publish(TrackerEvent::TransactionSucceeded {
			chain_id,
			stage,
			transaction: transaction.clone(),
		})
		.ok();
	}

	async fn on_failure(
		&self,
		chain_id: ChainId,
		stage: ConfirmationStage,
		transaction: &TrackedTransaction,
	) {
		self.publish(TrackerEvent::TransactionFailed {
			chain_id,
			stage,
			transaction: transaction.clone(),
		})
		.ok();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use txwatch_types::{Transaction, TransactionInfo};

	#[tokio::test]
	async fn test_listener_publishes_events() {
		let bus = EventBus::new(8);
		let mut receiver = bus.subscribe();
		let tx: TrackedTransaction =
			Transaction::new("0x01", "0xa", TransactionInfo::new("test-type"), 0).into();

		bus.on_success(1, ConfirmationStage::Base, &tx).await;
		bus.on_failure(1, ConfirmationStage::Oracle, &tx).await;

		assert!(matches!(
			receiver.recv().await.unwrap(),
			TrackerEvent::TransactionSucceeded {
				chain_id: 1,
				stage: ConfirmationStage::Base,
				..
			}
		));
		assert!(matches!(
			receiver.recv().await.unwrap(),
			TrackerEvent::TransactionFailed {
				stage: ConfirmationStage::Oracle,
				..
			}
		));
	}

	#[test]
	fn test_publish_without_subscribers_is_an_error() {
		let bus = EventBus::new(8);
		let tx: TrackedTransaction =
			Transaction::new("0x01", "0xa", TransactionInfo::new("test-type"), 0).into();

		assert!(bus
			.publish(TrackerEvent::TransactionSucceeded {
				chain_id: 1,
				stage: ConfirmationStage::Base,
				transaction: tx,
			})
			.is_err());
	}
}
