//! Activity and connectivity signals gating the check scheduler.

use tokio::sync::watch;

/// Pair of boolean signals that must both be `true` for checks to run.
///
/// `active` reports whether the tracker is in its active window and `online`
/// whether the chain's node is reachable.
#[derive(Clone, Debug)]
pub struct Gate {
	active: watch::Receiver<bool>,
	online: watch::Receiver<bool>,
}

impl Gate {
	pub fn new(active: watch::Receiver<bool>, online: watch::Receiver<bool>) -> Self {
		Self { active, online }
	}

	/// A gate that is permanently open.
	pub fn open() -> Self {
		let (_active_tx, active) = watch::channel(true);
		let (_online_tx, online) = watch::channel(true);
		Self { active, online }
	}

	pub fn is_open(&self) -> bool {
		*self.active.borrow() && *self.online.borrow()
	}

	/// Waits until either signal changes.
	///
	/// Returns `false` once both senders are gone, after which the gate can
	/// no longer change.
	pub async fn changed(&mut self) -> bool {
		let active_closed = self.active.has_changed().is_err();
		let online_closed = self.online.has_changed().is_err();

		match (active_closed, online_closed) {
			(true, true) => false,
			(true, false) => self.online.changed().await.is_ok(),
			(false, true) => self.active.changed().await.is_ok(),
			(false, false) => tokio::select! {
				result = self.active.changed() => result.is_ok() || self.online.changed().await.is_ok(),
				result = self.online.changed() => result.is_ok() || self.active.changed().await.is_ok(),
			},
		}
	}
}
