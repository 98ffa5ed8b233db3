//! Wall clock used to stamp added and confirmed times.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
	fn now_millis(&self) -> u64;
}

/// Clock reading the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now_millis(&self) -> u64 {
		// Clamp pre-epoch clocks to zero
		u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
	}
}

/// Clock returning a settable instant. Used by tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
	now: AtomicU64,
}

impl ManualClock {
	pub fn new(now_millis: u64) -> Self {
		Self {
			now: AtomicU64::new(now_millis),
		}
	}

	pub fn set(&self, now_millis: u64) {
		self.now.store(now_millis, Ordering::SeqCst);
	}

	pub fn advance(&self, millis: u64) {
		self.now.fetch_add(millis, Ordering::SeqCst);
	}
}

impl Clock for ManualClock {
	fn now_millis(&self) -> u64 {
		self.now.load(Ordering::SeqCst)
	}
}
