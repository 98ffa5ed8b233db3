//! Core of the txwatch transaction tracker.
//!
//! Holds the transactions state and the pure reducers, matchers and
//! selectors over it, the store applying those reducers concurrently, and
//! the per-chain monitoring tasks that look up receipts as blocks arrive.
//! `TrackerBuilder` wires everything into a runnable `TrackerEngine`.

pub mod builder;
pub mod clock;
pub mod engine;
pub mod monitoring;
pub mod signals;
pub mod state;
pub mod store;

pub use builder::{BuilderError, TrackerBuilder, TrackerFactories};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineError, EventBus, TrackerEngine};
pub use monitoring::{BlockWatcher, CheckReport, CheckScheduler, ConfirmationListener};
pub use signals::Gate;
pub use store::TransactionsStore;
