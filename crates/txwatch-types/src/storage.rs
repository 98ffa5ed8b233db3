//! Storage-related types for the tracker.

/// Storage namespaces used by txwatch.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Namespace of the serialized transactions state
	TransactionsState,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::TransactionsState => "transactions_state",
		}
	}
}
