//! Transaction state aggregates.
//!
//! `TransactionsState` maps chain ids to `ChainTransactionsState`, which maps
//! transaction hashes to tracked transactions. Both levels hold their children
//! behind `Arc`, so deriving a new state from an old one only allocates the
//! nodes along the changed path; every other chain and transaction is shared
//! with the previous snapshot.

use crate::TrackedTransaction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Identifier of a chain (e.g. an EVM chain id).
pub type ChainId = u64;

/// All tracked transactions of one chain, keyed by hash.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainTransactionsState {
	transactions: HashMap<String, Arc<TrackedTransaction>>,
}

impl ChainTransactionsState {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, hash: &str) -> Option<&Arc<TrackedTransaction>> {
		self.transactions.get(hash)
	}

	pub fn contains(&self, hash: &str) -> bool {
		self.transactions.contains_key(hash)
	}

	pub fn len(&self) -> usize {
		self.transactions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.transactions.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<TrackedTransaction>)> {
		self.transactions.iter()
	}

	pub fn values(&self) -> impl Iterator<Item = &Arc<TrackedTransaction>> {
		self.transactions.values()
	}

	/// Returns a copy with `transaction` inserted under its hash, replacing
	/// any previous entry. Other entries are shared with `self`.
	pub fn with_transaction(&self, transaction: TrackedTransaction) -> Self {
		let mut transactions = self.transactions.clone();
		transactions.insert(transaction.hash().to_string(), Arc::new(transaction));
		Self { transactions }
	}
}

impl FromIterator<TrackedTransaction> for ChainTransactionsState {
	fn from_iter<I: IntoIterator<Item = TrackedTransaction>>(iter: I) -> Self {
		Self {
			transactions: iter
				.into_iter()
				.map(|transaction| (transaction.hash().to_string(), Arc::new(transaction)))
				.collect(),
		}
	}
}

/// Root aggregate: every chain's transactions, keyed by chain id.
///
/// Serializes as a JSON object whose keys are the decimal chain ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionsState {
	chains: BTreeMap<ChainId, Arc<ChainTransactionsState>>,
}

impl TransactionsState {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn chain(&self, chain_id: ChainId) -> Option<&Arc<ChainTransactionsState>> {
		self.chains.get(&chain_id)
	}

	pub fn chain_ids(&self) -> impl Iterator<Item = ChainId> + '_ {
		self.chains.keys().copied()
	}

	pub fn is_empty(&self) -> bool {
		self.chains.is_empty()
	}

	/// Returns a copy with the map of `chain_id` replaced by `chain`.
	/// Other chains are shared with `self`.
	pub fn with_chain(&self, chain_id: ChainId, chain: ChainTransactionsState) -> Self {
		let mut chains = self.chains.clone();
		chains.insert(chain_id, Arc::new(chain));
		Self { chains }
	}
}

impl FromIterator<(ChainId, ChainTransactionsState)> for TransactionsState {
	fn from_iter<I: IntoIterator<Item = (ChainId, ChainTransactionsState)>>(iter: I) -> Self {
		Self {
			chains: iter
				.into_iter()
				.map(|(chain_id, chain)| (chain_id, Arc::new(chain)))
				.collect(),
		}
	}
}
