//! Pure reducers over the transactions state.
//!
//! Each reducer takes the current snapshot and returns the next one. Only the
//! addressed chain map and transaction are rebuilt; everything else is shared
//! with the input. When there is nothing to do (unknown chain or hash, wrong
//! transaction kind) the input `Arc` itself is returned.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use txwatch_types::{
	ChainId, ChainTransactionsState, OracleTransaction, TrackedTransaction, Transaction,
	TransactionInfo, TransactionReceipt, TransactionsState,
};

/// Raised when adding a transaction whose hash is already tracked on the chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Transaction {hash} already added on chain {chain_id}")]
pub struct DuplicateHashError {
	pub chain_id: ChainId,
	pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTransactionPayload {
	pub chain_id: ChainId,
	pub from: String,
	pub hash: String,
	pub info: TransactionInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmTransactionPayload {
	pub chain_id: ChainId,
	pub hash: String,
	pub receipt: TransactionReceipt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOracleTransactionPayload {
	pub chain_id: ChainId,
	pub hash: String,
	pub oracle_receipt: TransactionReceipt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionLastCheckedPayload {
	pub chain_id: ChainId,
	pub hash: String,
	pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearAllChainTransactionsPayload {
	pub chain_id: ChainId,
}

/// Inserts `transaction` into its chain, failing if the hash is taken.
fn insert_new(
	state: &Arc<TransactionsState>,
	chain_id: ChainId,
	transaction: TrackedTransaction,
) -> Result<Arc<TransactionsState>, DuplicateHashError> {
	let chain = match state.chain(chain_id) {
		Some(chain) if chain.contains(transaction.hash()) => {
			return Err(DuplicateHashError {
				chain_id,
				hash: transaction.hash().to_string(),
			});
		},
		Some(chain) => chain.with_transaction(transaction),
		None => ChainTransactionsState::new().with_transaction(transaction),
	};

	Ok(Arc::new(state.with_chain(chain_id, chain)))
}

/// Replaces the transaction at `(chain_id, hash)` with `update(existing)`.
///
/// Returns the input unchanged if the transaction is absent or `update`
/// declines by returning `None`.
fn update_existing(
	state: &Arc<TransactionsState>,
	chain_id: ChainId,
	hash: &str,
	update: impl FnOnce(&TrackedTransaction) -> Option<TrackedTransaction>,
) -> Arc<TransactionsState> {
	let Some(chain) = state.chain(chain_id) else {
		return Arc::clone(state);
	};
	let Some(updated) = chain.get(hash).and_then(|existing| update(existing)) else {
		return Arc::clone(state);
	};

	Arc::new(state.with_chain(chain_id, chain.with_transaction(updated)))
}

/// Starts tracking a standard transaction, stamped with the current time.
pub fn add_transaction(
	state: &Arc<TransactionsState>,
	payload: &AddTransactionPayload,
	clock: &dyn Clock,
) -> Result<Arc<TransactionsState>, DuplicateHashError> {
	let transaction = Transaction::new(
		payload.from.clone(),
		payload.hash.clone(),
		payload.info.clone(),
		clock.now_millis(),
	);

	insert_new(state, payload.chain_id, transaction.into())
}

/// Starts tracking an oracle transaction, stamped with the current time.
pub fn add_oracle_transaction(
	state: &Arc<TransactionsState>,
	payload: &AddTransactionPayload,
	clock: &dyn Clock,
) -> Result<Arc<TransactionsState>, DuplicateHashError> {
	let transaction = OracleTransaction::new(Transaction::new(
		payload.from.clone(),
		payload.hash.clone(),
		payload.info.clone(),
		clock.now_millis(),
	));

	insert_new(state, payload.chain_id, transaction.into())
}

/// Records the base receipt of a transaction of either kind.
pub fn confirm_transaction(
	state: &Arc<TransactionsState>,
	payload: &ConfirmTransactionPayload,
	clock: &dyn Clock,
) -> Arc<TransactionsState> {
	update_existing(state, payload.chain_id, &payload.hash, |existing| {
		let now = clock.now_millis();
		Some(existing.map_base(|base| base.confirmed(payload.receipt.clone(), now)))
	})
}

/// Records the oracle receipt of an oracle transaction.
///
/// Standard transactions are left untouched.
pub fn confirm_oracle_transaction(
	state: &Arc<TransactionsState>,
	payload: &ConfirmOracleTransactionPayload,
	clock: &dyn Clock,
) -> Arc<TransactionsState> {
	update_existing(state, payload.chain_id, &payload.hash, |existing| {
		existing.as_oracle().map(|oracle| {
			oracle
				.oracle_confirmed(payload.oracle_receipt.clone(), clock.now_millis())
				.into()
		})
	})
}

/// Raises the last checked block of a transaction, never lowering it.
pub fn update_transaction_last_checked(
	state: &Arc<TransactionsState>,
	payload: &UpdateTransactionLastCheckedPayload,
) -> Arc<TransactionsState> {
	update_existing(state, payload.chain_id, &payload.hash, |existing| {
		Some(existing.map_base(|base| base.checked_at(payload.block_number)))
	})
}

/// Drops every transaction of a chain, leaving an empty map behind.
pub fn clear_all_chain_transactions(
	state: &Arc<TransactionsState>,
	payload: &ClearAllChainTransactionsPayload,
) -> Arc<TransactionsState> {
	if state.chain(payload.chain_id).is_none() {
		return Arc::clone(state);
	}

	Arc::new(state.with_chain(payload.chain_id, ChainTransactionsState::new()))
}
