//! Read accessors over the transactions state.

use std::sync::Arc;
use txwatch_types::{ChainId, ChainTransactionsState, TrackedTransaction, TransactionsState};

/// All transactions of `chain_id`, or a fresh empty map if the chain is not
/// tracked. The state itself is never modified.
pub fn get_all_chain_transactions(
	state: &TransactionsState,
	chain_id: ChainId,
) -> Arc<ChainTransactionsState> {
	state
		.chain(chain_id)
		.cloned()
		.unwrap_or_else(|| Arc::new(ChainTransactionsState::new()))
}

pub fn get_chain_transaction(
	state: &TransactionsState,
	chain_id: ChainId,
	hash: &str,
) -> Option<Arc<TrackedTransaction>> {
	state
		.chain(chain_id)
		.and_then(|chain| chain.get(hash))
		.cloned()
}
