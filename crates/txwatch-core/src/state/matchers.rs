//! Predicates over tracked transactions.
//!
//! The state-scoped matchers answer `false` for a chain or hash that is not
//! tracked. The scheduling predicates decide which transactions a check batch
//! looks up for a given block.

use txwatch_types::{ChainId, OracleTransaction, TrackedTransaction, Transaction, TransactionsState};

fn lookup<'a>(
	state: &'a TransactionsState,
	chain_id: ChainId,
	hash: &str,
) -> Option<&'a TrackedTransaction> {
	state
		.chain(chain_id)
		.and_then(|chain| chain.get(hash))
		.map(|transaction| &**transaction)
}

fn lookup_oracle<'a>(
	state: &'a TransactionsState,
	chain_id: ChainId,
	hash: &str,
) -> Option<&'a OracleTransaction> {
	lookup(state, chain_id, hash).and_then(TrackedTransaction::as_oracle)
}

pub fn is_transaction_pending(state: &TransactionsState, chain_id: ChainId, hash: &str) -> bool {
	lookup(state, chain_id, hash).is_some_and(|tx| tx.base().is_pending())
}

pub fn is_transaction_confirmed(state: &TransactionsState, chain_id: ChainId, hash: &str) -> bool {
	lookup(state, chain_id, hash).is_some_and(|tx| tx.base().is_confirmed())
}

pub fn is_oracle_transaction_pending(
	state: &TransactionsState,
	chain_id: ChainId,
	hash: &str,
) -> bool {
	lookup_oracle(state, chain_id, hash).is_some_and(OracleTransaction::is_oracle_pending)
}

pub fn is_oracle_transaction_confirmed(
	state: &TransactionsState,
	chain_id: ChainId,
	hash: &str,
) -> bool {
	lookup_oracle(state, chain_id, hash).is_some_and(OracleTransaction::is_oracle_confirmed)
}

/// Whether a lookup already ran at `block_number` or a later block.
pub fn has_transaction_been_checked_on_block(transaction: &Transaction, block_number: u64) -> bool {
	transaction
		.last_checked_block_number
		.is_some_and(|last_checked| last_checked >= block_number)
}

/// Whether the base receipt of `transaction` should be looked up at `block_number`.
pub fn has_transaction_to_be_checked(transaction: &Transaction, block_number: u64) -> bool {
	!has_transaction_been_checked_on_block(transaction, block_number) && transaction.is_pending()
}

/// Whether the oracle receipt of `transaction` should be looked up at
/// `block_number`. The base transaction has to be confirmed first.
pub fn has_oracle_transaction_to_be_checked(
	transaction: &OracleTransaction,
	block_number: u64,
) -> bool {
	let base = &transaction.transaction;
	!has_transaction_been_checked_on_block(base, block_number)
		&& base.is_confirmed()
		&& transaction.is_oracle_pending()
}

#[cfg(test)]
mod tests {
	use super::*;
	use txwatch_types::{ChainTransactionsState, TransactionInfo, TransactionReceipt};

	const H1: &str = "0x1000000000000000000000000000000000000011";
	const O1: &str = "0x1000000000000000000000000000000000000022";

	fn receipt() -> TransactionReceipt {
		TransactionReceipt {
			from: "0x01".to_string(),
			to: None,
			contract_address: None,
			transaction_index: 0,
			transaction_hash: H1.to_string(),
			block_hash: "0x888".to_string(),
			block_number: 1,
			had_success: true,
		}
	}

	fn pending(hash: &str) -> Transaction {
		Transaction::new("0x01", hash, TransactionInfo::new("test-type"), 0)
	}

	fn state_of(transactions: Vec<TrackedTransaction>) -> TransactionsState {
		let chain: ChainTransactionsState = transactions.into_iter().collect();
		[(1, chain)].into_iter().collect()
	}

	#[test]
	fn test_pending_xor_confirmed() {
		for tx in [pending(H1), pending(H1).confirmed(receipt(), 10)] {
			assert!(tx.is_pending() ^ tx.is_confirmed());
		}

		// Either field alone already counts as confirmed
		let mut receipt_only = pending(H1);
		receipt_only.receipt = Some(receipt());
		assert!(receipt_only.is_confirmed() && !receipt_only.is_pending());

		let mut time_only = pending(H1);
		time_only.confirmed_time = Some(10);
		assert!(time_only.is_confirmed() && !time_only.is_pending());
	}

	#[test]
	fn test_state_scoped_matchers() {
		let state = state_of(vec![
			pending(H1).into(),
			OracleTransaction::new(pending(O1).confirmed(receipt(), 10)).into(),
		]);

		assert!(is_transaction_pending(&state, 1, H1));
		assert!(!is_transaction_confirmed(&state, 1, H1));
		assert!(is_transaction_confirmed(&state, 1, O1));
		assert!(is_oracle_transaction_pending(&state, 1, O1));
		assert!(!is_oracle_transaction_confirmed(&state, 1, O1));

		// Standard transactions are neither oracle-pending nor oracle-confirmed
		assert!(!is_oracle_transaction_pending(&state, 1, H1));
		assert!(!is_oracle_transaction_confirmed(&state, 1, H1));
	}

	#[test]
	fn test_absent_transactions_match_nothing() {
		let state = state_of(vec![pending(H1).into()]);

		for (chain_id, hash) in [(1, "0xmissing"), (2, H1)] {
			assert!(!is_transaction_pending(&state, chain_id, hash));
			assert!(!is_transaction_confirmed(&state, chain_id, hash));
			assert!(!is_oracle_transaction_pending(&state, chain_id, hash));
			assert!(!is_oracle_transaction_confirmed(&state, chain_id, hash));
		}
	}

	#[test]
	fn test_checked_on_block() {
		let tx = pending(H1);
		assert!(!has_transaction_been_checked_on_block(&tx, 0));

		let tx = tx.checked_at(100);
		assert!(has_transaction_been_checked_on_block(&tx, 99));
		assert!(has_transaction_been_checked_on_block(&tx, 100));
		assert!(!has_transaction_been_checked_on_block(&tx, 101));
	}

	#[test]
	fn test_base_check_eligibility_across_blocks() {
		let tx = pending(H1);
		assert!(has_transaction_to_be_checked(&tx, 100));

		let tx = tx.checked_at(100);
		assert!(!has_transaction_to_be_checked(&tx, 100));
		assert!(has_transaction_to_be_checked(&tx, 101));

		let tx = tx.confirmed(receipt(), 10);
		assert!(!has_transaction_to_be_checked(&tx, 101));
	}

	#[test]
	fn test_oracle_check_eligibility() {
		let base_pending = OracleTransaction::new(pending(O1));
		assert!(!has_oracle_transaction_to_be_checked(&base_pending, 100));

		let base_pending_oracle_answered = base_pending.oracle_confirmed(receipt(), 20);
		assert!(!has_oracle_transaction_to_be_checked(
			&base_pending_oracle_answered,
			100
		));

		let base_confirmed = OracleTransaction::new(pending(O1).confirmed(receipt(), 10));
		assert!(has_oracle_transaction_to_be_checked(&base_confirmed, 100));

		let checked = OracleTransaction::new(base_confirmed.transaction.checked_at(100));
		assert!(!has_oracle_transaction_to_be_checked(&checked, 100));
		assert!(has_oracle_transaction_to_be_checked(&checked, 101));

		let resolved = base_confirmed.oracle_confirmed(receipt(), 20);
		assert!(!has_oracle_transaction_to_be_checked(&resolved, 101));
	}
}
