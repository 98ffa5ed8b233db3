//! Tracked transaction entities.
//!
//! A tracked transaction is either a standard transaction, confirmed once its
//! on-chain receipt is known, or an oracle transaction which additionally
//! waits for an off-chain oracle receipt after the base confirmation.
//!
//! The persisted JSON layout is flat and camelCase: oracle transactions carry
//! `isOracleTransaction: true` next to the base fields.

use serde::{Deserialize, Serialize};

/// Receipt of a transaction that has been included in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
	/// Sender address.
	pub from: String,
	/// Recipient address, absent for contract creations.
	#[serde(default)]
	pub to: Option<String>,
	/// Address of the created contract, if any.
	#[serde(default)]
	pub contract_address: Option<String>,
	/// Index of the transaction within its block.
	pub transaction_index: u64,
	/// Hash of the transaction.
	pub transaction_hash: String,
	/// Hash of the including block.
	pub block_hash: String,
	/// Number of the including block.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub had_success: bool,
}

/// Caller-supplied description of a tracked transaction.
///
/// Only the `type` discriminator is interpreted; any other fields are kept
/// verbatim and round-trip through storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionInfo {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TransactionInfo {
	pub fn new(kind: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			extra: serde_json::Map::new(),
		}
	}
}

/// A submitted transaction awaiting (or having received) its receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
	pub from: String,
	/// Unique key of the transaction within its chain.
	pub hash: String,
	pub info: TransactionInfo,
	/// Creation time in milliseconds since the Unix epoch.
	pub added_time: u64,
	/// Highest block number at which a receipt lookup was performed.
	pub last_checked_block_number: Option<u64>,
	/// Confirmation time in milliseconds, set together with `receipt`.
	pub confirmed_time: Option<u64>,
	pub receipt: Option<TransactionReceipt>,
}

impl Transaction {
	pub fn new(
		from: impl Into<String>,
		hash: impl Into<String>,
		info: TransactionInfo,
		added_time: u64,
	) -> Self {
		Self {
			from: from.into(),
			hash: hash.into(),
			info,
			added_time,
			last_checked_block_number: None,
			confirmed_time: None,
			receipt: None,
		}
	}

	/// A transaction is pending while neither the receipt nor the
	/// confirmation time is known.
	pub fn is_pending(&self) -> bool {
		self.receipt.is_none() && self.confirmed_time.is_none()
	}

	pub fn is_confirmed(&self) -> bool {
		!self.is_pending()
	}

	/// Returns a copy confirmed with `receipt` at `confirmed_time`.
	pub fn confirmed(&self, receipt: TransactionReceipt, confirmed_time: u64) -> Self {
		Self {
			receipt: Some(receipt),
			confirmed_time: Some(confirmed_time),
			..self.clone()
		}
	}

	/// Returns a copy whose last checked block is raised to `block_number`.
	///
	/// The last checked block never decreases.
	pub fn checked_at(&self, block_number: u64) -> Self {
		let last_checked = match self.last_checked_block_number {
			Some(existing) => existing.max(block_number),
			None => block_number,
		};

		Self {
			last_checked_block_number: Some(last_checked),
			..self.clone()
		}
	}
}

/// A transaction that needs a second, oracle-reported confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleTransaction {
	pub transaction: Transaction,
	pub oracle_receipt: Option<TransactionReceipt>,
	/// Oracle confirmation time in milliseconds, set together with `oracle_receipt`.
	pub oracle_confirmed_time: Option<u64>,
}

impl OracleTransaction {
	pub fn new(transaction: Transaction) -> Self {
		Self {
			transaction,
			oracle_receipt: None,
			oracle_confirmed_time: None,
		}
	}

	pub fn is_oracle_pending(&self) -> bool {
		self.oracle_receipt.is_none() && self.oracle_confirmed_time.is_none()
	}

	pub fn is_oracle_confirmed(&self) -> bool {
		!self.is_oracle_pending()
	}

	/// Returns a copy confirmed by the oracle with `receipt` at `confirmed_time`.
	pub fn oracle_confirmed(&self, receipt: TransactionReceipt, confirmed_time: u64) -> Self {
		Self {
			transaction: self.transaction.clone(),
			oracle_receipt: Some(receipt),
			oracle_confirmed_time: Some(confirmed_time),
		}
	}
}

/// Any transaction held in the transactions state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TransactionRecord", into = "TransactionRecord")]
pub enum TrackedTransaction {
	Standard(Transaction),
	Oracle(OracleTransaction),
}

impl TrackedTransaction {
	/// The base transaction shared by both variants.
	pub fn base(&self) -> &Transaction {
		match self {
			TrackedTransaction::Standard(transaction) => transaction,
			TrackedTransaction::Oracle(oracle) => &oracle.transaction,
		}
	}

	pub fn hash(&self) -> &str {
		&self.base().hash
	}

	pub fn is_oracle(&self) -> bool {
		matches!(self, TrackedTransaction::Oracle(_))
	}

	/// Narrows to the oracle variant.
	pub fn as_oracle(&self) -> Option<&OracleTransaction> {
		match self {
			TrackedTransaction::Standard(_) => None,
			TrackedTransaction::Oracle(oracle) => Some(oracle),
		}
	}

	/// Returns a copy with the base transaction replaced by `update(base)`,
	/// keeping the variant and any oracle fields.
	pub fn map_base(&self, update: impl FnOnce(&Transaction) -> Transaction) -> Self {
		match self {
			TrackedTransaction::Standard(transaction) => {
				TrackedTransaction::Standard(update(transaction))
			},
			TrackedTransaction::Oracle(oracle) => TrackedTransaction::Oracle(OracleTransaction {
				transaction: update(&oracle.transaction),
				oracle_receipt: oracle.oracle_receipt.clone(),
				oracle_confirmed_time: oracle.oracle_confirmed_time,
			}),
		}
	}
}

impl From<Transaction> for TrackedTransaction {
	fn from(transaction: Transaction) -> Self {
		TrackedTransaction::Standard(transaction)
	}
}

impl From<OracleTransaction> for TrackedTransaction {
	fn from(oracle: OracleTransaction) -> Self {
		TrackedTransaction::Oracle(oracle)
	}
}

/// Flat wire representation of a tracked transaction.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRecord {
	from: String,
	hash: String,
	info: TransactionInfo,
	added_time: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	last_checked_block_number: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	confirmed_time: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	receipt: Option<TransactionReceipt>,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	is_oracle_transaction: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	oracle_receipt: Option<TransactionReceipt>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	oracle_confirmed_time: Option<u64>,
}

impl From<TransactionRecord> for TrackedTransaction {
	fn from(record: TransactionRecord) -> Self {
		let transaction = Transaction {
			from: record.from,
			hash: record.hash,
			info: record.info,
			added_time: record.added_time,
			last_checked_block_number: record.last_checked_block_number,
			confirmed_time: record.confirmed_time,
			receipt: record.receipt,
		};

		if record.is_oracle_transaction {
			TrackedTransaction::Oracle(OracleTransaction {
				transaction,
				oracle_receipt: record.oracle_receipt,
				oracle_confirmed_time: record.oracle_confirmed_time,
			})
		} else {
			TrackedTransaction::Standard(transaction)
		}
	}
}

impl From<TrackedTransaction> for TransactionRecord {
	fn from(tracked: TrackedTransaction) -> Self {
		let (transaction, oracle_receipt, oracle_confirmed_time, is_oracle_transaction) =
			match tracked {
				TrackedTransaction::Standard(transaction) => (transaction, None, None, false),
				TrackedTransaction::Oracle(oracle) => (
					oracle.transaction,
					oracle.oracle_receipt,
					oracle.oracle_confirmed_time,
					true,
				),
			};

		Self {
			from: transaction.from,
			hash: transaction.hash,
			info: transaction.info,
			added_time: transaction.added_time,
			last_checked_block_number: transaction.last_checked_block_number,
			confirmed_time: transaction.confirmed_time,
			receipt: transaction.receipt,
			is_oracle_transaction,
			oracle_receipt,
			oracle_confirmed_time,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn receipt(had_success: bool) -> TransactionReceipt {
		TransactionReceipt {
			from: "0x0000000000000000000000000000000000000010".to_string(),
			to: Some("0x0000000000000000000000000000000000000011".to_string()),
			contract_address: None,
			transaction_index: 1,
			transaction_hash: "0x1000000000000000000000000000000000000010".to_string(),
			block_hash: "0x2000000000000000000000000000000000000010".to_string(),
			block_number: 1,
			had_success,
		}
	}

	fn transaction() -> Transaction {
		Transaction::new(
			"0x0000000000000000000000000000000000000012",
			"0x1000000000000000000000000000000000000011",
			TransactionInfo::new("test-type"),
			0,
		)
	}

	#[test]
	fn test_pending_and_confirmed_are_exclusive() {
		let pending = transaction();
		assert!(pending.is_pending());
		assert!(!pending.is_confirmed());

		let confirmed = pending.confirmed(receipt(true), 1);
		assert!(!confirmed.is_pending());
		assert!(confirmed.is_confirmed());

		// A half-set confirmation still counts as confirmed
		let half = Transaction {
			confirmed_time: Some(1),
			..transaction()
		};
		assert!(half.is_pending() != half.is_confirmed());
		assert!(half.is_confirmed());
	}

	#[test]
	fn test_checked_at_never_regresses() {
		let tx = transaction().checked_at(5).checked_at(3);
		assert_eq!(tx.last_checked_block_number, Some(5));

		let tx = transaction().checked_at(3).checked_at(5);
		assert_eq!(tx.last_checked_block_number, Some(5));
	}

	#[test]
	fn test_oracle_stage_is_independent_of_base() {
		let oracle = OracleTransaction::new(transaction().confirmed(receipt(true), 1));
		assert!(oracle.transaction.is_confirmed());
		assert!(oracle.is_oracle_pending());

		let done = oracle.oracle_confirmed(receipt(false), 2);
		assert!(done.is_oracle_confirmed());
		assert_eq!(done.oracle_confirmed_time, Some(2));
		assert_eq!(done.transaction, oracle.transaction);
	}

	#[test]
	fn test_map_base_keeps_oracle_fields() {
		let tracked = TrackedTransaction::from(OracleTransaction {
			transaction: transaction(),
			oracle_receipt: Some(receipt(true)),
			oracle_confirmed_time: Some(7),
		});

		let updated = tracked.map_base(|tx| tx.checked_at(10));
		let oracle = updated.as_oracle().unwrap();
		assert_eq!(oracle.transaction.last_checked_block_number, Some(10));
		assert_eq!(oracle.oracle_confirmed_time, Some(7));
	}

	#[test]
	fn test_serialized_layout() {
		let tracked = TrackedTransaction::from(transaction());
		let value = serde_json::to_value(&tracked).unwrap();
		assert_eq!(
			value,
			json!({
				"from": "0x0000000000000000000000000000000000000012",
				"hash": "0x1000000000000000000000000000000000000011",
				"info": { "type": "test-type" },
				"addedTime": 0
			})
		);

		let oracle = TrackedTransaction::from(OracleTransaction::new(
			transaction().confirmed(receipt(true), 1),
		));
		let value = serde_json::to_value(&oracle).unwrap();
		assert_eq!(value["isOracleTransaction"], json!(true));
		assert_eq!(value["confirmedTime"], json!(1));
		assert_eq!(value["receipt"]["hadSuccess"], json!(true));
		assert!(value.get("oracleReceipt").is_none());
	}

	#[test]
	fn test_deserialize_discriminates_oracle_transactions() {
		let stored = json!({
			"from": "0x0000000000000000000000000000000000000014",
			"hash": "0x1000000000000000000000000000000000000013",
			"info": { "type": "bridge", "amount": "10" },
			"addedTime": 0,
			"confirmedTime": 1,
			"receipt": {
				"from": "0x0000000000000000000000000000000000000010",
				"to": null,
				"contractAddress": "0x0000000000000000000000000000000000000011",
				"transactionIndex": 1,
				"transactionHash": "0x1000000000000000000000000000000000000010",
				"blockHash": "0x2000000000000000000000000000000000000010",
				"blockNumber": 1,
				"hadSuccess": false
			},
			"isOracleTransaction": true
		});

		let tracked: TrackedTransaction = serde_json::from_value(stored).unwrap();
		let oracle = tracked.as_oracle().expect("oracle variant");
		assert!(oracle.transaction.is_confirmed());
		assert!(oracle.is_oracle_pending());
		assert_eq!(oracle.transaction.info.kind, "bridge");
		assert_eq!(oracle.transaction.info.extra["amount"], json!("10"));

		let receipt = oracle.transaction.receipt.as_ref().unwrap();
		assert_eq!(receipt.to, None);
		assert_eq!(
			receipt.contract_address.as_deref(),
			Some("0x0000000000000000000000000000000000000011")
		);
	}

	#[test]
	fn test_missing_flag_means_standard() {
		let tracked: TrackedTransaction = serde_json::from_value(json!({
			"from": "0x01",
			"hash": "0x02",
			"info": { "type": "swap" },
			"addedTime": 42,
			"lastCheckedBlockNumber": 100
		}))
		.unwrap();

		assert!(!tracked.is_oracle());
		assert_eq!(tracked.base().last_checked_block_number, Some(100));
		assert_eq!(tracked.hash(), "0x02");
	}
}
