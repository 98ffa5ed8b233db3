//! Receipt sources for the transaction tracker.
//!
//! A chain client answers two questions for the scheduler: whether a
//! transaction has a receipt yet, and what the latest block number is. Oracle
//! sources answer the first question for the second, off-chain confirmation
//! stage of oracle transactions. In both cases "no receipt yet" is `Ok(None)`,
//! never an error.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use txwatch_types::{OracleTransaction, Transaction, TransactionReceipt};

pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
	pub mod oracle {
		pub mod http;
	}
}

/// Errors that can occur while fetching receipts or block numbers.
#[derive(Debug, Error)]
pub enum ReceiptError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs when a transaction hash cannot be parsed.
	#[error("Invalid transaction hash: {0}")]
	InvalidHash(String),
	/// Error that occurs when a response cannot be decoded.
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
	/// Error that occurs when an implementation is misconfigured.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Looks up the receipt of a base transaction.
#[async_trait]
pub trait ReceiptSource: Send + Sync {
	/// Returns the receipt of `transaction`, or `None` while it is not mined.
	///
	/// `block_number` is the block that triggered the lookup.
	async fn get_receipt(
		&self,
		transaction: &Transaction,
		block_number: u64,
	) -> Result<Option<TransactionReceipt>, ReceiptError>;
}

/// Looks up the oracle-reported outcome of an oracle transaction.
#[async_trait]
pub trait OracleReceiptSource: Send + Sync {
	/// Returns the oracle receipt of `transaction`, or `None` while the oracle
	/// has not answered.
	async fn get_oracle_receipt(
		&self,
		transaction: &OracleTransaction,
		block_number: u64,
	) -> Result<Option<TransactionReceipt>, ReceiptError>;
}

/// Reports the latest block number of a chain.
#[async_trait]
pub trait BlockNumberSource: Send + Sync {
	async fn get_block_number(&self) -> Result<u64, ReceiptError>;
}

/// The collaborators built for one chain by a chain client factory.
#[derive(Clone)]
pub struct ChainClients {
	pub receipts: Arc<dyn ReceiptSource>,
	pub blocks: Arc<dyn BlockNumberSource>,
}

/// Type alias for chain client factory functions.
///
/// The factory receives the chain's configuration table.
pub type ChainClientFactory = fn(&toml::Value) -> Result<ChainClients, ReceiptError>;

/// Type alias for oracle receipt source factory functions.
pub type OracleReceiptFactory =
	fn(&toml::Value) -> Result<Arc<dyn OracleReceiptSource>, ReceiptError>;

/// Registry trait for chain client implementations.
pub trait ChainClientRegistry: txwatch_types::ImplementationRegistry<Factory = ChainClientFactory> {}

/// Registry trait for oracle receipt implementations.
pub trait OracleReceiptRegistry:
	txwatch_types::ImplementationRegistry<Factory = OracleReceiptFactory>
{
}

/// Get all registered chain client implementations.
pub fn get_all_implementations() -> Vec<(&'static str, ChainClientFactory)> {
	use implementations::evm::alloy;
	use txwatch_types::ImplementationRegistry;

	vec![(alloy::Registry::NAME, alloy::Registry::factory())]
}

/// Get all registered oracle receipt implementations.
pub fn get_all_oracle_implementations() -> Vec<(&'static str, OracleReceiptFactory)> {
	use implementations::oracle::http;
	use txwatch_types::ImplementationRegistry;

	vec![(http::Registry::NAME, http::Registry::factory())]
}
