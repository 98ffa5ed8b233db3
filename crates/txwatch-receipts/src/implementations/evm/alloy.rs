//! EVM chain client backed by an Alloy HTTP provider.
//!
//! Only read calls are issued: `eth_getTransactionReceipt` for receipts and
//! `eth_blockNumber` for the block watcher. A receipt that the node reports
//! without a block (pending) is treated as not yet available.

use crate::{
	BlockNumberSource, ChainClientFactory, ChainClientRegistry, ChainClients, ReceiptError,
	ReceiptSource,
};
use alloy_primitives::B256;
use alloy_provider::{Provider, ProviderBuilder};
use alloy_transport_http::Http;
use async_trait::async_trait;
use std::sync::Arc;
use txwatch_types::{
	truncate_id, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, Transaction,
	TransactionReceipt, ValidationError,
};

/// Alloy-based EVM receipt and block number source for a single chain.
pub struct AlloyReceipts {
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
}

impl AlloyReceipts {
	/// Creates a client for the node at `rpc_url`.
	pub fn new(rpc_url: &str) -> Result<Self, ReceiptError> {
		let url = rpc_url.parse().map_err(|e| {
			ReceiptError::Configuration(format!("Invalid RPC URL '{}': {}", rpc_url, e))
		})?;

		let provider = ProviderBuilder::new().on_http(url);

		Ok(Self {
			provider: Arc::new(provider),
		})
	}
}

fn parse_hash(hash: &str) -> Result<B256, ReceiptError> {
	hash.parse::<B256>()
		.map_err(|e| ReceiptError::InvalidHash(format!("{}: {}", hash, e)))
}

/// Maps a node receipt into the tracker's receipt, or `None` if it is not
/// part of a block yet.
fn to_receipt(receipt: &alloy_rpc_types::TransactionReceipt) -> Option<TransactionReceipt> {
	let block_hash = receipt.block_hash?;
	let block_number = receipt.block_number?;

	Some(TransactionReceipt {
		from: receipt.from.to_string(),
		to: receipt.to.map(|to| to.to_string()),
		contract_address: receipt.contract_address.map(|address| address.to_string()),
		transaction_index: receipt.transaction_index.unwrap_or_default(),
		transaction_hash: receipt.transaction_hash.to_string(),
		block_hash: block_hash.to_string(),
		block_number,
		had_success: receipt.status(),
	})
}

#[async_trait]
impl ReceiptSource for AlloyReceipts {
	async fn get_receipt(
		&self,
		transaction: &Transaction,
		block_number: u64,
	) -> Result<Option<TransactionReceipt>, ReceiptError> {
		let tx_hash = parse_hash(&transaction.hash)?;

		let receipt = self
			.provider
			.get_transaction_receipt(tx_hash)
			.await
			.map_err(|e| ReceiptError::Network(format!("Failed to get receipt: {}", e)))?;

		let mapped = receipt.as_ref().and_then(to_receipt);
		if mapped.is_none() {
			tracing::trace!(
				tx_hash = %truncate_id(&transaction.hash),
				block_number,
				"Receipt not available yet"
			);
		}

		Ok(mapped)
	}
}

#[async_trait]
impl BlockNumberSource for AlloyReceipts {
	async fn get_block_number(&self) -> Result<u64, ReceiptError> {
		self.provider
			.get_block_number()
			.await
			.map_err(|e| ReceiptError::Network(format!("Failed to get block number: {}", e)))
	}
}

/// Configuration schema for the Alloy chain client.
pub struct AlloyReceiptsSchema;

impl AlloyReceiptsSchema {
	/// Static validation method for use before instance creation
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		let instance = Self;
		instance.validate(config)
	}
}

impl ConfigSchema for AlloyReceiptsSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("rpc_url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
						Ok(())
					},
					_ => Err("rpc_url must be an http(s) URL".to_string()),
				}
			})],
			vec![],
		);

		schema.validate(config)
	}
}

/// Factory function to create the Alloy chain client from a chain's configuration.
///
/// # Parameters
/// - `config`: TOML table containing:
///   - `rpc_url` (required): HTTP JSON-RPC endpoint of the chain
pub fn create_chain_clients(config: &toml::Value) -> Result<ChainClients, ReceiptError> {
	AlloyReceiptsSchema::validate_config(config)
		.map_err(|e| ReceiptError::Configuration(format!("Invalid configuration: {}", e)))?;

	let rpc_url = config
		.get("rpc_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| ReceiptError::Configuration("rpc_url is required".to_string()))?;

	let client = Arc::new(AlloyReceipts::new(rpc_url)?);

	Ok(ChainClients {
		receipts: client.clone(),
		blocks: client,
	})
}

/// Registry for the Alloy chain client implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "evm_alloy";
	type Factory = ChainClientFactory;

	fn factory() -> Self::Factory {
		create_chain_clients
	}
}

impl ChainClientRegistry for Registry {}
