//! HTTP oracle receipt source.
//!
//! Queries `GET {url}/{chain_id}/{hash}`. A `404` means the oracle has not
//! reported the transaction yet; a `200` carries the receipt as JSON in the
//! same camelCase layout the tracker persists.

use crate::{
	OracleReceiptFactory, OracleReceiptRegistry, OracleReceiptSource, ReceiptError,
};
use async_trait::async_trait;
use std::sync::Arc;
use txwatch_types::{
	truncate_id, ChainId, ConfigSchema, Field, FieldType, ImplementationRegistry,
	OracleTransaction, Schema, TransactionReceipt, ValidationError,
};

/// Oracle receipt source backed by an HTTP endpoint.
pub struct HttpOracleReceipts {
	client: reqwest::Client,
	base_url: String,
	chain_id: ChainId,
}

impl HttpOracleReceipts {
	pub fn new(base_url: impl Into<String>, chain_id: ChainId) -> Self {
		Self {
			client: reqwest::Client::new(),
			base_url: base_url.into().trim_end_matches('/').to_string(),
			chain_id,
		}
	}

	fn receipt_url(&self, hash: &str) -> String {
		format!("{}/{}/{}", self.base_url, self.chain_id, hash)
	}
}

#[async_trait]
impl OracleReceiptSource for HttpOracleReceipts {
	async fn get_oracle_receipt(
		&self,
		transaction: &OracleTransaction,
		block_number: u64,
	) -> Result<Option<TransactionReceipt>, ReceiptError> {
		let hash = &transaction.transaction.hash;
		let response = self
			.client
			.get(self.receipt_url(hash))
			.send()
			.await
			.map_err(|e| ReceiptError::Network(format!("Oracle request failed: {}", e)))?;

		if response.status() == reqwest::StatusCode::NOT_FOUND {
			tracing::trace!(
				tx_hash = %truncate_id(hash),
				block_number,
				"Oracle has not reported yet"
			);
			return Ok(None);
		}

		let response = response
			.error_for_status()
			.map_err(|e| ReceiptError::Network(format!("Oracle returned an error: {}", e)))?;

		let receipt = response
			.json::<TransactionReceipt>()
			.await
			.map_err(|e| ReceiptError::InvalidResponse(e.to_string()))?;

		Ok(Some(receipt))
	}
}

/// Configuration schema for the HTTP oracle receipt source.
pub struct HttpOracleReceiptsSchema;

impl ConfigSchema for HttpOracleReceiptsSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("url", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
							Ok(())
						},
						_ => Err("url must be an http(s) URL".to_string()),
					}
				}),
				Field::new(
					"chain_id",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
			],
			vec![],
		);

		schema.validate(config)
	}
}

/// Factory function to create the HTTP oracle receipt source.
///
/// # Parameters
/// - `config`: TOML table containing:
///   - `url` (required): base URL of the oracle service
///   - `chain_id` (required): chain the queried transactions belong to
pub fn create_oracle_receipts(
	config: &toml::Value,
) -> Result<Arc<dyn OracleReceiptSource>, ReceiptError> {
	HttpOracleReceiptsSchema
		.validate(config)
		.map_err(|e| ReceiptError::Configuration(format!("Invalid configuration: {}", e)))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| ReceiptError::Configuration("url is required".to_string()))?;
	let chain_id = config
		.get("chain_id")
		.and_then(|v| v.as_integer())
		.ok_or_else(|| ReceiptError::Configuration("chain_id is required".to_string()))?;

	Ok(Arc::new(HttpOracleReceipts::new(url, chain_id as ChainId)))
}

/// Registry for the HTTP oracle receipt implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = OracleReceiptFactory;

	fn factory() -> Self::Factory {
		create_oracle_receipts
	}
}

impl OracleReceiptRegistry for Registry {}
