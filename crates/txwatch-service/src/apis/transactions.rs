//! Transaction endpoints.
//!
//! Registers transactions with the tracker, lists and clears a chain's
//! transactions, and reports the confirmation status of a single one.

use super::{ApiError, ApiPath};
use crate::server::AppState;
use axum::{
	extract::State,
	http::StatusCode,
	response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use txwatch_core::state::{AddTransactionPayload, ClearAllChainTransactionsPayload};
use txwatch_types::{truncate_id, ChainId, ChainTransactionsState, TrackedTransaction, TransactionInfo};

/// Body of `POST /api/chains/{chain_id}/transactions`.
#[derive(Debug, Deserialize)]
pub struct AddTransactionRequest {
	pub from: String,
	pub hash: String,
	pub info: TransactionInfo,
	/// Track the transaction through the oracle confirmation stage as well.
	#[serde(default)]
	pub oracle: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatusResponse {
	pub hash: String,
	pub is_oracle_transaction: bool,
	pub pending: bool,
	pub confirmed: bool,
	/// Oracle stage flags, present for oracle transactions only.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub oracle_pending: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub oracle_confirmed: Option<bool>,
}

/// Handles GET /api/chains/{chain_id}/transactions.
pub async fn list_transactions(
	ApiPath(chain_id): ApiPath<ChainId>,
	State(state): State<AppState>,
) -> Json<Arc<ChainTransactionsState>> {
	Json(state.store.get_all_chain_transactions(chain_id))
}

/// Handles POST /api/chains/{chain_id}/transactions.
pub async fn add_transaction(
	ApiPath(chain_id): ApiPath<ChainId>,
	State(state): State<AppState>,
	Json(request): Json<AddTransactionRequest>,
) -> Result<(StatusCode, Json<Arc<TrackedTransaction>>), ApiError> {
	if request.hash.trim().is_empty() {
		return Err(ApiError::BadRequest("hash must not be empty".to_string()));
	}
	if request.from.trim().is_empty() {
		return Err(ApiError::BadRequest("from must not be empty".to_string()));
	}

	let payload = AddTransactionPayload {
		chain_id,
		from: request.from,
		hash: request.hash,
		info: request.info,
	};

	let added = if request.oracle {
		state.store.add_oracle_transaction(&payload).await
	} else {
		state.store.add_transaction(&payload).await
	};
	added.map_err(|e| {
		tracing::warn!(chain_id, tx_hash = %truncate_id(&payload.hash), "Rejected duplicate transaction");
		ApiError::Conflict(e.to_string())
	})?;

	let transaction = state
		.store
		.get_chain_transaction(chain_id, &payload.hash)
		.ok_or_else(|| ApiError::Internal("Transaction was removed while being added".to_string()))?;

	Ok((StatusCode::CREATED, Json(transaction)))
}

/// Handles DELETE /api/chains/{chain_id}/transactions.
pub async fn clear_transactions(
	ApiPath(chain_id): ApiPath<ChainId>,
	State(state): State<AppState>,
) -> StatusCode {
	state
		.store
		.clear_all_chain_transactions(&ClearAllChainTransactionsPayload { chain_id })
		.await;
	tracing::info!(chain_id, "Cleared chain transactions");
	StatusCode::NO_CONTENT
}

/// Handles GET /api/chains/{chain_id}/transactions/{hash}.
pub async fn get_transaction(
	ApiPath((chain_id, hash)): ApiPath<(ChainId, String)>,
	State(state): State<AppState>,
) -> Result<Json<Arc<TrackedTransaction>>, ApiError> {
	state
		.store
		.get_chain_transaction(chain_id, &hash)
		.map(Json)
		.ok_or_else(|| not_found(chain_id, &hash))
}

/// Handles GET /api/chains/{chain_id}/transactions/{hash}/status.
pub async fn get_transaction_status(
	ApiPath((chain_id, hash)): ApiPath<(ChainId, String)>,
	State(state): State<AppState>,
) -> Result<Json<TransactionStatusResponse>, ApiError> {
	let transaction = state
		.store
		.get_chain_transaction(chain_id, &hash)
		.ok_or_else(|| not_found(chain_id, &hash))?;

	let store = &state.store;
	let is_oracle_transaction = transaction.is_oracle();
	let oracle_flag = |flag: bool| is_oracle_transaction.then_some(flag);

	Ok(Json(TransactionStatusResponse {
		is_oracle_transaction,
		pending: store.is_transaction_pending(chain_id, &hash),
		confirmed: store.is_transaction_confirmed(chain_id, &hash),
		oracle_pending: oracle_flag(store.is_oracle_transaction_pending(chain_id, &hash)),
		oracle_confirmed: oracle_flag(store.is_oracle_transaction_confirmed(chain_id, &hash)),
		hash,
	}))
}

fn not_found(chain_id: ChainId, hash: &str) -> ApiError {
	ApiError::NotFound(format!("Transaction {} is not tracked on chain {}", hash, chain_id))
}
