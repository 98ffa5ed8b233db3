//! HTTP server for the txwatch API.
//!
//! Exposes the tracked transactions of each chain so that clients can
//! register transactions and poll their confirmation status.

use crate::apis::transactions;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use txwatch_config::ApiConfig;
use txwatch_core::TransactionsStore;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Store shared with the tracker engine.
	pub store: Arc<TransactionsStore>,
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route(
					"/chains/{chain_id}/transactions",
					get(transactions::list_transactions)
						.post(transactions::add_transaction)
						.delete(transactions::clear_transactions),
				)
				.route(
					"/chains/{chain_id}/transactions/{hash}",
					get(transactions::get_transaction),
				)
				.route(
					"/chains/{chain_id}/transactions/{hash}/status",
					get(transactions::get_transaction_status),
				),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(state)
}

/// Serves the API until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	store: Arc<TransactionsStore>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(AppState { store });

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("txwatch API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}
