//! Main entry point for the txwatch service.
//!
//! This binary tracks submitted transactions on every configured chain,
//! looking up their receipts as new blocks arrive and, for oracle
//! transactions, the oracle-reported outcome once the base transaction is
//! mined. An optional HTTP API registers transactions and reports status.

use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use txwatch_config::Config;
use txwatch_core::{TrackerBuilder, TrackerEngine, TrackerFactories};

mod apis;
mod server;

/// Command-line arguments for the txwatch service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	// RUST_LOG takes precedence over --log-level
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started txwatch");

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.tracker.id);

	let engine = build_tracker(config.clone()).await?;
	let store = Arc::clone(engine.store());
	let shutdown = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "Failed to listen for shutdown signal");
		}
	};

	match config.api.filter(|api| api.enabled) {
		Some(api_config) => {
			tokio::select! {
				result = engine.run(shutdown) => {
					tracing::info!("Tracker finished");
					result?;
				},
				result = server::start_server(api_config, store) => {
					tracing::info!("API server finished");
					result?;
				},
			}
		},
		None => {
			tracing::info!("Starting tracker only");
			engine.run(shutdown).await?;
		},
	}

	tracing::info!("Stopped txwatch");
	Ok(())
}

/// Collects registered implementations into a name-keyed factory map.
fn factory_map<F>(implementations: Vec<(&'static str, F)>) -> HashMap<String, F> {
	implementations
		.into_iter()
		.map(|(name, factory)| (name.to_string(), factory))
		.collect()
}

/// Builds the tracker engine with every registered implementation.
async fn build_tracker(config: Config) -> Result<TrackerEngine, Box<dyn std::error::Error>> {
	let factories = TrackerFactories {
		storage_factories: factory_map(txwatch_storage::get_all_implementations()),
		chain_client_factories: factory_map(txwatch_receipts::get_all_implementations()),
		oracle_factories: factory_map(txwatch_receipts::get_all_oracle_implementations()),
	};

	Ok(TrackerBuilder::new(config).build(factories).await?)
}
