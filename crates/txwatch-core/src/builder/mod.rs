//! Builder for constructing tracker engines.
//!
//! Composes a `TrackerEngine` from the configuration and factory functions
//! for each pluggable component: the storage backend holding the mirrored
//! state, the per-chain receipt and block sources, and the oracle receipt
//! source of chains that track oracle transactions.

use crate::clock::{Clock, SystemClock};
use crate::engine::{ChainTasks, EventBus, TrackerEngine};
use crate::monitoring::{BlockWatcher, CheckScheduler};
use crate::signals::Gate;
use crate::store::TransactionsStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use txwatch_config::{ChainConfig, Config};
use txwatch_receipts::{ChainClients, OracleReceiptSource, ReceiptError};
use txwatch_storage::{StateMirror, StorageError, StorageInterface, StorageService};
use txwatch_types::ChainId;

/// Name of the oracle receipt implementation used for `oracle_url`.
const ORACLE_IMPLEMENTATION: &str = "http";

/// Capacity of the tracker event bus.
const EVENT_BUS_CAPACITY: usize = 1000;

/// Errors that can occur during tracker engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Container for all factory functions needed to build a `TrackerEngine`.
///
/// Each factory takes a TOML configuration value and returns the
/// corresponding implementation.
pub struct TrackerFactories<SF, CF, OF> {
	pub storage_factories: HashMap<String, SF>,
	pub chain_client_factories: HashMap<String, CF>,
	pub oracle_factories: HashMap<String, OF>,
}

/// Builder for constructing a `TrackerEngine` with pluggable implementations.
pub struct TrackerBuilder {
	config: Config,
	clock: Arc<dyn Clock>,
}

impl TrackerBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			clock: Arc::new(SystemClock),
		}
	}

	/// Replaces the wall clock used for transaction timestamps.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	pub async fn build<SF, CF, OF>(
		self,
		factories: TrackerFactories<SF, CF, OF>,
	) -> Result<TrackerEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		CF: Fn(&toml::Value) -> Result<ChainClients, ReceiptError>,
		OF: Fn(&toml::Value) -> Result<Arc<dyn OracleReceiptSource>, ReceiptError>,
	{
		let storage = self.build_storage(&factories.storage_factories)?;
		let mirror = StateMirror::new(storage, self.config.tracker.storage_key.clone());
		let store = Arc::new(TransactionsStore::rehydrate(mirror, Arc::clone(&self.clock)).await);

		let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
		let (active, active_rx) = watch::channel(true);

		let mut chains = Vec::with_capacity(self.config.chains.len());
		for (&chain_id, chain) in &self.config.chains {
			let clients = build_chain_clients(chain_id, chain, &factories.chain_client_factories)?;
			let oracle_receipts = build_oracle_receipts(chain_id, chain, &factories.oracle_factories)?;

			let watcher = BlockWatcher::new(
				chain_id,
				clients.blocks,
				Duration::from_secs(chain.poll_interval_seconds),
				active_rx.clone(),
			);
			let gate = Gate::new(active_rx.clone(), watcher.online());
			let scheduler = Arc::new(CheckScheduler::new(
				chain_id,
				Arc::clone(&store),
				clients.receipts,
				oracle_receipts,
				Arc::new(event_bus.clone()),
				gate,
			));

			chains.push(ChainTasks { scheduler, watcher });
		}

		tracing::info!(
			tracker_id = %self.config.tracker.id,
			chains = chains.len(),
			"Tracker built"
		);

		Ok(TrackerEngine::new(store, event_bus, active, chains))
	}

	fn build_storage<SF>(
		&self,
		storage_factories: &HashMap<String, SF>,
	) -> Result<Arc<StorageService>, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			if let Some(factory) = storage_factories.get(name) {
				match factory(config) {
					Ok(implementation) => {
						storage_impls.insert(name.clone(), implementation);
						let is_primary = &self.config.storage.primary == name;
						tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
					},
					Err(e) => {
						tracing::error!(
							component = "storage",
							implementation = %name,
							error = %e,
							"Failed to create storage implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create storage implementation '{}': {}",
							name, e
						)));
					},
				}
			}
		}

		let primary_storage = &self.config.storage.primary;
		let backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::MissingComponent(format!(
				"Primary storage '{}' is not an available implementation",
				primary_storage
			))
		})?;

		Ok(Arc::new(StorageService::new(backend)))
	}
}

fn build_chain_clients<CF>(
	chain_id: ChainId,
	chain: &ChainConfig,
	factories: &HashMap<String, CF>,
) -> Result<ChainClients, BuilderError>
where
	CF: Fn(&toml::Value) -> Result<ChainClients, ReceiptError>,
{
	let factory = factories.get(&chain.receipts).ok_or_else(|| {
		BuilderError::MissingComponent(format!(
			"Unknown receipts implementation '{}' for chain {}",
			chain.receipts, chain_id
		))
	})?;

	let config = toml::Value::try_from(chain).map_err(|e| {
		BuilderError::Config(format!("Invalid configuration for chain {}: {}", chain_id, e))
	})?;

	let clients = factory(&config).map_err(|e| {
		tracing::error!(
			component = "receipts",
			implementation = %chain.receipts,
			chain_id,
			error = %e,
			"Failed to create receipt source"
		);
		BuilderError::Config(format!(
			"Failed to create receipts implementation '{}' for chain {}: {}",
			chain.receipts, chain_id, e
		))
	})?;

	tracing::info!(component = "receipts", implementation = %chain.receipts, chain_id, "Loaded");
	Ok(clients)
}

fn build_oracle_receipts<OF>(
	chain_id: ChainId,
	chain: &ChainConfig,
	factories: &HashMap<String, OF>,
) -> Result<Option<Arc<dyn OracleReceiptSource>>, BuilderError>
where
	OF: Fn(&toml::Value) -> Result<Arc<dyn OracleReceiptSource>, ReceiptError>,
{
	let Some(url) = &chain.oracle_url else {
		return Ok(None);
	};

	let factory = factories.get(ORACLE_IMPLEMENTATION).ok_or_else(|| {
		BuilderError::MissingComponent(format!(
			"Oracle implementation '{}' is not available",
			ORACLE_IMPLEMENTATION
		))
	})?;

	let chain_id_value = i64::try_from(chain_id).map_err(|_| {
		BuilderError::Config(format!("Chain id {} does not fit an integer", chain_id))
	})?;
	let mut table = toml::map::Map::new();
	table.insert("url".to_string(), toml::Value::String(url.clone()));
	table.insert("chain_id".to_string(), toml::Value::Integer(chain_id_value));

	let source = factory(&toml::Value::Table(table)).map_err(|e| {
		BuilderError::Config(format!(
			"Failed to create oracle receipt source for chain {}: {}",
			chain_id, e
		))
	})?;

	tracing::info!(component = "oracle", implementation = ORACLE_IMPLEMENTATION, chain_id, "Loaded");
	Ok(Some(source))
}
