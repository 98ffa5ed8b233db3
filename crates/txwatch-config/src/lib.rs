//! Configuration module for the transaction tracker.
//!
//! Configuration is loaded from a TOML file. `${VAR}` and `${VAR:-default}`
//! references are resolved from the environment before parsing, and the
//! parsed configuration is validated before it is handed to the builder.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use txwatch_types::ChainId;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only, the full error repeats the input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the tracker.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	/// Identity and persistence settings of this tracker instance.
	pub tracker: TrackerConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Chains to watch, keyed by chain id.
	#[serde(deserialize_with = "deserialize_chains")]
	pub chains: BTreeMap<ChainId, ChainConfig>,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
	/// Unique identifier for this tracker instance.
	pub id: String,
	/// Storage key of the persisted transactions state.
	#[serde(default = "default_storage_key")]
	pub storage_key: String,
}

fn default_storage_key() -> String {
	"pending-transactions-state".to_string()
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Per-chain receipt and block polling settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
	/// Name of the receipt source implementation.
	#[serde(default = "default_receipts")]
	pub receipts: String,
	/// JSON-RPC endpoint of the chain.
	pub rpc_url: String,
	/// Seconds between two block number polls.
	#[serde(default = "default_poll_interval_seconds")]
	pub poll_interval_seconds: u64,
	/// Base URL of the oracle receipt service, if oracle transactions are tracked.
	pub oracle_url: Option<String>,
}

fn default_receipts() -> String {
	"evm_alloy".to_string()
}

fn default_poll_interval_seconds() -> u64 {
	12
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

/// Deserializes the `[chains.<id>]` tables, whose keys are chain ids.
fn deserialize_chains<'de, D>(deserializer: D) -> Result<BTreeMap<ChainId, ChainConfig>, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: HashMap<String, ChainConfig> = HashMap::deserialize(deserializer)?;
	string_map
		.into_iter()
		.map(|(key, value)| {
			key.parse::<ChainId>()
				.map(|chain_id| (chain_id, value))
				.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))
		})
		.collect()
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable and
/// supports defaults with `${VAR_NAME:-default_value}`.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut missing = None;
	let resolved = re.replace_all(input, |cap: &regex::Captures<'_>| {
		let var_name = &cap[1];
		match (std::env::var(var_name), cap.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| var_name.to_string());
				String::new()
			},
		}
	});

	match missing {
		Some(var_name) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' not found",
			var_name
		))),
		None => Ok(resolved.into_owned()),
	}
}

impl Config {
	/// Loads and validates configuration from a TOML file.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = tokio::fs::read_to_string(path.as_ref()).await?;
		content.parse()
	}

	/// Validates the configuration.
	///
	/// Checks that the tracker identity is set, the primary storage
	/// implementation is configured, at least one chain is watched with a
	/// usable endpoint and poll interval, and the API port is bindable.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.tracker.id.is_empty() {
			return Err(ConfigError::Validation("Tracker ID cannot be empty".into()));
		}

		if self.tracker.storage_key.is_empty() {
			return Err(ConfigError::Validation(
				"Tracker storage_key cannot be empty".into(),
			));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}

		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}

		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		if self.chains.is_empty() {
			return Err(ConfigError::Validation(
				"At least one chain must be configured".into(),
			));
		}

		for (chain_id, chain) in &self.chains {
			if chain.rpc_url.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Chain {} has an empty rpc_url",
					chain_id
				)));
			}

			if chain.poll_interval_seconds == 0 {
				return Err(ConfigError::Validation(format!(
					"Chain {} poll_interval_seconds must be greater than 0",
					chain_id
				)));
			}

			if chain.oracle_url.as_deref().is_some_and(str::is_empty) {
				return Err(ConfigError::Validation(format!(
					"Chain {} has an empty oracle_url",
					chain_id
				)));
			}
		}

		if let Some(api) = self.api.as_ref().filter(|api| api.enabled) {
			if api.port == 0 {
				return Err(ConfigError::Validation(
					"API port must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses a configuration from TOML text, resolving environment variables
/// and validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::NamedTempFile;

	const MINIMAL: &str = r#"
[tracker]
id = "tracker-test"

[storage]
primary = "memory"
[storage.implementations.memory]

[chains.1]
rpc_url = "http://localhost:8545"
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("TXWATCH_TEST_HOST", "localhost");
		std::env::set_var("TXWATCH_TEST_PORT", "8545");

		let input = "url = \"http://${TXWATCH_TEST_HOST}:${TXWATCH_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "url = \"http://localhost:8545\"");

		std::env::remove_var("TXWATCH_TEST_HOST");
		std::env::remove_var("TXWATCH_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${TXWATCH_MISSING_VAR:-default_value}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "value = \"default_value\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let input = "value = \"${TXWATCH_MISSING_VAR}\"";
		let err = resolve_env_vars(input).unwrap_err();
		assert!(err.to_string().contains("TXWATCH_MISSING_VAR"));
	}

	#[test]
	fn test_minimal_config_applies_defaults() {
		let config: Config = MINIMAL.parse().unwrap();

		assert_eq!(config.tracker.id, "tracker-test");
		assert_eq!(config.tracker.storage_key, "pending-transactions-state");

		let chain = &config.chains[&1];
		assert_eq!(chain.receipts, "evm_alloy");
		assert_eq!(chain.poll_interval_seconds, 12);
		assert!(chain.oracle_url.is_none());
		assert!(config.api.is_none());
	}

	#[test]
	fn test_full_config() {
		std::env::set_var("TXWATCH_TEST_ORACLE", "http://oracle.local");

		let config: Config = r#"
[tracker]
id = "tracker-full"
storage_key = "custom-key"

[storage]
primary = "file"
[storage.implementations.file]
storage_path = "/tmp/txwatch"

[chains.1]
rpc_url = "http://localhost:8545"
poll_interval_seconds = 4

[chains.42161]
receipts = "evm_alloy"
rpc_url = "http://localhost:8546"
oracle_url = "${TXWATCH_TEST_ORACLE}"

[api]
enabled = true
port = 8080
"#
		.parse()
		.unwrap();

		assert_eq!(config.tracker.storage_key, "custom-key");
		assert_eq!(config.chains.keys().copied().collect::<Vec<_>>(), vec![1, 42161]);
		assert_eq!(config.chains[&1].poll_interval_seconds, 4);
		assert_eq!(
			config.chains[&42161].oracle_url.as_deref(),
			Some("http://oracle.local")
		);

		let api = config.api.unwrap();
		assert!(api.enabled);
		assert_eq!(api.host, "127.0.0.1");
		assert_eq!(api.port, 8080);

		std::env::remove_var("TXWATCH_TEST_ORACLE");
	}

	#[test]
	fn test_invalid_chain_id_rejected() {
		let config = MINIMAL.replace("[chains.1]", "[chains.mainnet]");
		let err = config.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Invalid chain_id 'mainnet'"));
	}

	#[test]
	fn test_unknown_primary_storage_rejected() {
		let config = MINIMAL.replace("primary = \"memory\"", "primary = \"redis\"");
		let err = config.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Primary storage 'redis'"));
	}

	#[test]
	fn test_zero_poll_interval_rejected() {
		let config = format!("{}poll_interval_seconds = 0\n", MINIMAL);
		let err = config.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("poll_interval_seconds"));
	}

	#[test]
	fn test_missing_chains_rejected() {
		let config = r#"
[tracker]
id = "tracker-test"

[storage]
primary = "memory"
[storage.implementations.memory]
"#;
		assert!(config.parse::<Config>().is_err());
	}

	#[tokio::test]
	async fn test_from_file() {
		let mut file = NamedTempFile::new().unwrap();
		file.write_all(MINIMAL.as_bytes()).unwrap();

		let config = Config::from_file(file.path()).await.unwrap();
		assert_eq!(config.storage.primary, "memory");
	}

	#[tokio::test]
	async fn test_from_missing_file() {
		let err = Config::from_file("/nonexistent/txwatch.toml").await.unwrap_err();
		assert!(matches!(err, ConfigError::Io(_)));
	}
}
