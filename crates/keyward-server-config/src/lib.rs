// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the Keyward server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`KEYWARD_SERVER_*`)
//! - Master key material loaded only from the environment (`VAR` or `VAR_FILE`)
//!
//! # Usage
//!
//! ```ignore
//! use keyward_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("vault configured: {}", config.master_key.is_configured());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use keyward_common_config::load_secret_env;
use tracing::{debug, info};

/// Environment variable holding the current master key.
pub const MASTER_KEY_ENV: &str = "KEYWARD_SERVER_VAULT_MASTER_KEY";

/// Environment variable holding retired master keys (`label:key,...`).
pub const RETIRED_KEYS_ENV: &str = "KEYWARD_SERVER_VAULT_RETIRED_KEYS";

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub master_key: MasterKeyConfig,
	pub api_keys: ApiKeysConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`KEYWARD_SERVER_*`)
/// 2. Config file (`/etc/keyward/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![Box::new(EnvSource)])
}

fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let api_keys = layer.api_keys.unwrap_or_default().finalize();

	let key = load_secret_env(MASTER_KEY_ENV).map_err(|e| ConfigError::Secret(e.to_string()))?;
	let retired =
		load_secret_env(RETIRED_KEYS_ENV).map_err(|e| ConfigError::Secret(e.to_string()))?;
	let master_key = layer.master_key.unwrap_or_default().finalize(key, retired);

	validate_config(&master_key, &api_keys)?;

	info!(
		database = %database.url,
		log_format = %logging.format,
		vault_configured = master_key.is_configured(),
		master_key_version = %master_key.version,
		retired_keys_configured = master_key.retired.is_some(),
		api_key_prefix = %api_keys.default_prefix,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		logging,
		master_key,
		api_keys,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(
	master_key: &MasterKeyConfig,
	api_keys: &ApiKeysConfig,
) -> Result<(), ConfigError> {
	let label = master_key.version.as_str();
	if label.is_empty()
		|| label.len() > 64
		|| label.contains([':', ','])
		|| label.contains(char::is_whitespace)
	{
		return Err(ConfigError::Validation(format!(
			"master key version label '{label}' must be 1-64 characters without ':', ',' or whitespace"
		)));
	}

	if master_key.key.is_none() && master_key.retired.is_some() {
		return Err(ConfigError::Validation(format!(
			"{RETIRED_KEYS_ENV} is set but {MASTER_KEY_ENV} is not; retired keys require a current key"
		)));
	}

	let prefix = api_keys.default_prefix.as_str();
	if prefix.is_empty()
		|| prefix.len() > 32
		|| !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
	{
		return Err(ConfigError::Validation(format!(
			"API key prefix '{prefix}' must be 1-32 characters of [A-Za-z0-9_]"
		)));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use keyward_common_config::SecretString;

	#[test]
	fn test_default_config_validates() {
		let config = ServerConfig::default();
		assert!(validate_config(&config.master_key, &config.api_keys).is_ok());
		assert!(!config.master_key.is_configured());
	}

	#[test]
	fn test_label_with_separator_is_rejected() {
		let master_key = MasterKeyConfig {
			version: "v1:old".to_string(),
			..Default::default()
		};
		let err = validate_config(&master_key, &ApiKeysConfig::default()).unwrap_err();
		assert!(err.to_string().contains("master key version label"));
	}

	#[test]
	fn test_retired_keys_without_current_key_are_rejected() {
		let master_key = MasterKeyConfig {
			retired: Some(SecretString::from("v0:b2xkLWtleQ==")),
			..Default::default()
		};
		assert!(validate_config(&master_key, &ApiKeysConfig::default()).is_err());
	}

	#[test]
	fn test_bad_api_key_prefix_is_rejected() {
		let api_keys = ApiKeysConfig {
			default_prefix: "kx-live".to_string(),
			default_ttl_days: None,
		};
		assert!(validate_config(&MasterKeyConfig::default(), &api_keys).is_err());
	}
}
