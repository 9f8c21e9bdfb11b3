// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Service wiring.

use std::sync::Arc;

use keyward_server_audit::{AuditSink, TracingAuditSink};
use keyward_server_auth::{ApiKeyService, AuthError, InvalidIdentifier};
use keyward_server_config::{ConfigError, ServerConfig};
use keyward_server_db::{create_pool, run_migrations, ApiKeyRepository, DbError, SqlitePool};
use keyward_server_secrets::{SecretsError, SqliteSecretStore, Vault, VaultConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("database error: {0}")]
	Db(#[from] DbError),

	#[error(transparent)]
	Secrets(#[from] SecretsError),

	#[error(transparent)]
	Auth(#[from] AuthError),

	#[error(transparent)]
	Identifier(#[from] InvalidIdentifier),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("invalid input: {0}")]
	Input(String),
}

/// Everything a command needs, built once per process.
pub struct App {
	config: ServerConfig,
	pool: SqlitePool,
	vault: Vault<SqliteSecretStore>,
	api_keys: ApiKeyService<ApiKeyRepository>,
}

impl App {
	/// Open the configured database and apply migrations.
	pub async fn connect(config: ServerConfig) -> Result<Self, AppError> {
		let pool = create_pool(&config.database.url).await?;
		run_migrations(&pool).await?;
		Self::with_pool(config, pool)
	}

	pub fn with_pool(config: ServerConfig, pool: SqlitePool) -> Result<Self, AppError> {
		Self::with_audit_sink(config, pool, Arc::new(TracingAuditSink::new()))
	}

	pub fn with_audit_sink(
		config: ServerConfig,
		pool: SqlitePool,
		audit: Arc<dyn AuditSink>,
	) -> Result<Self, AppError> {
		let vault_config = VaultConfig::from_encoded(
			&config.master_key.version,
			config.master_key.key.as_ref(),
			config.master_key.retired.as_ref(),
		)?;

		let vault = Vault::new(
			vault_config,
			Arc::new(SqliteSecretStore::new(pool.clone())),
		)
		.with_audit_sink(Arc::clone(&audit));
		let api_keys =
			ApiKeyService::new(Arc::new(ApiKeyRepository::new(pool.clone()))).with_audit_sink(audit);

		Ok(Self {
			config,
			pool,
			vault,
			api_keys,
		})
	}

	pub fn config(&self) -> &ServerConfig {
		&self.config
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	pub fn vault(&self) -> &Vault<SqliteSecretStore> {
		&self.vault
	}

	pub fn api_keys(&self) -> &ApiKeyService<ApiKeyRepository> {
		&self.api_keys
	}
}
