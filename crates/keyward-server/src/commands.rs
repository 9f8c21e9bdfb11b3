// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! CLI commands.
//!
//! Secret values and API tokens are read from stdin, never from argv, so they
//! do not end up in shell history or process listings. Every command returns a
//! JSON document; plaintext only appears in the output of `secret reveal`,
//! `secret resolve` and `api-key create`.

use std::io::Read;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use keyward_common_secret::SecretString;
use keyward_server_auth::{ApiKeyId, AuthError, CreateApiKeyRequest, OrgId, UserId};
use keyward_server_config::MASTER_KEY_ENV;
use keyward_server_db::run_migrations;
use keyward_server_secrets::{
	generate_master_key, CreateSecretInput, SecretId, SecretKind, SecretLookup, SecretResolver,
	SecretsError, TenantId,
};
use serde_json::{json, Value};
use tracing::info;

use crate::app::{App, AppError};

/// Keyward - tenant-scoped secrets vault and API key service.
#[derive(Parser, Debug)]
#[command(
	name = "keyward-server",
	about = "Keyward secrets vault and API key service",
	version
)]
pub struct Args {
	/// TOML config file (defaults to /etc/keyward/server.toml)
	#[arg(long, global = true, env = "KEYWARD_SERVER_CONFIG")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Apply database migrations
	Migrate,
	/// Show configuration and master keyring status
	Status,
	/// Print a freshly generated base64 master key
	GenerateMasterKey,
	/// Manage tenant secrets
	#[command(subcommand)]
	Secret(SecretCommand),
	/// Manage API keys
	#[command(subcommand)]
	ApiKey(ApiKeyCommand),
}

#[derive(Subcommand, Debug)]
pub enum SecretCommand {
	/// Create a secret; the value is read from stdin
	Create {
		#[arg(long)]
		tenant: String,
		name: String,
		/// api_key, signing_secret, provider_token or generic
		#[arg(long, default_value = "generic")]
		kind: String,
		#[arg(long)]
		description: Option<String>,
	},
	/// Add a new version; the value is read from stdin
	Rotate {
		#[arg(long)]
		tenant: String,
		/// Secret id or name
		secret: String,
	},
	/// List secret metadata for a tenant
	List {
		#[arg(long)]
		tenant: String,
	},
	/// Show secret metadata
	Show {
		#[arg(long)]
		tenant: String,
		secret: String,
	},
	/// Print the decrypted value of the active version
	Reveal {
		#[arg(long)]
		tenant: String,
		secret: String,
	},
	/// Resolve a `secret://<name>` reference
	Resolve {
		#[arg(long)]
		tenant: String,
		reference: String,
	},
	/// List version metadata, oldest first
	Versions {
		#[arg(long)]
		tenant: String,
		secret: String,
	},
	/// Set or clear the description
	Describe {
		#[arg(long)]
		tenant: String,
		secret: String,
		#[arg(long, conflicts_with = "clear")]
		description: Option<String>,
		#[arg(long)]
		clear: bool,
	},
	/// Delete a secret and all of its versions
	Delete {
		#[arg(long)]
		tenant: String,
		secret: String,
	},
}

#[derive(Subcommand, Debug)]
pub enum ApiKeyCommand {
	/// Issue a key and print its token once
	Create {
		#[arg(long)]
		user: String,
		#[arg(long)]
		org: Option<String>,
		name: String,
		/// Token prefix (defaults to the configured prefix)
		#[arg(long)]
		prefix: Option<String>,
		/// Repeat for several scopes
		#[arg(long = "scope")]
		scopes: Vec<String>,
		/// Lifetime in days (defaults to the configured TTL)
		#[arg(long, conflicts_with = "no_expiry")]
		ttl_days: Option<u32>,
		#[arg(long)]
		no_expiry: bool,
	},
	/// Verify a token read from stdin
	Verify,
	/// List a user's keys
	List {
		#[arg(long)]
		user: String,
	},
	/// Show one key
	Show {
		#[arg(long)]
		user: String,
		id: String,
	},
	/// Revoke a key; it stays listed
	Revoke {
		#[arg(long)]
		user: String,
		id: String,
	},
	/// Delete a key permanently
	Delete {
		#[arg(long)]
		user: String,
		id: String,
	},
}

/// Output of `generate-master-key`. Needs neither config nor database.
pub fn new_master_key() -> Value {
	let key = generate_master_key();
	json!({
		"master_key": key.as_str(),
		"env": MASTER_KEY_ENV,
	})
}

pub async fn run<R: Read>(app: &App, command: Command, input: &mut R) -> Result<Value, AppError> {
	match command {
		Command::Migrate => {
			run_migrations(app.pool()).await?;
			Ok(json!({ "migrated": true }))
		}
		Command::Status => Ok(status(app)),
		Command::GenerateMasterKey => Ok(new_master_key()),
		Command::Secret(cmd) => run_secret(app, cmd, input).await,
		Command::ApiKey(cmd) => run_api_key(app, cmd, input).await,
	}
}

fn status(app: &App) -> Value {
	let config = app.config();
	let keyring = app.vault().config().keyring();
	json!({
		"database": config.database.url,
		"logging": {
			"level": config.logging.level,
			"format": config.logging.format.to_string(),
		},
		"vault": {
			"configured": keyring.is_configured(),
			"current_key_version": keyring.current_version(),
			"key_versions": keyring.versions(),
		},
		"api_keys": {
			"default_prefix": config.api_keys.default_prefix,
			"default_ttl_days": config.api_keys.default_ttl_days,
		},
	})
}

async fn run_secret<R: Read>(
	app: &App,
	command: SecretCommand,
	input: &mut R,
) -> Result<Value, AppError> {
	let vault = app.vault();
	match command {
		SecretCommand::Create {
			tenant,
			name,
			kind,
			description,
		} => {
			let kind: SecretKind = kind.parse()?;
			let value = read_stdin_value(input, "secret value")?;
			let metadata = vault
				.create_secret(CreateSecretInput {
					tenant_id: TenantId::new(tenant)?,
					name,
					kind,
					value,
					description,
				})
				.await?;
			info!(secret_id = %metadata.id, "Secret created");
			Ok(serde_json::to_value(metadata)?)
		}
		SecretCommand::Rotate { tenant, secret } => {
			let tenant_id = TenantId::new(tenant)?;
			let value = read_stdin_value(input, "secret value")?;
			let version = vault
				.rotate_secret(&tenant_id, &SecretLookup::parse(&secret), &value)
				.await?;
			Ok(serde_json::to_value(version)?)
		}
		SecretCommand::List { tenant } => {
			let secrets = vault.list_secrets(&TenantId::new(tenant)?).await?;
			Ok(serde_json::to_value(secrets)?)
		}
		SecretCommand::Show { tenant, secret } => {
			let lookup = SecretLookup::parse(&secret);
			let metadata = vault
				.get_secret(&TenantId::new(tenant)?, &lookup)
				.await?
				.ok_or_else(|| SecretsError::NotFound(lookup.to_string()))?;
			Ok(serde_json::to_value(metadata)?)
		}
		SecretCommand::Reveal { tenant, secret } => {
			let lookup = SecretLookup::parse(&secret);
			let value = vault
				.get_secret_value(&TenantId::new(tenant)?, &lookup)
				.await?
				.ok_or_else(|| SecretsError::NotFound(lookup.to_string()))?;
			Ok(json!({ "value": value.expose() }))
		}
		SecretCommand::Resolve { tenant, reference } => {
			let value = vault
				.resolve_secret_ref(&TenantId::new(tenant)?, &reference)
				.await?;
			Ok(json!({
				"resolved": value.is_some(),
				"value": value.as_ref().map(|v| v.expose()),
			}))
		}
		SecretCommand::Versions { tenant, secret } => {
			let tenant_id = TenantId::new(tenant)?;
			let secret_id = secret_id(app, &tenant_id, &secret).await?;
			let versions = vault.list_secret_versions(&tenant_id, secret_id).await?;
			Ok(serde_json::to_value(versions)?)
		}
		SecretCommand::Describe {
			tenant,
			secret,
			description,
			clear,
		} => {
			if description.is_none() && !clear {
				return Err(AppError::Input(
					"pass --description <text> or --clear".to_string(),
				));
			}
			let tenant_id = TenantId::new(tenant)?;
			let secret_id = secret_id(app, &tenant_id, &secret).await?;
			let metadata = vault
				.update_secret_description(&tenant_id, secret_id, description.as_deref())
				.await?;
			Ok(serde_json::to_value(metadata)?)
		}
		SecretCommand::Delete { tenant, secret } => {
			let tenant_id = TenantId::new(tenant)?;
			let secret_id = secret_id(app, &tenant_id, &secret).await?;
			vault.delete_secret(&tenant_id, secret_id).await?;
			Ok(json!({ "deleted": secret_id }))
		}
	}
}

async fn run_api_key<R: Read>(
	app: &App,
	command: ApiKeyCommand,
	input: &mut R,
) -> Result<Value, AppError> {
	let service = app.api_keys();
	match command {
		ApiKeyCommand::Create {
			user,
			org,
			name,
			prefix,
			scopes,
			ttl_days,
			no_expiry,
		} => {
			let defaults = &app.config().api_keys;
			let ttl_days = if no_expiry {
				None
			} else {
				ttl_days.or(defaults.default_ttl_days)
			};
			let issued = service
				.create_api_key(CreateApiKeyRequest {
					user_id: UserId::new(user)?,
					org_id: org.map(OrgId::new).transpose()?,
					name,
					prefix: prefix.unwrap_or_else(|| defaults.default_prefix.clone()),
					scopes,
					expires_at: ttl_days.map(|days| Utc::now() + Duration::days(i64::from(days))),
				})
				.await?;
			Ok(json!({
				"token": issued.token.expose(),
				"api_key": issued.metadata,
			}))
		}
		ApiKeyCommand::Verify => {
			let token = read_stdin_value(input, "token")?;
			match service.verify_api_key_token(token.expose()).await? {
				Some(verified) => Ok(json!({
					"valid": true,
					"user_id": verified.user_id,
					"api_key_id": verified.api_key_id,
					"scopes": verified.scopes,
				})),
				None => Ok(json!({ "valid": false })),
			}
		}
		ApiKeyCommand::List { user } => {
			let keys = service.list_api_keys(&UserId::new(user)?).await?;
			Ok(serde_json::to_value(keys)?)
		}
		ApiKeyCommand::Show { user, id } => {
			let id = parse_api_key_id(&id)?;
			let key = service
				.get_api_key(&UserId::new(user)?, id)
				.await?
				.ok_or_else(|| AuthError::NotFound(id.to_string()))?;
			Ok(serde_json::to_value(key)?)
		}
		ApiKeyCommand::Revoke { user, id } => {
			let id = parse_api_key_id(&id)?;
			let changed = service.revoke_api_key(&UserId::new(user)?, id).await?;
			Ok(json!({ "revoked": id, "changed": changed }))
		}
		ApiKeyCommand::Delete { user, id } => {
			let id = parse_api_key_id(&id)?;
			service.delete_api_key(&UserId::new(user)?, id).await?;
			Ok(json!({ "deleted": id }))
		}
	}
}

async fn secret_id(app: &App, tenant_id: &TenantId, secret: &str) -> Result<SecretId, AppError> {
	match SecretLookup::parse(secret) {
		SecretLookup::Id(id) => Ok(id),
		lookup => Ok(app
			.vault()
			.get_secret(tenant_id, &lookup)
			.await?
			.ok_or_else(|| SecretsError::NotFound(lookup.to_string()))?
			.id),
	}
}

fn parse_api_key_id(id: &str) -> Result<ApiKeyId, AppError> {
	id.parse()
		.map_err(|e| AppError::Input(format!("invalid API key id '{id}': {e}")))
}

/// Read all of `input`, dropping one trailing newline.
fn read_stdin_value<R: Read>(input: &mut R, what: &str) -> Result<SecretString, AppError> {
	let mut buf = String::new();
	input.read_to_string(&mut buf)?;
	if buf.ends_with('\n') {
		buf.pop();
		if buf.ends_with('\r') {
			buf.pop();
		}
	}
	if buf.is_empty() {
		return Err(AppError::Input(format!("{what} must be provided on stdin")));
	}
	Ok(SecretString::new(buf))
}
