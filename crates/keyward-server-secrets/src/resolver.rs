// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `secret://<name>` references.
//!
//! Configuration values elsewhere in a deployment may point at a vault
//! secret instead of embedding it. A value without the `secret://` prefix is a
//! literal and comes back unchanged. A reference that cannot be resolved
//! (unknown name, empty name, unconfigured vault) yields `None`, meaning the
//! value is unavailable. Integrity failures still propagate.

use async_trait::async_trait;
use keyward_common_secret::SecretString;
use tracing::{debug, warn};

use crate::error::SecretsResult;
use crate::store::SecretStore;
use crate::types::TenantId;
use crate::vault::Vault;

/// URI scheme of a secret reference.
pub const SECRET_REF_SCHEME: &str = "secret://";

/// The secret name in `secret://<name>`, or `None` for anything else.
pub fn parse_secret_ref(reference: &str) -> Option<&str> {
	reference
		.strip_prefix(SECRET_REF_SCHEME)
		.filter(|name| !name.is_empty())
}

/// Resolves secret references to plaintext for a tenant.
#[async_trait]
pub trait SecretResolver: Send + Sync {
	async fn resolve_secret_ref(
		&self,
		tenant_id: &TenantId,
		reference: &str,
	) -> SecretsResult<Option<SecretString>>;
}

#[async_trait]
impl<S: SecretStore + 'static> SecretResolver for Vault<S> {
	async fn resolve_secret_ref(
		&self,
		tenant_id: &TenantId,
		reference: &str,
	) -> SecretsResult<Option<SecretString>> {
		if !reference.starts_with(SECRET_REF_SCHEME) {
			return Ok(Some(SecretString::new(reference.to_string())));
		}
		let Some(name) = parse_secret_ref(reference) else {
			debug!(tenant_id = %tenant_id, "Empty secret reference");
			return Ok(None);
		};

		match self.get_secret_value_by_name(tenant_id, name).await {
			Ok(Some(value)) => Ok(Some(value)),
			Ok(None) => {
				debug!(tenant_id = %tenant_id, name, "Secret reference did not resolve");
				Ok(None)
			}
			Err(e) if e.is_configuration() => {
				warn!(tenant_id = %tenant_id, name, error = %e, "Vault unavailable; secret reference left unresolved");
				Ok(None)
			}
			Err(e) => Err(e),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::VaultConfig;
	use crate::master_key::{MasterKey, MasterKeyring, MASTER_KEY_SIZE};
	use crate::store::SqliteSecretStore;
	use crate::types::SecretKind;
	use crate::vault::CreateSecretInput;
	use keyward_server_db::testing::create_migrated_test_pool;
	use std::sync::Arc;

	#[test]
	fn parses_only_secret_scheme() {
		assert_eq!(parse_secret_ref("secret://openai-key"), Some("openai-key"));
		assert_eq!(parse_secret_ref("secret://"), None);
		assert_eq!(parse_secret_ref("sk-literal"), None);
		assert_eq!(parse_secret_ref("https://example.com"), None);
		assert_eq!(parse_secret_ref("SECRET://x"), None);
	}

	async fn vault(config: VaultConfig) -> Vault<SqliteSecretStore> {
		Vault::new(
			config,
			Arc::new(SqliteSecretStore::new(create_migrated_test_pool().await)),
		)
	}

	fn configured() -> VaultConfig {
		VaultConfig::new(
			MasterKeyring::new("v1", MasterKey::from_bytes([4u8; MASTER_KEY_SIZE])).unwrap(),
		)
	}

	#[test]
	fn resolves_existing_reference() {
		tokio_test::block_on(async {
			let vault = vault(configured()).await;
			let acme = TenantId::new("acme").unwrap();
			vault
				.create_secret(CreateSecretInput {
					tenant_id: acme.clone(),
					name: "openai-key".to_string(),
					kind: SecretKind::ApiKey,
					value: SecretString::new("sk-abc123".to_string()),
					description: None,
				})
				.await
				.unwrap();

			let value = vault
				.resolve_secret_ref(&acme, "secret://openai-key")
				.await
				.unwrap()
				.unwrap();
			assert_eq!(value.expose(), "sk-abc123");
		});
	}

	#[tokio::test]
	async fn literals_pass_through_unchanged() {
		let vault = vault(configured()).await;
		let acme = TenantId::new("acme").unwrap();

		for literal in ["sk-literal", "https://example.com", "SECRET://x", ""] {
			let value = vault.resolve_secret_ref(&acme, literal).await.unwrap();
			assert_eq!(value.as_ref().map(|v| v.expose().as_str()), Some(literal));
		}
	}

	#[tokio::test]
	async fn unresolvable_references_are_none() {
		let vault = vault(configured()).await;
		let acme = TenantId::new("acme").unwrap();

		for reference in ["secret://missing", "secret://bad name", "secret://"] {
			assert!(vault
				.resolve_secret_ref(&acme, reference)
				.await
				.unwrap()
				.is_none());
		}
	}

	#[tokio::test]
	async fn unconfigured_vault_resolves_to_none() {
		let vault = vault(VaultConfig::unconfigured()).await;
		let acme = TenantId::new("acme").unwrap();
		assert!(vault
			.resolve_secret_ref(&acme, "secret://anything")
			.await
			.unwrap()
			.is_none());

		let literal = vault
			.resolve_secret_ref(&acme, "sk-literal")
			.await
			.unwrap()
			.unwrap();
		assert_eq!(literal.expose(), "sk-literal");
	}
}
