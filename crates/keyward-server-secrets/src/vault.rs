// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secrets vault providing high-level secret management operations.
//!
//! This service combines:
//! - Secret storage
//! - Per-tenant envelope encryption
//! - Versioned rotation
//! - Audit logging
//!
//! # Security
//!
//! The vault trusts the `TenantId` it is given. Callers MUST authenticate the
//! tenant before invoking any operation.

use std::sync::Arc;

use keyward_common_secret::SecretString;
use keyward_server_audit::{
	AuditEvent, AuditEventBuilder, AuditEventType, AuditSink, TracingAuditSink,
};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::config::VaultConfig;
use crate::encryption::{decrypt_for_tenant, encrypt_for_tenant};
use crate::error::{SecretsError, SecretsResult};
use crate::store::{NewSecret, SecretStore, StoredVersion};
use crate::types::{
	validate_description, validate_secret_name, validate_secret_value, SecretId, SecretKind,
	SecretLookup, SecretMetadata, SecretVersion, TenantId,
};

/// Request to create a new secret.
#[derive(Debug)]
pub struct CreateSecretInput {
	pub tenant_id: TenantId,
	pub name: String,
	pub kind: SecretKind,
	pub value: SecretString,
	pub description: Option<String>,
}

/// Tenant-scoped secrets vault.
pub struct Vault<S: SecretStore> {
	config: VaultConfig,
	store: Arc<S>,
	audit: Arc<dyn AuditSink>,
}

impl<S: SecretStore> Vault<S> {
	pub fn new(config: VaultConfig, store: Arc<S>) -> Self {
		Self {
			config,
			store,
			audit: Arc::new(TracingAuditSink::new()),
		}
	}

	pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
		self.audit = audit;
		self
	}

	/// Whether a master key is loaded.
	pub fn is_configured(&self) -> bool {
		self.config.is_configured()
	}

	pub fn config(&self) -> &VaultConfig {
		&self.config
	}

	fn require_configured(&self) -> SecretsResult<()> {
		if self.is_configured() {
			Ok(())
		} else {
			Err(SecretsError::MasterKeyNotConfigured)
		}
	}

	fn audit_event(
		&self,
		event_type: AuditEventType,
		tenant_id: &TenantId,
		secret_id: SecretId,
	) -> PendingAudit {
		PendingAudit {
			sink: Arc::clone(&self.audit),
			builder: AuditEvent::builder(event_type)
				.tenant(tenant_id.as_str())
				.resource("secret", secret_id.to_string()),
		}
	}

	#[instrument(skip(self, input), fields(tenant_id = %input.tenant_id, name = %input.name, kind = %input.kind))]
	pub async fn create_secret(&self, input: CreateSecretInput) -> SecretsResult<SecretMetadata> {
		validate_secret_name(&input.name)?;
		validate_secret_value(input.value.expose().as_bytes())?;
		validate_description(input.description.as_deref())?;
		self.require_configured()?;

		let blob = encrypt_for_tenant(
			self.config.keyring(),
			input.value.expose().as_bytes(),
			&input.tenant_id,
		)?;

		let new_secret = NewSecret {
			tenant_id: input.tenant_id,
			name: input.name,
			kind: input.kind,
			description: input.description,
		};
		let stored = self.store.create_secret(&new_secret, &blob).await?;

		self
			.audit_event(AuditEventType::SecretCreated, &stored.tenant_id, stored.id)
			.action("create")
			.details(json!({
				"name": stored.name,
				"kind": stored.kind,
				"version": 1,
				"key_version": blob.key_version,
			}))
			.send();
		info!(secret_id = %stored.id, "Created secret");

		Ok(stored.into())
	}

	/// Replace the value of a secret with a new active version.
	///
	/// The version observed before encryption is compared-and-swapped inside
	/// the store transaction; a concurrent rotation makes this call fail with
	/// [`SecretsError::Conflict`].
	#[instrument(skip(self, value), fields(tenant_id = %tenant_id, secret = %lookup))]
	pub async fn rotate_secret(
		&self,
		tenant_id: &TenantId,
		lookup: &SecretLookup,
		value: &SecretString,
	) -> SecretsResult<SecretVersion> {
		validate_secret_value(value.expose().as_bytes())?;
		self.require_configured()?;

		let secret = self
			.store
			.get_secret(tenant_id, lookup)
			.await?
			.ok_or_else(|| SecretsError::NotFound(lookup.to_string()))?;

		let blob = encrypt_for_tenant(self.config.keyring(), value.expose().as_bytes(), tenant_id)?;
		let stored = self
			.store
			.rotate_secret(tenant_id, secret.id, secret.current_version, &blob)
			.await?;

		self
			.audit_event(AuditEventType::SecretRotated, tenant_id, secret.id)
			.action("rotate")
			.details(json!({
				"name": secret.name,
				"previous_version": secret.current_version,
				"version": stored.version,
				"key_version": blob.key_version,
			}))
			.send();
		info!(secret_id = %secret.id, version = stored.version, "Rotated secret");

		Ok(stored.into())
	}

	/// Metadata for every secret of a tenant, ordered by name.
	pub async fn list_secrets(&self, tenant_id: &TenantId) -> SecretsResult<Vec<SecretMetadata>> {
		let secrets = self.store.list_secrets(tenant_id).await?;
		debug!(tenant_id = %tenant_id, count = secrets.len(), "Listed secrets");
		Ok(secrets.into_iter().map(SecretMetadata::from).collect())
	}

	pub async fn get_secret(
		&self,
		tenant_id: &TenantId,
		lookup: &SecretLookup,
	) -> SecretsResult<Option<SecretMetadata>> {
		Ok(self
			.store
			.get_secret(tenant_id, lookup)
			.await?
			.map(SecretMetadata::from))
	}

	/// Decrypt the active value of a secret named `name`.
	///
	/// Fails with [`SecretsError::MasterKeyNotConfigured`] before touching the
	/// store when the vault has no key. Returns `None` if the secret does not
	/// exist for this tenant.
	pub async fn get_secret_value_by_name(
		&self,
		tenant_id: &TenantId,
		name: &str,
	) -> SecretsResult<Option<SecretString>> {
		self
			.get_secret_value(tenant_id, &SecretLookup::Name(name.to_string()))
			.await
	}

	#[instrument(skip(self), fields(tenant_id = %tenant_id, secret = %lookup))]
	pub async fn get_secret_value(
		&self,
		tenant_id: &TenantId,
		lookup: &SecretLookup,
	) -> SecretsResult<Option<SecretString>> {
		self.require_configured()?;

		let Some(secret) = self.store.get_secret(tenant_id, lookup).await? else {
			debug!("Secret not found");
			return Ok(None);
		};

		let version = self
			.store
			.get_active_version(tenant_id, secret.id)
			.await?
			.ok_or_else(|| {
				SecretsError::CorruptedData(format!("secret {} has no active version", secret.id))
			})?;

		let value = self.decrypt_version(tenant_id, &version)?;

		self
			.audit_event(AuditEventType::SecretRead, tenant_id, secret.id)
			.action("read")
			.details(json!({ "name": secret.name, "version": version.version }))
			.send();
		debug!(secret_id = %secret.id, version = version.version, "Decrypted secret");

		Ok(Some(value))
	}

	fn decrypt_version(
		&self,
		tenant_id: &TenantId,
		version: &StoredVersion,
	) -> SecretsResult<SecretString> {
		let plaintext = match decrypt_for_tenant(self.config.keyring(), &version.blob, tenant_id) {
			Ok(plaintext) => plaintext,
			Err(e) => {
				warn!(
					secret_id = %version.secret_id,
					version = version.version,
					key_version = %version.blob.key_version,
					error = %e,
					"Secret decryption failed"
				);
				self
					.audit_event(AuditEventType::SecretDecryptionFailed, tenant_id, version.secret_id)
					.action("decrypt")
					.details(json!({
						"version": version.version,
						"key_version": version.blob.key_version,
						"error": e.to_string(),
					}))
					.send();
				return Err(e);
			}
		};

		let value = std::str::from_utf8(&plaintext).map_err(|_| {
			SecretsError::CorruptedData(format!(
				"secret {} v{} is not valid UTF-8",
				version.secret_id, version.version
			))
		})?;
		Ok(SecretString::new(value.to_string()))
	}

	/// Delete a secret and all its versions.
	#[instrument(skip(self), fields(tenant_id = %tenant_id, secret_id = %secret_id))]
	pub async fn delete_secret(&self, tenant_id: &TenantId, secret_id: SecretId) -> SecretsResult<()> {
		if !self.store.delete_secret(tenant_id, secret_id).await? {
			return Err(SecretsError::NotFound(secret_id.to_string()));
		}

		self
			.audit_event(AuditEventType::SecretDeleted, tenant_id, secret_id)
			.action("delete")
			.send();
		info!("Deleted secret");
		Ok(())
	}

	#[instrument(skip(self, description), fields(tenant_id = %tenant_id, secret_id = %secret_id))]
	pub async fn update_secret_description(
		&self,
		tenant_id: &TenantId,
		secret_id: SecretId,
		description: Option<&str>,
	) -> SecretsResult<SecretMetadata> {
		validate_description(description)?;

		let secret = self
			.store
			.update_description(tenant_id, secret_id, description)
			.await?
			.ok_or_else(|| SecretsError::NotFound(secret_id.to_string()))?;

		self
			.audit_event(AuditEventType::SecretDescriptionUpdated, tenant_id, secret_id)
			.action("update")
			.send();
		Ok(secret.into())
	}

	/// All versions of a secret, oldest first. Never includes ciphertext.
	pub async fn list_secret_versions(
		&self,
		tenant_id: &TenantId,
		secret_id: SecretId,
	) -> SecretsResult<Vec<SecretVersion>> {
		if self
			.store
			.get_secret(tenant_id, &SecretLookup::Id(secret_id))
			.await?
			.is_none()
		{
			return Err(SecretsError::NotFound(secret_id.to_string()));
		}

		Ok(self
			.store
			.list_versions(tenant_id, secret_id)
			.await?
			.into_iter()
			.map(SecretVersion::from)
			.collect())
	}

	pub async fn get_secret_version(
		&self,
		tenant_id: &TenantId,
		secret_id: SecretId,
		version: u32,
	) -> SecretsResult<Option<SecretVersion>> {
		Ok(self
			.store
			.get_version(tenant_id, secret_id, version)
			.await?
			.map(SecretVersion::from))
	}
}

/// Audit record bound to the vault's sink, published by `send`.
struct PendingAudit {
	sink: Arc<dyn AuditSink>,
	builder: AuditEventBuilder,
}

impl PendingAudit {
	fn action(mut self, action: &str) -> Self {
		self.builder = self.builder.action(action);
		self
	}

	fn details(mut self, details: serde_json::Value) -> Self {
		self.builder = self.builder.details(details);
		self
	}

	fn send(self) {
		self.sink.publish(&self.builder.build());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::master_key::{MasterKey, MasterKeyring, MASTER_KEY_SIZE};
	use crate::store::SqliteSecretStore;
	use crate::types::VersionStatus;
	use keyward_server_audit::MemoryAuditSink;
	use keyward_server_db::testing::create_migrated_test_pool;
	use keyward_server_db::SqlitePool;

	fn keyring(version: &str, byte: u8) -> MasterKeyring {
		MasterKeyring::new(version, MasterKey::from_bytes([byte; MASTER_KEY_SIZE])).unwrap()
	}

	fn vault_on(
		pool: SqlitePool,
		config: VaultConfig,
	) -> (Vault<SqliteSecretStore>, MemoryAuditSink) {
		let audit = MemoryAuditSink::new();
		let vault = Vault::new(config, Arc::new(SqliteSecretStore::new(pool)))
			.with_audit_sink(Arc::new(audit.clone()));
		(vault, audit)
	}

	async fn vault() -> (Vault<SqliteSecretStore>, MemoryAuditSink) {
		vault_on(
			create_migrated_test_pool().await,
			VaultConfig::new(keyring("v1", 3)),
		)
	}

	fn tenant(id: &str) -> TenantId {
		TenantId::new(id).unwrap()
	}

	fn input(tenant_id: &str, name: &str, value: &str) -> CreateSecretInput {
		CreateSecretInput {
			tenant_id: tenant(tenant_id),
			name: name.to_string(),
			kind: SecretKind::ApiKey,
			value: SecretString::new(value.to_string()),
			description: None,
		}
	}

	mod scenarios {
		use super::*;

		#[tokio::test]
		async fn create_then_read_back() {
			let (vault, audit) = vault().await;
			vault
				.create_secret(input("tenantA", "openai-key", "sk-abc123"))
				.await
				.unwrap();

			let value = vault
				.get_secret_value_by_name(&tenant("tenantA"), "openai-key")
				.await
				.unwrap()
				.unwrap();
			assert_eq!(value.expose(), "sk-abc123");

			assert_eq!(audit.events_of(AuditEventType::SecretCreated).len(), 1);
			assert_eq!(audit.events_of(AuditEventType::SecretRead).len(), 1);
			let json = serde_json::to_string(&audit.events()).unwrap();
			assert!(!json.contains("sk-abc123"));
		}

		#[tokio::test]
		async fn rotate_then_read_back() {
			let (vault, audit) = vault().await;
			let acme = tenant("tenantA");
			let created = vault
				.create_secret(input("tenantA", "openai-key", "sk-abc123"))
				.await
				.unwrap();

			let v2 = vault
				.rotate_secret(
					&acme,
					&SecretLookup::Name("openai-key".to_string()),
					&SecretString::new("sk-def456".to_string()),
				)
				.await
				.unwrap();
			assert_eq!(v2.version, 2);
			assert!(v2.is_active());

			let value = vault
				.get_secret_value_by_name(&acme, "openai-key")
				.await
				.unwrap()
				.unwrap();
			assert_eq!(value.expose(), "sk-def456");

			let v1 = vault
				.get_secret_version(&acme, created.id, 1)
				.await
				.unwrap()
				.unwrap();
			assert_eq!(v1.status, VersionStatus::Inactive);

			assert_eq!(audit.events_of(AuditEventType::SecretRotated).len(), 1);
		}
	}

	mod versions {
		use super::*;

		#[tokio::test]
		async fn exactly_one_active_after_many_rotations() {
			let (vault, _) = vault().await;
			let acme = tenant("acme");
			let created = vault.create_secret(input("acme", "s", "v1")).await.unwrap();

			for i in 2..=6 {
				let version = vault
					.rotate_secret(
						&acme,
						&SecretLookup::Id(created.id),
						&SecretString::new(format!("v{i}")),
					)
					.await
					.unwrap();
				assert_eq!(version.version, i);
			}

			let versions = vault.list_secret_versions(&acme, created.id).await.unwrap();
			let numbers: Vec<u32> = versions.iter().map(|v| v.version).collect();
			assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
			let active: Vec<_> = versions.iter().filter(|v| v.is_active()).collect();
			assert_eq!(active.len(), 1);
			assert_eq!(active[0].version, 6);

			let meta = vault
				.get_secret(&acme, &SecretLookup::Id(created.id))
				.await
				.unwrap()
				.unwrap();
			assert_eq!(meta.current_version, 6);
			assert_eq!(
				vault
					.get_secret_value_by_name(&acme, "s")
					.await
					.unwrap()
					.unwrap()
					.expose(),
				"v6"
			);
		}

		#[tokio::test]
		async fn losing_concurrent_rotation_conflicts() {
			let pool = create_migrated_test_pool().await;
			let (vault, _) = vault_on(pool.clone(), VaultConfig::new(keyring("v1", 3)));
			let acme = tenant("acme");
			let created = vault.create_secret(input("acme", "s", "one")).await.unwrap();

			// Both writers observed version 1; the first commits.
			let store = SqliteSecretStore::new(pool);
			let blob = encrypt_for_tenant(vault.config().keyring(), b"two", &acme).unwrap();
			store.rotate_secret(&acme, created.id, 1, &blob).await.unwrap();

			let blob = encrypt_for_tenant(vault.config().keyring(), b"three", &acme).unwrap();
			let lost = store.rotate_secret(&acme, created.id, 1, &blob).await;
			assert!(matches!(lost, Err(SecretsError::Conflict(_))));

			let versions = vault.list_secret_versions(&acme, created.id).await.unwrap();
			assert_eq!(versions.len(), 2);
			assert_eq!(
				vault
					.get_secret_value_by_name(&acme, "s")
					.await
					.unwrap()
					.unwrap()
					.expose(),
				"two"
			);
		}

		#[tokio::test]
		async fn version_list_carries_key_version_only() {
			let (vault, _) = vault().await;
			let created = vault.create_secret(input("acme", "s", "x")).await.unwrap();
			let versions = vault
				.list_secret_versions(&tenant("acme"), created.id)
				.await
				.unwrap();
			let json = serde_json::to_string(&versions).unwrap();
			assert!(json.contains("\"key_version\":\"v1\""));
			assert!(!json.contains("ciphertext"));
		}
	}

	mod isolation {
		use super::*;

		#[tokio::test]
		async fn tenants_cannot_see_each_other() {
			let (vault, _) = vault().await;
			let a = tenant("tenantA");
			let b = tenant("tenantB");
			let created = vault
				.create_secret(input("tenantA", "shared-name", "a-value"))
				.await
				.unwrap();
			vault
				.create_secret(input("tenantB", "shared-name", "b-value"))
				.await
				.unwrap();

			assert_eq!(
				vault
					.get_secret_value_by_name(&b, "shared-name")
					.await
					.unwrap()
					.unwrap()
					.expose(),
				"b-value"
			);
			assert_eq!(vault.list_secrets(&a).await.unwrap().len(), 1);
			assert!(vault
				.get_secret(&b, &SecretLookup::Id(created.id))
				.await
				.unwrap()
				.is_none());
			assert!(matches!(
				vault.delete_secret(&b, created.id).await,
				Err(SecretsError::NotFound(_))
			));
			assert!(matches!(
				vault
					.rotate_secret(
						&b,
						&SecretLookup::Id(created.id),
						&SecretString::new("x".to_string())
					)
					.await,
				Err(SecretsError::NotFound(_))
			));
		}

		#[tokio::test]
		async fn duplicate_name_in_tenant_conflicts() {
			let (vault, _) = vault().await;
			vault.create_secret(input("acme", "dup", "1")).await.unwrap();
			assert!(matches!(
				vault.create_secret(input("acme", "dup", "2")).await,
				Err(SecretsError::Conflict(_))
			));
		}
	}

	mod configuration {
		use super::*;

		#[tokio::test]
		async fn unconfigured_vault_fails_fast() {
			let (vault, _) = vault_on(
				create_migrated_test_pool().await,
				VaultConfig::unconfigured(),
			);
			assert!(!vault.is_configured());

			let err = vault
				.get_secret_value_by_name(&tenant("acme"), "anything")
				.await
				.unwrap_err();
			assert!(err.is_configuration());
			assert!(matches!(
				vault.create_secret(input("acme", "s", "v")).await,
				Err(SecretsError::MasterKeyNotConfigured)
			));
			assert!(vault.list_secrets(&tenant("acme")).await.unwrap().is_empty());
		}

		#[tokio::test]
		async fn missing_secret_is_none_not_error() {
			let (vault, _) = vault().await;
			assert!(vault
				.get_secret_value_by_name(&tenant("acme"), "missing")
				.await
				.unwrap()
				.is_none());
		}

		#[tokio::test]
		async fn master_key_rotation_keeps_old_versions_readable() {
			let pool = create_migrated_test_pool().await;
			let (old_vault, _) = vault_on(pool.clone(), VaultConfig::new(keyring("v1", 1)));
			old_vault
				.create_secret(input("acme", "legacy", "old-value"))
				.await
				.unwrap();

			let rotated = keyring("v2", 2)
				.with_retired("v1", MasterKey::from_bytes([1u8; MASTER_KEY_SIZE]))
				.unwrap();
			let (vault, _) = vault_on(pool, VaultConfig::new(rotated));
			let acme = tenant("acme");
			assert_eq!(
				vault
					.get_secret_value_by_name(&acme, "legacy")
					.await
					.unwrap()
					.unwrap()
					.expose(),
				"old-value"
			);

			let v2 = vault
				.rotate_secret(
					&acme,
					&SecretLookup::Name("legacy".to_string()),
					&SecretString::new("new-value".to_string()),
				)
				.await
				.unwrap();
			assert_eq!(v2.key_version, "v2");
		}

		#[tokio::test]
		async fn wrong_master_key_is_audited_decryption_failure() {
			let pool = create_migrated_test_pool().await;
			let (writer, _) = vault_on(pool.clone(), VaultConfig::new(keyring("v1", 1)));
			writer.create_secret(input("acme", "s", "value")).await.unwrap();

			let (reader, audit) = vault_on(pool, VaultConfig::new(keyring("v1", 9)));
			let err = reader
				.get_secret_value_by_name(&tenant("acme"), "s")
				.await
				.unwrap_err();
			assert!(matches!(err, SecretsError::Decryption(_)));

			let failures = audit.events_of(AuditEventType::SecretDecryptionFailed);
			assert_eq!(failures.len(), 1);
			assert_eq!(failures[0].tenant_id.as_deref(), Some("acme"));
			assert!(audit.events_of(AuditEventType::SecretRead).is_empty());
		}
	}

	mod lifecycle {
		use super::*;

		#[tokio::test]
		async fn validation_runs_before_storage() {
			let (vault, _) = vault().await;
			assert!(matches!(
				vault.create_secret(input("acme", "bad name", "v")).await,
				Err(SecretsError::Validation(_))
			));
			assert!(matches!(
				vault.create_secret(input("acme", "empty", "")).await,
				Err(SecretsError::Validation(_))
			));
			assert!(vault.list_secrets(&tenant("acme")).await.unwrap().is_empty());
		}

		#[tokio::test]
		async fn uuid_shaped_names_cannot_shadow_ids() {
			let (vault, _) = vault().await;
			let acme = tenant("acme");
			let uuid_name = "123e4567-e89b-12d3-a456-426614174000";
			assert!(matches!(
				vault.create_secret(input("acme", uuid_name, "v")).await,
				Err(SecretsError::Validation(_))
			));

			let created = vault
				.create_secret(input("acme", "stripe_api_key", "sk-1"))
				.await
				.unwrap();
			let by_id = SecretLookup::parse(&created.id.to_string());
			assert_eq!(by_id, SecretLookup::Id(created.id));
			let version = vault
				.rotate_secret(&acme, &by_id, &SecretString::new("sk-2".to_string()))
				.await
				.unwrap();
			assert_eq!(version.version, 2);
		}

		#[tokio::test]
		async fn description_update_and_delete() {
			let (vault, audit) = vault().await;
			let acme = tenant("acme");
			let created = vault.create_secret(input("acme", "s", "v")).await.unwrap();

			let updated = vault
				.update_secret_description(&acme, created.id, Some("Stripe live key"))
				.await
				.unwrap();
			assert_eq!(updated.description.as_deref(), Some("Stripe live key"));
			assert_eq!(updated.current_version, 1);

			vault.delete_secret(&acme, created.id).await.unwrap();
			assert!(vault.list_secrets(&acme).await.unwrap().is_empty());
			assert!(matches!(
				vault.list_secret_versions(&acme, created.id).await,
				Err(SecretsError::NotFound(_))
			));
			assert!(matches!(
				vault
					.update_secret_description(&acme, created.id, None)
					.await,
				Err(SecretsError::NotFound(_))
			));
			assert_eq!(audit.events_of(AuditEventType::SecretDeleted).len(), 1);
			assert_eq!(
				audit
					.events_of(AuditEventType::SecretDescriptionUpdated)
					.len(),
				1
			);
		}

		#[tokio::test]
		async fn list_reports_metadata_only() {
			let (vault, _) = vault().await;
			vault.create_secret(input("acme", "b-secret", "sk-bravo-value")).await.unwrap();
			vault.create_secret(input("acme", "a-secret", "sk-alpha-value")).await.unwrap();

			let listed = vault.list_secrets(&tenant("acme")).await.unwrap();
			let names: Vec<&str> = listed.iter().map(|s| s.name.as_str()).collect();
			assert_eq!(names, vec!["a-secret", "b-secret"]);
			assert!(listed.iter().all(|s| s.last_rotated_at.is_some()));

			let json = serde_json::to_string(&listed).unwrap();
			assert!(!json.contains("sk-alpha-value"));
		}
	}
}
