// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret storage with SQLite backend.
//!
//! The store only ever sees ciphertext. It parses database rows into typed
//! entities and reports malformed rows as [`SecretsError::CorruptedData`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyward_server_db::{
	CreateSecretParams, NewVersionParams, RotateSecretParams, SecretRow, SecretVersionRow,
	SecretsRepository, SqlitePool,
};
use tracing::{debug, instrument};

use crate::encryption::{EncryptedBlob, IV_SIZE, TAG_SIZE};
use crate::error::{SecretsError, SecretsResult};
use crate::types::{
	SecretId, SecretKind, SecretLookup, SecretMetadata, SecretVersion, SecretVersionId, TenantId,
	VersionStatus,
};

/// A secret's metadata as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
	pub id: SecretId,
	pub tenant_id: TenantId,
	pub name: String,
	pub kind: SecretKind,
	pub description: Option<String>,
	pub current_version: u32,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub last_rotated_at: Option<DateTime<Utc>>,
}

impl From<Secret> for SecretMetadata {
	fn from(s: Secret) -> Self {
		Self {
			id: s.id,
			tenant_id: s.tenant_id,
			name: s.name,
			kind: s.kind,
			description: s.description,
			current_version: s.current_version,
			created_at: s.created_at,
			updated_at: s.updated_at,
			last_rotated_at: s.last_rotated_at,
		}
	}
}

/// A version with its encrypted payload. Never leaves the crate's public
/// surface except through [`SecretVersion`].
#[derive(Debug, Clone)]
pub struct StoredVersion {
	pub id: SecretVersionId,
	pub secret_id: SecretId,
	pub version: u32,
	pub status: VersionStatus,
	pub blob: EncryptedBlob,
	pub created_at: DateTime<Utc>,
}

impl From<StoredVersion> for SecretVersion {
	fn from(v: StoredVersion) -> Self {
		Self {
			id: v.id,
			secret_id: v.secret_id,
			version: v.version,
			status: v.status,
			key_version: v.blob.key_version,
			created_at: v.created_at,
		}
	}
}

/// Metadata for a secret about to be created.
#[derive(Debug, Clone)]
pub struct NewSecret {
	pub tenant_id: TenantId,
	pub name: String,
	pub kind: SecretKind,
	pub description: Option<String>,
}

/// Trait for secret storage operations.
///
/// Every method is scoped by tenant; another tenant's secret is
/// indistinguishable from a missing one.
#[async_trait]
pub trait SecretStore: Send + Sync {
	/// Create a secret with `blob` as version 1 (active).
	async fn create_secret(&self, secret: &NewSecret, blob: &EncryptedBlob)
		-> SecretsResult<Secret>;

	async fn get_secret(
		&self,
		tenant_id: &TenantId,
		lookup: &SecretLookup,
	) -> SecretsResult<Option<Secret>>;

	/// All secrets of a tenant, ordered by name.
	async fn list_secrets(&self, tenant_id: &TenantId) -> SecretsResult<Vec<Secret>>;

	async fn get_active_version(
		&self,
		tenant_id: &TenantId,
		secret_id: SecretId,
	) -> SecretsResult<Option<StoredVersion>>;

	async fn get_version(
		&self,
		tenant_id: &TenantId,
		secret_id: SecretId,
		version: u32,
	) -> SecretsResult<Option<StoredVersion>>;

	/// All versions, oldest first.
	async fn list_versions(
		&self,
		tenant_id: &TenantId,
		secret_id: SecretId,
	) -> SecretsResult<Vec<StoredVersion>>;

	/// Append `blob` as the new active version.
	///
	/// Fails with `Conflict` if `current_version` is no longer
	/// `expected_version`, and `NotFound` if the secret is gone.
	async fn rotate_secret(
		&self,
		tenant_id: &TenantId,
		secret_id: SecretId,
		expected_version: u32,
		blob: &EncryptedBlob,
	) -> SecretsResult<StoredVersion>;

	/// Returns the updated secret, or `None` if it does not exist.
	async fn update_description(
		&self,
		tenant_id: &TenantId,
		secret_id: SecretId,
		description: Option<&str>,
	) -> SecretsResult<Option<Secret>>;

	/// Delete a secret and all its versions. Returns false if absent.
	async fn delete_secret(&self, tenant_id: &TenantId, secret_id: SecretId)
		-> SecretsResult<bool>;
}

/// [`SecretStore`] backed by [`SecretsRepository`].
#[derive(Clone)]
pub struct SqliteSecretStore {
	repo: SecretsRepository,
}

impl SqliteSecretStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			repo: SecretsRepository::new(pool),
		}
	}

	pub fn from_repository(repo: SecretsRepository) -> Self {
		Self { repo }
	}
}

fn new_version_params(blob: &EncryptedBlob, id: SecretVersionId, now: DateTime<Utc>) -> NewVersionParams {
	NewVersionParams {
		id: id.to_string(),
		ciphertext: blob.ciphertext.clone(),
		iv: blob.iv.to_vec(),
		tag: blob.tag.to_vec(),
		key_version: blob.key_version.clone(),
		created_at: now.to_rfc3339(),
	}
}

#[async_trait]
impl SecretStore for SqliteSecretStore {
	#[instrument(skip(self, secret, blob), fields(tenant_id = %secret.tenant_id, name = %secret.name))]
	async fn create_secret(
		&self,
		secret: &NewSecret,
		blob: &EncryptedBlob,
	) -> SecretsResult<Secret> {
		let id = SecretId::generate();
		let version_id = SecretVersionId::generate();
		let now = Utc::now();

		let params = CreateSecretParams {
			id: id.to_string(),
			tenant_id: secret.tenant_id.to_string(),
			name: secret.name.clone(),
			kind: secret.kind.as_str().to_string(),
			description: secret.description.clone(),
			created_at: now.to_rfc3339(),
		};
		self
			.repo
			.create_secret(&params, &new_version_params(blob, version_id, now))
			.await?;

		debug!(secret_id = %id, "Stored secret");
		Ok(Secret {
			id,
			tenant_id: secret.tenant_id.clone(),
			name: secret.name.clone(),
			kind: secret.kind,
			description: secret.description.clone(),
			current_version: 1,
			created_at: now,
			updated_at: now,
			last_rotated_at: Some(now),
		})
	}

	async fn get_secret(
		&self,
		tenant_id: &TenantId,
		lookup: &SecretLookup,
	) -> SecretsResult<Option<Secret>> {
		let row = match lookup {
			SecretLookup::Id(id) => {
				self
					.repo
					.get_secret_by_id(tenant_id.as_str(), &id.to_string())
					.await?
			}
			SecretLookup::Name(name) => self.repo.get_secret_by_name(tenant_id.as_str(), name).await?,
		};
		row.as_ref().map(parse_secret_row).transpose()
	}

	async fn list_secrets(&self, tenant_id: &TenantId) -> SecretsResult<Vec<Secret>> {
		self
			.repo
			.list_secrets(tenant_id.as_str())
			.await?
			.iter()
			.map(parse_secret_row)
			.collect()
	}

	async fn get_active_version(
		&self,
		tenant_id: &TenantId,
		secret_id: SecretId,
	) -> SecretsResult<Option<StoredVersion>> {
		self
			.repo
			.get_active_version(tenant_id.as_str(), &secret_id.to_string())
			.await?
			.as_ref()
			.map(parse_version_row)
			.transpose()
	}

	async fn get_version(
		&self,
		tenant_id: &TenantId,
		secret_id: SecretId,
		version: u32,
	) -> SecretsResult<Option<StoredVersion>> {
		self
			.repo
			.get_version(tenant_id.as_str(), &secret_id.to_string(), i64::from(version))
			.await?
			.as_ref()
			.map(parse_version_row)
			.transpose()
	}

	async fn list_versions(
		&self,
		tenant_id: &TenantId,
		secret_id: SecretId,
	) -> SecretsResult<Vec<StoredVersion>> {
		self
			.repo
			.list_versions(tenant_id.as_str(), &secret_id.to_string())
			.await?
			.iter()
			.map(parse_version_row)
			.collect()
	}

	#[instrument(skip(self, blob), fields(tenant_id = %tenant_id, secret_id = %secret_id))]
	async fn rotate_secret(
		&self,
		tenant_id: &TenantId,
		secret_id: SecretId,
		expected_version: u32,
		blob: &EncryptedBlob,
	) -> SecretsResult<StoredVersion> {
		let version_id = SecretVersionId::generate();
		let now = Utc::now();
		let params = RotateSecretParams {
			tenant_id: tenant_id.to_string(),
			secret_id: secret_id.to_string(),
			expected_version: i64::from(expected_version),
			version: new_version_params(blob, version_id, now),
		};

		let version = self.repo.rotate_secret(&params).await?;
		let version = u32::try_from(version)
			.map_err(|_| SecretsError::CorruptedData(format!("version out of range: {version}")))?;

		Ok(StoredVersion {
			id: version_id,
			secret_id,
			version,
			status: VersionStatus::Active,
			blob: blob.clone(),
			created_at: now,
		})
	}

	async fn update_description(
		&self,
		tenant_id: &TenantId,
		secret_id: SecretId,
		description: Option<&str>,
	) -> SecretsResult<Option<Secret>> {
		let updated = self
			.repo
			.update_description(
				tenant_id.as_str(),
				&secret_id.to_string(),
				description,
				&Utc::now().to_rfc3339(),
			)
			.await?;
		if !updated {
			return Ok(None);
		}
		self.get_secret(tenant_id, &SecretLookup::Id(secret_id)).await
	}

	async fn delete_secret(
		&self,
		tenant_id: &TenantId,
		secret_id: SecretId,
	) -> SecretsResult<bool> {
		Ok(self
			.repo
			.delete_secret(tenant_id.as_str(), &secret_id.to_string())
			.await?)
	}
}

fn parse_timestamp(field: &str, value: &str) -> SecretsResult<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|_| SecretsError::CorruptedData(format!("invalid {field} timestamp: {value}")))
}

fn parse_version_number(value: i64) -> SecretsResult<u32> {
	u32::try_from(value)
		.ok()
		.filter(|v| *v >= 1)
		.ok_or_else(|| SecretsError::CorruptedData(format!("invalid version number: {value}")))
}

fn parse_secret_row(row: &SecretRow) -> SecretsResult<Secret> {
	Ok(Secret {
		id: row
			.id
			.parse()
			.map_err(|_| SecretsError::CorruptedData(format!("invalid secret id: {}", row.id)))?,
		tenant_id: TenantId::new(row.tenant_id.clone())
			.map_err(|e| SecretsError::CorruptedData(e.to_string()))?,
		name: row.name.clone(),
		kind: row
			.kind
			.parse()
			.map_err(|_| SecretsError::CorruptedData(format!("invalid secret kind: {}", row.kind)))?,
		description: row.description.clone(),
		current_version: parse_version_number(row.current_version)?,
		created_at: parse_timestamp("created_at", &row.created_at)?,
		updated_at: parse_timestamp("updated_at", &row.updated_at)?,
		last_rotated_at: row
			.last_rotated_at
			.as_deref()
			.map(|v| parse_timestamp("last_rotated_at", v))
			.transpose()?,
	})
}

fn parse_version_row(row: &SecretVersionRow) -> SecretsResult<StoredVersion> {
	let iv: [u8; IV_SIZE] = row.iv.as_slice().try_into().map_err(|_| {
		SecretsError::CorruptedData(format!("expected {IV_SIZE}-byte iv, got {}", row.iv.len()))
	})?;
	let tag: [u8; TAG_SIZE] = row.tag.as_slice().try_into().map_err(|_| {
		SecretsError::CorruptedData(format!("expected {TAG_SIZE}-byte tag, got {}", row.tag.len()))
	})?;

	Ok(StoredVersion {
		id: row
			.id
			.parse()
			.map_err(|_| SecretsError::CorruptedData(format!("invalid version id: {}", row.id)))?,
		secret_id: row.secret_id.parse().map_err(|_| {
			SecretsError::CorruptedData(format!("invalid secret id: {}", row.secret_id))
		})?,
		version: parse_version_number(row.version)?,
		status: row
			.status
			.parse()
			.map_err(SecretsError::CorruptedData)?,
		blob: EncryptedBlob {
			ciphertext: row.ciphertext.clone(),
			iv,
			tag,
			key_version: row.key_version.clone(),
		},
		created_at: parse_timestamp("created_at", &row.created_at)?,
	})
}
