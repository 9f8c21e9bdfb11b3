// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secrets repository for database operations.
//!
//! Two tables back the vault:
//! - `secrets`: one row per `(tenant_id, name)` slot
//! - `secret_versions`: encrypted snapshots, at most one `active` per secret
//!
//! Creation, rotation and deletion each run inside a single transaction.
//! Rotation is guarded by a compare-and-swap on `secrets.current_version`.

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{conflict_or_sqlx, is_busy_error, DbError, Result};

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_INACTIVE: &str = "inactive";

const SECRET_COLUMNS: &str = r#"
	s.id, s.tenant_id, s.name, s.kind, s.description, s.current_version,
	s.created_at, s.updated_at,
	(SELECT v.created_at FROM secret_versions v
	 WHERE v.secret_id = s.id ORDER BY v.version DESC LIMIT 1) AS last_rotated_at
"#;

const VERSION_COLUMNS: &str = r#"
	v.id, v.secret_id, v.version, v.status, v.ciphertext, v.iv, v.tag,
	v.key_version, v.created_at
"#;

/// Stored secret metadata row.
#[derive(Debug, Clone)]
pub struct SecretRow {
	pub id: String,
	pub tenant_id: String,
	pub name: String,
	pub kind: String,
	pub description: Option<String>,
	pub current_version: i64,
	pub created_at: String,
	pub updated_at: String,
	/// `created_at` of the newest version.
	pub last_rotated_at: Option<String>,
}

/// Stored secret version row.
#[derive(Debug, Clone)]
pub struct SecretVersionRow {
	pub id: String,
	pub secret_id: String,
	pub version: i64,
	pub status: String,
	pub ciphertext: Vec<u8>,
	pub iv: Vec<u8>,
	pub tag: Vec<u8>,
	pub key_version: String,
	pub created_at: String,
}

/// Parameters for creating a secret.
#[derive(Debug, Clone)]
pub struct CreateSecretParams {
	pub id: String,
	pub tenant_id: String,
	pub name: String,
	pub kind: String,
	pub description: Option<String>,
	pub created_at: String,
}

/// Encrypted payload for a new version.
#[derive(Clone)]
pub struct NewVersionParams {
	pub id: String,
	pub ciphertext: Vec<u8>,
	pub iv: Vec<u8>,
	pub tag: Vec<u8>,
	pub key_version: String,
	pub created_at: String,
}

impl std::fmt::Debug for NewVersionParams {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NewVersionParams")
			.field("id", &self.id)
			.field("ciphertext_len", &self.ciphertext.len())
			.field("key_version", &self.key_version)
			.field("created_at", &self.created_at)
			.finish()
	}
}

/// Parameters for rotating a secret.
#[derive(Debug, Clone)]
pub struct RotateSecretParams {
	pub tenant_id: String,
	pub secret_id: String,
	/// `current_version` observed before encrypting; the swap fails if it moved.
	pub expected_version: i64,
	pub version: NewVersionParams,
}

#[async_trait]
pub trait SecretsStore: Send + Sync {
	async fn create_secret(
		&self,
		secret: &CreateSecretParams,
		version: &NewVersionParams,
	) -> Result<()>;
	async fn get_secret_by_id(&self, tenant_id: &str, id: &str) -> Result<Option<SecretRow>>;
	async fn get_secret_by_name(&self, tenant_id: &str, name: &str) -> Result<Option<SecretRow>>;
	async fn list_secrets(&self, tenant_id: &str) -> Result<Vec<SecretRow>>;
	async fn get_active_version(
		&self,
		tenant_id: &str,
		secret_id: &str,
	) -> Result<Option<SecretVersionRow>>;
	async fn get_version(
		&self,
		tenant_id: &str,
		secret_id: &str,
		version: i64,
	) -> Result<Option<SecretVersionRow>>;
	async fn list_versions(&self, tenant_id: &str, secret_id: &str)
		-> Result<Vec<SecretVersionRow>>;
	async fn rotate_secret(&self, params: &RotateSecretParams) -> Result<i64>;
	async fn update_description(
		&self,
		tenant_id: &str,
		id: &str,
		description: Option<&str>,
		updated_at: &str,
	) -> Result<bool>;
	async fn delete_secret(&self, tenant_id: &str, id: &str) -> Result<bool>;
}

/// Repository for secrets database operations.
#[derive(Clone)]
pub struct SecretsRepository {
	pool: SqlitePool,
}

impl SecretsRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a secret and its first (active) version atomically.
	///
	/// Returns `Err(DbError::Conflict)` if the tenant already has a secret with
	/// this name.
	#[tracing::instrument(skip(self, secret, version), fields(secret_id = %secret.id, tenant_id = %secret.tenant_id, name = %secret.name))]
	pub async fn create_secret(
		&self,
		secret: &CreateSecretParams,
		version: &NewVersionParams,
	) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
			INSERT INTO secrets (id, tenant_id, name, kind, description, current_version, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, 1, ?, ?)
			"#,
		)
		.bind(&secret.id)
		.bind(&secret.tenant_id)
		.bind(&secret.name)
		.bind(&secret.kind)
		.bind(&secret.description)
		.bind(&secret.created_at)
		.bind(&secret.created_at)
		.execute(&mut *tx)
		.await
		.map_err(|e| conflict_or_sqlx(e, || format!("secret already exists: {}", secret.name)))?;

		insert_version(&mut tx, &secret.id, 1, version).await?;

		tx.commit().await?;

		tracing::debug!(secret_id = %secret.id, name = %secret.name, "secret created");
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(tenant_id = %tenant_id, secret_id = %id))]
	pub async fn get_secret_by_id(&self, tenant_id: &str, id: &str) -> Result<Option<SecretRow>> {
		let sql = format!("SELECT {SECRET_COLUMNS} FROM secrets s WHERE s.tenant_id = ? AND s.id = ?");
		let row = sqlx::query(&sql)
			.bind(tenant_id)
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;

		Ok(row.as_ref().map(parse_secret_row))
	}

	#[tracing::instrument(skip(self), fields(tenant_id = %tenant_id, name = %name))]
	pub async fn get_secret_by_name(
		&self,
		tenant_id: &str,
		name: &str,
	) -> Result<Option<SecretRow>> {
		let sql =
			format!("SELECT {SECRET_COLUMNS} FROM secrets s WHERE s.tenant_id = ? AND s.name = ?");
		let row = sqlx::query(&sql)
			.bind(tenant_id)
			.bind(name)
			.fetch_optional(&self.pool)
			.await?;

		Ok(row.as_ref().map(parse_secret_row))
	}

	/// List a tenant's secrets ordered by name.
	#[tracing::instrument(skip(self), fields(tenant_id = %tenant_id))]
	pub async fn list_secrets(&self, tenant_id: &str) -> Result<Vec<SecretRow>> {
		let sql = format!(
			"SELECT {SECRET_COLUMNS} FROM secrets s WHERE s.tenant_id = ? ORDER BY s.name ASC"
		);
		let rows = sqlx::query(&sql)
			.bind(tenant_id)
			.fetch_all(&self.pool)
			.await?;

		Ok(rows.iter().map(parse_secret_row).collect())
	}

	#[tracing::instrument(skip(self), fields(tenant_id = %tenant_id, secret_id = %secret_id))]
	pub async fn get_active_version(
		&self,
		tenant_id: &str,
		secret_id: &str,
	) -> Result<Option<SecretVersionRow>> {
		let sql = format!(
			r#"
			SELECT {VERSION_COLUMNS}
			FROM secret_versions v
			JOIN secrets s ON s.id = v.secret_id
			WHERE s.tenant_id = ? AND v.secret_id = ? AND v.status = 'active'
			"#
		);
		let row = sqlx::query(&sql)
			.bind(tenant_id)
			.bind(secret_id)
			.fetch_optional(&self.pool)
			.await?;

		Ok(row.as_ref().map(parse_version_row))
	}

	#[tracing::instrument(skip(self), fields(tenant_id = %tenant_id, secret_id = %secret_id, version = %version))]
	pub async fn get_version(
		&self,
		tenant_id: &str,
		secret_id: &str,
		version: i64,
	) -> Result<Option<SecretVersionRow>> {
		let sql = format!(
			r#"
			SELECT {VERSION_COLUMNS}
			FROM secret_versions v
			JOIN secrets s ON s.id = v.secret_id
			WHERE s.tenant_id = ? AND v.secret_id = ? AND v.version = ?
			"#
		);
		let row = sqlx::query(&sql)
			.bind(tenant_id)
			.bind(secret_id)
			.bind(version)
			.fetch_optional(&self.pool)
			.await?;

		Ok(row.as_ref().map(parse_version_row))
	}

	/// All versions of a secret, oldest first.
	#[tracing::instrument(skip(self), fields(tenant_id = %tenant_id, secret_id = %secret_id))]
	pub async fn list_versions(
		&self,
		tenant_id: &str,
		secret_id: &str,
	) -> Result<Vec<SecretVersionRow>> {
		let sql = format!(
			r#"
			SELECT {VERSION_COLUMNS}
			FROM secret_versions v
			JOIN secrets s ON s.id = v.secret_id
			WHERE s.tenant_id = ? AND v.secret_id = ?
			ORDER BY v.version ASC
			"#
		);
		let rows = sqlx::query(&sql)
			.bind(tenant_id)
			.bind(secret_id)
			.fetch_all(&self.pool)
			.await?;

		Ok(rows.iter().map(parse_version_row).collect())
	}

	/// Append a new active version and retire the previous one.
	///
	/// Steps, all in one transaction:
	/// 1. `next = MAX(version) + 1`
	/// 2. swap `current_version` from `expected_version` to `next`
	/// 3. flip the active version to inactive
	/// 4. insert the new version as active
	///
	/// Returns the new version number. A swap that matches no row is a
	/// `Conflict` if the secret still exists for this tenant, else `NotFound`.
	#[tracing::instrument(skip(self, params), fields(tenant_id = %params.tenant_id, secret_id = %params.secret_id, expected_version = params.expected_version))]
	pub async fn rotate_secret(&self, params: &RotateSecretParams) -> Result<i64> {
		self.rotate_in_tx(params).await.map_err(|e| match e {
			DbError::Sqlx(err) if is_busy_error(&err) => DbError::Conflict(format!(
				"secret {} is being rotated concurrently",
				params.secret_id
			)),
			other => other,
		})
	}

	async fn rotate_in_tx(&self, params: &RotateSecretParams) -> Result<i64> {
		// Writers serialize here; a late rotation then fails the swap.
		let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

		let next_version: i64 = sqlx::query_scalar(
			"SELECT COALESCE(MAX(version), 0) + 1 FROM secret_versions WHERE secret_id = ?",
		)
		.bind(&params.secret_id)
		.fetch_one(&mut *tx)
		.await?;

		let swapped = sqlx::query(
			r#"
			UPDATE secrets SET current_version = ?, updated_at = ?
			WHERE id = ? AND tenant_id = ? AND current_version = ?
			"#,
		)
		.bind(next_version)
		.bind(&params.version.created_at)
		.bind(&params.secret_id)
		.bind(&params.tenant_id)
		.bind(params.expected_version)
		.execute(&mut *tx)
		.await?;

		if swapped.rows_affected() == 0 {
			let exists: Option<i64> =
				sqlx::query_scalar("SELECT 1 FROM secrets WHERE id = ? AND tenant_id = ?")
					.bind(&params.secret_id)
					.bind(&params.tenant_id)
					.fetch_optional(&mut *tx)
					.await?;
			tx.rollback().await?;

			return Err(match exists {
				Some(_) => DbError::Conflict(format!(
					"secret {} changed concurrently; expected version {}",
					params.secret_id, params.expected_version
				)),
				None => DbError::NotFound(format!("secret {}", params.secret_id)),
			});
		}

		sqlx::query(
			"UPDATE secret_versions SET status = 'inactive' WHERE secret_id = ? AND status = 'active'",
		)
		.bind(&params.secret_id)
		.execute(&mut *tx)
		.await?;

		insert_version(&mut tx, &params.secret_id, next_version, &params.version).await?;

		tx.commit().await?;

		tracing::debug!(secret_id = %params.secret_id, version = next_version, "secret rotated");
		Ok(next_version)
	}

	#[tracing::instrument(skip(self, description), fields(tenant_id = %tenant_id, secret_id = %id))]
	pub async fn update_description(
		&self,
		tenant_id: &str,
		id: &str,
		description: Option<&str>,
		updated_at: &str,
	) -> Result<bool> {
		let result = sqlx::query(
			"UPDATE secrets SET description = ?, updated_at = ? WHERE id = ? AND tenant_id = ?",
		)
		.bind(description)
		.bind(updated_at)
		.bind(id)
		.bind(tenant_id)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	/// Delete a secret and all of its versions. Returns `false` if the tenant
	/// has no such secret.
	#[tracing::instrument(skip(self), fields(tenant_id = %tenant_id, secret_id = %id))]
	pub async fn delete_secret(&self, tenant_id: &str, id: &str) -> Result<bool> {
		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
			DELETE FROM secret_versions
			WHERE secret_id IN (SELECT id FROM secrets WHERE id = ? AND tenant_id = ?)
			"#,
		)
		.bind(id)
		.bind(tenant_id)
		.execute(&mut *tx)
		.await?;

		let result = sqlx::query("DELETE FROM secrets WHERE id = ? AND tenant_id = ?")
			.bind(id)
			.bind(tenant_id)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::debug!(secret_id = %id, "secret deleted");
		}
		Ok(deleted)
	}
}

async fn insert_version(
	tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
	secret_id: &str,
	version: i64,
	params: &NewVersionParams,
) -> Result<()> {
	sqlx::query(
		r#"
		INSERT INTO secret_versions (id, secret_id, version, status, ciphertext, iv, tag, key_version, created_at)
		VALUES (?, ?, ?, 'active', ?, ?, ?, ?, ?)
		"#,
	)
	.bind(&params.id)
	.bind(secret_id)
	.bind(version)
	.bind(&params.ciphertext)
	.bind(&params.iv)
	.bind(&params.tag)
	.bind(&params.key_version)
	.bind(&params.created_at)
	.execute(&mut **tx)
	.await
	.map_err(|e| conflict_or_sqlx(e, || format!("version {version} of secret {secret_id} already exists")))?;

	Ok(())
}

#[async_trait]
impl SecretsStore for SecretsRepository {
	async fn create_secret(
		&self,
		secret: &CreateSecretParams,
		version: &NewVersionParams,
	) -> Result<()> {
		SecretsRepository::create_secret(self, secret, version).await
	}

	async fn get_secret_by_id(&self, tenant_id: &str, id: &str) -> Result<Option<SecretRow>> {
		SecretsRepository::get_secret_by_id(self, tenant_id, id).await
	}

	async fn get_secret_by_name(&self, tenant_id: &str, name: &str) -> Result<Option<SecretRow>> {
		SecretsRepository::get_secret_by_name(self, tenant_id, name).await
	}

	async fn list_secrets(&self, tenant_id: &str) -> Result<Vec<SecretRow>> {
		SecretsRepository::list_secrets(self, tenant_id).await
	}

	async fn get_active_version(
		&self,
		tenant_id: &str,
		secret_id: &str,
	) -> Result<Option<SecretVersionRow>> {
		SecretsRepository::get_active_version(self, tenant_id, secret_id).await
	}

	async fn get_version(
		&self,
		tenant_id: &str,
		secret_id: &str,
		version: i64,
	) -> Result<Option<SecretVersionRow>> {
		SecretsRepository::get_version(self, tenant_id, secret_id, version).await
	}

	async fn list_versions(
		&self,
		tenant_id: &str,
		secret_id: &str,
	) -> Result<Vec<SecretVersionRow>> {
		SecretsRepository::list_versions(self, tenant_id, secret_id).await
	}

	async fn rotate_secret(&self, params: &RotateSecretParams) -> Result<i64> {
		SecretsRepository::rotate_secret(self, params).await
	}

	async fn update_description(
		&self,
		tenant_id: &str,
		id: &str,
		description: Option<&str>,
		updated_at: &str,
	) -> Result<bool> {
		SecretsRepository::update_description(self, tenant_id, id, description, updated_at).await
	}

	async fn delete_secret(&self, tenant_id: &str, id: &str) -> Result<bool> {
		SecretsRepository::delete_secret(self, tenant_id, id).await
	}
}

fn parse_secret_row(row: &sqlx::sqlite::SqliteRow) -> SecretRow {
	SecretRow {
		id: row.get("id"),
		tenant_id: row.get("tenant_id"),
		name: row.get("name"),
		kind: row.get("kind"),
		description: row.get("description"),
		current_version: row.get("current_version"),
		created_at: row.get("created_at"),
		updated_at: row.get("updated_at"),
		last_rotated_at: row.get("last_rotated_at"),
	}
}

fn parse_version_row(row: &sqlx::sqlite::SqliteRow) -> SecretVersionRow {
	SecretVersionRow {
		id: row.get("id"),
		secret_id: row.get("secret_id"),
		version: row.get("version"),
		status: row.get("status"),
		ciphertext: row.get("ciphertext"),
		iv: row.get("iv"),
		tag: row.get("tag"),
		key_version: row.get("key_version"),
		created_at: row.get("created_at"),
	}
}
