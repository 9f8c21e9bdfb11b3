// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key repository for database operations.
//!
//! API keys are user-owned bearer credentials. Only the SHA-256 hash of a
//! token is stored; lookups during verification go through the unique
//! `token_hash` column. Every other query filters on `(user_id, id)`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{conflict_or_sqlx, Result};

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_REVOKED: &str = "revoked";

const API_KEY_COLUMNS: &str = r#"
	id, user_id, org_id, name, prefix, token_hash, partial_key, scopes, status,
	expires_at, last_used_at, created_at, updated_at
"#;

/// Stored API key row. `scopes` is a JSON array of strings.
#[derive(Debug, Clone)]
pub struct ApiKeyRow {
	pub id: String,
	pub user_id: String,
	pub org_id: Option<String>,
	pub name: String,
	pub prefix: String,
	pub token_hash: String,
	pub partial_key: String,
	pub scopes: String,
	pub status: String,
	pub expires_at: Option<String>,
	pub last_used_at: Option<String>,
	pub created_at: String,
	pub updated_at: String,
}

/// Parameters for inserting an API key.
#[derive(Debug, Clone)]
pub struct CreateApiKeyParams {
	pub id: String,
	pub user_id: String,
	pub org_id: Option<String>,
	pub name: String,
	pub prefix: String,
	pub token_hash: String,
	pub partial_key: String,
	pub scopes: Vec<String>,
	pub expires_at: Option<String>,
	pub created_at: String,
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
	async fn create_api_key(&self, params: &CreateApiKeyParams) -> Result<()>;
	async fn get_api_key(&self, user_id: &str, id: &str) -> Result<Option<ApiKeyRow>>;
	async fn get_api_key_by_hash(&self, token_hash: &str) -> Result<Option<ApiKeyRow>>;
	async fn list_api_keys(&self, user_id: &str) -> Result<Vec<ApiKeyRow>>;
	async fn revoke_api_key(&self, user_id: &str, id: &str) -> Result<bool>;
	async fn delete_api_key(&self, user_id: &str, id: &str) -> Result<bool>;
	async fn update_last_used(&self, id: &str) -> Result<()>;
}

/// Repository for API key database operations.
///
/// All tokens are stored as hashes, never in plaintext.
#[derive(Clone)]
pub struct ApiKeyRepository {
	pool: SqlitePool,
}

impl ApiKeyRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a new API key.
	///
	/// # Database Constraints
	/// - `id` must be unique
	/// - `token_hash` must be unique (a collision is reported as `Conflict`)
	#[tracing::instrument(skip(self, params), fields(api_key_id = %params.id, user_id = %params.user_id))]
	pub async fn create_api_key(&self, params: &CreateApiKeyParams) -> Result<()> {
		let scopes_json = serde_json::to_string(&params.scopes)?;

		sqlx::query(
			r#"
			INSERT INTO api_keys (
				id, user_id, org_id, name, prefix, token_hash, partial_key, scopes,
				status, expires_at, last_used_at, created_at, updated_at
			) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'active', ?, NULL, ?, ?)
			"#,
		)
		.bind(&params.id)
		.bind(&params.user_id)
		.bind(&params.org_id)
		.bind(&params.name)
		.bind(&params.prefix)
		.bind(&params.token_hash)
		.bind(&params.partial_key)
		.bind(&scopes_json)
		.bind(&params.expires_at)
		.bind(&params.created_at)
		.bind(&params.created_at)
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_or_sqlx(e, || format!("api key {} already exists", params.id)))?;

		tracing::debug!(api_key_id = %params.id, user_id = %params.user_id, "API key created");
		Ok(())
	}

	/// Get a key owned by `user_id`. Returns the key regardless of status.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, api_key_id = %id))]
	pub async fn get_api_key(&self, user_id: &str, id: &str) -> Result<Option<ApiKeyRow>> {
		let sql = format!("SELECT {API_KEY_COLUMNS} FROM api_keys WHERE user_id = ? AND id = ?");
		let row = sqlx::query(&sql)
			.bind(user_id)
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;

		Ok(row.as_ref().map(parse_api_key_row))
	}

	/// Look up a key by token hash. The caller checks status and expiry.
	#[tracing::instrument(skip(self, token_hash))]
	pub async fn get_api_key_by_hash(&self, token_hash: &str) -> Result<Option<ApiKeyRow>> {
		let sql = format!("SELECT {API_KEY_COLUMNS} FROM api_keys WHERE token_hash = ?");
		let row = sqlx::query(&sql)
			.bind(token_hash)
			.fetch_optional(&self.pool)
			.await?;

		Ok(row.as_ref().map(parse_api_key_row))
	}

	/// List a user's keys, newest first.
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list_api_keys(&self, user_id: &str) -> Result<Vec<ApiKeyRow>> {
		let sql = format!(
			"SELECT {API_KEY_COLUMNS} FROM api_keys WHERE user_id = ? ORDER BY created_at DESC, id ASC"
		);
		let rows = sqlx::query(&sql)
			.bind(user_id)
			.fetch_all(&self.pool)
			.await?;

		Ok(rows.iter().map(parse_api_key_row).collect())
	}

	/// Mark an active key revoked. Returns `false` if no active key matched.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, api_key_id = %id))]
	pub async fn revoke_api_key(&self, user_id: &str, id: &str) -> Result<bool> {
		let now = Utc::now().to_rfc3339();
		let result = sqlx::query(
			r#"
			UPDATE api_keys SET status = 'revoked', updated_at = ?
			WHERE user_id = ? AND id = ? AND status = 'active'
			"#,
		)
		.bind(&now)
		.bind(user_id)
		.bind(id)
		.execute(&self.pool)
		.await?;

		let revoked = result.rows_affected() > 0;
		if revoked {
			tracing::debug!(api_key_id = %id, "API key revoked");
		}
		Ok(revoked)
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, api_key_id = %id))]
	pub async fn delete_api_key(&self, user_id: &str, id: &str) -> Result<bool> {
		let result = sqlx::query("DELETE FROM api_keys WHERE user_id = ? AND id = ?")
			.bind(user_id)
			.bind(id)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(api_key_id = %id))]
	pub async fn update_last_used(&self, id: &str) -> Result<()> {
		let now = Utc::now().to_rfc3339();
		sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
			.bind(&now)
			.bind(id)
			.execute(&self.pool)
			.await?;

		Ok(())
	}
}

#[async_trait]
impl ApiKeyStore for ApiKeyRepository {
	async fn create_api_key(&self, params: &CreateApiKeyParams) -> Result<()> {
		self.create_api_key(params).await
	}

	async fn get_api_key(&self, user_id: &str, id: &str) -> Result<Option<ApiKeyRow>> {
		self.get_api_key(user_id, id).await
	}

	async fn get_api_key_by_hash(&self, token_hash: &str) -> Result<Option<ApiKeyRow>> {
		self.get_api_key_by_hash(token_hash).await
	}

	async fn list_api_keys(&self, user_id: &str) -> Result<Vec<ApiKeyRow>> {
		self.list_api_keys(user_id).await
	}

	async fn revoke_api_key(&self, user_id: &str, id: &str) -> Result<bool> {
		self.revoke_api_key(user_id, id).await
	}

	async fn delete_api_key(&self, user_id: &str, id: &str) -> Result<bool> {
		self.delete_api_key(user_id, id).await
	}

	async fn update_last_used(&self, id: &str) -> Result<()> {
		self.update_last_used(id).await
	}
}

fn parse_api_key_row(row: &sqlx::sqlite::SqliteRow) -> ApiKeyRow {
	ApiKeyRow {
		id: row.get("id"),
		user_id: row.get("user_id"),
		org_id: row.get("org_id"),
		name: row.get("name"),
		prefix: row.get("prefix"),
		token_hash: row.get("token_hash"),
		partial_key: row.get("partial_key"),
		scopes: row.get("scopes"),
		status: row.get("status"),
		expires_at: row.get("expires_at"),
		last_used_at: row.get("last_used_at"),
		created_at: row.get("created_at"),
		updated_at: row.get("updated_at"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::DbError;
	use crate::testing::create_migrated_test_pool;

	async fn make_repo() -> ApiKeyRepository {
		ApiKeyRepository::new(create_migrated_test_pool().await)
	}

	fn params(id: &str, user_id: &str, token_hash: &str) -> CreateApiKeyParams {
		CreateApiKeyParams {
			id: id.to_string(),
			user_id: user_id.to_string(),
			org_id: None,
			name: "ci deploy".to_string(),
			prefix: "kw".to_string(),
			token_hash: token_hash.to_string(),
			partial_key: "kw_abcd...wxyz".to_string(),
			scopes: vec!["secrets:read".to_string(), "secrets:write".to_string()],
			expires_at: None,
			created_at: Utc::now().to_rfc3339(),
		}
	}

	#[tokio::test]
	async fn test_create_and_lookup_by_hash() {
		let repo = make_repo().await;
		repo.create_api_key(&params("key-1", "user-1", "hash-1")).await.unwrap();

		let row = repo.get_api_key_by_hash("hash-1").await.unwrap().unwrap();
		assert_eq!(row.id, "key-1");
		assert_eq!(row.status, STATUS_ACTIVE);
		assert_eq!(row.scopes, r#"["secrets:read","secrets:write"]"#);
		assert!(row.last_used_at.is_none());

		assert!(repo.get_api_key_by_hash("hash-2").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_duplicate_hash_conflicts() {
		let repo = make_repo().await;
		repo.create_api_key(&params("key-1", "user-1", "hash-1")).await.unwrap();
		let err = repo
			.create_api_key(&params("key-2", "user-1", "hash-1"))
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
	}

	#[tokio::test]
	async fn test_queries_are_owner_scoped() {
		let repo = make_repo().await;
		repo.create_api_key(&params("key-1", "user-1", "hash-1")).await.unwrap();

		assert!(repo.get_api_key("user-2", "key-1").await.unwrap().is_none());
		assert!(repo.list_api_keys("user-2").await.unwrap().is_empty());
		assert!(!repo.revoke_api_key("user-2", "key-1").await.unwrap());
		assert!(!repo.delete_api_key("user-2", "key-1").await.unwrap());

		assert!(repo.get_api_key("user-1", "key-1").await.unwrap().is_some());
	}

	#[tokio::test]
	async fn test_revoke_is_one_way() {
		let repo = make_repo().await;
		repo.create_api_key(&params("key-1", "user-1", "hash-1")).await.unwrap();

		assert!(repo.revoke_api_key("user-1", "key-1").await.unwrap());
		assert!(!repo.revoke_api_key("user-1", "key-1").await.unwrap());

		let row = repo.get_api_key("user-1", "key-1").await.unwrap().unwrap();
		assert_eq!(row.status, STATUS_REVOKED);
	}

	#[tokio::test]
	async fn test_update_last_used_and_delete() {
		let repo = make_repo().await;
		repo.create_api_key(&params("key-1", "user-1", "hash-1")).await.unwrap();

		repo.update_last_used("key-1").await.unwrap();
		let row = repo.get_api_key("user-1", "key-1").await.unwrap().unwrap();
		assert!(row.last_used_at.is_some());

		assert!(repo.delete_api_key("user-1", "key-1").await.unwrap());
		assert!(repo.get_api_key_by_hash("hash-1").await.unwrap().is_none());
	}
}
