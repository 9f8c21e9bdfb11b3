// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key issuance, verification and lifecycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use keyward_server_audit::{AuditEvent, AuditEventType, AuditSink, TracingAuditSink};
use keyward_server_db::{ApiKeyStore, CreateApiKeyParams};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::api_key::{
	generate_api_token, hash_api_key_token, normalize_scopes, partial_key, validate_prefix, ApiKey,
	ApiKeyMetadata, ApiKeyStatus, IssuedApiKey, VerifiedApiKey, MAX_NAME_LEN,
};
use crate::error::{AuthError, AuthResult};
use crate::types::{ApiKeyId, OrgId, UserId};

/// Request to issue a new API key.
#[derive(Debug, Clone)]
pub struct CreateApiKeyRequest {
	pub user_id: UserId,
	pub org_id: Option<OrgId>,
	pub name: String,
	pub prefix: String,
	pub scopes: Vec<String>,
	pub expires_at: Option<DateTime<Utc>>,
}

/// Issues and verifies API keys for user owners.
///
/// Management operations are scoped by `user_id`: a key owned by another user
/// behaves exactly like a missing key.
pub struct ApiKeyService<S: ApiKeyStore + 'static> {
	store: Arc<S>,
	audit: Arc<dyn AuditSink>,
}

impl<S: ApiKeyStore + 'static> ApiKeyService<S> {
	pub fn new(store: Arc<S>) -> Self {
		Self {
			store,
			audit: Arc::new(TracingAuditSink::new()),
		}
	}

	pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
		self.audit = audit;
		self
	}

	/// Issue a key. The returned token is never stored and cannot be recovered.
	#[instrument(skip(self, request), fields(user_id = %request.user_id, name = %request.name))]
	pub async fn create_api_key(&self, request: CreateApiKeyRequest) -> AuthResult<IssuedApiKey> {
		let name = request.name.trim().to_string();
		if name.is_empty() || name.len() > MAX_NAME_LEN {
			return Err(AuthError::Validation(format!(
				"API key name must be 1-{MAX_NAME_LEN} characters"
			)));
		}
		validate_prefix(&request.prefix)?;
		let scopes = normalize_scopes(request.scopes)?;

		let now = Utc::now();
		if let Some(expires_at) = request.expires_at {
			if expires_at <= now {
				return Err(AuthError::Validation(
					"expires_at must be in the future".to_string(),
				));
			}
		}

		let (token, random) = generate_api_token(&request.prefix);
		let id = ApiKeyId::generate();
		let params = CreateApiKeyParams {
			id: id.to_string(),
			user_id: request.user_id.to_string(),
			org_id: request.org_id.as_ref().map(ToString::to_string),
			name: name.clone(),
			prefix: request.prefix.clone(),
			token_hash: hash_api_key_token(token.expose()),
			partial_key: partial_key(&request.prefix, random.expose()),
			scopes: scopes.clone(),
			expires_at: request.expires_at.map(|t| t.to_rfc3339()),
			created_at: now.to_rfc3339(),
		};
		self.store.create_api_key(&params).await?;

		let metadata = ApiKeyMetadata {
			id,
			user_id: request.user_id,
			org_id: request.org_id,
			name,
			prefix: request.prefix,
			partial_key: params.partial_key,
			scopes,
			status: ApiKeyStatus::Active,
			expires_at: request.expires_at,
			last_used_at: None,
			created_at: now,
			updated_at: now,
		};

		self.audit.publish(
			&AuditEvent::builder(AuditEventType::ApiKeyCreated)
				.actor(metadata.user_id.as_str())
				.resource("api_key", id.to_string())
				.action("create")
				.details(json!({
					"name": metadata.name,
					"scopes": metadata.scopes,
					"expires_at": metadata.expires_at.map(|t| t.to_rfc3339()),
				}))
				.build(),
		);
		info!(api_key_id = %id, "Created API key");

		Ok(IssuedApiKey { token, metadata })
	}

	/// Check a presented token.
	///
	/// Returns `None` for unknown, revoked and expired tokens alike. On
	/// success `last_used_at` is updated in a detached task; failures there
	/// are logged and never affect the result.
	#[instrument(skip(self, token))]
	pub async fn verify_api_key_token(&self, token: &str) -> AuthResult<Option<VerifiedApiKey>> {
		let hash = hash_api_key_token(token);
		let Some(row) = self.store.get_api_key_by_hash(&hash).await? else {
			debug!("API key not found");
			return Ok(None);
		};
		let key = ApiKey::try_from(row)?;

		if !key.is_usable_at(Utc::now()) {
			debug!(api_key_id = %key.id, status = %key.status, "API key rejected");
			return Ok(None);
		}

		let store = Arc::clone(&self.store);
		let key_id = key.id.to_string();
		tokio::spawn(async move {
			if let Err(e) = store.update_last_used(&key_id).await {
				warn!(api_key_id = %key_id, error = %e, "Failed to update API key last_used_at");
			}
		});

		Ok(Some(VerifiedApiKey {
			user_id: key.user_id,
			api_key_id: key.id,
			scopes: key.scopes,
		}))
	}

	/// Revoke a key. Returns `false` if it was already revoked.
	#[instrument(skip_all, fields(user_id = %user_id, api_key_id = %id))]
	pub async fn revoke_api_key(&self, user_id: &UserId, id: ApiKeyId) -> AuthResult<bool> {
		if self.store.revoke_api_key(user_id.as_str(), &id.to_string()).await? {
			self.audit.publish(
				&AuditEvent::builder(AuditEventType::ApiKeyRevoked)
					.actor(user_id.as_str())
					.resource("api_key", id.to_string())
					.action("revoke")
					.build(),
			);
			info!("Revoked API key");
			return Ok(true);
		}

		match self.store.get_api_key(user_id.as_str(), &id.to_string()).await? {
			Some(_) => Ok(false),
			None => Err(AuthError::NotFound(id.to_string())),
		}
	}

	#[instrument(skip_all, fields(user_id = %user_id, api_key_id = %id))]
	pub async fn delete_api_key(&self, user_id: &UserId, id: ApiKeyId) -> AuthResult<()> {
		if !self.store.delete_api_key(user_id.as_str(), &id.to_string()).await? {
			return Err(AuthError::NotFound(id.to_string()));
		}

		self.audit.publish(
			&AuditEvent::builder(AuditEventType::ApiKeyDeleted)
				.actor(user_id.as_str())
				.resource("api_key", id.to_string())
				.action("delete")
				.build(),
		);
		info!("Deleted API key");
		Ok(())
	}

	/// Keys owned by `user_id`, newest first.
	pub async fn list_api_keys(&self, user_id: &UserId) -> AuthResult<Vec<ApiKeyMetadata>> {
		self
			.store
			.list_api_keys(user_id.as_str())
			.await?
			.into_iter()
			.map(|row| ApiKey::try_from(row).map(ApiKeyMetadata::from))
			.collect()
	}

	pub async fn get_api_key(
		&self,
		user_id: &UserId,
		id: ApiKeyId,
	) -> AuthResult<Option<ApiKeyMetadata>> {
		self
			.store
			.get_api_key(user_id.as_str(), &id.to_string())
			.await?
			.map(|row| ApiKey::try_from(row).map(ApiKeyMetadata::from))
			.transpose()
	}
}
