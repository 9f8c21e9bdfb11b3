// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key tokens and entities.
//!
//! A token is `<prefix>_<64 hex chars>`: 32 bytes from the thread RNG,
//! hex-encoded. It is shown to the caller once; the database keeps only the
//! SHA-256 hex digest of the whole string plus a display-safe `partial_key`.
//! The digest is a unique indexed column and is the only lookup path.

use chrono::{DateTime, Utc};
use keyward_common_secret::SecretString;
use keyward_server_db::ApiKeyRow;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::AuthError;
use crate::types::{ApiKeyId, OrgId, UserId};

/// Number of random bytes in a token (64 hex chars).
pub const API_KEY_BYTES: usize = 32;

/// Maximum token prefix length.
pub const MAX_PREFIX_LEN: usize = 32;

/// Maximum length of a single scope string.
pub const MAX_SCOPE_LEN: usize = 128;

/// Maximum length of a key's display name.
pub const MAX_NAME_LEN: usize = 128;

/// Lifecycle state of an API key. `Revoked` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
	Active,
	Revoked,
}

impl ApiKeyStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			ApiKeyStatus::Active => "active",
			ApiKeyStatus::Revoked => "revoked",
		}
	}
}

impl fmt::Display for ApiKeyStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ApiKeyStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"active" => Ok(ApiKeyStatus::Active),
			"revoked" => Ok(ApiKeyStatus::Revoked),
			other => Err(format!("unknown API key status: {other}")),
		}
	}
}

/// A stored API key, including its token hash.
#[derive(Debug, Clone)]
pub struct ApiKey {
	pub id: ApiKeyId,
	pub user_id: UserId,
	pub org_id: Option<OrgId>,
	pub name: String,
	pub prefix: String,
	/// SHA-256 hex digest of the full token.
	pub token_hash: String,
	pub partial_key: String,
	pub scopes: Vec<String>,
	pub status: ApiKeyStatus,
	pub expires_at: Option<DateTime<Utc>>,
	pub last_used_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl ApiKey {
	pub fn is_active(&self) -> bool {
		self.status == ApiKeyStatus::Active
	}

	/// A key with `expires_at <= now` is expired.
	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		self.expires_at.is_some_and(|expires_at| expires_at <= now)
	}

	/// Whether a token for this key should authenticate at `now`.
	pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
		self.is_active() && !self.is_expired_at(now)
	}

	pub fn has_scope(&self, scope: &str) -> bool {
		self.scopes.iter().any(|s| s == scope)
	}
}

impl TryFrom<ApiKeyRow> for ApiKey {
	type Error = AuthError;

	fn try_from(row: ApiKeyRow) -> Result<Self, Self::Error> {
		let id = row
			.id
			.parse::<ApiKeyId>()
			.map_err(|_| AuthError::CorruptedData(format!("invalid api key id: {}", row.id)))?;
		let user_id = UserId::new(row.user_id)
			.map_err(|e| AuthError::CorruptedData(format!("api key {id}: {e}")))?;
		let org_id = row
			.org_id
			.map(OrgId::new)
			.transpose()
			.map_err(|e| AuthError::CorruptedData(format!("api key {id}: {e}")))?;
		let scopes: Vec<String> = serde_json::from_str(&row.scopes)
			.map_err(|e| AuthError::CorruptedData(format!("api key {id}: invalid scopes: {e}")))?;
		let status = row
			.status
			.parse::<ApiKeyStatus>()
			.map_err(|e| AuthError::CorruptedData(format!("api key {id}: {e}")))?;

		Ok(ApiKey {
			id,
			user_id,
			org_id,
			name: row.name,
			prefix: row.prefix,
			token_hash: row.token_hash,
			partial_key: row.partial_key,
			scopes,
			status,
			expires_at: parse_optional_timestamp(id, "expires_at", row.expires_at.as_deref())?,
			last_used_at: parse_optional_timestamp(id, "last_used_at", row.last_used_at.as_deref())?,
			created_at: parse_timestamp(id, "created_at", &row.created_at)?,
			updated_at: parse_timestamp(id, "updated_at", &row.updated_at)?,
		})
	}
}

fn parse_timestamp(id: ApiKeyId, field: &str, value: &str) -> Result<DateTime<Utc>, AuthError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|_| AuthError::CorruptedData(format!("api key {id}: invalid {field}: {value}")))
}

fn parse_optional_timestamp(
	id: ApiKeyId,
	field: &str,
	value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, AuthError> {
	value.map(|v| parse_timestamp(id, field, v)).transpose()
}

/// Display-safe view of an API key. Never carries the token or its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyMetadata {
	pub id: ApiKeyId,
	pub user_id: UserId,
	pub org_id: Option<OrgId>,
	pub name: String,
	pub prefix: String,
	pub partial_key: String,
	pub scopes: Vec<String>,
	pub status: ApiKeyStatus,
	pub expires_at: Option<DateTime<Utc>>,
	pub last_used_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyMetadata {
	fn from(key: ApiKey) -> Self {
		Self {
			id: key.id,
			user_id: key.user_id,
			org_id: key.org_id,
			name: key.name,
			prefix: key.prefix,
			partial_key: key.partial_key,
			scopes: key.scopes,
			status: key.status,
			expires_at: key.expires_at,
			last_used_at: key.last_used_at,
			created_at: key.created_at,
			updated_at: key.updated_at,
		}
	}
}

/// Result of issuing a key. `token` is the only copy of the credential.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedApiKey {
	pub token: SecretString,
	pub metadata: ApiKeyMetadata,
}

/// Identity attached to a successfully verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedApiKey {
	pub user_id: UserId,
	pub api_key_id: ApiKeyId,
	pub scopes: Vec<String>,
}

impl VerifiedApiKey {
	pub fn has_scope(&self, scope: &str) -> bool {
		self.scopes.iter().any(|s| s == scope)
	}
}

/// Validate a token prefix: 1-32 characters of `[A-Za-z0-9_]`.
pub fn validate_prefix(prefix: &str) -> Result<(), AuthError> {
	if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN {
		return Err(AuthError::Validation(format!(
			"API key prefix must be 1-{MAX_PREFIX_LEN} characters"
		)));
	}
	if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
		return Err(AuthError::Validation(
			"API key prefix may only contain [A-Za-z0-9_]".to_string(),
		));
	}
	Ok(())
}

fn is_scope_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '*' | '-')
}

/// Validate scopes and drop duplicates, keeping first-seen order.
pub fn normalize_scopes<I, S>(scopes: I) -> Result<Vec<String>, AuthError>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	let mut out: Vec<String> = Vec::new();
	for scope in scopes {
		let scope = scope.into();
		if scope.is_empty() || scope.len() > MAX_SCOPE_LEN {
			return Err(AuthError::Validation(format!(
				"scope must be 1-{MAX_SCOPE_LEN} characters"
			)));
		}
		if !scope.chars().all(is_scope_char) {
			return Err(AuthError::Validation(format!(
				"scope '{scope}' may only contain [A-Za-z0-9_.:*-]"
			)));
		}
		if !out.contains(&scope) {
			out.push(scope);
		}
	}
	Ok(out)
}

/// Generate a fresh token for `prefix`.
///
/// Returns the full token and its random hex part. The prefix is assumed to
/// be validated.
pub fn generate_api_token(prefix: &str) -> (SecretString, SecretString) {
	let mut bytes = [0u8; API_KEY_BYTES];
	rand::thread_rng().fill_bytes(&mut bytes);
	let random = hex::encode(bytes);
	let token = format!("{prefix}_{random}");
	(SecretString::new(token), SecretString::new(random))
}

/// SHA-256 hex digest of a presented token.
pub fn hash_api_key_token(token: &str) -> String {
	hex::encode(Sha256::digest(token.as_bytes()))
}

/// `<prefix>_` + first 4 + `...` + last 4 characters of the random part.
pub fn partial_key(prefix: &str, random: &str) -> String {
	let chars: Vec<char> = random.chars().collect();
	if chars.len() <= 8 {
		return format!("{prefix}_...");
	}
	let head: String = chars[..4].iter().collect();
	let tail: String = chars[chars.len() - 4..].iter().collect();
	format!("{prefix}_{head}...{tail}")
}
