// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the secrets vault.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{SecretsError, SecretsResult};

pub use keyward_server_auth::TenantId;

/// Maximum length of a secret name.
pub const MAX_SECRET_NAME_LEN: usize = 128;

/// Maximum size of a secret value in bytes.
pub const MAX_SECRET_VALUE_LEN: usize = 64 * 1024;

/// Maximum length of a secret description.
pub const MAX_DESCRIPTION_LEN: usize = 1024;

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			pub fn into_inner(self) -> Uuid {
				self.0
			}

			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(SecretId, "Unique identifier for a secret.");
define_id_type!(SecretVersionId, "Unique identifier for a secret version.");

/// What a secret is used for. Informational only; all kinds are encrypted
/// the same way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretKind {
	ApiKey,
	SigningSecret,
	ProviderToken,
	#[default]
	Generic,
}

impl SecretKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			SecretKind::ApiKey => "api_key",
			SecretKind::SigningSecret => "signing_secret",
			SecretKind::ProviderToken => "provider_token",
			SecretKind::Generic => "generic",
		}
	}
}

impl fmt::Display for SecretKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for SecretKind {
	type Err = SecretsError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"api_key" => Ok(SecretKind::ApiKey),
			"signing_secret" => Ok(SecretKind::SigningSecret),
			"provider_token" => Ok(SecretKind::ProviderToken),
			"generic" => Ok(SecretKind::Generic),
			other => Err(SecretsError::Validation(format!(
				"unknown secret kind: {other}"
			))),
		}
	}
}

/// Whether a version is the one currently served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
	Active,
	Inactive,
}

impl VersionStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			VersionStatus::Active => "active",
			VersionStatus::Inactive => "inactive",
		}
	}
}

impl fmt::Display for VersionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for VersionStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"active" => Ok(VersionStatus::Active),
			"inactive" => Ok(VersionStatus::Inactive),
			other => Err(format!("unknown version status: {other}")),
		}
	}
}

/// How a caller names a secret within its tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretLookup {
	Id(SecretId),
	Name(String),
}

impl SecretLookup {
	/// A UUID is taken as an id, anything else as a name.
	pub fn parse(s: &str) -> Self {
		match s.parse::<SecretId>() {
			Ok(id) => SecretLookup::Id(id),
			Err(_) => SecretLookup::Name(s.to_string()),
		}
	}
}

impl fmt::Display for SecretLookup {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SecretLookup::Id(id) => write!(f, "{id}"),
			SecretLookup::Name(name) => f.write_str(name),
		}
	}
}

impl From<SecretId> for SecretLookup {
	fn from(id: SecretId) -> Self {
		SecretLookup::Id(id)
	}
}

impl From<&str> for SecretLookup {
	fn from(name: &str) -> Self {
		SecretLookup::Name(name.to_string())
	}
}

/// Secret metadata. Never carries ciphertext or plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMetadata {
	pub id: SecretId,
	pub tenant_id: TenantId,
	pub name: String,
	pub kind: SecretKind,
	pub description: Option<String>,
	/// Number of the active version.
	pub current_version: u32,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	/// `created_at` of the newest version.
	pub last_rotated_at: Option<DateTime<Utc>>,
}

/// Public view of one version of a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretVersion {
	pub id: SecretVersionId,
	pub secret_id: SecretId,
	pub version: u32,
	pub status: VersionStatus,
	/// Label of the master key the version was encrypted under.
	pub key_version: String,
	pub created_at: DateTime<Utc>,
}

impl SecretVersion {
	pub fn is_active(&self) -> bool {
		self.status == VersionStatus::Active
	}
}

/// Validate a secret name: 1-128 characters of `[A-Za-z0-9._-]`, starting
/// with an ASCII letter or digit.
///
/// Names that parse as a UUID are rejected so [`SecretLookup::parse`] never
/// mistakes a name for an id.
pub fn validate_secret_name(name: &str) -> SecretsResult<()> {
	if name.is_empty() || name.len() > MAX_SECRET_NAME_LEN {
		return Err(SecretsError::Validation(format!(
			"secret name must be 1-{MAX_SECRET_NAME_LEN} characters"
		)));
	}
	if !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
		return Err(SecretsError::Validation(
			"secret name must start with a letter or digit".to_string(),
		));
	}
	if !name
		.chars()
		.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
	{
		return Err(SecretsError::Validation(
			"secret name may only contain [A-Za-z0-9._-]".to_string(),
		));
	}
	if name.parse::<SecretId>().is_ok() {
		return Err(SecretsError::Validation(
			"secret name must not be a UUID".to_string(),
		));
	}
	Ok(())
}

/// Validate a plaintext value: non-empty and at most 64 KiB.
pub fn validate_secret_value(value: &[u8]) -> SecretsResult<()> {
	if value.is_empty() {
		return Err(SecretsError::Validation(
			"secret value must not be empty".to_string(),
		));
	}
	if value.len() > MAX_SECRET_VALUE_LEN {
		return Err(SecretsError::Validation(format!(
			"secret value exceeds {MAX_SECRET_VALUE_LEN} bytes"
		)));
	}
	Ok(())
}

pub fn validate_description(description: Option<&str>) -> SecretsResult<()> {
	match description {
		Some(d) if d.len() > MAX_DESCRIPTION_LEN => Err(SecretsError::Validation(format!(
			"description exceeds {MAX_DESCRIPTION_LEN} bytes"
		))),
		_ => Ok(()),
	}
}
