// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identifier types.
//!
//! Owner identifiers (`TenantId`, `UserId`, `OrgId`) are opaque strings
//! supplied by the embedding application. Keyward only requires them to be
//! non-empty, bounded, and free of control characters, because they appear in
//! SQL filters, HKDF `info` strings and audit records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Maximum length in bytes of an owner identifier.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// An owner identifier failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {reason}")]
pub struct InvalidIdentifier {
	pub kind: &'static str,
	pub reason: String,
}

fn validate_identifier(kind: &'static str, value: &str) -> Result<(), InvalidIdentifier> {
	let reason = if value.is_empty() {
		"must not be empty".to_string()
	} else if value.len() > MAX_IDENTIFIER_LEN {
		format!("must be at most {MAX_IDENTIFIER_LEN} bytes")
	} else if value.chars().any(char::is_control) {
		"must not contain control characters".to_string()
	} else {
		return Ok(());
	};
	Err(InvalidIdentifier { kind, reason })
}

macro_rules! define_owner_id_type {
	($name:ident, $kind:expr, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);

		impl $name {
			/// Validate and wrap an identifier.
			pub fn new(id: impl Into<String>) -> Result<Self, InvalidIdentifier> {
				let id = id.into();
				validate_identifier($kind, &id)?;
				Ok(Self(id))
			}

			pub fn as_str(&self) -> &str {
				&self.0
			}

			pub fn into_inner(self) -> String {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl FromStr for $name {
			type Err = InvalidIdentifier;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}

		impl TryFrom<String> for $name {
			type Error = InvalidIdentifier;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}

		impl From<$name> for String {
			fn from(id: $name) -> Self {
				id.0
			}
		}

		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
	};
}

define_owner_id_type!(TenantId, "tenant id", "Identifier of the tenant that owns a secret.");
define_owner_id_type!(UserId, "user id", "Identifier of the user that owns an API key.");
define_owner_id_type!(OrgId, "org id", "Identifier of the organization an API key is issued for.");

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

define_id_type!(ApiKeyId, "Unique identifier for an API key.");

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	mod owner_ids {
		use super::*;

		#[test]
		fn accepts_typical_identifiers() {
			assert_eq!(TenantId::new("acme-prod").unwrap().as_str(), "acme-prod");
			assert!(UserId::new("user_01HZX3").is_ok());
			assert!(OrgId::new("org:acme/platform").is_ok());
		}

		#[test]
		fn rejects_empty() {
			let err = TenantId::new("").unwrap_err();
			assert_eq!(err.kind, "tenant id");
			assert!(err.to_string().contains("must not be empty"));
		}

		#[test]
		fn rejects_too_long() {
			let long = "t".repeat(MAX_IDENTIFIER_LEN + 1);
			assert!(TenantId::new(long).is_err());
			assert!(TenantId::new("t".repeat(MAX_IDENTIFIER_LEN)).is_ok());
		}

		#[test]
		fn rejects_control_characters() {
			assert!(UserId::new("alice\nbob").is_err());
			assert!(UserId::new("alice\0").is_err());
		}

		#[test]
		fn serde_validates_on_deserialize() {
			let ok: TenantId = serde_json::from_str("\"tenant-a\"").unwrap();
			assert_eq!(serde_json::to_string(&ok).unwrap(), "\"tenant-a\"");
			assert!(serde_json::from_str::<TenantId>("\"\"").is_err());
		}
	}

	mod uuid_ids {
		use super::*;

		#[test]
		fn api_key_id_round_trips_through_display() {
			let id = ApiKeyId::generate();
			let parsed: ApiKeyId = id.to_string().parse().unwrap();
			assert_eq!(parsed, id);
		}

		#[test]
		fn api_key_id_rejects_garbage() {
			assert!("not-a-uuid".parse::<ApiKeyId>().is_err());
		}
	}

	proptest! {
		#[test]
		fn printable_identifiers_are_accepted(id in "[a-zA-Z0-9_.:/@-]{1,128}") {
			prop_assert!(TenantId::new(id.clone()).is_ok());
			prop_assert_eq!(TenantId::new(id.clone()).unwrap().into_inner(), id);
		}
	}
}
