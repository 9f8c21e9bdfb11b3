// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core event types for audit logging.
//!
//! - [`AuditEventType`]: every auditable vault and API key operation
//! - [`AuditSeverity`]: RFC 5424-compatible severity levels
//! - [`AuditEvent`]: a complete audit record
//! - [`AuditEventBuilder`]: fluent API for constructing events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Types of events that can be recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
	// Vault events
	SecretCreated,
	SecretRotated,
	SecretRead,
	SecretDeleted,
	SecretDescriptionUpdated,
	SecretDecryptionFailed,

	// API key events
	ApiKeyCreated,
	ApiKeyRevoked,
	ApiKeyDeleted,
}

impl fmt::Display for AuditEventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AuditEventType::SecretCreated => "secret_created",
			AuditEventType::SecretRotated => "secret_rotated",
			AuditEventType::SecretRead => "secret_read",
			AuditEventType::SecretDeleted => "secret_deleted",
			AuditEventType::SecretDescriptionUpdated => "secret_description_updated",
			AuditEventType::SecretDecryptionFailed => "secret_decryption_failed",

			AuditEventType::ApiKeyCreated => "api_key_created",
			AuditEventType::ApiKeyRevoked => "api_key_revoked",
			AuditEventType::ApiKeyDeleted => "api_key_deleted",
		};
		write!(f, "{s}")
	}
}

impl AuditEventType {
	/// Returns the default severity for this event type.
	///
	/// - `Info`: normal operations (create, rotate, read)
	/// - `Notice`: destructive or access-removing actions (delete, revoke)
	/// - `Error`: a stored ciphertext could not be decrypted
	pub fn default_severity(&self) -> AuditSeverity {
		match self {
			AuditEventType::SecretCreated
			| AuditEventType::SecretRotated
			| AuditEventType::SecretRead
			| AuditEventType::SecretDescriptionUpdated
			| AuditEventType::ApiKeyCreated => AuditSeverity::Info,

			AuditEventType::SecretDeleted
			| AuditEventType::ApiKeyRevoked
			| AuditEventType::ApiKeyDeleted => AuditSeverity::Notice,

			AuditEventType::SecretDecryptionFailed => AuditSeverity::Error,
		}
	}
}

/// Severity levels following RFC 5424 syslog conventions.
///
/// Ordering: `Critical > Error > Warning > Notice > Info > Debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
	Debug = 7,
	Info = 6,
	Notice = 5,
	Warning = 4,
	Error = 3,
	Critical = 2,
}

impl PartialOrd for AuditSeverity {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for AuditSeverity {
	fn cmp(&self, other: &Self) -> Ordering {
		// Lower numeric value = higher severity
		(*other as u8).cmp(&(*self as u8))
	}
}

impl fmt::Display for AuditSeverity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AuditSeverity::Debug => "debug",
			AuditSeverity::Info => "info",
			AuditSeverity::Notice => "notice",
			AuditSeverity::Warning => "warning",
			AuditSeverity::Error => "error",
			AuditSeverity::Critical => "critical",
		};
		write!(f, "{s}")
	}
}

/// A single audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
	pub id: Uuid,
	pub timestamp: DateTime<Utc>,
	pub event_type: AuditEventType,
	pub severity: AuditSeverity,

	/// Tenant that owns the affected secret, when applicable.
	pub tenant_id: Option<String>,
	/// User that owns the affected API key, when applicable.
	pub actor_user_id: Option<String>,

	/// Kind of resource affected (`secret`, `api_key`).
	pub resource_type: Option<String>,
	pub resource_id: Option<String>,

	/// Human-readable description of the action.
	pub action: String,
	/// Event-specific details. Must never contain secret material.
	pub details: serde_json::Value,
}

impl AuditEvent {
	pub fn builder(event_type: AuditEventType) -> AuditEventBuilder {
		AuditEventBuilder::new(event_type)
	}
}

/// Builder for constructing audit events with a fluent API.
#[derive(Debug, Clone)]
pub struct AuditEventBuilder {
	event_type: AuditEventType,
	severity: Option<AuditSeverity>,
	tenant_id: Option<String>,
	actor_user_id: Option<String>,
	resource_type: Option<String>,
	resource_id: Option<String>,
	action: Option<String>,
	details: serde_json::Value,
}

impl AuditEventBuilder {
	pub fn new(event_type: AuditEventType) -> Self {
		Self {
			event_type,
			severity: None,
			tenant_id: None,
			actor_user_id: None,
			resource_type: None,
			resource_id: None,
			action: None,
			details: serde_json::Value::Null,
		}
	}

	/// Set the severity level. Defaults to the event type's default severity.
	pub fn severity(mut self, severity: AuditSeverity) -> Self {
		self.severity = Some(severity);
		self
	}

	pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
		self.tenant_id = Some(tenant_id.into());
		self
	}

	pub fn actor(mut self, user_id: impl Into<String>) -> Self {
		self.actor_user_id = Some(user_id.into());
		self
	}

	pub fn resource(
		mut self,
		resource_type: impl Into<String>,
		resource_id: impl Into<String>,
	) -> Self {
		self.resource_type = Some(resource_type.into());
		self.resource_id = Some(resource_id.into());
		self
	}

	pub fn action(mut self, action: impl Into<String>) -> Self {
		self.action = Some(action.into());
		self
	}

	pub fn details(mut self, details: serde_json::Value) -> Self {
		self.details = details;
		self
	}

	pub fn build(self) -> AuditEvent {
		AuditEvent {
			id: Uuid::new_v4(),
			timestamp: Utc::now(),
			event_type: self.event_type,
			severity: self
				.severity
				.unwrap_or_else(|| self.event_type.default_severity()),
			tenant_id: self.tenant_id,
			actor_user_id: self.actor_user_id,
			resource_type: self.resource_type,
			resource_id: self.resource_id,
			action: self.action.unwrap_or_else(|| self.event_type.to_string()),
			details: self.details,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	const ALL_EVENT_TYPES: [AuditEventType; 9] = [
		AuditEventType::SecretCreated,
		AuditEventType::SecretRotated,
		AuditEventType::SecretRead,
		AuditEventType::SecretDeleted,
		AuditEventType::SecretDescriptionUpdated,
		AuditEventType::SecretDecryptionFailed,
		AuditEventType::ApiKeyCreated,
		AuditEventType::ApiKeyRevoked,
		AuditEventType::ApiKeyDeleted,
	];

	mod audit_event_type {
		use super::*;

		#[test]
		fn display_matches_serde_name() {
			for event_type in ALL_EVENT_TYPES {
				let json = serde_json::to_string(&event_type).unwrap();
				assert_eq!(json, format!("\"{event_type}\""));
			}
		}

		#[test]
		fn decryption_failure_is_error_severity() {
			assert_eq!(
				AuditEventType::SecretDecryptionFailed.default_severity(),
				AuditSeverity::Error
			);
			assert_eq!(
				AuditEventType::ApiKeyRevoked.default_severity(),
				AuditSeverity::Notice
			);
		}
	}

	mod severity {
		use super::*;

		#[test]
		fn ordering_follows_rfc5424() {
			assert!(AuditSeverity::Critical > AuditSeverity::Error);
			assert!(AuditSeverity::Error > AuditSeverity::Warning);
			assert!(AuditSeverity::Notice > AuditSeverity::Info);
			assert!(AuditSeverity::Info > AuditSeverity::Debug);
		}
	}

	mod builder {
		use super::*;

		#[test]
		fn defaults_action_and_severity() {
			let event = AuditEvent::builder(AuditEventType::SecretRotated)
				.tenant("tenant-a")
				.resource("secret", "sec-1")
				.build();
			assert_eq!(event.action, "secret_rotated");
			assert_eq!(event.severity, AuditSeverity::Info);
			assert_eq!(event.tenant_id.as_deref(), Some("tenant-a"));
			assert!(event.details.is_null());
		}

		#[test]
		fn explicit_values_win() {
			let event = AuditEvent::builder(AuditEventType::ApiKeyCreated)
				.actor("user-1")
				.severity(AuditSeverity::Warning)
				.action("issued key for ci")
				.details(json!({ "scopes": ["secrets:read"] }))
				.build();
			assert_eq!(event.severity, AuditSeverity::Warning);
			assert_eq!(event.action, "issued key for ci");
			assert_eq!(event.details["scopes"][0], "secrets:read");
		}
	}

	proptest! {
		#[test]
		fn builder_preserves_resource(kind in "[a-z_]{1,16}", id in "[a-zA-Z0-9-]{1,36}") {
			let event = AuditEvent::builder(AuditEventType::SecretRead)
				.resource(kind.clone(), id.clone())
				.build();
			prop_assert_eq!(event.resource_type, Some(kind));
			prop_assert_eq!(event.resource_id, Some(id));
		}
	}
}
