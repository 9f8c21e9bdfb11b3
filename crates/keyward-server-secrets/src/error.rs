// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the secrets vault.

use keyward_server_auth::InvalidIdentifier;
use keyward_server_db::DbError;
use thiserror::Error;

/// Result type alias for vault operations.
pub type SecretsResult<T> = Result<T, SecretsError>;

/// Errors that can occur during vault operations.
///
/// Messages never include plaintext, derived keys or master key material.
#[derive(Debug, Error)]
pub enum SecretsError {
	// =========================================================================
	// Configuration Errors
	// =========================================================================
	#[error("configuration error: {0}")]
	Configuration(String),

	#[error("master key not configured")]
	MasterKeyNotConfigured,

	#[error("unknown master key version: {0}")]
	UnknownKeyVersion(String),

	// =========================================================================
	// Encryption Errors
	// =========================================================================
	#[error("encryption failed: {0}")]
	Encryption(String),

	#[error("decryption failed: {0}")]
	Decryption(String),

	// =========================================================================
	// Secret Access Errors
	// =========================================================================
	#[error("secret not found: {0}")]
	NotFound(String),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("validation error: {0}")]
	Validation(String),

	#[error("corrupted data: {0}")]
	CorruptedData(String),

	// =========================================================================
	// Infrastructure Errors
	// =========================================================================
	#[error("database error: {0}")]
	Database(DbError),

	#[error("internal error: {0}")]
	Internal(String),
}

impl From<DbError> for SecretsError {
	fn from(err: DbError) -> Self {
		match err {
			DbError::NotFound(msg) => SecretsError::NotFound(msg),
			DbError::Conflict(msg) => SecretsError::Conflict(msg),
			other => SecretsError::Database(other),
		}
	}
}

impl From<InvalidIdentifier> for SecretsError {
	fn from(err: InvalidIdentifier) -> Self {
		SecretsError::Validation(err.to_string())
	}
}

impl SecretsError {
	/// Returns true if this error should be logged at error level.
	pub fn is_internal(&self) -> bool {
		matches!(
			self,
			SecretsError::Database(_)
				| SecretsError::Internal(_)
				| SecretsError::CorruptedData(_)
				| SecretsError::Encryption(_)
				| SecretsError::Configuration(_)
				| SecretsError::MasterKeyNotConfigured
				| SecretsError::UnknownKeyVersion(_)
		)
	}

	/// True for deployment problems: missing or unusable master keys.
	pub fn is_configuration(&self) -> bool {
		matches!(
			self,
			SecretsError::Configuration(_)
				| SecretsError::MasterKeyNotConfigured
				| SecretsError::UnknownKeyVersion(_)
		)
	}

	/// Returns the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			SecretsError::Validation(_) => 400,
			SecretsError::NotFound(_) => 404,
			SecretsError::Conflict(_) => 409,
			SecretsError::MasterKeyNotConfigured => 503,
			SecretsError::Configuration(_)
			| SecretsError::UnknownKeyVersion(_)
			| SecretsError::Encryption(_)
			| SecretsError::Decryption(_)
			| SecretsError::CorruptedData(_)
			| SecretsError::Database(_)
			| SecretsError::Internal(_) => 500,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn db_conflict_and_not_found_are_lifted() {
		assert!(matches!(
			SecretsError::from(DbError::Conflict("dup".into())),
			SecretsError::Conflict(_)
		));
		assert!(matches!(
			SecretsError::from(DbError::NotFound("gone".into())),
			SecretsError::NotFound(_)
		));
		assert!(matches!(
			SecretsError::from(DbError::Internal("boom".into())),
			SecretsError::Database(_)
		));
	}

	#[test]
	fn configuration_errors_are_distinct() {
		assert!(SecretsError::MasterKeyNotConfigured.is_configuration());
		assert!(SecretsError::UnknownKeyVersion("v0".into()).is_configuration());
		assert!(!SecretsError::NotFound("x".into()).is_configuration());
		assert!(!SecretsError::Decryption("tag".into()).is_configuration());
	}

	#[test]
	fn status_codes() {
		assert_eq!(SecretsError::Validation("x".into()).status_code(), 400);
		assert_eq!(SecretsError::NotFound("x".into()).status_code(), 404);
		assert_eq!(SecretsError::Conflict("x".into()).status_code(), 409);
		assert_eq!(SecretsError::MasterKeyNotConfigured.status_code(), 503);
		assert_eq!(SecretsError::Decryption("x".into()).status_code(), 500);
	}

	#[test]
	fn decryption_is_not_internal() {
		// Logged as a security event at warn, not as a server fault.
		assert!(!SecretsError::Decryption("tag mismatch".into()).is_internal());
		assert!(SecretsError::CorruptedData("bad iv".into()).is_internal());
	}
}
