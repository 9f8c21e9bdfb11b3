// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key error types.

use keyward_server_db::DbError;
use thiserror::Error;

use crate::types::InvalidIdentifier;

pub type AuthResult<T> = Result<T, AuthError>;

/// Errors returned by API key issuance and management.
///
/// Verification never reports *why* a token was rejected; it returns `None`.
#[derive(Debug, Error)]
pub enum AuthError {
	// =========================================================================
	// Request Errors
	// =========================================================================
	#[error("validation error: {0}")]
	Validation(String),

	#[error("API key not found: {0}")]
	NotFound(String),

	#[error("conflict: {0}")]
	Conflict(String),

	// =========================================================================
	// Infrastructure Errors
	// =========================================================================
	#[error("corrupted data: {0}")]
	CorruptedData(String),

	#[error("database error: {0}")]
	Database(DbError),

	#[error("internal error: {0}")]
	Internal(String),
}

impl From<DbError> for AuthError {
	fn from(err: DbError) -> Self {
		match err {
			DbError::NotFound(msg) => AuthError::NotFound(msg),
			DbError::Conflict(msg) => AuthError::Conflict(msg),
			other => AuthError::Database(other),
		}
	}
}

impl From<InvalidIdentifier> for AuthError {
	fn from(err: InvalidIdentifier) -> Self {
		AuthError::Validation(err.to_string())
	}
}

impl AuthError {
	/// Returns true if this error should be logged at error level.
	pub fn is_internal(&self) -> bool {
		matches!(
			self,
			AuthError::Database(_) | AuthError::Internal(_) | AuthError::CorruptedData(_)
		)
	}

	/// Returns the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			AuthError::Validation(_) => 400,
			AuthError::NotFound(_) => 404,
			AuthError::Conflict(_) => 409,
			AuthError::CorruptedData(_) | AuthError::Database(_) | AuthError::Internal(_) => 500,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn db_conflict_maps_to_conflict() {
		let err: AuthError = DbError::Conflict("dup".into()).into();
		assert!(matches!(err, AuthError::Conflict(_)));
		assert_eq!(err.status_code(), 409);
		assert!(!err.is_internal());
	}

	#[test]
	fn db_internal_stays_database() {
		let err: AuthError = DbError::Internal("bad url".into()).into();
		assert!(matches!(err, AuthError::Database(_)));
		assert!(err.is_internal());
		assert_eq!(err.status_code(), 500);
	}

	#[test]
	fn invalid_identifier_is_validation() {
		let err: AuthError = crate::UserId::new("").unwrap_err().into();
		assert_eq!(err.status_code(), 400);
		assert!(err.to_string().contains("user id"));
	}
}
