// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Migration error: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// True when a statement failed on a `UNIQUE` constraint or unique index.
pub fn is_unique_constraint_error(e: &sqlx::Error) -> bool {
	if let sqlx::Error::Database(ref db_err) = e {
		return db_err.message().contains("UNIQUE constraint failed");
	}
	false
}

/// True when SQLite gave up waiting for a lock (`SQLITE_BUSY` / `SQLITE_LOCKED`,
/// including extended codes such as 517 `SQLITE_BUSY_SNAPSHOT`).
pub fn is_busy_error(e: &sqlx::Error) -> bool {
	if let sqlx::Error::Database(ref db_err) = e {
		if let Some(code) = db_err.code().and_then(|c| c.parse::<i32>().ok()) {
			return matches!(code & 0xff, 5 | 6);
		}
		return db_err.message().contains("database is locked");
	}
	false
}

/// Map a unique violation to [`DbError::Conflict`], anything else to [`DbError::Sqlx`].
pub(crate) fn conflict_or_sqlx(e: sqlx::Error, what: impl FnOnce() -> String) -> DbError {
	if is_unique_constraint_error(&e) {
		DbError::Conflict(what())
	} else {
		DbError::Sqlx(e)
	}
}
