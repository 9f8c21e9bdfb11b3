// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # keyward-server-db
//!
//! Persistence layer for Keyward using SQLite via sqlx.
//!
//! ## Repository Pattern
//!
//! Each domain has two components:
//! - **`*Store` trait**: the interface (`SecretsStore`, `ApiKeyStore`)
//! - **`*Repository` struct**: concrete implementation holding a `SqlitePool`
//!
//! Rows are returned as string-typed structs (`SecretRow`, `ApiKeyRow`).
//! Parsing into domain types, and reporting malformed rows as corrupted data,
//! is the job of the owning domain crate.
//!
//! ## Error Handling
//!
//! | Variant | When to use |
//! |---------|-------------|
//! | `NotFound` | Resource must exist but doesn't (delete by ID) |
//! | `Conflict` | Unique constraint violation, lost compare-and-swap |
//! | `Sqlx` | Unexpected database errors, propagated via `?` |
//! | `Internal` | Invalid configuration or stored data |
//!
//! Every query that touches tenant- or user-owned data filters on the owner.
//! A row owned by someone else is indistinguishable from a missing row.
//!
//! ## Testing
//!
//! With the `testing` feature (or inside this crate's tests),
//! [`testing::create_migrated_test_pool`] returns a single-connection
//! in-memory pool with the full schema applied.

pub mod api_key;
pub mod error;
pub mod pool;
pub mod secrets;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api_key::{ApiKeyRepository, ApiKeyRow, ApiKeyStore, CreateApiKeyParams};
pub use error::{is_busy_error, is_unique_constraint_error, DbError, Result};
pub use pool::{create_pool, run_migrations};
pub use secrets::{
	CreateSecretParams, NewVersionParams, RotateSecretParams, SecretRow, SecretVersionRow,
	SecretsRepository, SecretsStore,
};

pub use sqlx::SqlitePool;
