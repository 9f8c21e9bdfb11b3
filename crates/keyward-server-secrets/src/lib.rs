// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant-Scoped Secrets Vault
//!
//! This crate stores credentials on behalf of many tenants sharing one
//! deployment:
//!
//! - **Envelope Encryption**: a per-tenant AES-256-GCM key derived from the
//!   master key with HKDF-SHA256
//! - **Versioned Rotation**: append-only versions with exactly one active
//! - **Master Key Rotation**: retired master keys stay available for decryption
//! - **Secret References**: `secret://<name>` resolution
//! - **Audit Integration**: lifecycle and decryption-failure events
//!
//! # Security Design
//!
//! - All secret values use [`SecretString`](keyward_common_secret::SecretString)
//!   to prevent logging
//! - Derived keys are never stored and are zeroized after use
//! - Tenant ids are bound into both the SQL filters and the key derivation

pub mod config;
pub mod encryption;
pub mod error;
pub mod master_key;
pub mod resolver;
pub mod store;
pub mod types;
pub mod vault;

pub use config::VaultConfig;
pub use encryption::{
	decrypt_for_tenant, derive_tenant_key, encrypt_for_tenant, EncryptedBlob, IV_SIZE, KEY_SIZE,
	TAG_SIZE,
};
pub use error::{SecretsError, SecretsResult};
pub use master_key::{generate_master_key, MasterKey, MasterKeyring, MASTER_KEY_SIZE};
pub use resolver::{parse_secret_ref, SecretResolver, SECRET_REF_SCHEME};
pub use store::{NewSecret, Secret, SecretStore, SqliteSecretStore, StoredVersion};
pub use types::{
	validate_secret_name, validate_secret_value, SecretId, SecretKind, SecretLookup,
	SecretMetadata, SecretVersion, SecretVersionId, TenantId, VersionStatus, MAX_SECRET_NAME_LEN,
	MAX_SECRET_VALUE_LEN,
};
pub use vault::{CreateSecretInput, Vault};
