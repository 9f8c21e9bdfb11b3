// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity types and API key management for Keyward.
//!
//! This crate provides:
//! - Validated owner identifiers ([`TenantId`], [`UserId`], [`OrgId`])
//! - Opaque API token generation, hashing and display helpers
//! - [`ApiKeyService`]: issuance, verification, revocation and deletion
//!
//! # Security Considerations
//!
//! - Tokens are returned exactly once, wrapped in
//!   [`keyward_common_secret::SecretString`]
//! - Only the SHA-256 hex digest of a token is persisted
//! - Every owner-facing query filters on `(user_id, id)`

pub mod api_key;
pub mod error;
pub mod service;
pub mod types;

pub use api_key::{
	generate_api_token, hash_api_key_token, normalize_scopes, partial_key, validate_prefix,
	ApiKey, ApiKeyMetadata, ApiKeyStatus, IssuedApiKey, VerifiedApiKey, API_KEY_BYTES,
};
pub use error::{AuthError, AuthResult};
pub use service::{ApiKeyService, CreateApiKeyRequest};
pub use types::{ApiKeyId, InvalidIdentifier, OrgId, TenantId, UserId, MAX_IDENTIFIER_LEN};
