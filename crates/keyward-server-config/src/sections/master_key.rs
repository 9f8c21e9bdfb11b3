// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Vault master key configuration.
//!
//! Only the version label may come from the TOML file. Key material is read
//! from `KEYWARD_SERVER_VAULT_MASTER_KEY` and `KEYWARD_SERVER_VAULT_RETIRED_KEYS`
//! (or their `_FILE` variants) during finalization and never deserialized from
//! disk configuration.

use keyward_common_config::SecretString;
use serde::Deserialize;

const DEFAULT_VERSION: &str = "v1";

/// Resolved master key settings. Key material is still encoded here; decoding
/// and length checks happen when the vault keyring is built.
#[derive(Debug, Clone)]
pub struct MasterKeyConfig {
	/// Label recorded on every ciphertext encrypted with `key`.
	pub version: String,
	/// Current master key (base64 or hex).
	pub key: Option<SecretString>,
	/// Historical keys kept for decryption, as `label:key,label:key`.
	pub retired: Option<SecretString>,
}

impl MasterKeyConfig {
	pub fn is_configured(&self) -> bool {
		self.key.is_some()
	}
}

impl Default for MasterKeyConfig {
	fn default() -> Self {
		Self {
			version: DEFAULT_VERSION.to_string(),
			key: None,
			retired: None,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MasterKeyConfigLayer {
	#[serde(default)]
	pub version: Option<String>,
}

impl MasterKeyConfigLayer {
	pub fn merge(&mut self, other: MasterKeyConfigLayer) {
		if other.version.is_some() {
			self.version = other.version;
		}
	}

	pub fn finalize(
		self,
		key: Option<SecretString>,
		retired: Option<SecretString>,
	) -> MasterKeyConfig {
		MasterKeyConfig {
			version: self
				.version
				.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
			key,
			retired,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_unconfigured_by_default() {
		let config = MasterKeyConfigLayer::default().finalize(None, None);
		assert_eq!(config.version, "v1");
		assert!(!config.is_configured());
	}

	#[test]
	fn test_debug_redacts_key_material() {
		let config = MasterKeyConfigLayer {
			version: Some("2025-06".to_string()),
		}
		.finalize(
			Some(SecretString::from("c2VjcmV0LW1hc3Rlci1rZXk=")),
			Some(SecretString::from("2025-01:b2xkLWtleQ==")),
		);
		let debug = format!("{config:?}");
		assert!(config.is_configured());
		assert!(debug.contains("2025-06"));
		assert!(!debug.contains("c2VjcmV0LW1hc3Rlci1rZXk="));
		assert!(!debug.contains("b2xkLWtleQ=="));
	}

	#[test]
	fn test_toml_sets_version_label() {
		let layer: MasterKeyConfigLayer = toml::from_str("version = \"v7\"").unwrap();
		assert_eq!(layer.version.as_deref(), Some("v7"));
	}
}
