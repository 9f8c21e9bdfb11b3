// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Master keys and the versioned keyring.
//!
//! The keyring holds one *current* key, used for every new encryption, plus
//! any number of *retired* keys that are only used to decrypt versions written
//! before a master key rotation. Each ciphertext records the label of the key
//! it was written under.

use std::collections::HashMap;
use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{SecretsError, SecretsResult};

/// Size of a master key in bytes (256 bits).
pub const MASTER_KEY_SIZE: usize = 32;

/// Maximum length of a key version label.
pub const MAX_KEY_VERSION_LEN: usize = 64;

/// 32 bytes of master key material. Zeroized on drop.
#[derive(Clone)]
pub struct MasterKey(Zeroizing<[u8; MASTER_KEY_SIZE]>);

impl MasterKey {
	pub fn from_bytes(bytes: [u8; MASTER_KEY_SIZE]) -> Self {
		Self(Zeroizing::new(bytes))
	}

	/// Decode key material given as 64 hex characters or base64.
	pub fn from_encoded(encoded: &str) -> SecretsResult<Self> {
		let encoded = encoded.trim();
		let decoded: Zeroizing<Vec<u8>> = if encoded.len() == MASTER_KEY_SIZE * 2
			&& encoded.chars().all(|c| c.is_ascii_hexdigit())
		{
			Zeroizing::new(hex::decode(encoded).map_err(|_| {
				SecretsError::Configuration("master key is not valid hex".to_string())
			})?)
		} else {
			Zeroizing::new(BASE64.decode(encoded).map_err(|_| {
				SecretsError::Configuration(
					"master key must be 64 hex characters or base64".to_string(),
				)
			})?)
		};

		if decoded.len() != MASTER_KEY_SIZE {
			return Err(SecretsError::Configuration(format!(
				"master key must be {MASTER_KEY_SIZE} bytes, got {}",
				decoded.len()
			)));
		}

		let mut bytes = Zeroizing::new([0u8; MASTER_KEY_SIZE]);
		bytes.copy_from_slice(&decoded);
		Ok(Self(bytes))
	}

	pub(crate) fn as_bytes(&self) -> &[u8; MASTER_KEY_SIZE] {
		&self.0
	}
}

impl fmt::Debug for MasterKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("MasterKey([REDACTED])")
	}
}

/// Fresh random master key material, base64 encoded.
pub fn generate_master_key() -> Zeroizing<String> {
	let mut bytes = Zeroizing::new([0u8; MASTER_KEY_SIZE]);
	OsRng.fill_bytes(bytes.as_mut());
	Zeroizing::new(BASE64.encode(&bytes[..]))
}

fn validate_key_version(label: &str) -> SecretsResult<()> {
	if label.is_empty() || label.len() > MAX_KEY_VERSION_LEN {
		return Err(SecretsError::Configuration(format!(
			"master key version must be 1-{MAX_KEY_VERSION_LEN} characters"
		)));
	}
	if !label
		.chars()
		.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
	{
		return Err(SecretsError::Configuration(format!(
			"invalid master key version label: {label}"
		)));
	}
	Ok(())
}

/// Current master key plus retired keys, by version label.
#[derive(Clone, Default)]
pub struct MasterKeyring {
	current: Option<String>,
	keys: HashMap<String, MasterKey>,
}

impl MasterKeyring {
	/// A keyring with no key material. Every crypto operation fails with
	/// [`SecretsError::MasterKeyNotConfigured`].
	pub fn empty() -> Self {
		Self::default()
	}

	pub fn new(version: impl Into<String>, key: MasterKey) -> SecretsResult<Self> {
		let version = version.into();
		validate_key_version(&version)?;
		let mut keys = HashMap::new();
		keys.insert(version.clone(), key);
		Ok(Self {
			current: Some(version),
			keys,
		})
	}

	/// Add a key that may only be used for decryption.
	pub fn with_retired(mut self, version: impl Into<String>, key: MasterKey) -> SecretsResult<Self> {
		let version = version.into();
		validate_key_version(&version)?;
		if self.keys.contains_key(&version) {
			return Err(SecretsError::Configuration(format!(
				"duplicate master key version: {version}"
			)));
		}
		self.keys.insert(version, key);
		Ok(self)
	}

	/// Parse retired keys given as `label:key,label:key`.
	pub fn with_retired_encoded(mut self, encoded: &str) -> SecretsResult<Self> {
		for entry in encoded.split(',').map(str::trim).filter(|e| !e.is_empty()) {
			let (label, key) = entry.split_once(':').ok_or_else(|| {
				SecretsError::Configuration(
					"retired master keys must be formatted as label:key".to_string(),
				)
			})?;
			self = self.with_retired(label.trim(), MasterKey::from_encoded(key)?)?;
		}
		Ok(self)
	}

	pub fn is_configured(&self) -> bool {
		self.current.is_some()
	}

	/// The key used for new encryptions, with its label.
	pub fn current(&self) -> SecretsResult<(&MasterKey, &str)> {
		let label = self
			.current
			.as_deref()
			.ok_or(SecretsError::MasterKeyNotConfigured)?;
		let key = self
			.keys
			.get(label)
			.ok_or(SecretsError::MasterKeyNotConfigured)?;
		Ok((key, label))
	}

	pub fn current_version(&self) -> Option<&str> {
		self.current.as_deref()
	}

	/// Look up a key by label, current or retired.
	pub fn get(&self, version: &str) -> SecretsResult<&MasterKey> {
		if !self.is_configured() {
			return Err(SecretsError::MasterKeyNotConfigured);
		}
		self
			.keys
			.get(version)
			.ok_or_else(|| SecretsError::UnknownKeyVersion(version.to_string()))
	}

	/// All loaded labels, sorted.
	pub fn versions(&self) -> Vec<&str> {
		let mut versions: Vec<&str> = self.keys.keys().map(String::as_str).collect();
		versions.sort_unstable();
		versions
	}
}

impl fmt::Debug for MasterKeyring {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MasterKeyring")
			.field("current", &self.current)
			.field("versions", &self.versions())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

	mod decoding {
		use super::*;

		#[test]
		fn accepts_hex() {
			let key = MasterKey::from_encoded(HEX_KEY).unwrap();
			assert_eq!(key.as_bytes()[31], 0x1f);
		}

		#[test]
		fn accepts_base64() {
			let encoded = BASE64.encode([7u8; MASTER_KEY_SIZE]);
			let key = MasterKey::from_encoded(&encoded).unwrap();
			assert_eq!(key.as_bytes(), &[7u8; MASTER_KEY_SIZE]);
		}

		#[test]
		fn rejects_wrong_length() {
			let short = BASE64.encode([1u8; 16]);
			assert!(matches!(
				MasterKey::from_encoded(&short),
				Err(SecretsError::Configuration(_))
			));
			assert!(MasterKey::from_encoded("not base64 at all!").is_err());
		}

		#[test]
		fn generated_keys_decode() {
			let a = generate_master_key();
			let b = generate_master_key();
			assert_ne!(a.as_str(), b.as_str());
			assert!(MasterKey::from_encoded(&a).is_ok());
		}

		#[test]
		fn debug_is_redacted() {
			let key = MasterKey::from_encoded(HEX_KEY).unwrap();
			let debug = format!("{key:?}");
			assert!(debug.contains("REDACTED"));
			assert!(!debug.contains("0a0b"));
		}
	}

	mod keyring {
		use super::*;

		#[test]
		fn empty_keyring_is_unconfigured() {
			let ring = MasterKeyring::empty();
			assert!(!ring.is_configured());
			assert!(matches!(
				ring.current(),
				Err(SecretsError::MasterKeyNotConfigured)
			));
			assert!(matches!(
				ring.get("v1"),
				Err(SecretsError::MasterKeyNotConfigured)
			));
		}

		#[test]
		fn current_and_retired_lookup() {
			let retired = BASE64.encode([2u8; MASTER_KEY_SIZE]);
			let ring = MasterKeyring::new("v2", MasterKey::from_bytes([1u8; MASTER_KEY_SIZE]))
				.unwrap()
				.with_retired_encoded(&format!("v1:{retired}"))
				.unwrap();

			let (key, label) = ring.current().unwrap();
			assert_eq!(label, "v2");
			assert_eq!(key.as_bytes(), &[1u8; MASTER_KEY_SIZE]);
			assert_eq!(ring.get("v1").unwrap().as_bytes(), &[2u8; MASTER_KEY_SIZE]);
			assert!(matches!(
				ring.get("v0"),
				Err(SecretsError::UnknownKeyVersion(_))
			));
			assert_eq!(ring.versions(), vec!["v1", "v2"]);
		}

		#[test]
		fn rejects_duplicate_and_malformed_retired_entries() {
			let ring = MasterKeyring::new("v1", MasterKey::from_bytes([1u8; MASTER_KEY_SIZE])).unwrap();
			assert!(ring
				.clone()
				.with_retired_encoded(&format!("v1:{HEX_KEY}"))
				.is_err());
			assert!(ring.clone().with_retired_encoded(HEX_KEY).is_err());
			assert!(ring.with_retired_encoded(" , ").is_ok());
		}

		#[test]
		fn rejects_bad_labels() {
			let key = MasterKey::from_bytes([1u8; MASTER_KEY_SIZE]);
			assert!(MasterKeyring::new("", key.clone()).is_err());
			assert!(MasterKeyring::new("v 1", key).is_err());
		}

		#[test]
		fn debug_lists_labels_only() {
			let ring = MasterKeyring::new("v1", MasterKey::from_encoded(HEX_KEY).unwrap()).unwrap();
			let debug = format!("{ring:?}");
			assert!(debug.contains("v1"));
			assert!(!debug.contains("0a0b"));
		}
	}
}
