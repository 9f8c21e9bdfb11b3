// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Vault configuration.
//!
//! A [`VaultConfig`] is built once at startup from encoded key material and
//! handed to [`crate::Vault::new`]. An unconfigured vault is valid: it
//! serves metadata but every operation that needs a key fails with
//! [`SecretsError::MasterKeyNotConfigured`].

use std::sync::Arc;

use keyward_common_secret::SecretString;
use tracing::{info, instrument, warn};

use crate::error::SecretsResult;
use crate::master_key::{MasterKey, MasterKeyring};

#[derive(Debug, Clone)]
pub struct VaultConfig {
	keyring: Arc<MasterKeyring>,
}

impl VaultConfig {
	pub fn new(keyring: MasterKeyring) -> Self {
		Self {
			keyring: Arc::new(keyring),
		}
	}

	/// A vault with no master key.
	pub fn unconfigured() -> Self {
		Self::new(MasterKeyring::empty())
	}

	/// Build from encoded key material.
	///
	/// `key` is base64 or hex; `retired` is `label:key,label:key`. With no
	/// current key the vault is unconfigured and `retired` is ignored.
	#[instrument(skip(key, retired))]
	pub fn from_encoded(
		version: &str,
		key: Option<&SecretString>,
		retired: Option<&SecretString>,
	) -> SecretsResult<Self> {
		let Some(key) = key else {
			if retired.is_some() {
				warn!("Retired master keys supplied without a current key; ignoring them");
			}
			warn!("No master key configured; secret values are unavailable");
			return Ok(Self::unconfigured());
		};

		let mut keyring = MasterKeyring::new(version, MasterKey::from_encoded(key.expose())?)?;
		if let Some(retired) = retired {
			keyring = keyring.with_retired_encoded(retired.expose())?;
		}

		info!(
			current = version,
			versions = ?keyring.versions(),
			"Vault master keyring loaded"
		);
		Ok(Self::new(keyring))
	}

	pub fn is_configured(&self) -> bool {
		self.keyring.is_configured()
	}

	pub fn keyring(&self) -> &MasterKeyring {
		&self.keyring
	}
}
