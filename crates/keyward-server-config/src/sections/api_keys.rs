// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key issuance defaults.

use serde::Deserialize;

const DEFAULT_PREFIX: &str = "kw";

#[derive(Debug, Clone, PartialEq)]
pub struct ApiKeysConfig {
	/// Prefix used when the caller does not choose one.
	pub default_prefix: String,
	/// Lifetime applied when the caller does not pass an expiry. `None` issues
	/// keys that never expire.
	pub default_ttl_days: Option<u32>,
}

impl Default for ApiKeysConfig {
	fn default() -> Self {
		ApiKeysConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiKeysConfigLayer {
	#[serde(default)]
	pub default_prefix: Option<String>,
	#[serde(default)]
	pub default_ttl_days: Option<u32>,
}

impl ApiKeysConfigLayer {
	pub fn merge(&mut self, other: ApiKeysConfigLayer) {
		if other.default_prefix.is_some() {
			self.default_prefix = other.default_prefix;
		}
		if other.default_ttl_days.is_some() {
			self.default_ttl_days = other.default_ttl_days;
		}
	}

	pub fn finalize(self) -> ApiKeysConfig {
		ApiKeysConfig {
			default_prefix: self
				.default_prefix
				.unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
			default_ttl_days: self.default_ttl_days.filter(|days| *days > 0),
		}
	}
}
