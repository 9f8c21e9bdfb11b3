// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for keyward-server.

pub mod api_keys;
pub mod database;
pub mod logging;
pub mod master_key;

pub use api_keys::{ApiKeysConfig, ApiKeysConfigLayer};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use master_key::{MasterKeyConfig, MasterKeyConfigLayer};
