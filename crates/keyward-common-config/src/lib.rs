// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration primitives shared by Keyward crates.
//!
//! Master keys and other secret settings are read with [`load_secret_env`],
//! which understands the `VAR_FILE` convention used by Docker and Kubernetes
//! secret mounts and always hands back a redacting [`SecretString`].

pub mod env;

pub use keyward_common_secret::{Secret, SecretString, REDACTED};

pub use env::{load_secret_env, require_secret_env, RequiredSecretError, SecretEnvError};
