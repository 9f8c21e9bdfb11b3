// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracing subscriber setup.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.

use keyward_server_config::{LogFormat, LoggingConfig};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG` wins over the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| config.level.clone().into())
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TryInitError> {
	let (pretty, json) = match config.format {
		LogFormat::Pretty => (Some(fmt::layer().with_writer(std::io::stderr)), None),
		LogFormat::Json => (
			None,
			Some(fmt::layer().json().with_writer(std::io::stderr)),
		),
	};

	tracing_subscriber::registry()
		.with(env_filter(config))
		.with(pretty)
		.with(json)
		.try_init()
}
