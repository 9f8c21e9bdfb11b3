// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Operator surface for Keyward.
//!
//! [`App`] wires configuration, the database pool, the vault and the API key
//! service together. [`commands`] maps CLI subcommands onto those services and
//! renders every result as JSON.

pub mod app;
pub mod commands;
pub mod logging;

pub use app::{App, AppError};
pub use commands::{run, ApiKeyCommand, Args, Command, SecretCommand};
pub use logging::init_tracing;
