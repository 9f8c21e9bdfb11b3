// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Keyward server binary.

use clap::Parser;
use keyward_server::commands::new_master_key;
use keyward_server::{init_tracing, run, App, Args, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Commands that need neither config nor database
	if let Command::GenerateMasterKey = args.command {
		println!("{}", serde_json::to_string_pretty(&new_master_key())?);
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => keyward_server_config::load_config_with_file(path)?,
		None => keyward_server_config::load_config()?,
	};

	init_tracing(&config.logging)?;

	tracing::info!(
		database = %config.database.url,
		vault_configured = config.master_key.is_configured(),
		"starting keyward-server"
	);

	let app = App::connect(config).await?;
	let output = run(&app, args.command, &mut std::io::stdin().lock()).await?;
	println!("{}", serde_json::to_string_pretty(&output)?);

	app.pool().close().await;
	Ok(())
}
