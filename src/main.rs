// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use clap::Parser;
use cli::{Cli, Commands, ServeArgs};

const CRATES: [&str; 5] = [
    "chatrelay",
    "chatrelay_config",
    "chatrelay_model",
    "chatrelay_core",
    "chatrelay_server",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        None => serve(cli.config.as_deref(), &ServeArgs::default()).await,
        Some(Commands::Serve(args)) => serve(cli.config.as_deref(), &args).await,
        Some(Commands::Format { file }) => format_file(file.as_deref()),
        Some(Commands::ShowConfig) => {
            let config = chatrelay_config::load(cli.config.as_deref())?;
            let rendered = toml::to_string_pretty(&config.redacted()).context("rendering config as TOML")?;
            print!("{rendered}");
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            cli::print_completions(shell);
            Ok(())
        }
    }
}

async fn serve(config_path: Option<&Path>, args: &ServeArgs) -> anyhow::Result<()> {
    let mut config = chatrelay_config::load(config_path)?;
    args.apply(&mut config);
    tracing::debug!(server = ?config.server, provider = %config.model.provider, model = %config.model.name, "effective configuration");

    let provider = chatrelay_model::from_config(&config.model)?;
    let service = Arc::new(chatrelay_core::ChatService::new(Arc::from(provider), &config.history));

    chatrelay_server::serve(&config.server, service)
        .await
        .context("chat relay server failed")
}

/// Run the reply reformatter over a file (or stdin) and print the result.
fn format_file(file: Option<&Path>) -> anyhow::Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("reading stdin")?;
            buf
        }
    };
    println!("{}", chatrelay_core::reformat(&text));
    Ok(())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives: Vec<String> = CRATES
            .iter()
            .chain(std::iter::once(&"tower_http"))
            .map(|krate| format!("{krate}={level}"))
            .collect();
        EnvFilter::new(format!("warn,{}", directives.join(",")))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
