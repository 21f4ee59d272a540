// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "chatrelay",
    about = "HTTP relay between a browser chat page and the Gemini API",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file (overrides auto-discovery)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server (default when no subcommand is given)
    Serve(ServeArgs),
    /// Reformat model-style markdown from a file or stdin and print it
    Format {
        /// Input file; reads stdin when omitted
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML and exit
    ShowConfig,
    /// Generate shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Address to listen on, e.g. "0.0.0.0:8000"
    #[arg(long, short = 'b', env = "CHATRELAY_BIND")]
    pub bind: Option<String>,

    /// Gemini model name, e.g. "gemini-1.5-flash"
    #[arg(long, short = 'M', env = "CHATRELAY_MODEL")]
    pub model: Option<String>,

    /// Model provider ("google" or "mock")
    #[arg(long, short = 'p')]
    pub provider: Option<String>,
}

impl ServeArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut chatrelay_config::Config) {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(model) = &self.model {
            config.model.name = model.clone();
        }
        if let Some(provider) = &self.provider {
            config.model.provider = provider.clone();
        }
    }
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "chatrelay", &mut std::io::stdout());
}
