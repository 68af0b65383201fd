// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "legion",
    about = "Multi-agent orchestration runtime for personality-driven LLM agents",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file (overrides auto-discovery).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the runtime: event bus, orchestrator, and HTTP/WebSocket gateway.
    ///
    /// Blocks until the process receives a shutdown signal. Agents and
    /// channels are created afterward, at runtime, via the gateway's
    /// `/agents` and `/channels` endpoints.
    Serve {
        /// Override the gateway bind address (`host:port`).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print the effective configuration and exit.
    ShowConfig,

    /// Generate a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "legion", &mut std::io::stdout());
}
