//! CLI Adapter
//!
//! Command-line interface for the copy-trade engine.
//! Uses clap derive macros for argument parsing.

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "mirrorbot", about = "Solana copy-trade engine", version)]
pub struct CliApp {
    /// Enable info-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug-level logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the copy-trade engine
    Run(RunCmd),
    /// Report follower wallets, balances and open positions
    Status(StatusCmd),
}

#[derive(Debug, Args)]
pub struct RunCmd {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Debug, Args)]
pub struct StatusCmd {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}
