//! # orgpolicy
//!
//! Keeps AWS Organizations service control policies in line with a
//! declared manifest.
//!
//! - `orgpolicy apply`: create/update every declared policy and reconcile
//!   its attachments (`--dry-run` to preview)
//! - `orgpolicy validate`: check the manifest and every policy document
//!   offline, without touching AWS

mod commands;
mod config;
mod logging;
mod report;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::LogFormat;

/// Reconcile AWS Organizations policies against a manifest.
#[derive(Parser)]
#[command(name = "orgpolicy", version, about)]
struct Cli {
    /// Directory holding orgpolicy.toml, the manifest, and policy documents.
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    /// Emit debug-level logs on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log line format on stderr (text or json).
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create/update declared policies and reconcile their attachments.
    Apply(commands::apply::ApplyArgs),
    /// Check the manifest and policy documents without contacting AWS.
    Validate(commands::validate::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format)?;

    let config_dir = cli.config_dir.canonicalize().unwrap_or(cli.config_dir);

    match &cli.command {
        Commands::Apply(args) => commands::apply::execute(args, &config_dir),
        Commands::Validate(args) => commands::validate::execute(args, &config_dir),
    }
}
