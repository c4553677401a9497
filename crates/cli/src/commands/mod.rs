//! CLI command definitions and execution
//!
//! Each command parses its arguments, opens the bucket it needs through the
//! B2 adapter and prints through the shared [`Formatter`].

use std::sync::Arc;

use bz_b2::B2Client;
use bz_core::config::Defaults;
use bz_core::{AliasManager, ConfigManager, Error, FileList, RemotePath};
use clap::{Parser, Subcommand};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod alias;
mod ls;
mod put;
mod stat;

/// bz - client for B2-compatible object storage
#[derive(Parser, Debug)]
#[command(name = "bz")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage accounts
    #[command(subcommand)]
    Alias(alias::AliasCommands),

    /// List files in a bucket
    Ls(ls::LsArgs),

    /// Show file metadata
    Stat(stat::StatArgs),

    /// Upload a local file
    Put(put::PutArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let fallback = Formatter::new(OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        ..Default::default()
    });
    let defaults = match ConfigManager::new().and_then(|manager| manager.load()) {
        Ok(config) => config.defaults,
        Err(e) => return report(&fallback, &e),
    };

    let output_config = output_config(&cli, &defaults);

    match cli.command {
        Commands::Alias(cmd) => alias::execute(cmd, output_config).await,
        Commands::Ls(args) => ls::execute(args, output_config).await,
        Commands::Stat(args) => stat::execute(args, output_config).await,
        Commands::Put(args) => put::execute(args, output_config, &defaults).await,
    }
}

/// Flags win over config defaults; defaults can only turn features off
fn output_config(cli: &Cli, defaults: &Defaults) -> OutputConfig {
    OutputConfig {
        json: cli.json || defaults.output == "json",
        no_color: cli.no_color || defaults.color == "never",
        no_progress: cli.no_progress || !defaults.progress,
        quiet: cli.quiet,
    }
}

/// Print an error and pick its exit code
pub(crate) fn report(formatter: &Formatter, error: &Error) -> ExitCode {
    formatter.error(&error.to_string());
    ExitCode::from(error)
}

/// Authorize the path's alias and resolve its bucket
pub(crate) async fn open_bucket(path: &RemotePath) -> bz_core::Result<FileList> {
    let alias = AliasManager::new()?.get(&path.alias)?;
    let client = B2Client::connect(&alias).await?;
    let bucket = client.bucket(&path.bucket).await?;
    tracing::debug!(alias = %alias.name, bucket_id = %bucket.bucket_id, "bucket resolved");
    Ok(FileList::new(Arc::new(client), bucket))
}

/// Format an optional upload time the way listings show it
pub(crate) fn format_timestamp(timestamp: Option<jiff::Timestamp>) -> String {
    timestamp
        .map(|ts| ts.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| " ".repeat(19))
}
