//! CLI argument definitions for the state file tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "rvm",
    version,
    about = "Inspect and manage restorable view model state files",
    long_about = "Inspect and manage the state files written by restorable view models.\n\n\
                  Decodes individual state files, lists every owner directory under a\n\
                  storage root, and clears an owner's saved state."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Decode one state file and print its entries.
    Inspect(InspectArgs),

    /// List owner directories and their state files.
    List(ListArgs),

    /// Delete every state file of one owner type.
    Clear(ClearArgs),
}

#[derive(Parser)]
pub struct InspectArgs {
    /// Path to a state file.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Parser)]
pub struct ListArgs {
    /// Host storage root that contains the state root directory.
    #[arg(value_name = "BASE_DIR")]
    pub base_dir: PathBuf,

    /// Storage layout overrides (TOML).
    #[arg(long = "config", value_name = "TOML")]
    pub config: Option<PathBuf>,
}

#[derive(Parser)]
pub struct ClearArgs {
    /// Host storage root that contains the state root directory.
    #[arg(value_name = "BASE_DIR")]
    pub base_dir: PathBuf,

    /// Fully-qualified owner type name, as passed to the provider.
    #[arg(long = "owner", value_name = "TYPE_NAME")]
    pub owner: String,

    /// Storage layout overrides (TOML).
    #[arg(long = "config", value_name = "TOML")]
    pub config: Option<PathBuf>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
