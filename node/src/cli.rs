//! # CLI Interface
//!
//! Defines the command-line argument structure for `assetvault-node` using
//! `clap` derive. Supports three subcommands: `run`, `init`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Asset registry node.
///
/// Hosts an owner-scoped asset registry behind a REST API, keeps the
/// logical clock that stamps every call, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "assetvault-node",
    about = "Asset registry node",
    version,
    propagate_version = true
)]
pub struct AssetVaultCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Create the data directory and write a default configuration file.
    Init(InitArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node configuration file (JSON).
    ///
    /// When omitted, the node looks for `config.json` in the data directory
    /// and falls back to built-in defaults if there is none.
    #[arg(long, short = 'c', env = "ASSETVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the database and configuration.
    ///
    /// Created on first run if it does not exist.
    #[arg(
        long,
        short = 'd',
        env = "ASSETVAULT_DATA_DIR",
        default_value = "./assetvault-data"
    )]
    pub data_dir: PathBuf,

    /// Port for the REST API. Overrides the configuration file.
    #[arg(long, env = "ASSETVAULT_API_PORT")]
    pub api_port: Option<u16>,

    /// Port for the Prometheus metrics endpoint. Overrides the configuration file.
    #[arg(long, env = "ASSETVAULT_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Log output format.
    #[arg(
        long,
        env = "ASSETVAULT_LOG_FORMAT",
        value_enum,
        default_value = "pretty",
        ignore_case = true
    )]
    pub log_format: LogFormat,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(
        long,
        short = 'd',
        env = "ASSETVAULT_DATA_DIR",
        default_value = "./assetvault-data"
    )]
    pub data_dir: PathBuf,

    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}
