//! # Logging
//!
//! One `tracing` subscriber for the whole process. `RUST_LOG` replaces the
//! built-in directives when set.
//!
//! The registry logs accepted mutations at `info` and rejected calls at
//! `warn`, so `assetvault_registry=info` doubles as an audit trail of every
//! state change.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives for `run` when `RUST_LOG` is unset.
pub const RUN_DIRECTIVES: &str = "assetvault_node=info,assetvault_registry=info,tower_http=debug";

/// Directives for `init` when `RUST_LOG` is unset.
pub const INIT_DIRECTIVES: &str = "assetvault_node=info";

/// Log line format, selected with `--log-format`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Colored lines with source locations.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Installs the global subscriber. Panics if one is already installed.
pub fn init_logging(directives: &str, format: LogFormat) {
    let subscriber = tracing_subscriber::registry().with(env_filter(directives));
    match format {
        LogFormat::Pretty => subscriber
            .with(fmt::layer().with_file(true).with_line_number(true))
            .init(),
        LogFormat::Json => subscriber.with(fmt::layer().json()).init(),
    }

    tracing::debug!(?format, directives, "subscriber installed");
}
