//! CLI for the AGW resilience core.

mod commands;

use anyhow::Result;
use agw_core::config::{self, GatewayConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{run_backoff, run_classify, run_config, run_stream_demo};

/// Top-level CLI for the AGW gateway core.
#[derive(Debug, Parser)]
#[command(name = "agw")]
#[command(about = "AGW: upstream retry, cooldown and event-stream tooling", long_about = None)]
pub struct Cli {
    /// Use this config file instead of ~/.config/agw/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Classify an upstream error body and show the extracted retry signal.
    Classify {
        /// HTTP status of the failed response; omit to read it from the body.
        #[arg(long, value_name = "N")]
        status: Option<u16>,
        /// File holding the error body (stdin when omitted).
        file: Option<PathBuf>,
    },

    /// Print the backoff schedule the retry loop would use.
    Backoff {
        /// Server-advised delay in milliseconds.
        #[arg(long, value_name = "N")]
        hint_ms: Option<u64>,
        /// Number of retries to show.
        #[arg(long, default_value = "3", value_name = "N")]
        attempts: u32,
    },

    /// Stream a canned completion to stdout as server-sent events.
    StreamDemo {
        /// Number of content chunks to emit.
        #[arg(long, default_value = "5", value_name = "N")]
        chunks: usize,
        /// Pause between chunks in milliseconds.
        #[arg(long, default_value = "200", value_name = "N")]
        interval_ms: u64,
    },

    /// Show the effective configuration and where it was loaded from.
    Config,
}

impl Cli {
    fn load_config(&self) -> Result<GatewayConfig> {
        match &self.config {
            Some(path) => config::load_from_path(path),
            None => config::load_or_init(),
        }
    }

    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = cli.load_config()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Classify { status, file } => run_classify(status, file.as_deref())?,
            CliCommand::Backoff { hint_ms, attempts } => run_backoff(&cfg, hint_ms, attempts),
            CliCommand::StreamDemo {
                chunks,
                interval_ms,
            } => run_stream_demo(&cfg, chunks, interval_ms).await?,
            CliCommand::Config => run_config(&cfg, cli.config.as_deref())?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
