//! CLI for the hsmsign signing client.

mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use hsmsign_core::config;
use std::path::PathBuf;

use commands::{run_completions, run_config, run_man, run_sign, SignArgs};

/// Top-level CLI for hsmsign.
#[derive(Debug, Parser)]
#[command(name = "hsmsign")]
#[command(about = "Request HMAC signatures from a local HSM workload endpoint", long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of the XDG config path.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Sign data with a key held by the HSM and print the base64 signature.
    Sign {
        /// Key (module) identifier known to the HSM.
        key: String,

        /// Text to sign (UTF-8).
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        data: Option<String>,

        /// Sign the raw contents of this file.
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Override the configured endpoint (unix:///path or http://host:port).
        #[arg(long, value_name = "URI")]
        endpoint: Option<String>,

        /// Override the configured workload API version.
        #[arg(long, value_name = "VERSION")]
        api_version: Option<String>,
    },

    /// Show the config file path and effective settings.
    Config,

    /// Print shell completions to stdout.
    Completions {
        shell: Shell,
    },

    /// Print a man page to stdout.
    Man,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        // Completions and man page need no config.
        match cli.command {
            CliCommand::Completions { shell } => return run_completions(Cli::command(), shell),
            CliCommand::Man => return run_man(Cli::command()),
            _ => {}
        }

        let (cfg, cfg_path) = match &cli.config {
            Some(path) => (config::load_from(path)?, path.clone()),
            None => (config::load_or_init()?, config::config_path()?),
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Sign {
                key,
                data,
                file,
                endpoint,
                api_version,
            } => {
                let args = SignArgs {
                    key,
                    data,
                    file,
                    endpoint,
                    api_version,
                };
                run_sign(&cfg, args).await?;
            }
            CliCommand::Config => run_config(&cfg, &cfg_path)?,
            CliCommand::Completions { .. } | CliCommand::Man => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
