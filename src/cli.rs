//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use versioned_sphinx::output::OutputConfig;

use crate::commands;

/// Environment variable holding an `env_logger` filter; overrides `--log-level`.
pub const LOG_ENV: &str = "VERSIONED_SPHINX_LOG";

/// Versioned Sphinx - Build documentation for every branch and tag into one site
#[derive(Parser, Debug)]
#[command(name = "versioned-sphinx")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build every matching version and publish the combined site
    Build(commands::build::BuildArgs),

    /// Show which versions would be built, in order, without building
    List(commands::list::ListArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);
        let output = OutputConfig::from_env_and_flag(&self.color);

        match self.command {
            Commands::Build(args) => commands::build::execute(args, output),
            Commands::List(args) => commands::list::execute(args, output),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

fn init_logging(level: &str) {
    // A logger may already be installed when running inside tests
    let _ = Builder::from_env(Env::default().filter_or(LOG_ENV, level))
        .format_timestamp(None)
        .try_init();
}
