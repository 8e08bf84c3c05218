//! # Versioned Sphinx CLI
//!
//! Binary entry point for the `versioned-sphinx` command-line tool.
//!
//! It parses arguments with `clap`, installs the logger and dispatches to
//! the subcommand. All of the real work lives in the library crate.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
