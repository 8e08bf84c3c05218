//! # Completions Command Implementation
//!
//! Writes a shell completion script for `versioned-sphinx` to stdout,
//! generated from the `clap` definition with `clap_complete`.
//!
//! ```bash
//! versioned-sphinx completions bash > ~/.local/share/bash-completion/completions/versioned-sphinx
//! versioned-sphinx completions zsh > ~/.zfunc/_versioned-sphinx
//! ```

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};
use std::io::{self, Write};

use crate::cli::Cli;

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// The shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Execute the `completions` command.
pub fn execute(args: CompletionsArgs) -> Result<()> {
    write_completions(args.shell, &mut io::stdout())
}

fn write_completions(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_completions_mention_subcommands() {
        let mut buffer = Vec::new();
        write_completions(Shell::Bash, &mut buffer).unwrap();
        let script = String::from_utf8(buffer).unwrap();
        assert!(script.contains("versioned-sphinx"));
        assert!(script.contains("build"));
        assert!(script.contains("list"));
    }
}
