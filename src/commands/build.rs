//! # Build Command Implementation
//!
//! Runs the whole pipeline: every matching branch and tag is checked out and
//! rendered with `sphinx-build`, then the results are merged into one site
//! under the build path. The original checkout is restored afterwards, also
//! when a build fails.

use anyhow::Result;
use clap::Args;
use std::time::Instant;

use versioned_sphinx::defaults;
use versioned_sphinx::git::Git;
use versioned_sphinx::orchestrator;
use versioned_sphinx::output::{OutputConfig, Printer};
use versioned_sphinx::sphinx::{Builder, Sphinx};

use super::args::SourceArgs;

/// Build every matching version
#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// The sphinx-build executable to run
    #[arg(long, value_name = "PATH", env = "SPHINX_BUILD", default_value = defaults::SPHINX_BUILD)]
    pub sphinx_build: String,
}

/// Execute the `build` command.
pub fn execute(args: BuildArgs, output: OutputConfig) -> Result<()> {
    let start = Instant::now();
    let printer = Printer::new(output);

    let repo_root = args.source.repo_root()?;
    let git = Git::open(&repo_root)?;
    let sphinx = Sphinx::locate(&repo_root, args.source.conf.as_deref())?
        .with_executable(args.sphinx_build);
    let config = args.source.resolve(&repo_root, Some(sphinx.source_dir()))?;

    println!(
        "{}",
        printer.step(format!("Building documentation from {}", repo_root.display()))
    );
    let summary = orchestrator::execute(&config, &git, &sphinx)?;

    println!(
        "{}",
        printer.success(format!(
            "Built {} versions ({} pages) into {} in {:.1}s",
            summary.versions.len(),
            summary.pages,
            summary.build_path.display(),
            start.elapsed().as_secs_f64()
        ))
    );
    println!("Primary version: {}", summary.primary);
    Ok(())
}
