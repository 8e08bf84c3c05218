//! # List Command Implementation
//!
//! Shows the versions a `build` would produce, in build order, with the
//! primary version marked. Only reads refs: nothing is checked out and
//! nothing is written.

use anyhow::Result;
use clap::Args;

use versioned_sphinx::git::Git;
use versioned_sphinx::output::{OutputConfig, Printer};
use versioned_sphinx::publish::ManifestVersion;
use versioned_sphinx::versions;

use super::args::SourceArgs;

/// List the versions that would be built
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the `list` command.
pub fn execute(args: ListArgs, output: OutputConfig) -> Result<()> {
    let repo_root = args.source.repo_root()?;
    let git = Git::open(&repo_root)?;
    let conf = args.source.conf_path(&repo_root)?;
    let conf_dir = conf.as_deref().and_then(|c| c.parent());
    let config = args.source.resolve(&repo_root, conf_dir)?;

    let plan = versions::plan(&config, &git)?;

    if args.json {
        let entries: Vec<ManifestVersion> = plan
            .iter()
            .map(|entry| ManifestVersion {
                display_name: entry.display_name.clone(),
                primary: entry.is_primary,
                version_ref: entry.version_ref.clone(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let printer = Printer::new(output);
    for entry in plan.iter() {
        let detail = format!(
            "({}, {})",
            entry.version_ref,
            entry.version_ref.created_at().format("%Y-%m-%d")
        );
        println!(
            "{}",
            printer.version(&entry.display_name, entry.is_primary, detail)
        );
    }
    println!();
    println!("{} versions", plan.len());
    Ok(())
}
