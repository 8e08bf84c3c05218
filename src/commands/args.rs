//! Options shared by every command that works on a repository.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use versioned_sphinx::config::{self, Configuration, Settings};
use versioned_sphinx::sphinx;

/// Where the repository is and which refs to consider
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Glob pattern selecting branches and tags (e.g. "release/*")
    #[arg(short, long, value_name = "GLOB")]
    pub pattern: Option<String>,

    /// Which branches to consider [default: remote]
    #[arg(short, long, value_name = "WHERE", value_parser = ["all", "local", "remote"])]
    pub location: Option<String>,

    /// Repository to build (defaults to the current directory)
    #[arg(short, long, value_name = "DIR")]
    pub repo: Option<PathBuf>,

    /// Path to conf.py (defaults to searching <repo>/docs)
    #[arg(short, long, value_name = "FILE")]
    pub conf: Option<PathBuf>,

    /// Output directory (defaults to <repo>/docs/build)
    #[arg(short, long, value_name = "DIR")]
    pub build_path: Option<PathBuf>,

    /// Version shown by default; matches a display name or a ref name
    #[arg(short = 'v', long, value_name = "NAME")]
    pub current_version: Option<String>,

    /// Project settings file (defaults to versioned_sphinx.toml next to
    /// conf.py or at the repository root)
    #[arg(long, value_name = "FILE", env = "VERSIONED_SPHINX_SETTINGS")]
    pub settings: Option<PathBuf>,
}

impl SourceArgs {
    /// Absolute repository root.
    pub fn repo_root(&self) -> Result<PathBuf> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Ok(match &self.repo {
            Some(repo) => cwd.join(repo),
            None => cwd,
        })
    }

    /// `conf.py`, if one can be found. An explicit `--conf` must exist.
    pub fn conf_path(&self, repo_root: &Path) -> Result<Option<PathBuf>> {
        match &self.conf {
            Some(conf) => Ok(Some(sphinx::locate_config(repo_root, Some(conf))?)),
            None => Ok(sphinx::locate_config(repo_root, None).ok()),
        }
    }

    fn cli_settings(&self) -> Result<Settings> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Ok(Settings {
            pattern: self.pattern.clone(),
            location: self.location.clone(),
            build_path: self.build_path.as_ref().map(|p| cwd.join(p)),
            current_version: self.current_version.clone(),
            ..Settings::default()
        })
    }

    fn project_settings(&self, conf_dir: Option<&Path>, repo_root: &Path) -> Result<Settings> {
        let path = match &self.settings {
            Some(path) => Some(path.clone()),
            None => config::find_settings_file(conf_dir.unwrap_or(repo_root), repo_root),
        };

        match path {
            Some(path) => {
                log::info!("Using project settings from {}", path.display());
                Settings::from_file(&path)
                    .with_context(|| format!("Failed to load settings from {}", path.display()))
            }
            None => Ok(Settings::default()),
        }
    }

    /// Merge the project file and these flags into a validated configuration.
    pub fn resolve(&self, repo_root: &Path, conf_dir: Option<&Path>) -> Result<Configuration> {
        let project = self.project_settings(conf_dir, repo_root)?;
        let cli = self.cli_settings()?;
        Ok(config::resolve(project, cli, repo_root)?)
    }
}
