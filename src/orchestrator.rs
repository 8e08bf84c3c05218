//! # Orchestrator
//!
//! Runs a complete versioned build:
//!
//! 1. **Preconditions**: switcher placement and stylesheet, output location,
//!    and the version plan (refs exist, something matches, primary found).
//! 2. **Prepare output**: clean and recreate the build path, write the
//!    switcher script and stylesheet.
//! 3. **Build**: one isolated build per version, original checkout restored.
//! 4. **Publish**: consolidate, inject assets into pages, root redirect and
//!    manifest.
//!
//! Nothing in the output directory is touched until every precondition has
//! passed.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::{self, Configuration};
use crate::error::{Error, Result};
use crate::git::VersionControl;
use crate::publish::{self, BuildManifest};
use crate::sphinx::{self, Builder};
use crate::versions::{self, VersionPlan};

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub build_path: PathBuf,
    /// Display names in build order.
    pub versions: Vec<String>,
    pub primary: String,
    pub pages: usize,
}

/// Settings derived from the project that every later stage needs.
struct Preflight {
    plan: VersionPlan,
    inject_selector: String,
    control_css: String,
}

/// Build every version and publish the combined site.
pub fn execute(
    config: &Configuration,
    vcs: &dyn VersionControl,
    builder: &dyn Builder,
) -> Result<RunSummary> {
    info!("versioned-sphinx v{}", env!("CARGO_PKG_VERSION"));

    let preflight = preflight(config, vcs, builder)?;
    let plan = &preflight.plan;
    let primary = plan
        .primary()
        .map(|entry| entry.display_name.clone())
        .ok_or_else(|| Error::NoVersionsFound {
            pattern: config.pattern.clone(),
        })?;

    prepare_output(&config.build_path)?;
    publish::write_static_assets(&config.build_path)?;
    publish::write_control_css(&config.build_path, &preflight.control_css)?;

    versions::build_all(plan, vcs, builder)?;

    publish::consolidate_all(plan)?;
    let mut pages = 0;
    for entry in plan.iter() {
        let names = sphinx::enumerate_pages(&entry.output_path)?;
        if names.is_empty() {
            warn!("Version '{}' produced no pages", entry.display_name);
        }
        publish::inject_page_assets(entry, &names)?;
        pages += names.len();
    }

    publish::write_root_redirect(&config.build_path, &primary)?;
    let manifest = BuildManifest::collect(plan, &preflight.inject_selector)?;
    publish::append_manifest(&config.build_path, &manifest)?;

    info!(
        "Built {} versions into {}",
        plan.len(),
        config.build_path.display()
    );

    Ok(RunSummary {
        build_path: config.build_path.clone(),
        versions: plan.iter().map(|e| e.display_name.clone()).collect(),
        primary,
        pages,
    })
}

fn preflight(
    config: &Configuration,
    vcs: &dyn VersionControl,
    builder: &dyn Builder,
) -> Result<Preflight> {
    let theme = builder.theme()?;
    match &theme {
        Some(theme) => info!("Detected theme '{}'", theme),
        None => info!("conf.py does not set html_theme"),
    }

    let inject_selector = match (&config.inject_selector, theme.as_deref()) {
        (Some(selector), _) => selector.clone(),
        (None, Some(theme)) => sphinx::theme_inject_selector(theme)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::invalid(
                    "inject_selector",
                    format!("theme '{}' is not supported; set inject_selector", theme),
                )
            })?,
        (None, None) => {
            return Err(Error::invalid(
                "html_theme",
                "conf.py does not set html_theme; set inject_selector and control_css",
            ));
        }
    };

    let control_css = publish::resolve_control_css(config.control_css.as_ref(), theme.as_deref())?;
    check_build_path(&config.build_path, &config.repo_root, builder.source_dir())?;

    let plan = versions::plan(config, vcs)?;
    Ok(Preflight {
        plan,
        inject_selector,
        control_css,
    })
}

/// The output root is wiped at the start of every run, so it must not hold
/// the sources.
fn check_build_path(build_path: &Path, repo_root: &Path, source_dir: &Path) -> Result<()> {
    let resolved = resolve_path(build_path);
    if resolve_path(source_dir).starts_with(&resolved)
        || resolve_path(repo_root).starts_with(&resolved)
    {
        return Err(Error::invalid(
            "build_path",
            format!(
                "'{}' contains the documentation sources and would be deleted",
                build_path.display()
            ),
        ));
    }
    Ok(())
}

/// Normalize `path` and resolve symlinks in the part of it that exists.
fn resolve_path(path: &Path) -> PathBuf {
    let normalized = config::normalize_path(path);
    let mut existing = normalized.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(real) = fs::canonicalize(existing) {
            return missing.iter().rev().fold(real, |acc, name| acc.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

fn prepare_output(build_path: &Path) -> Result<()> {
    if build_path.exists() {
        info!("Cleaning '{}'", build_path.display());
        fs::remove_dir_all(build_path)?;
    }
    fs::create_dir_all(build_path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_build_path() {
        let repo = Path::new("/repo");
        let source = Path::new("/repo/docs");

        assert!(check_build_path(Path::new("/repo/docs/build"), repo, source).is_ok());
        assert!(check_build_path(Path::new("/tmp/site"), repo, source).is_ok());

        for bad in [
            "/repo/docs",
            "/repo",
            "/",
            "/repo/docs/..",
            "/repo/docs/build/../..",
            "/repo/./docs/build/..",
            "/repo/docs/build/../../..",
        ] {
            let err = check_build_path(Path::new(bad), repo, source).unwrap_err();
            assert!(
                matches!(err, Error::InvalidConfiguration { ref key, .. } if key == "build_path"),
                "{} accepted",
                bad
            );
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_check_build_path_follows_symlinks() {
        let temp = tempfile::TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        let docs = repo.join("docs");
        fs::create_dir_all(&docs).unwrap();
        let link = temp.path().join("alias");
        std::os::unix::fs::symlink(&repo, &link).unwrap();

        let err = check_build_path(&link, &repo, &docs).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { ref key, .. } if key == "build_path"));
        assert!(check_build_path(&link.join("docs/build"), &repo, &docs).is_ok());
    }

    #[test]
    fn test_prepare_output_recreates_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        let out = temp.path().join("build");
        fs::create_dir_all(out.join("stale")).unwrap();
        fs::write(out.join("stale/old.html"), "").unwrap();

        prepare_output(&out).unwrap();

        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }
}
