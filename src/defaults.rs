//! Default values for versioned-sphinx configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::{Path, PathBuf};

/// Name of the project settings file, looked up next to `conf.py` and then
/// at the repository root.
pub const SETTINGS_FILENAME: &str = "versioned_sphinx.toml";

/// Renderer executable used when neither `--sphinx-build` nor
/// `SPHINX_BUILD` is given.
pub const SPHINX_BUILD: &str = "sphinx-build";

/// Stylesheet for the version switcher, written at the output root.
pub const CONTROL_CSS_FILENAME: &str = "versioned_sphinx.css";

/// Landing page written at the output root.
pub const ROOT_INDEX_FILENAME: &str = "index.html";

/// Returns the default build output directory for a repository.
///
/// This is `<repo>/docs/build`, overridable with `-b/--build-path` or the
/// `build_path` project setting.
pub fn default_build_path(repo_root: &Path) -> PathBuf {
    repo_root.join("docs").join("build")
}
