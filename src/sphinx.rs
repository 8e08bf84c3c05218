//! # Sphinx Adapter
//!
//! Finds a project's `conf.py`, runs `sphinx-build` for one version at a
//! time, and knows a few things about popular themes (where the version
//! switcher goes and which bundled stylesheet suits it).
//!
//! `sphinx-build -M html <source> <out>` writes two subtrees under `<out>`:
//! `doctrees/` with pickled intermediate state and `html/` with the final
//! pages. A build only counts as successful if the process exits zero *and*
//! prints the `build succeeded` marker.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, error};
use regex::Regex;
use walkdir::WalkDir;

use crate::assets::{self, Asset};
use crate::defaults;
use crate::error::{Error, Result};

/// Subtree holding the renderer's intermediate artifacts.
pub const INTERMEDIATE_DIR: &str = "doctrees";

/// Subtree holding the final pages.
pub const PAGES_DIR: &str = "html";

/// Text the renderer prints when a build completes.
pub const SUCCESS_MARKER: &str = "build succeeded";

const CONF_FILENAME: &str = "conf.py";

/// Renders one version of the documentation.
pub trait Builder {
    /// Render the checked-out sources into `output_dir`, producing the
    /// intermediate and final-pages subtrees beneath it.
    fn build(&self, version: &str, output_dir: &Path) -> Result<()>;

    /// Directory containing `conf.py`.
    fn source_dir(&self) -> &Path;

    /// The `html_theme` declared by the project, if any.
    fn theme(&self) -> Result<Option<String>>;
}

/// Builder backed by the `sphinx-build` executable.
#[derive(Debug, Clone)]
pub struct Sphinx {
    conf_file: PathBuf,
    source_dir: PathBuf,
    executable: String,
}

impl Sphinx {
    /// Locate `conf.py` in `repo_root` (or use `conf_path`) and prepare a
    /// builder for it.
    pub fn locate(repo_root: &Path, conf_path: Option<&Path>) -> Result<Self> {
        let conf_file = locate_config(repo_root, conf_path)?;
        let source_dir = conf_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            conf_file,
            source_dir,
            executable: defaults::SPHINX_BUILD.to_string(),
        })
    }

    /// Use a different renderer executable.
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn conf_path(&self) -> &Path {
        &self.conf_file
    }
}

impl Builder for Sphinx {
    fn build(&self, version: &str, output_dir: &Path) -> Result<()> {
        debug!(
            "Building '{}' to '{}'",
            self.source_dir.display(),
            output_dir.display()
        );

        let output = Command::new(&self.executable)
            .arg("-M")
            .arg("html")
            .arg(&self.source_dir)
            .arg(output_dir)
            .output()
            .map_err(|e| {
                let hint = (e.kind() == ErrorKind::NotFound)
                    .then(|| format!("Is '{}' installed and on PATH?", self.executable));
                error!("Error during build of {}: {}", version, e);
                Error::BuildFailure {
                    version: version.to_string(),
                    message: e.to_string(),
                    hint,
                }
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            error!("Error during build. Are you sure all themes and extensions are installed?");
            return Err(Error::BuildFailure {
                version: version.to_string(),
                message: format!(
                    "{} exited with {}: {}",
                    self.executable,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                hint: Some("Are all themes and extensions installed for this version?".to_string()),
            });
        }

        if !stdout.contains(SUCCESS_MARKER) {
            return Err(Error::BuildFailure {
                version: version.to_string(),
                message: format!("build did not succeed: {}", stdout.trim().replace('\n', " ")),
                hint: None,
            });
        }

        Ok(())
    }

    fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    fn theme(&self) -> Result<Option<String>> {
        let source = std::fs::read_to_string(&self.conf_file)?;
        read_theme(&source)
    }
}

/// Find `conf.py`: the explicit path if given, otherwise the shallowest
/// `conf.py` anywhere under `<repo_root>/docs`.
pub fn locate_config(repo_root: &Path, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(Error::ConfigNotFound {
                path: path.display().to_string(),
            })
        };
    }

    let docs = repo_root.join("docs");
    if !docs.is_dir() {
        return Err(Error::ConfigNotFound {
            path: docs.display().to_string(),
        });
    }

    let mut best: Option<(usize, PathBuf)> = None;
    for entry in WalkDir::new(&docs).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.file_name() != CONF_FILENAME {
            continue;
        }
        if best.as_ref().is_none_or(|(depth, _)| entry.depth() < *depth) {
            best = Some((entry.depth(), entry.into_path()));
        }
    }

    match best {
        Some((_, conf)) => {
            debug!("Resolved 'conf.py' to {}", conf.display());
            Ok(conf)
        }
        None => Err(Error::ConfigNotFound {
            path: docs.display().to_string(),
        }),
    }
}

/// Extract `html_theme = "..."` from the text of a `conf.py`.
pub fn read_theme(conf_source: &str) -> Result<Option<String>> {
    let pattern = Regex::new(r#"(?m)^\s*html_theme\s*=\s*['"]([^'"]+)['"]"#)?;
    Ok(pattern
        .captures(conf_source)
        .map(|captures| captures[1].to_string()))
}

/// Every `.html` page under `version_dir`, as sorted `/`-separated paths
/// relative to it.
pub fn enumerate_pages(version_dir: &Path) -> Result<Vec<String>> {
    let mut pages = Vec::new();
    for entry in WalkDir::new(version_dir) {
        let entry = entry?;
        if !entry.file_type().is_file()
            || entry.path().extension().and_then(|e| e.to_str()) != Some("html")
        {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(version_dir)
            .map_err(|e| Error::Filesystem {
                message: format!("'{}' escaped its version: {}", entry.path().display(), e),
            })?;
        let joined: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        pages.push(joined.join("/"));
    }

    pages.sort();
    Ok(pages)
}

struct ThemeSupport {
    name: &'static str,
    inject_selector: &'static str,
    stylesheet: Option<Asset>,
}

const THEMES: &[ThemeSupport] = &[
    ThemeSupport {
        name: "alabaster",
        inject_selector: "div.sphinxsidebarwrapper",
        stylesheet: Some(assets::ALABASTER_CSS),
    },
    ThemeSupport {
        name: "classic",
        inject_selector: "div.sphinxsidebarwrapper",
        stylesheet: Some(assets::ALABASTER_CSS),
    },
    ThemeSupport {
        name: "nature",
        inject_selector: "div.sphinxsidebarwrapper",
        stylesheet: Some(assets::ALABASTER_CSS),
    },
    ThemeSupport {
        name: "sphinx_rtd_theme",
        inject_selector: "div.wy-side-nav-search",
        stylesheet: Some(assets::RTD_CSS),
    },
    ThemeSupport {
        name: "furo",
        inject_selector: "div.sidebar-sticky",
        stylesheet: Some(assets::FURO_CSS),
    },
    ThemeSupport {
        name: "pydata_sphinx_theme",
        inject_selector: "div.bd-sidebar-primary",
        stylesheet: Some(assets::PYDATA_CSS),
    },
    ThemeSupport {
        name: "sphinx_book_theme",
        inject_selector: "div.sidebar-primary-items__start",
        stylesheet: Some(assets::PYDATA_CSS),
    },
    ThemeSupport {
        name: "sphinxdoc",
        inject_selector: "div.sphinxsidebarwrapper",
        stylesheet: None,
    },
];

fn theme_support(theme: &str) -> Option<&'static ThemeSupport> {
    THEMES.iter().find(|t| t.name == theme)
}

/// Bundled switcher stylesheet for a theme, if there is one.
pub fn theme_css_asset(theme: &str) -> Option<Asset> {
    theme_support(theme).and_then(|t| t.stylesheet)
}

/// CSS selector of the element the switcher is inserted into, if known.
pub fn theme_inject_selector(theme: &str) -> Option<&'static str> {
    theme_support(theme).map(|t| t.inject_selector)
}
