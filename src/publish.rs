//! # Consolidation and Publishing
//!
//! Everything that happens to the output tree after the per-version builds:
//!
//! - flattening each version's `doctrees/` + `html/` output into one page tree,
//! - wiring the switcher stylesheet and script into every page,
//! - the root redirect to the primary version,
//! - the version manifest appended to `versioned_sphinx.js`.
//!
//! The final layout is:
//!
//! ```text
//! <build_path>/
//!     index.html              redirect to <primary>/index.html
//!     versioned_sphinx.css    switcher stylesheet
//!     versioned_sphinx.js     switcher script + manifest
//!     <display_name>/...      flattened pages of each version
//! ```

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;

use crate::assets;
use crate::config::ControlCss;
use crate::defaults;
use crate::error::{Error, Result};
use crate::refs::VersionRef;
use crate::sphinx::{self, INTERMEDIATE_DIR, PAGES_DIR};
use crate::versions::{VersionEntry, VersionPlan};

const INJECTION_MARKER: &str = "<!-- versioned-sphinx -->";

/// Flatten one version's build output in place.
///
/// Only a directory holding nothing but the renderer's intermediate and
/// pages subtrees is flattened: the intermediate subtree is removed and
/// everything in the pages subtree moves up one level. Anything else is
/// treated as already flattened and left alone, so running this twice is
/// harmless even when the pages themselves contain an `html/` directory.
pub fn consolidate(version_dir: &Path) -> Result<()> {
    if !is_raw_output(version_dir)? {
        debug!("'{}' is already consolidated", version_dir.display());
        return Ok(());
    }

    let doctrees = version_dir.join(INTERMEDIATE_DIR);
    if doctrees.is_dir() {
        debug!("Removing '{}'...", doctrees.display());
        fs::remove_dir_all(&doctrees)?;
    }

    let html = version_dir.join(PAGES_DIR);
    if !html.is_dir() {
        return Ok(());
    }

    // Park the pages under a name none of its entries use, so moving an
    // entry called `html` up cannot land on the pages directory itself.
    let staging = staging_dir(version_dir, &html);
    fs::rename(&html, &staging)?;

    debug!("Moving '{}' -> '{}'...", html.display(), version_dir.display());
    for item in fs::read_dir(&staging)? {
        let item = item?;
        fs::rename(item.path(), version_dir.join(item.file_name()))?;
    }
    fs::remove_dir(&staging)?;

    Ok(())
}

/// Whether `dir` holds only the renderer's `doctrees/` and `html/` subtrees.
fn is_raw_output(dir: &Path) -> Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    for item in fs::read_dir(dir)? {
        let name = item?.file_name();
        if name != INTERMEDIATE_DIR && name != PAGES_DIR {
            return Ok(false);
        }
    }
    Ok(true)
}

fn staging_dir(version_dir: &Path, pages: &Path) -> PathBuf {
    let mut name = String::from(".html-consolidate");
    while pages.join(&name).exists() || version_dir.join(&name).exists() {
        name.push('_');
    }
    version_dir.join(name)
}

/// Flatten every version of a run.
pub fn consolidate_all(plan: &VersionPlan) -> Result<()> {
    info!("Consolidating HTML versions...");
    for entry in plan.iter() {
        consolidate(&entry.output_path)?;
    }
    Ok(())
}

/// Write `index.html` at the output root, redirecting to the primary
/// version's landing page.
pub fn write_root_redirect(build_path: &Path, primary: &str) -> Result<PathBuf> {
    let target = format!("{}/index.html", primary);
    let html = format!(
        r#"<!DOCTYPE html>
<html>
    <head>
        <meta charset="utf-8" />
        <meta http-equiv="refresh" content="0; url='{target}'" />
        <link rel="canonical" href="{target}" />
    </head>
    <body>
        <p>Redirecting to <a href="{target}">{primary}</a>...</p>
    </body>
</html>
"#,
        target = escape_attr(&target),
        primary = escape_attr(primary),
    );

    let path = build_path.join(defaults::ROOT_INDEX_FILENAME);
    info!("Writing root HTML file...");
    fs::write(&path, html)?;
    Ok(path)
}

/// One entry of the manifest's `VERSIONS` list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestVersion {
    pub display_name: String,
    pub primary: bool,
    #[serde(flatten)]
    pub version_ref: VersionRef,
}

/// Cross-version metadata read by the switcher script.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildManifest {
    pub files_per_version: BTreeMap<String, Vec<String>>,
    pub inject_selector: String,
    pub versions: Vec<ManifestVersion>,
}

impl BuildManifest {
    /// Collect page lists from the consolidated version directories.
    pub fn collect(plan: &VersionPlan, inject_selector: &str) -> Result<Self> {
        let mut files_per_version = BTreeMap::new();
        for entry in plan.iter() {
            let pages = sphinx::enumerate_pages(&entry.output_path)?;
            files_per_version.insert(entry.display_name.clone(), pages);
        }

        let versions = plan
            .iter()
            .map(|entry| ManifestVersion {
                display_name: entry.display_name.clone(),
                primary: entry.is_primary,
                version_ref: entry.version_ref.clone(),
            })
            .collect();

        Ok(Self {
            files_per_version,
            inject_selector: inject_selector.to_string(),
            versions,
        })
    }

    /// The manifest as JavaScript assignments.
    pub fn render_script(&self) -> Result<String> {
        Ok(format!(
            "FILES_PER_VERSION = {};\nTHEME_INJECT_POINT = {};\nVERSIONS = {};\n",
            serde_json::to_string(&self.files_per_version)?,
            serde_json::to_string(&self.inject_selector)?,
            serde_json::to_string(&self.versions)?,
        ))
    }
}

/// Append the manifest to the switcher script at the output root.
pub fn append_manifest(build_path: &Path, manifest: &BuildManifest) -> Result<()> {
    info!("Writing version details...");
    let script = manifest.render_script()?;
    let mut file = OpenOptions::new()
        .append(true)
        .open(build_path.join(assets::SWITCHER_SCRIPT.name))?;
    write!(file, "\n\n{}", script)?;
    Ok(())
}

/// Copy the bundled switcher script to the output root.
///
/// The script draws a plain `<select>`; no third-party widget files
/// (`choices.min.js`, `choices.min.css`) are written.
pub fn write_static_assets(build_path: &Path) -> Result<()> {
    let path = build_path.join(assets::SWITCHER_SCRIPT.name);
    debug!("Writing '{}'", path.display());
    fs::write(path, assets::SWITCHER_SCRIPT.contents)?;
    Ok(())
}

/// Pick the switcher stylesheet: literal CSS, then a CSS file, then the
/// theme's bundled stylesheet.
pub fn resolve_control_css(control_css: Option<&ControlCss>, theme: Option<&str>) -> Result<String> {
    match control_css {
        Some(ControlCss::Literal(css)) => Ok(css.clone()),
        Some(ControlCss::File(path)) => fs::read_to_string(path).map_err(|e| {
            Error::invalid(
                "control_css_path",
                format!("could not read '{}': {}", path.display(), e),
            )
        }),
        None => theme
            .and_then(sphinx::theme_css_asset)
            .map(|asset| asset.contents.to_string())
            .ok_or_else(|| {
                Error::invalid(
                    "control_css",
                    format!(
                        "no bundled stylesheet for theme '{}'; set control_css or control_css_path",
                        theme.unwrap_or("<none>")
                    ),
                )
            }),
    }
}

pub fn write_control_css(build_path: &Path, css: &str) -> Result<()> {
    fs::write(build_path.join(defaults::CONTROL_CSS_FILENAME), css)?;
    Ok(())
}

/// Link the switcher assets into every page of a consolidated version.
///
/// Returns how many pages were changed. Pages that already carry the
/// assets, or have no `</head>`, are skipped.
pub fn inject_page_assets(entry: &VersionEntry, pages: &[String]) -> Result<usize> {
    let version_depth = Path::new(&entry.display_name).components().count();
    let mut injected = 0;

    for page in pages {
        let path = entry.output_path.join(page);
        let html = fs::read_to_string(&path)?;
        if html.contains(INJECTION_MARKER) {
            continue;
        }
        let Some(head_end) = html.find("</head>") else {
            debug!("No </head> in '{}', skipping", path.display());
            continue;
        };

        let depth = version_depth + page.matches('/').count();
        let root = "../".repeat(depth);
        let snippet = format!(
            concat!(
                "{marker}\n",
                "<meta name=\"versioned-sphinx:version\" content=\"{version}\" />\n",
                "<meta name=\"versioned-sphinx:root\" content=\"{root}\" />\n",
                "<link rel=\"stylesheet\" href=\"{root}{css}\" type=\"text/css\" />\n",
                "<script src=\"{root}{js}\"></script>\n",
            ),
            marker = INJECTION_MARKER,
            version = escape_attr(&entry.display_name),
            root = root,
            css = defaults::CONTROL_CSS_FILENAME,
            js = assets::SWITCHER_SCRIPT.name,
        );

        let mut patched = String::with_capacity(html.len() + snippet.len());
        patched.push_str(&html[..head_end]);
        patched.push_str(&snippet);
        patched.push_str(&html[head_end..]);
        fs::write(&path, patched)?;
        injected += 1;
    }

    Ok(injected)
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
