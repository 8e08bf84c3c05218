//! # Configuration Resolution
//!
//! Settings come from two places: command-line flags and the project's
//! `versioned_sphinx.toml`. Both are read into a [`Settings`] value, and
//! [`resolve`] merges them into one immutable [`Configuration`], key by key,
//! with the project file winning over the command line and the command line
//! winning over built-in defaults.
//!
//! ## Project File
//!
//! ```toml
//! pattern = "release/*"
//! location = "all"
//! current_version = "release/2.0"
//! sort = "semver"                       # natural | created | semver
//! inject_selector = "div.sidebar"
//! control_css_path = "switcher.css"     # or control_css = "..."
//!
//! [filter]
//! kind = "any"                          # any | branch | tag
//! include = ['^release/', '^v\d+\.\d+$']
//! exclude = ['-rc\d*$']
//!
//! [display_name]
//! rules = [{ kind = "tag", pattern = '^v(.*)$', replace = "$1" }]
//! ```
//!
//! The `filter`, `sort` and `display_name` tables compile into the same
//! boxed strategies library users can install directly with
//! [`Settings::with_filter`] and friends.
//!
//! ## Validation
//!
//! Everything is checked here, before any checkout or build happens:
//! misconfiguration would otherwise only show up after the expensive
//! per-version build pass. Strategies are probed once against a synthetic
//! ref to prove they can be invoked and honour their contract.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use glob::Pattern;
use log::debug;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::defaults;
use crate::error::{Error, Result};
use crate::natural;
use crate::refs::{RefKind, RefLocation, VersionRef};

/// Decides whether a discovered ref becomes a version.
pub type FilterFn = Box<dyn Fn(&VersionRef) -> bool>;

/// Reorders the full filtered list of refs.
pub type SortFn = Box<dyn Fn(Vec<VersionRef>) -> Vec<VersionRef>>;

/// Names the output directory and switcher label of a ref.
pub type DisplayNameFn = Box<dyn Fn(&VersionRef) -> String>;

/// Stylesheet used for the version switcher, when not taken from the theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCss {
    /// CSS text written verbatim.
    Literal(String),
    /// A stylesheet copied from disk.
    File(PathBuf),
}

/// One source of settings; every field is optional.
#[derive(Default)]
pub struct Settings {
    pub pattern: Option<String>,
    pub location: Option<String>,
    pub build_path: Option<PathBuf>,
    pub current_version: Option<String>,
    pub control_css: Option<ControlCss>,
    pub inject_selector: Option<String>,
    pub filter: Option<FilterFn>,
    pub sort: Option<SortFn>,
    pub display_name: Option<DisplayNameFn>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("pattern", &self.pattern)
            .field("location", &self.location)
            .field("build_path", &self.build_path)
            .field("current_version", &self.current_version)
            .field("control_css", &self.control_css)
            .field("inject_selector", &self.inject_selector)
            .field("filter", &self.filter.is_some())
            .field("sort", &self.sort.is_some())
            .field("display_name", &self.display_name.is_some())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilterTable {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    include: Vec<String>,
    #[serde(default)]
    exclude: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DisplayNameTable {
    rules: Vec<RenameRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RenameRule {
    #[serde(default)]
    kind: Option<String>,
    pattern: String,
    replace: String,
}

impl Settings {
    pub fn with_filter(mut self, filter: impl Fn(&VersionRef) -> bool + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn with_sort(
        mut self,
        sort: impl Fn(Vec<VersionRef>) -> Vec<VersionRef> + 'static,
    ) -> Self {
        self.sort = Some(Box::new(sort));
        self
    }

    pub fn with_display_name(mut self, name: impl Fn(&VersionRef) -> String + 'static) -> Self {
        self.display_name = Some(Box::new(name));
        self
    }

    /// Load a project settings file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        debug!("Loading project settings from {}", path.display());
        Self::from_toml_str(&text, base_dir)
    }

    /// Parse project settings. Relative `control_css_path` values are
    /// resolved against `base_dir`.
    pub fn from_toml_str(text: &str, base_dir: &Path) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(text)?;

        let control_css = match (
            take::<String>(&mut table, "control_css")?,
            take::<PathBuf>(&mut table, "control_css_path")?,
        ) {
            (Some(css), _) => Some(ControlCss::Literal(css)),
            (None, Some(path)) => Some(ControlCss::File(base_dir.join(path))),
            (None, None) => None,
        };

        let mut settings = Settings {
            pattern: take(&mut table, "pattern")?,
            location: take(&mut table, "location")?,
            build_path: take(&mut table, "build_path")?,
            current_version: take(&mut table, "current_version")?,
            control_css,
            inject_selector: take(&mut table, "inject_selector")?,
            ..Settings::default()
        };

        if let Some(sort) = take::<String>(&mut table, "sort")? {
            settings.sort = builtin_sort(&sort)?;
        }
        if let Some(filter) = take::<FilterTable>(&mut table, "filter")? {
            settings.filter = Some(compile_filter(filter)?);
        }
        if let Some(names) = take::<DisplayNameTable>(&mut table, "display_name")? {
            settings.display_name = Some(compile_display_name(names)?);
        }

        if let Some(unknown) = table.keys().next() {
            return Err(Error::invalid(unknown, "unknown setting"));
        }

        Ok(settings)
    }
}

fn take<T: DeserializeOwned>(table: &mut toml::Table, key: &str) -> Result<Option<T>> {
    table
        .remove(key)
        .map(|value| value.try_into::<T>().map_err(|e| Error::invalid(key, e.to_string())))
        .transpose()
}

fn parse_kind(key: &str, kind: Option<&str>) -> Result<Option<RefKind>> {
    match kind {
        None | Some("any") => Ok(None),
        Some("branch") => Ok(Some(RefKind::Branch)),
        Some("tag") => Ok(Some(RefKind::Tag)),
        Some(other) => Err(Error::invalid(
            key,
            format!("kind '{}' is not one of any, branch, tag", other),
        )),
    }
}

fn compile_regexes(key: &str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| Error::invalid(key, e.to_string())))
        .collect()
}

fn compile_filter(table: FilterTable) -> Result<FilterFn> {
    let kind = parse_kind("filter", table.kind.as_deref())?;
    let include = compile_regexes("filter", &table.include)?;
    let exclude = compile_regexes("filter", &table.exclude)?;

    Ok(Box::new(move |version: &VersionRef| {
        let names = [version.name(), version.short_name()];
        let matches = |re: &Regex| names.iter().any(|n| re.is_match(n));

        kind.is_none_or(|k| k == version.kind())
            && (include.is_empty() || include.iter().any(matches))
            && !exclude.iter().any(matches)
    }))
}

fn compile_display_name(table: DisplayNameTable) -> Result<DisplayNameFn> {
    let mut rules = Vec::with_capacity(table.rules.len());
    for rule in table.rules {
        let kind = parse_kind("display_name", rule.kind.as_deref())?;
        let pattern = Regex::new(&rule.pattern)
            .map_err(|e| Error::invalid("display_name", e.to_string()))?;
        rules.push((kind, pattern, rule.replace));
    }

    Ok(Box::new(move |version: &VersionRef| {
        let name = version.name();
        rules
            .iter()
            .find(|(kind, pattern, _)| {
                kind.is_none_or(|k| k == version.kind()) && pattern.is_match(name)
            })
            .map(|(_, pattern, replace)| pattern.replace(name, replace.as_str()).into_owned())
            .unwrap_or_else(|| name.to_string())
    }))
}

fn builtin_sort(name: &str) -> Result<Option<SortFn>> {
    match name {
        "natural" => Ok(None),
        "created" => Ok(Some(Box::new(sort_by_created))),
        "semver" => Ok(Some(Box::new(sort_by_semver))),
        other => Err(Error::invalid(
            "sort",
            format!("'{}' is not one of natural, created, semver", other),
        )),
    }
}

/// Newest creation timestamp first; ties keep their order.
pub fn sort_by_created(mut versions: Vec<VersionRef>) -> Vec<VersionRef> {
    versions.sort_by_key(|v| std::cmp::Reverse(v.created_at()));
    versions
}

/// Highest semantic version first. Names that do not parse follow in
/// natural descending order.
pub fn sort_by_semver(versions: Vec<VersionRef>) -> Vec<VersionRef> {
    let (mut parsed, mut unparsed): (Vec<_>, Vec<_>) = versions
        .into_iter()
        .map(|v| (parse_semver(v.name()), v))
        .partition(|(parsed, _)| parsed.is_some());

    parsed.sort_by(|(a, _), (b, _)| b.cmp(a));
    natural::sort_descending_by_key(&mut unparsed, |(_, v)| v.name().to_string());

    parsed
        .into_iter()
        .chain(unparsed)
        .map(|(_, v)| v)
        .collect()
}

/// `origin/release/v1.2` -> 1.2.0
fn parse_semver(name: &str) -> Option<semver::Version> {
    let last = name.rsplit('/').next().unwrap_or(name);
    let bare = last.strip_prefix('v').unwrap_or(last);

    let (core, rest) = match bare.find(['-', '+']) {
        Some(idx) => bare.split_at(idx),
        None => (bare, ""),
    };
    let mut parts: Vec<&str> = core.split('.').collect();
    while parts.len() < 3 {
        parts.push("0");
    }

    semver::Version::parse(&format!("{}{}", parts.join("."), rest)).ok()
}

/// Look for the project settings file next to `conf.py`, then at the
/// repository root.
pub fn find_settings_file(conf_dir: &Path, repo_root: &Path) -> Option<PathBuf> {
    [conf_dir, repo_root]
        .iter()
        .map(|dir| dir.join(defaults::SETTINGS_FILENAME))
        .find(|candidate| candidate.is_file())
}

/// Fully resolved, validated settings for one run.
pub struct Configuration {
    pub repo_root: PathBuf,
    pub build_path: PathBuf,
    pub pattern: Option<String>,
    pub location: RefLocation,
    pub current_version: Option<String>,
    pub control_css: Option<ControlCss>,
    pub inject_selector: Option<String>,
    pub filter: Option<FilterFn>,
    pub sort: Option<SortFn>,
    pub display_name: Option<DisplayNameFn>,
}

impl Configuration {
    /// Directory name and switcher label for `version`.
    pub fn display_name_of(&self, version: &VersionRef) -> String {
        match &self.display_name {
            Some(name) => name(version),
            None => version.name().to_string(),
        }
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("repo_root", &self.repo_root)
            .field("build_path", &self.build_path)
            .field("pattern", &self.pattern)
            .field("location", &self.location)
            .field("current_version", &self.current_version)
            .field("control_css", &self.control_css)
            .field("inject_selector", &self.inject_selector)
            .field("filter", &self.filter.is_some())
            .field("sort", &self.sort.is_some())
            .field("display_name", &self.display_name.is_some())
            .finish()
    }
}

/// Merge project and command-line settings and validate the result.
pub fn resolve(project: Settings, cli: Settings, repo_root: &Path) -> Result<Configuration> {
    let build_path = match project.build_path.or(cli.build_path) {
        Some(path) if path.as_os_str().is_empty() => {
            return Err(Error::invalid("build_path", "must not be empty"));
        }
        Some(path) if path.is_relative() => normalize_path(&repo_root.join(path)),
        Some(path) => normalize_path(&path),
        None => defaults::default_build_path(repo_root),
    };

    let pattern = project.pattern.or(cli.pattern);
    if let Some(pattern) = &pattern {
        Pattern::new(pattern).map_err(|e| Error::invalid("pattern", e.to_string()))?;
    }

    let location = match project.location.or(cli.location) {
        Some(location) => location.parse()?,
        None => RefLocation::default(),
    };

    let config = Configuration {
        repo_root: repo_root.to_path_buf(),
        build_path,
        pattern,
        location,
        current_version: project.current_version.or(cli.current_version),
        control_css: project.control_css.or(cli.control_css),
        inject_selector: project.inject_selector.or(cli.inject_selector),
        filter: project.filter.or(cli.filter),
        sort: project.sort.or(cli.sort),
        display_name: project.display_name.or(cli.display_name),
    };

    probe_strategies(&config)?;
    debug!("Resolved {:?}", config);
    Ok(config)
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(component),
            },
            other => normalized.push(other),
        }
    }
    normalized
}

fn sample_ref() -> VersionRef {
    VersionRef::tag("test", Utc::now().into())
}

fn probe<T>(key: &str, call: impl FnOnce() -> T) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(call))
        .map_err(|_| Error::invalid(key, "panicked when probed with a sample ref"))
}

fn probe_strategies(config: &Configuration) -> Result<()> {
    if let Some(filter) = &config.filter {
        probe("filter", || filter(&sample_ref()))?;
    }

    if let Some(name) = &config.display_name {
        let display = probe("display_name", || name(&sample_ref()))?;
        if display.trim().is_empty() {
            return Err(Error::invalid("display_name", "produced an empty name"));
        }
    }

    if let Some(sort) = &config.sort {
        let sorted = probe("sort", || sort(vec![sample_ref()]))?;
        if sorted.len() != 1 {
            return Err(Error::invalid(
                "sort",
                format!("returned {} refs when given 1", sorted.len()),
            ));
        }
    }

    Ok(())
}
