//! Library-level tests of the full pipeline.
//!
//! Source control and the renderer are replaced by scripted implementations
//! of `VersionControl` and `Builder`, so these run without `git` or Sphinx.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset};
use tempfile::TempDir;
use versioned_sphinx::config::{self, Configuration, ControlCss, Settings};
use versioned_sphinx::error::{Error, Result};
use versioned_sphinx::git::VersionControl;
use versioned_sphinx::orchestrator;
use versioned_sphinx::refs::{HeadRef, RefLocation, VersionRef};
use versioned_sphinx::sphinx::Builder;

fn at(day: u32) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(&format!("2024-03-{:02}T09:30:00+02:00", day)).unwrap()
}

struct ScriptedRepo {
    branches: Vec<VersionRef>,
    tags: Vec<VersionRef>,
    head: RefCell<HeadRef>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRepo {
    fn new(branches: Vec<VersionRef>, tags: Vec<VersionRef>) -> Self {
        Self {
            branches,
            tags,
            head: RefCell::new(HeadRef::Branch("main".to_string())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// `origin/release/1.0`, `origin/release/2.0` and tag `v0.1`.
    fn releases() -> Self {
        Self::new(
            vec![
                VersionRef::branch("origin/release/1.0", at(2), true),
                VersionRef::branch("origin/release/2.0", at(3), true),
            ],
            vec![VersionRef::tag("v0.1", at(1))],
        )
    }

    fn with_tags(count: usize) -> Self {
        let tags = (1..=count)
            .map(|i| VersionRef::tag(format!("v{}.0", i), at(i as u32)))
            .collect();
        Self::new(Vec::new(), tags)
    }

    fn checkouts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with("checkout"))
            .cloned()
            .collect()
    }
}

impl VersionControl for ScriptedRepo {
    fn list_branches(&self, _pattern: Option<&str>, _location: RefLocation) -> Result<Vec<VersionRef>> {
        Ok(self.branches.clone())
    }

    fn list_tags(&self, _pattern: Option<&str>) -> Result<Vec<VersionRef>> {
        Ok(self.tags.clone())
    }

    fn current_ref(&self) -> Result<HeadRef> {
        Ok(self.head.borrow().clone())
    }

    fn checkout(&self, target: &VersionRef) -> Result<()> {
        self.calls.lock().unwrap().push(format!("checkout {}", target.name()));
        *self.head.borrow_mut() = HeadRef::Detached(target.name().to_string());
        Ok(())
    }

    fn restore(&self, head: &HeadRef) -> Result<()> {
        self.calls.lock().unwrap().push(format!("restore {}", head));
        *self.head.borrow_mut() = head.clone();
        Ok(())
    }
}

/// Writes Sphinx-shaped output; fails on the `fail_on`-th build (1-based).
struct ScriptedBuilder {
    source: PathBuf,
    theme: Option<String>,
    fail_on: Option<usize>,
    built: RefCell<Vec<String>>,
}

impl ScriptedBuilder {
    fn new(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            theme: Some("alabaster".to_string()),
            fail_on: None,
            built: RefCell::new(Vec::new()),
        }
    }
}

impl Builder for ScriptedBuilder {
    fn build(&self, version: &str, output_dir: &Path) -> Result<()> {
        self.built.borrow_mut().push(version.to_string());
        if self.fail_on == Some(self.built.borrow().len()) {
            return Err(Error::BuildFailure {
                version: version.to_string(),
                message: "sphinx-build exited with 2".to_string(),
                hint: None,
            });
        }

        fs::create_dir_all(output_dir.join("doctrees"))?;
        fs::write(output_dir.join("doctrees/index.doctree"), "pickle")?;
        fs::create_dir_all(output_dir.join("html/guide"))?;
        fs::write(
            output_dir.join("html/index.html"),
            format!("<html><head><title>{}</title></head><body></body></html>", version),
        )?;
        fs::write(
            output_dir.join("html/guide/install.html"),
            "<html><head></head><body></body></html>",
        )?;
        Ok(())
    }

    fn source_dir(&self) -> &Path {
        &self.source
    }

    fn theme(&self) -> Result<Option<String>> {
        Ok(self.theme.clone())
    }
}

struct Workspace {
    _temp: TempDir,
    repo: PathBuf,
    build: PathBuf,
}

fn workspace() -> Workspace {
    let temp = TempDir::new().unwrap();
    let repo = temp.path().join("repo");
    let build = temp.path().join("site");
    fs::create_dir_all(repo.join("docs")).unwrap();
    Workspace {
        _temp: temp,
        repo,
        build,
    }
}

fn configure(ws: &Workspace, project: Settings) -> Configuration {
    let cli = Settings {
        build_path: Some(ws.build.clone()),
        ..Settings::default()
    };
    config::resolve(project, cli, &ws.repo).unwrap()
}

/// Project settings naming remote branches without their `origin/` prefix,
/// with `extra` appended.
fn without_remote_prefix(extra: &str, base_dir: &Path) -> Settings {
    let text = format!(
        "{}\n[display_name]\nrules = [{{ kind = \"branch\", pattern = '^origin/(.*)$', replace = \"$1\" }}]\n",
        extra
    );
    Settings::from_toml_str(&text, base_dir).unwrap()
}

fn read(path: PathBuf) -> String {
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {}", path.display(), e))
}

#[test]
fn test_releases_end_to_end() {
    let ws = workspace();
    let vcs = ScriptedRepo::releases();
    let builder = ScriptedBuilder::new(&ws.repo.join("docs"));
    let config = configure(&ws, without_remote_prefix("", &ws.repo));

    let summary = orchestrator::execute(&config, &vcs, &builder).unwrap();

    // Natural descending order on display names
    assert_eq!(summary.versions, vec!["v0.1", "release/2.0", "release/1.0"]);
    assert_eq!(summary.primary, "v0.1");
    assert_eq!(summary.pages, 6);

    for version in ["v0.1", "release/2.0", "release/1.0"] {
        let dir = ws.build.join(version);
        assert!(dir.join("index.html").is_file(), "{} not flattened", version);
        assert!(dir.join("guide/install.html").is_file());
        assert!(!dir.join("doctrees").exists());
        assert!(!dir.join("html").exists());
    }

    let redirect = read(ws.build.join("index.html"));
    assert!(redirect.contains("url='v0.1/index.html'"));

    let script = read(ws.build.join("versioned_sphinx.js"));
    assert!(script.contains(r#""release/2.0":["guide/install.html","index.html"]"#));
    assert!(script.contains(r#"THEME_INJECT_POINT = "div.sphinxsidebarwrapper";"#));
    assert_eq!(script.matches(r#""primary":true"#).count(), 1);

    let css = read(ws.build.join("versioned_sphinx.css"));
    assert!(css.contains(".versioned-sphinx-switcher"));

    let mut root_files: Vec<String> = fs::read_dir(&ws.build)
        .unwrap()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().unwrap().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    root_files.sort();
    assert_eq!(
        root_files,
        vec!["index.html", "versioned_sphinx.css", "versioned_sphinx.js"]
    );

    let page = read(ws.build.join("release/2.0/guide/install.html"));
    assert!(page.contains(r#"<script src="../../../versioned_sphinx.js"></script>"#));

    assert_eq!(
        vcs.checkouts(),
        vec![
            "checkout v0.1",
            "checkout origin/release/2.0",
            "checkout origin/release/1.0"
        ]
    );
    assert_eq!(*vcs.head.borrow(), HeadRef::Branch("main".to_string()));
}

#[test]
fn test_semver_sort_puts_newest_release_first() {
    let ws = workspace();
    let vcs = ScriptedRepo::releases();
    let builder = ScriptedBuilder::new(&ws.repo.join("docs"));
    let project = without_remote_prefix("sort = \"semver\"", &ws.repo);
    let config = configure(&ws, project);

    let summary = orchestrator::execute(&config, &vcs, &builder).unwrap();

    assert_eq!(summary.versions, vec!["release/2.0", "release/1.0", "v0.1"]);
    assert_eq!(summary.primary, "release/2.0");
    assert!(read(ws.build.join("index.html")).contains("url='release/2.0/index.html'"));
}

#[test]
fn test_pinned_primary_is_the_only_primary() {
    let ws = workspace();
    let vcs = ScriptedRepo::with_tags(3);
    let builder = ScriptedBuilder::new(&ws.repo.join("docs"));
    let project = Settings {
        current_version: Some("v2.0".to_string()),
        ..Settings::default()
    };
    let config = configure(&ws, project);

    orchestrator::execute(&config, &vcs, &builder).unwrap();

    let script = read(ws.build.join("versioned_sphinx.js"));
    let manifest_line = script
        .lines()
        .find(|line| line.starts_with("VERSIONS = "))
        .unwrap();
    let json = manifest_line
        .trim_start_matches("VERSIONS = ")
        .trim_end_matches(';');
    let versions: serde_json::Value = serde_json::from_str(json).unwrap();
    let primaries: Vec<&str> = versions
        .as_array()
        .unwrap()
        .iter()
        .filter(|v| v["primary"] == true)
        .map(|v| v["display_name"].as_str().unwrap())
        .collect();
    assert_eq!(primaries, vec!["v2.0"]);
}

#[test]
fn test_restores_checkout_for_every_failure_position() {
    for count in 1..=4 {
        for fail_on in 0..=count {
            let ws = workspace();
            let vcs = ScriptedRepo::with_tags(count);
            *vcs.head.borrow_mut() = HeadRef::Branch("feature/docs".to_string());
            let mut builder = ScriptedBuilder::new(&ws.repo.join("docs"));
            builder.fail_on = (fail_on > 0).then_some(fail_on);
            let config = configure(&ws, Settings::default());

            let result = orchestrator::execute(&config, &vcs, &builder);

            if fail_on == 0 {
                assert!(result.is_ok());
            } else {
                assert!(matches!(result, Err(Error::BuildFailure { .. })));
                assert_eq!(builder.built.borrow().len(), fail_on);
            }
            assert_eq!(
                *vcs.head.borrow(),
                HeadRef::Branch("feature/docs".to_string()),
                "{} builds, failure at {}",
                count,
                fail_on
            );
        }
    }
}

#[test]
fn test_preflight_failures_leave_output_untouched() {
    let ws = workspace();
    fs::create_dir_all(&ws.build).unwrap();
    fs::write(ws.build.join("keep.txt"), "previous run").unwrap();

    let vcs = ScriptedRepo::with_tags(2);
    let builder = ScriptedBuilder::new(&ws.repo.join("docs"));

    let missing_primary = Settings {
        current_version: Some("v9.0".to_string()),
        ..Settings::default()
    };
    let err = orchestrator::execute(&configure(&ws, missing_primary), &vcs, &builder).unwrap_err();
    assert!(matches!(err, Error::PrimaryVersionNotFound { .. }));

    let nothing_matches = Settings::default().with_filter(|_| false);
    let err = orchestrator::execute(&configure(&ws, nothing_matches), &vcs, &builder).unwrap_err();
    assert!(matches!(err, Error::NoVersionsFound { .. }));

    let mut unknown_theme = ScriptedBuilder::new(&ws.repo.join("docs"));
    unknown_theme.theme = Some("my_company_theme".to_string());
    let err = orchestrator::execute(&configure(&ws, Settings::default()), &vcs, &unknown_theme)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfiguration { ref key, .. } if key == "inject_selector"));

    assert_eq!(read(ws.build.join("keep.txt")), "previous run");
    assert!(vcs.checkouts().is_empty());
}

#[test]
fn test_unknown_theme_with_overrides() {
    let ws = workspace();
    let vcs = ScriptedRepo::with_tags(1);
    let mut builder = ScriptedBuilder::new(&ws.repo.join("docs"));
    builder.theme = Some("my_company_theme".to_string());
    let project = Settings {
        inject_selector: Some("nav.versions".to_string()),
        control_css: Some(ControlCss::Literal(".versioned-sphinx-switcher { margin: 0; }".to_string())),
        ..Settings::default()
    };
    let config = configure(&ws, project);

    orchestrator::execute(&config, &vcs, &builder).unwrap();

    assert_eq!(
        read(ws.build.join("versioned_sphinx.css")),
        ".versioned-sphinx-switcher { margin: 0; }"
    );
    assert!(read(ws.build.join("versioned_sphinx.js"))
        .contains(r#"THEME_INJECT_POINT = "nav.versions";"#));
}

#[test]
fn test_display_names_shape_output() {
    let ws = workspace();
    let vcs = ScriptedRepo::releases();
    let builder = ScriptedBuilder::new(&ws.repo.join("docs"));
    let project = Settings::from_toml_str(
        r#"
        [display_name]
        rules = [
            { kind = "branch", pattern = '^origin/release/(.*)$', replace = "$1" },
            { kind = "tag", pattern = '^v(.*)$', replace = "$1" },
        ]
        "#,
        &ws.repo,
    )
    .unwrap();
    let config = configure(&ws, project);

    let summary = orchestrator::execute(&config, &vcs, &builder).unwrap();

    assert_eq!(summary.versions, vec!["2.0", "1.0", "0.1"]);
    assert!(ws.build.join("2.0/index.html").is_file());
    assert_eq!(*builder.built.borrow(), vec!["2.0", "1.0", "0.1"]);
}

#[test]
fn test_build_path_inside_sources_is_rejected() {
    let ws = workspace();
    let vcs = ScriptedRepo::with_tags(1);
    let builder = ScriptedBuilder::new(&ws.repo.join("docs"));
    let cli = Settings {
        build_path: Some(ws.repo.clone()),
        ..Settings::default()
    };
    let config = config::resolve(Settings::default(), cli, &ws.repo).unwrap();

    let err = orchestrator::execute(&config, &vcs, &builder).unwrap_err();
    assert!(matches!(err, Error::InvalidConfiguration { ref key, .. } if key == "build_path"));
    assert!(ws.repo.join("docs").is_dir());
}

#[test]
fn test_build_path_resolving_to_repository_is_rejected() {
    let ws = workspace();
    fs::write(ws.repo.join("docs/index.rst"), "Title").unwrap();
    let vcs = ScriptedRepo::with_tags(1);
    let builder = ScriptedBuilder::new(&ws.repo.join("docs"));

    for build_path in ["docs/..", "docs/build/../..", "../repo"] {
        let project = Settings {
            build_path: Some(PathBuf::from(build_path)),
            ..Settings::default()
        };
        let config = config::resolve(project, Settings::default(), &ws.repo).unwrap();

        let err = orchestrator::execute(&config, &vcs, &builder).unwrap_err();
        assert!(
            matches!(err, Error::InvalidConfiguration { ref key, .. } if key == "build_path"),
            "{} accepted",
            build_path
        );
        assert!(ws.repo.join("docs/index.rst").is_file());
    }
    assert!(vcs.checkouts().is_empty());
}
