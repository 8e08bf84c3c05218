//! Shared test utilities for integration and E2E tests.
//!
//! Provides a scratch documentation repository driven by the real `git`
//! binary and a stand-in for `sphinx-build`, so the whole pipeline can run
//! without a Python installation.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! #[cfg_attr(not(feature = "integration-tests"), ignore)]
//! fn test_example() {
//!     let fixture = DocsFixture::cloned_with_releases();
//!     fixture.command().arg("list").assert().success();
//! }
//! ```

use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    pub use super::DocsFixture;
}

/// Minimal `conf.py` using a theme with a bundled switcher stylesheet.
pub const CONF_PY: &str = "project = 'demo'\nhtml_theme = 'alabaster'\n";

/// Stand-in for `sphinx-build -M html <source> <output>`.
///
/// Writes `doctrees/` and `html/` like the real tool, titles the index page
/// with the first line of `index.rst` and fails when that file contains
/// `BROKEN`.
pub const FAKE_SPHINX_BUILD: &str = r#"#!/bin/sh
src="$3"
out="$4"
if grep -q BROKEN "$src/index.rst"; then
    echo "index.rst: unknown directive" >&2
    exit 1
fi
mkdir -p "$out/doctrees" "$out/html/_static" "$out/html/api"
echo pickle > "$out/doctrees/index.doctree"
title=$(head -n 1 "$src/index.rst")
printf '<html><head><title>%s</title></head><body><h1>%s</h1></body></html>\n' "$title" "$title" > "$out/html/index.html"
printf '<html><head></head><body>api</body></html>\n' > "$out/html/api/module.html"
echo 'body {}' > "$out/html/_static/basic.css"
echo "build succeeded."
"#;

/// Run git in `dir` with a fixed identity, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Docs Tester")
        .env("GIT_AUTHOR_EMAIL", "docs@example.com")
        .env("GIT_COMMITTER_NAME", "Docs Tester")
        .env("GIT_COMMITTER_EMAIL", "docs@example.com")
        .env("LC_ALL", "C")
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("git output is not UTF-8")
}

/// A temporary workspace holding a documentation repository and a fake
/// renderer outside of it.
pub struct DocsFixture {
    temp_dir: assert_fs::TempDir,
    repo: PathBuf,
}

impl DocsFixture {
    /// A fresh repository on `main` with one commit of documentation.
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        let repo = temp_dir.path().join("project");
        std::fs::create_dir_all(&repo).expect("Failed to create repo directory");

        git(&repo, &["init", "-q"]);
        git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&repo, &["config", "commit.gpgsign", "false"]);

        let fixture = Self { temp_dir, repo };
        fixture.write("docs/conf.py", CONF_PY);
        fixture.commit_docs("Main docs", "Initial docs");
        fixture.write_fake_renderer();
        fixture
    }

    /// Upstream repository with `release/1.0`, `release/2.0` and tag `v0.1`,
    /// cloned so the release branches only exist as remote branches.
    pub fn cloned_with_releases() -> Self {
        let upstream = Self::new();
        upstream.commit_docs("Version 0.1", "Docs for 0.1");
        upstream.tag("v0.1");
        upstream.branch_with_docs("release/1.0", "Version 1.0");
        upstream.branch_with_docs("release/2.0", "Version 2.0");
        git(upstream.repo(), &["checkout", "-q", "main"]);

        let clone = upstream.temp_dir.path().join("clone");
        git(
            upstream.temp_dir.path(),
            &["clone", "-q", upstream.repo().to_str().unwrap(), "clone"],
        );
        git(&clone, &["config", "commit.gpgsign", "false"]);

        Self {
            repo: clone,
            ..upstream
        }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of the fake `sphinx-build` script.
    pub fn renderer(&self) -> PathBuf {
        self.temp_dir.path().join("fake-sphinx-build")
    }

    /// Default output directory of a build.
    pub fn build_path(&self) -> PathBuf {
        self.repo.join("docs").join("build")
    }

    /// Write a file inside the repository (not committed).
    pub fn write(&self, path: &str, content: &str) {
        let target = self.repo.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(target, content).expect("Failed to write file");
    }

    /// Replace `docs/index.rst` with `title` and commit it.
    pub fn commit_docs(&self, title: &str, message: &str) {
        self.write("docs/index.rst", &format!("{}\n{}\n", title, "=".repeat(title.len())));
        git(&self.repo, &["add", "-A"]);
        git(&self.repo, &["commit", "-q", "-m", message]);
    }

    /// Create `name` from the current commit with its own docs title.
    pub fn branch_with_docs(&self, name: &str, title: &str) {
        git(&self.repo, &["checkout", "-q", "-b", name]);
        self.commit_docs(title, &format!("Docs for {}", name));
    }

    pub fn tag(&self, name: &str) {
        git(&self.repo, &["tag", name]);
    }

    /// Name of the checked-out branch, or `HEAD` when detached.
    pub fn current_branch(&self) -> String {
        git(&self.repo, &["rev-parse", "--abbrev-ref", "HEAD"])
            .trim()
            .to_string()
    }

    fn write_fake_renderer(&self) {
        let script = self.renderer();
        std::fs::write(&script, FAKE_SPHINX_BUILD).expect("Failed to write renderer");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
                .expect("Failed to make renderer executable");
        }
    }

    /// A `versioned-sphinx` command running inside the repository with the
    /// fake renderer and no inherited settings.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("versioned-sphinx");
        cmd.current_dir(&self.repo)
            .env("SPHINX_BUILD", self.renderer())
            .env_remove("VERSIONED_SPHINX_SETTINGS")
            .env_remove("VERSIONED_SPHINX_LOG")
            .env("NO_COLOR", "1");
        cmd
    }
}

impl Default for DocsFixture {
    fn default() -> Self {
        Self::new()
    }
}
