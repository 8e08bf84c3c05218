//! # Git Adapter
//!
//! Lists branches and tags, reports the current checkout and switches between
//! refs, all by shelling out to the system `git` command. Shelling out means
//! the user's own git configuration (credentials, `safe.directory`, hooks) is
//! honoured exactly as on the command line.
//!
//! ## Design
//!
//! The pipeline only talks to the [`VersionControl`] trait, so tests can swap
//! in a scripted implementation. [`Git`] itself runs every command through a
//! [`GitExecutor`], which keeps the output parsing and the dirty-tree guard
//! testable without a real repository.
//!
//! Every checkout is preceded by a clean-tree check: the pipeline checks out
//! many refs unattended, and an uncommitted change must abort the run rather
//! than be carried along or lost.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, FixedOffset};
use glob::Pattern;
use log::debug;

use crate::error::{Error, Result};
use crate::refs::{HeadRef, RefLocation, VersionRef};

const LOCAL_PREFIX: &str = "refs/heads/";
const REMOTE_PREFIX: &str = "refs/remotes/";
const TAG_PREFIX: &str = "refs/tags/";
const REF_FORMAT: &str = "--format=%(creatordate:iso-strict)%09%(refname)";

/// Operations the version pipeline needs from source control.
pub trait VersionControl {
    /// Branches matching `pattern` (all when `None`) in discovery order.
    fn list_branches(&self, pattern: Option<&str>, location: RefLocation)
        -> Result<Vec<VersionRef>>;

    /// Tags matching `pattern` (all when `None`) in discovery order.
    fn list_tags(&self, pattern: Option<&str>) -> Result<Vec<VersionRef>>;

    /// The branch or detached revision currently checked out.
    fn current_ref(&self) -> Result<HeadRef>;

    /// Switch the working tree to `target`.
    ///
    /// Fails with [`Error::DirtyWorkingTree`] before touching anything if the
    /// tree has uncommitted changes.
    ///
    /// A remote branch is built from its local tracking branch. That branch
    /// is created on first use and left in place afterwards; later runs reuse
    /// it as is, so after a `git fetch` it must be fast-forwarded to build
    /// the remote tip.
    fn checkout(&self, target: &VersionRef) -> Result<()>;

    /// Return the working tree to a previously recorded checkout.
    fn restore(&self, head: &HeadRef) -> Result<()>;
}

/// Runs a git command in a repository and returns its decoded stdout.
pub trait GitExecutor {
    fn run(&self, repo: &Path, args: &[&str]) -> Result<String>;
}

/// Executes the `git` binary found on `PATH`.
pub struct SystemGit;

impl GitExecutor for SystemGit {
    fn run(&self, repo: &Path, args: &[&str]) -> Result<String> {
        let command = format!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(repo)
            // Keep `git status` wording stable regardless of the user's locale
            .env("LC_ALL", "C")
            .output()
            .map_err(|e| Error::CommandFailure {
                command: command.clone(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::CommandFailure {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8(output.stdout).map_err(|e| Error::CommandFailure {
            command: command.clone(),
            stderr: format!("output is not valid UTF-8: {}", e),
        })?;
        debug!("command '{}' yielded '{}'", command, stdout.trim().replace('\n', " "));
        Ok(stdout)
    }
}

/// A git working tree.
pub struct Git {
    repo: PathBuf,
    executor: Box<dyn GitExecutor>,
}

impl Git {
    /// Open the repository at `repo`, verifying that it is a git work tree.
    pub fn open(repo: impl AsRef<Path>) -> Result<Self> {
        Self::with_executor(repo, Box::new(SystemGit))
    }

    /// Open a repository with a custom command executor.
    pub fn with_executor(repo: impl AsRef<Path>, executor: Box<dyn GitExecutor>) -> Result<Self> {
        let repo = repo.as_ref().to_path_buf();
        debug!("Looking for git repo in {}", repo.display());
        let git = Self { repo, executor };

        let inside = git.run(&["rev-parse", "--is-inside-work-tree"])?;
        if inside.trim() != "true" {
            return Err(Error::CommandFailure {
                command: "git rev-parse --is-inside-work-tree".to_string(),
                stderr: format!("'{}' is not a git work tree", git.repo.display()),
            });
        }

        Ok(git)
    }

    /// Root directory of the working tree.
    pub fn path(&self) -> &Path {
        &self.repo
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        self.executor.run(&self.repo, args)
    }

    /// Whether the tree has no uncommitted changes to tracked files.
    ///
    /// Untracked files are ignored so an un-ignored build directory does not
    /// block the pipeline.
    pub fn is_clean(&self) -> Result<bool> {
        let status = self.run(&["status", "--porcelain", "--untracked-files=no"])?;
        Ok(status.trim().is_empty())
    }

    fn ensure_clean(&self) -> Result<()> {
        if self.is_clean()? {
            Ok(())
        } else {
            Err(Error::DirtyWorkingTree {
                repo: self.repo.display().to_string(),
            })
        }
    }

    fn local_branch_exists(&self, name: &str) -> Result<bool> {
        let full = format!("{}{}", LOCAL_PREFIX, name);
        let listing = self.run(&["for-each-ref", "--format=%(refname)", &full])?;
        Ok(listing.lines().any(|line| line.trim() == full))
    }

    fn list_refs(&self, namespaces: &[&str]) -> Result<Vec<(String, String)>> {
        let mut args = vec!["for-each-ref", REF_FORMAT];
        args.extend_from_slice(namespaces);
        let listing = self.run(&args)?;

        Ok(listing
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| {
                line.split_once('\t')
                    .map(|(date, name)| (date.trim().to_string(), name.trim().to_string()))
            })
            .collect())
    }
}

impl VersionControl for Git {
    fn list_branches(
        &self,
        pattern: Option<&str>,
        location: RefLocation,
    ) -> Result<Vec<VersionRef>> {
        let mut namespaces = Vec::new();
        if location.includes_local() {
            namespaces.push("refs/heads");
        }
        if location.includes_remote() {
            namespaces.push("refs/remotes");
        }

        let matcher = RefMatcher::new(pattern)?;
        let mut branches = Vec::new();
        for (date, full_name) in self.list_refs(&namespaces)? {
            if let Some(branch) = parse_branch(&date, &full_name)? {
                if matcher.matches_branch(&branch) {
                    branches.push(branch);
                }
            }
        }
        Ok(branches)
    }

    fn list_tags(&self, pattern: Option<&str>) -> Result<Vec<VersionRef>> {
        let matcher = RefMatcher::new(pattern)?;
        let mut tags = Vec::new();
        for (date, full_name) in self.list_refs(&["refs/tags"])? {
            let Some(name) = full_name.strip_prefix(TAG_PREFIX) else {
                continue;
            };
            if matcher.matches(name) {
                tags.push(VersionRef::tag(name, parse_date(&date, &full_name)?));
            }
        }
        Ok(tags)
    }

    fn current_ref(&self) -> Result<HeadRef> {
        let status = self.run(&["status"])?;
        parse_status_head(&status)
    }

    fn checkout(&self, target: &VersionRef) -> Result<()> {
        self.ensure_clean()?;

        match target {
            VersionRef::Branch {
                name, is_remote, ..
            } if *is_remote => {
                let local = target.short_name();
                if self.local_branch_exists(local)? {
                    debug!(
                        "Reusing local branch '{}' for '{}'; it may lag behind the remote",
                        local, name
                    );
                    self.run(&["checkout", local])?;
                } else {
                    debug!("Creating local branch '{}' tracking '{}'", local, name);
                    self.run(&["checkout", "-b", local, "--track", name])?;
                }
            }
            VersionRef::Branch { name, .. } => {
                self.run(&["checkout", name])?;
            }
            VersionRef::Tag { name, .. } => {
                let full = format!("{}{}", TAG_PREFIX, name);
                self.run(&["checkout", "--detach", &full])?;
            }
        }
        Ok(())
    }

    fn restore(&self, head: &HeadRef) -> Result<()> {
        self.ensure_clean()?;

        match head {
            HeadRef::Branch(name) => self.run(&["checkout", name])?,
            HeadRef::Detached(rev) => self.run(&["checkout", "--detach", rev])?,
        };
        Ok(())
    }
}

/// Glob matcher for short ref names.
struct RefMatcher {
    pattern: Option<Pattern>,
}

impl RefMatcher {
    fn new(pattern: Option<&str>) -> Result<Self> {
        let pattern = pattern.map(Pattern::new).transpose()?;
        Ok(Self { pattern })
    }

    fn matches(&self, name: &str) -> bool {
        self.pattern.as_ref().is_none_or(|p| p.matches(name))
    }

    /// Remote branches also match with their remote prefix stripped, so
    /// `release/*` selects `origin/release/1.0`.
    fn matches_branch(&self, branch: &VersionRef) -> bool {
        self.matches(branch.name()) || self.matches(branch.short_name())
    }
}

fn parse_date(date: &str, ref_name: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(date).map_err(|e| Error::CommandFailure {
        command: "git for-each-ref".to_string(),
        stderr: format!("could not parse date '{}' of {}: {}", date, ref_name, e),
    })
}

/// Turn one `for-each-ref` line into a branch; `None` for symbolic refs such
/// as `origin/HEAD` and for refs outside the branch namespaces.
fn parse_branch(date: &str, full_name: &str) -> Result<Option<VersionRef>> {
    let (name, is_remote) = if let Some(name) = full_name.strip_prefix(LOCAL_PREFIX) {
        (name, false)
    } else if let Some(name) = full_name.strip_prefix(REMOTE_PREFIX) {
        if name.ends_with("/HEAD") {
            return Ok(None);
        }
        (name, true)
    } else {
        return Ok(None);
    };

    Ok(Some(VersionRef::branch(
        name,
        parse_date(date, full_name)?,
        is_remote,
    )))
}

/// Read the checkout from the first line of `git status`.
pub fn parse_status_head(status: &str) -> Result<HeadRef> {
    let first_line = status.lines().next().unwrap_or_default().trim();

    if let Some(branch) = first_line.strip_prefix("On branch ") {
        Ok(HeadRef::Branch(branch.trim().to_string()))
    } else if let Some(rev) = first_line.strip_prefix("HEAD detached at ") {
        Ok(HeadRef::Detached(rev.trim().to_string()))
    } else {
        log::error!("Unknown checkout: '{}'", first_line);
        Err(Error::UnknownCheckoutState {
            status: first_line.to_string(),
        })
    }
}
