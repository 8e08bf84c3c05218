//! # Version Set Builder
//!
//! Turns the refs in a repository into an ordered list of versions and then
//! builds each of them, one checkout at a time.
//!
//! A run moves through `Discover -> Filter -> Sort -> Resolve-Primary`
//! (see [`plan`]) and then `Build-Each -> Restore` (see [`build_all`]).
//! Planning never touches the working tree, which is what the `list`
//! command relies on.
//!
//! The working tree is shared by every build, so builds are strictly
//! sequential. Whatever happens during Build-Each, the checkout that was
//! active before it started is restored before `build_all` returns.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use log::{error, info, warn};

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::git::VersionControl;
use crate::natural;
use crate::refs::{HeadRef, RefKind, VersionRef};
use crate::sphinx::Builder;

/// One version of the site, derived from a ref for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub display_name: String,
    pub version_ref: VersionRef,
    pub is_primary: bool,
    /// `<build_path>/<display_name>`
    pub output_path: PathBuf,
}

/// The ordered versions of a run. Exactly one entry is primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPlan {
    pub entries: Vec<VersionEntry>,
}

impl VersionPlan {
    pub fn primary(&self) -> Option<&VersionEntry> {
        self.entries.iter().find(|e| e.is_primary)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VersionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Branches (per the configured location) followed by tags, each matching
/// the configured pattern, without duplicates.
pub fn discover(config: &Configuration, vcs: &dyn VersionControl) -> Result<Vec<VersionRef>> {
    let pattern = config.pattern.as_deref();
    let mut refs = vcs.list_branches(pattern, config.location)?;
    refs.extend(vcs.list_tags(pattern)?);

    let mut seen: HashSet<(RefKind, String)> = HashSet::new();
    refs.retain(|r| seen.insert((r.kind(), r.name().to_string())));

    info!("Discovered {} refs", refs.len());
    Ok(refs)
}

/// Apply the configured filter, keeping discovery order.
pub fn filter(config: &Configuration, refs: Vec<VersionRef>) -> Result<Vec<VersionRef>> {
    let kept: Vec<VersionRef> = match &config.filter {
        Some(keep) => refs.into_iter().filter(|r| keep(r)).collect(),
        None => refs,
    };

    if kept.is_empty() {
        return Err(Error::NoVersionsFound {
            pattern: config.pattern.clone(),
        });
    }
    Ok(kept)
}

/// Order refs with the custom sort if there is one, otherwise by natural
/// descending order of their display names.
pub fn sort(config: &Configuration, refs: Vec<VersionRef>) -> Result<Vec<VersionRef>> {
    match &config.sort {
        Some(custom) => {
            let expected = refs.len();
            let sorted = custom(refs);
            if sorted.len() != expected {
                return Err(Error::invalid(
                    "sort",
                    format!("returned {} refs when given {}", sorted.len(), expected),
                ));
            }
            Ok(sorted)
        }
        None => {
            let mut refs = refs;
            natural::sort_descending_by_key(&mut refs, |r| config.display_name_of(r));
            Ok(refs)
        }
    }
}

/// Index of the primary version: the pinned current version if configured,
/// else the first entry.
pub fn resolve_primary(config: &Configuration, entries: &[VersionEntry]) -> Result<usize> {
    match &config.current_version {
        Some(current) => entries
            .iter()
            .position(|e| &e.display_name == current || e.version_ref.name() == current)
            .ok_or_else(|| Error::PrimaryVersionNotFound {
                name: current.clone(),
            }),
        None if entries.is_empty() => Err(Error::NoVersionsFound {
            pattern: config.pattern.clone(),
        }),
        None => Ok(0),
    }
}

/// Run Discover, Filter, Sort and Resolve-Primary.
pub fn plan(config: &Configuration, vcs: &dyn VersionControl) -> Result<VersionPlan> {
    let refs = discover(config, vcs)?;
    let refs = filter(config, refs)?;
    let refs = sort(config, refs)?;

    let mut entries = Vec::with_capacity(refs.len());
    for version_ref in refs {
        let display_name = config.display_name_of(&version_ref);
        check_display_name(&display_name)?;
        entries.push(VersionEntry {
            output_path: config.build_path.join(&display_name),
            display_name,
            version_ref,
            is_primary: false,
        });
    }
    warn_duplicate_names(&entries);

    let primary = resolve_primary(config, &entries)?;
    entries[primary].is_primary = true;
    info!("Primary version is '{}'", entries[primary].display_name);

    Ok(VersionPlan { entries })
}

/// Display names become directories under the output root.
fn check_display_name(name: &str) -> Result<()> {
    let path = Path::new(name);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if name.trim().is_empty() || escapes {
        return Err(Error::invalid(
            "display_name",
            format!("'{}' is not a usable directory name", name),
        ));
    }
    Ok(())
}

fn warn_duplicate_names(entries: &[VersionEntry]) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        *counts.entry(entry.display_name.as_str()).or_default() += 1;
    }
    for entry in entries {
        if counts.get(entry.display_name.as_str()).copied().unwrap_or(0) > 1 {
            warn!(
                "Display name '{}' is used by more than one ref; later builds overwrite earlier ones",
                entry.display_name
            );
            counts.remove(entry.display_name.as_str());
        }
    }
}

/// Holds the checkout that was active when a run started and puts it back
/// when released or dropped.
struct CheckoutGuard<'a> {
    vcs: &'a dyn VersionControl,
    original: HeadRef,
    restored: bool,
}

impl<'a> CheckoutGuard<'a> {
    fn acquire(vcs: &'a dyn VersionControl) -> Result<Self> {
        let original = vcs.current_ref()?;
        info!("Recorded current checkout: {}", original);
        Ok(Self {
            vcs,
            original,
            restored: false,
        })
    }

    fn restore(mut self) -> Result<()> {
        self.restored = true;
        info!("Restoring {}", self.original);
        self.vcs.restore(&self.original)
    }
}

impl Drop for CheckoutGuard<'_> {
    fn drop(&mut self) {
        if !self.restored {
            if let Err(e) = self.vcs.restore(&self.original) {
                error!("Could not restore {}: {}", self.original, e);
            }
        }
    }
}

/// Check out and build every version of `plan` in order, then restore the
/// original checkout. The first failure stops the run; builds are never
/// retried.
pub fn build_all(
    plan: &VersionPlan,
    vcs: &dyn VersionControl,
    builder: &dyn Builder,
) -> Result<()> {
    let guard = CheckoutGuard::acquire(vcs)?;
    let built = build_each(plan, vcs, builder);
    let restored = guard.restore();

    match (built, restored) {
        (Err(e), Err(restore_err)) => {
            error!("Restoring the original checkout also failed: {}", restore_err);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), restored) => restored,
    }
}

fn build_each(plan: &VersionPlan, vcs: &dyn VersionControl, builder: &dyn Builder) -> Result<()> {
    for (index, entry) in plan.iter().enumerate() {
        info!(
            "[{}/{}] Building {} as '{}'",
            index + 1,
            plan.len(),
            entry.version_ref,
            entry.display_name
        );
        vcs.checkout(&entry.version_ref)?;
        fs::create_dir_all(&entry.output_path)?;
        builder.build(&entry.display_name, &entry.output_path)?;
    }
    Ok(())
}
