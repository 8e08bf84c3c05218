//! # Versioned Sphinx Library
//!
//! Builds Sphinx documentation once for every matching git branch and tag
//! and stitches the results into a single static site with a version
//! switcher. The `versioned-sphinx` binary is a thin wrapper around this
//! crate.
//!
//! ## Quick Example
//!
//! ```
//! use versioned_sphinx::natural;
//!
//! let mut versions = vec!["v2.0", "v10.0", "v1.0"];
//! natural::sort_descending_by_key(&mut versions, |v| v.to_string());
//! assert_eq!(versions, vec!["v10.0", "v2.0", "v1.0"]);
//! ```
//!
//! ## Core Concepts
//!
//! - **Refs (`refs`)**: branches and tags a version can be built from.
//! - **Adapters (`git`, `sphinx`)**: the `VersionControl` and `Builder`
//!   traits and their implementations over the system `git` and
//!   `sphinx-build` commands.
//! - **Configuration (`config`)**: command-line and project settings merged
//!   into one validated `Configuration`.
//! - **Version set (`versions`)**: discovery, filtering, ordering and
//!   primary selection, then one build per version with the original
//!   checkout restored afterwards.
//! - **Publishing (`publish`)**: consolidation, page asset injection, root
//!   redirect and the manifest read by the switcher script.
//!
//! ## Execution Flow
//!
//! [`orchestrator::execute`] validates everything it can up front, cleans
//! the output directory, builds each version in turn and publishes the
//! combined site. The library only logs through the `log` facade; installing
//! a logger is left to the binary.

pub mod assets;
pub mod config;
pub mod defaults;
pub mod error;
pub mod git;
pub mod natural;
pub mod orchestrator;
pub mod output;
pub mod publish;
pub mod refs;
pub mod sphinx;
pub mod versions;

#[cfg(test)]
mod natural_proptest;
