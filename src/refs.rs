//! Branch and tag references that documentation versions are built from.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A checkoutable point in history: either a branch or a tag.
///
/// Identity is `(kind, name)`. For remote branches `name` keeps the remote
/// prefix (`origin/release/1.0`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VersionRef {
    Branch {
        name: String,
        #[serde(rename = "date")]
        created_at: DateTime<FixedOffset>,
        #[serde(rename = "remote")]
        is_remote: bool,
    },
    Tag {
        name: String,
        #[serde(rename = "date")]
        created_at: DateTime<FixedOffset>,
    },
}

impl VersionRef {
    pub fn branch(
        name: impl Into<String>,
        created_at: DateTime<FixedOffset>,
        is_remote: bool,
    ) -> Self {
        VersionRef::Branch {
            name: name.into(),
            created_at,
            is_remote,
        }
    }

    pub fn tag(name: impl Into<String>, created_at: DateTime<FixedOffset>) -> Self {
        VersionRef::Tag {
            name: name.into(),
            created_at,
        }
    }

    /// Short name of the ref, origin-qualified for remote branches.
    pub fn name(&self) -> &str {
        match self {
            VersionRef::Branch { name, .. } | VersionRef::Tag { name, .. } => name,
        }
    }

    /// Name without the remote prefix: `origin/release/1.0` -> `release/1.0`.
    pub fn short_name(&self) -> &str {
        match self {
            VersionRef::Branch {
                name,
                is_remote: true,
                ..
            } => name.split_once('/').map(|(_, rest)| rest).unwrap_or(name),
            other => other.name(),
        }
    }

    pub fn created_at(&self) -> DateTime<FixedOffset> {
        match self {
            VersionRef::Branch { created_at, .. } | VersionRef::Tag { created_at, .. } => {
                *created_at
            }
        }
    }

    pub fn kind(&self) -> RefKind {
        match self {
            VersionRef::Branch { .. } => RefKind::Branch,
            VersionRef::Tag { .. } => RefKind::Tag,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, VersionRef::Branch { .. })
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, VersionRef::Tag { .. })
    }
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind(), self.name())
    }
}

/// Which variant a [`VersionRef`] is, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Branch,
    Tag,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKind::Branch => f.write_str("branch"),
            RefKind::Tag => f.write_str("tag"),
        }
    }
}

/// Where branches are listed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefLocation {
    All,
    Local,
    #[default]
    Remote,
}

impl RefLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefLocation::All => "all",
            RefLocation::Local => "local",
            RefLocation::Remote => "remote",
        }
    }

    pub fn includes_local(&self) -> bool {
        matches!(self, RefLocation::All | RefLocation::Local)
    }

    pub fn includes_remote(&self) -> bool {
        matches!(self, RefLocation::All | RefLocation::Remote)
    }
}

impl FromStr for RefLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(RefLocation::All),
            "local" => Ok(RefLocation::Local),
            "remote" => Ok(RefLocation::Remote),
            other => Err(Error::invalid(
                "location",
                format!("'{}' is not one of all, local, remote", other),
            )),
        }
    }
}

impl fmt::Display for RefLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the working tree has checked out right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadRef {
    /// On a named local branch.
    Branch(String),
    /// Detached at a tag or revision.
    Detached(String),
}

impl HeadRef {
    pub fn name(&self) -> &str {
        match self {
            HeadRef::Branch(name) | HeadRef::Detached(name) => name,
        }
    }
}

impl fmt::Display for HeadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadRef::Branch(name) => write!(f, "branch '{}'", name),
            HeadRef::Detached(name) => write!(f, "detached '{}'", name),
        }
    }
}
