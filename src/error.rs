//! # Error Handling
//!
//! This module defines the centralized error type for `versioned-sphinx`.
//! It uses the `thiserror` library to create a single `Error` enum covering
//! every failure the pipeline can hit, each variant carrying enough context
//! to tell the user what went wrong and, where possible, how to fix it.
//!
//! ## Failure Classes
//!
//! - **Pre-flight** errors (`InvalidConfiguration`, `NoVersionsFound`,
//!   `PrimaryVersionNotFound`, `ConfigNotFound`) are raised before the output
//!   directory is touched.
//! - **Checkout** errors (`DirtyWorkingTree`, `UnknownCheckoutState`,
//!   `CommandFailure`) come from the git adapter.
//! - **Build** errors (`BuildFailure`) come from the renderer and abort the
//!   run after the original checkout has been restored.
//!
//! No variant is ever swallowed: every error propagates to the caller.

use thiserror::Error;

/// Main error type for versioned-sphinx operations
#[derive(Error, Debug)]
pub enum Error {
    /// A setting is missing, has the wrong shape, or fails its contract check.
    #[error("Invalid configuration for '{key}': {message}")]
    InvalidConfiguration { key: String, message: String },

    /// Discovery and filtering left nothing to build.
    #[error("No branches or tags found matching {}{}", pattern.as_deref().map(|p| format!("pattern '{}'", p)).unwrap_or_else(|| "the configured filter".to_string()), "\n  hint: Check --pattern, --location and the [filter] table")]
    NoVersionsFound { pattern: Option<String> },

    /// The pinned current version matches no display name or ref name.
    #[error("No branch or tag found matching current version '{name}'")]
    PrimaryVersionNotFound { name: String },

    /// The working tree has uncommitted changes and a checkout was requested.
    #[error("Repository '{repo}' has uncommitted changes\n  hint: Commit or stash your changes before building versioned docs")]
    DirtyWorkingTree { repo: String },

    /// A git invocation exited non-zero or produced undecodable output.
    #[error("Command failed: {command} - {stderr}")]
    CommandFailure { command: String, stderr: String },

    /// The documentation renderer failed for a version.
    #[error("Build failed for version '{version}': {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    BuildFailure {
        version: String,
        message: String,
        /// Optional hint about the likely cause
        hint: Option<String>,
    },

    /// `git status` reported a checkout form that cannot be interpreted.
    #[error("Unknown checkout state: '{status}'")]
    UnknownCheckoutState { status: String },

    /// No `conf.py` could be found.
    #[error("Sphinx configuration not found: {path}\n  hint: Use -c/--conf to point at conf.py")]
    ConfigNotFound { path: String },

    /// A filesystem operation on the output tree failed.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A directory walk error, wrapped from `walkdir::Error`.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A JSON serialization error, wrapped from `serde_json::Error`.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A TOML parsing error, wrapped from `toml::de::Error`.
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

impl Error {
    /// Shorthand for an `InvalidConfiguration` error naming the offending key.
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
