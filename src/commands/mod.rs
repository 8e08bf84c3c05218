//! # CLI Command Implementations
//!
//! One file per subcommand of `versioned-sphinx`. Each holds a `clap` `Args`
//! struct and an `execute` function that calls into the `versioned_sphinx`
//! library. Options shared by `build` and `list` live in [`args`].

pub mod args;
pub mod build;
pub mod completions;
pub mod list;
