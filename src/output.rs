//! # Terminal Output
//!
//! Status lines printed by the `versioned-sphinx` binary. Logging goes to
//! stderr through `log`; these lines are the user-facing summary on stdout.
//!
//! Color and emoji are used only when the terminal supports them and the
//! user has not opted out:
//! - `--color=never|always|auto`
//! - `NO_COLOR` (any value) disables color
//! - `CLICOLOR=0` disables color, `CLICOLOR_FORCE=1` forces it
//! - `TERM=dumb` disables color

use std::env;
use std::fmt::Display;

use console::style;

/// Whether output may use color and emoji.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Decide from the `--color` flag value and the environment.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => detect_color_support(),
        };
        Self { use_color }
    }

    pub fn plain() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

fn detect_color_support() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
        return false;
    }
    if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
        return true;
    }
    if env::var("TERM").is_ok_and(|v| v == "dumb") {
        return false;
    }
    console::Term::stdout().features().colors_supported()
}

/// Pick the emoji when color is on, the plain marker otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji
    } else {
        plain
    }
}

/// Formats the binary's status lines.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    config: OutputConfig,
}

impl Printer {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn success(&self, message: impl Display) -> String {
        let marker = emoji(&self.config, "✅", "[OK]");
        if self.config.use_color {
            format!("{} {}", marker, style(message).green())
        } else {
            format!("{} {}", marker, message)
        }
    }

    pub fn step(&self, message: impl Display) -> String {
        let marker = emoji(&self.config, "📚", "[..]");
        if self.config.use_color {
            format!("{} {}", marker, style(message).bold())
        } else {
            format!("{} {}", marker, message)
        }
    }

    /// A version line for listings; the primary version is highlighted.
    pub fn version(&self, display_name: &str, primary: bool, detail: impl Display) -> String {
        let marker = if primary {
            emoji(&self.config, "⭐", "*")
        } else {
            " "
        };
        if self.config.use_color && primary {
            format!("{} {} {}", marker, style(display_name).cyan().bold(), style(detail).dim())
        } else if self.config.use_color {
            format!("{} {} {}", marker, display_name, style(detail).dim())
        } else {
            format!("{} {} {}", marker, display_name, detail)
        }
    }
}
