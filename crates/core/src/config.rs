//! Scan configuration.
//!
//! Settings are read from an optional `lockscan.toml` in the scan root:
//!
//! ```toml
//! mode = "auto"
//! commandTimeoutSecs = 120
//! concurrency = 4
//! useWorkspaceLockfile = true
//! ignore = ["fixtures", "*.snap"]
//! ```
//!
//! Command-line flags override whatever the file sets.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Name of the configuration file looked up in the scan root.
pub const CONFIG_FILE: &str = "lockscan.toml";

/// Which resolution path a scan uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Try the package manager CLI, fall back to lockfile parsing.
    #[default]
    Auto,
    /// Only run the package manager CLI.
    Native,
    /// Only parse lockfiles.
    Static,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Native => write!(f, "native"),
            Self::Static => write!(f, "static"),
        }
    }
}

impl FromStr for ScanMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "native" => Ok(Self::Native),
            "static" => Ok(Self::Static),
            other => Err(Error::configuration(format!(
                "Unknown scan mode '{other}' (expected auto, native or static)"
            ))),
        }
    }
}

/// Settings for one scan call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Resolution mode.
    pub mode: ScanMode,
    /// Wall-clock limit for each package manager command.
    pub command_timeout_secs: u64,
    /// Number of manifests resolved at the same time.
    pub concurrency: usize,
    /// Let members without a lockfile use the workspace root lockfile.
    pub use_workspace_lockfile: bool,
    /// Apply `.gitignore` rules during discovery.
    pub respect_gitignore: bool,
    /// Extra ignore patterns, in `.gitignore` syntax.
    pub ignore: Vec<String>,
    /// Maximum directory depth walked during discovery.
    pub max_depth: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Auto,
            command_timeout_secs: 120,
            concurrency: 1,
            use_workspace_lockfile: false,
            respect_gitignore: true,
            ignore: Vec::new(),
            max_depth: 32,
        }
    }
}

impl ScanConfig {
    /// Parse configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for malformed TOML, unknown keys or
    /// out-of-range values.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| {
            Error::configuration(format!("Failed to parse {CONFIG_FILE}: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file.
    ///
    /// Returns `None` if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the file exists but cannot be
    /// read or parsed.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("Failed to read {}: {e}", path.display()))
        })?;

        Self::from_toml_str(&contents).map(Some)
    }

    /// Load `lockscan.toml` from a scan root, or defaults when absent.
    ///
    /// # Errors
    ///
    /// See [`ScanConfig::load`].
    pub fn discover(root: &Path) -> Result<Self> {
        Ok(Self::load(&root.join(CONFIG_FILE))?.unwrap_or_default())
    }

    /// Reject values that make a scan impossible.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a zero timeout or zero concurrency.
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(Error::configuration("commandTimeoutSecs must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(Error::configuration("concurrency must be at least 1"));
        }
        Ok(())
    }

    /// Command timeout as a [`Duration`].
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
