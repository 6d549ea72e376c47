//! Lockfile parsers that turn lockfile text into dependency trees.
//!
//! Each parser implements [`LockfileParser`] for one lockfile format. Parsers
//! are pure functions over text that was already read from disk: they touch
//! no shared state and only consult the [`ParseContext`] for the manifest
//! being resolved, its position inside the lockfile and the cancellation
//! token. Feature flags allow opting into only the parsers you need.
//!
//! ## Feature flags
//!
//! - `parsers-javascript`: Enables every parser (npm, pnpm, Yarn classic)
//! - `parser-npm`, `parser-pnpm`, `parser-yarn-classic`: one format each
//!
//! Manifests whose lockfile format is disabled, or that have no lockfile at
//! all, are resolved by [`manifest_only`].

pub mod javascript;
pub mod manifest_only;

#[cfg(feature = "parser-npm")]
pub use javascript::NpmLockfileParser;
#[cfg(feature = "parser-pnpm")]
pub use javascript::PnpmLockfileParser;
#[cfg(feature = "parser-yarn-classic")]
pub use javascript::YarnClassicLockfileParser;

use lockscan_core::{Dependency, Manifest, PackageManager, Result};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// A parser for one lockfile format.
pub trait LockfileParser: Send + Sync {
    /// Package manager whose lockfile this parser reads.
    fn manager(&self) -> PackageManager;

    /// Build the root dependency nodes for the manifest in `ctx`.
    ///
    /// Development roots carry `is_dev = true`; callers split them with
    /// [`lockscan_core::DependencyFile::with_roots`].
    ///
    /// # Errors
    ///
    /// Returns [`lockscan_core::Error::Parse`] for malformed lockfile text and
    /// [`lockscan_core::Error::Cancelled`] when the token fires mid-parse.
    fn parse(&self, contents: &str, ctx: &ParseContext<'_>) -> Result<Vec<Dependency>>;

    /// Name of the lockfile this parser reads.
    fn lockfile_name(&self) -> &'static str {
        self.manager().lockfile_name()
    }
}

/// Inputs shared by every parser invocation.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// The manifest being resolved.
    pub manifest: &'a Manifest,
    /// Path the lockfile text came from, used in error messages.
    pub lockfile_path: Option<&'a Path>,
    /// Manifest directory relative to the lockfile directory (`/`
    /// separators, empty for the lockfile's own directory).
    pub importer: &'a str,
    /// Cancellation token checked inside parser loops.
    pub cancel: &'a CancellationToken,
}

impl<'a> ParseContext<'a> {
    /// Context for a manifest whose lockfile sits next to it.
    #[must_use]
    pub const fn new(manifest: &'a Manifest, cancel: &'a CancellationToken) -> Self {
        Self {
            manifest,
            lockfile_path: None,
            importer: "",
            cancel,
        }
    }

    /// Attach the lockfile path.
    #[must_use]
    pub const fn with_lockfile_path(mut self, path: &'a Path) -> Self {
        self.lockfile_path = Some(path);
        self
    }

    /// Locate the manifest inside a shared lockfile.
    #[must_use]
    pub const fn with_importer(mut self, importer: &'a str) -> Self {
        self.importer = importer;
        self
    }
}

/// The parser for a package manager's lockfile, if its feature is enabled.
#[must_use]
pub fn parser_for(manager: PackageManager) -> Option<&'static dyn LockfileParser> {
    match manager {
        #[cfg(feature = "parser-npm")]
        PackageManager::Npm => Some(&NpmLockfileParser),
        #[cfg(feature = "parser-pnpm")]
        PackageManager::Pnpm => Some(&PnpmLockfileParser),
        #[cfg(feature = "parser-yarn-classic")]
        PackageManager::Yarn => Some(&YarnClassicLockfileParser),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_for_each_manager() {
        for manager in PackageManager::PREFERENCE {
            let parser = parser_for(manager).unwrap();
            assert_eq!(parser.manager(), manager);
            assert_eq!(parser.lockfile_name(), manager.lockfile_name());
        }
    }
}
