//! Adapters that run a package manager's listing command and parse its output.
//!
//! Each adapter knows one tool: how to tell that a directory belongs to it,
//! which command lists the installed tree, and how to turn that command's
//! JSON into [`Dependency`] trees. Adapters are plain values injected into
//! [`crate::NativeStrategy`], so tests can substitute their own.

pub mod npm;
pub mod pnpm;
pub mod yarn;

pub use npm::NpmCliAdapter;
pub use pnpm::PnpmCliAdapter;
pub use yarn::YarnCliAdapter;

use crate::executor::CommandSpec;
use lockscan_core::{Dependency, Manifest, PackageManager, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A package manager command line tool.
pub trait CliAdapter: Send + Sync {
    /// Package manager this adapter drives.
    fn manager(&self) -> PackageManager;

    /// Whether `dir` is managed by this tool. The default checks for the
    /// manager's lockfile.
    fn is_supported(&self, dir: &Path) -> bool {
        dir.join(self.manager().lockfile_name()).is_file()
    }

    /// The listing command, run with the manifest directory as cwd.
    fn command(&self) -> CommandSpec;

    /// Parse the command's standard output into root dependency nodes.
    ///
    /// Development roots carry `is_dev = true`. Packages that the tool
    /// reports as missing are emitted as leaves whose version is the raw
    /// declared range, which [`lockscan_core::version::is_unresolved`]
    /// recognises.
    ///
    /// # Errors
    ///
    /// Returns [`lockscan_core::Error::Parse`] when the output is not the
    /// expected JSON and [`lockscan_core::Error::Cancelled`] when the token
    /// fires.
    fn parse(
        &self,
        output: &str,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Dependency>>;
}

/// The built-in adapters in lockfile preference order.
#[must_use]
pub fn default_adapters() -> Vec<Arc<dyn CliAdapter>> {
    vec![
        Arc::new(PnpmCliAdapter),
        Arc::new(YarnCliAdapter),
        Arc::new(NpmCliAdapter),
    ]
}

/// Pick the adapter for a manifest directory.
///
/// The directory itself is checked first; the workspace root breaks the tie
/// for members that have no lockfile of their own.
#[must_use]
pub fn select_adapter<'a>(
    adapters: &'a [Arc<dyn CliAdapter>],
    dir: &Path,
    workspace_root: &Path,
) -> Option<&'a dyn CliAdapter> {
    adapters
        .iter()
        .find(|adapter| adapter.is_supported(dir))
        .or_else(|| {
            adapters
                .iter()
                .find(|adapter| adapter.is_supported(workspace_root))
        })
        .map(|adapter| &**adapter)
}

/// Leaf for a package the tool reports as not installed.
fn missing(name: &str, range: &str) -> Dependency {
    Dependency::transitive(name, range, range)
}

/// Root-level constraint and dev flag for a package named in the output.
fn declared_root(manifest: &Manifest, name: &str, fallback: &str) -> (String, bool) {
    let range = manifest.range_of(name).unwrap_or(fallback).to_string();
    let is_dev = manifest.group_of(name).is_some_and(|group| group.is_dev());
    (range, is_dev)
}

/// Finish a root node: clear the transitive flag and apply the dev flag to
/// the whole subtree.
fn into_root(mut node: Dependency, is_dev: bool) -> Dependency {
    node.is_transitive = false;
    if is_dev {
        node.mark_dev_recursive();
    }
    node
}
