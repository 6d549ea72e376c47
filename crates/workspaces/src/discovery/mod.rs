//! Manifest discovery.
//!
//! [`WorkspaceDiscovery`] walks a scan root with `ignore::WalkBuilder`, which
//! applies root and nested `.gitignore` files, prunes the built-in denylist
//! and any configured patterns, and returns the sorted list of
//! `package.json` files it finds.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lockscan_workspaces::WorkspaceDiscovery;
//! use std::path::Path;
//!
//! let workspace = WorkspaceDiscovery::new().scan(Path::new("."), &cancel)?;
//! println!("{} manifests, monorepo: {}", workspace.manifests.len(), workspace.is_monorepo());
//! ```

use ignore::WalkBuilder;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use lockscan_core::{Error, MANIFEST_FILE, Result, ScanConfig};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Directories that never contain manifests worth scanning.
pub const DEFAULT_IGNORES: &[&str] = &[
    "node_modules/",
    ".git/",
    ".next/",
    ".turbo/",
    ".cache/",
    ".output/",
    ".vercel/",
    ".expo/",
    ".parcel-cache/",
    ".docusaurus/",
    ".angular/",
    ".svelte-kit/",
    ".nuxt/",
];

/// Result of a discovery walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredWorkspace {
    /// The scanned root.
    pub root: PathBuf,
    /// Manifest paths, sorted.
    pub manifests: Vec<PathBuf>,
}

impl DiscoveredWorkspace {
    /// Distinct directories that contain a manifest.
    #[must_use]
    pub fn directories(&self) -> BTreeSet<&Path> {
        self.manifests.iter().filter_map(|p| p.parent()).collect()
    }

    /// A workspace is a monorepo when manifests live in more than one directory.
    #[must_use]
    pub fn is_monorepo(&self) -> bool {
        self.directories().len() > 1
    }
}

/// Enumerates candidate manifests under a root directory.
#[derive(Debug, Clone)]
pub struct WorkspaceDiscovery {
    respect_gitignore: bool,
    extra_ignores: Vec<String>,
    max_depth: usize,
}

impl Default for WorkspaceDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceDiscovery {
    /// Discovery with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&ScanConfig::default())
    }

    /// Discovery configured from scan settings.
    #[must_use]
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            respect_gitignore: config.respect_gitignore,
            extra_ignores: config.ignore.clone(),
            max_depth: config.max_depth,
        }
    }

    /// Walk `root` and collect every `package.json` that is not ignored.
    ///
    /// `.gitignore` rules apply whether or not `root` is inside a git
    /// repository. Unreadable directories are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileNotFound`] when `root` does not exist,
    /// [`Error::Configuration`] for an invalid `ignore` pattern and
    /// [`Error::Cancelled`] when the token fires during the walk.
    #[tracing::instrument(skip(self, cancel), fields(root = %root.display()))]
    pub fn scan(&self, root: &Path, cancel: &CancellationToken) -> Result<DiscoveredWorkspace> {
        if !root.is_dir() {
            return Err(Error::FileNotFound {
                path: root.to_path_buf(),
            });
        }

        let denylist = self.denylist(root)?;
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .git_ignore(self.respect_gitignore)
            .require_git(false)
            .follow_links(false)
            .max_depth(Some(self.max_depth))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                entry.depth() == 0 || !denylist.matched(entry.path(), is_dir).is_ignore()
            })
            .build();

        let mut manifests = Vec::new();
        for entry in walker {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable path during discovery");
                    continue;
                }
            };
            if entry.file_type().is_some_and(|t| t.is_file()) && entry.file_name() == MANIFEST_FILE
            {
                manifests.push(entry.into_path());
            }
        }

        manifests.sort();
        tracing::debug!(count = manifests.len(), "Discovered manifests");

        Ok(DiscoveredWorkspace {
            root: root.to_path_buf(),
            manifests,
        })
    }

    /// Built-in denylist plus configured patterns, in `.gitignore` syntax.
    fn denylist(&self, root: &Path) -> Result<Gitignore> {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in DEFAULT_IGNORES
            .iter()
            .copied()
            .chain(self.extra_ignores.iter().map(String::as_str))
        {
            builder.add_line(None, pattern).map_err(|e| {
                Error::configuration(format!("Invalid ignore pattern '{pattern}': {e}"))
            })?;
        }
        builder
            .build()
            .map_err(|e| Error::configuration(format!("Invalid ignore patterns: {e}")))
    }
}
