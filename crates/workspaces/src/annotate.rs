//! Monorepo context stamped onto resolved trees.

use lockscan_core::version::is_local_protocol;
use lockscan_core::{Dependency, DependencyFile, ManifestTarget};
use std::collections::HashSet;
use std::path::PathBuf;

/// Workspace-wide facts applied to every node of every tree.
#[derive(Debug, Clone, Default)]
pub struct MonorepoContext {
    workspace_root: PathBuf,
    is_monorepo: bool,
    internal_names: HashSet<String>,
}

impl MonorepoContext {
    /// Context for a scan root.
    #[must_use]
    pub fn new(workspace_root: impl Into<PathBuf>, is_monorepo: bool) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            is_monorepo,
            internal_names: HashSet::new(),
        }
    }

    /// Register package names that belong to the workspace.
    #[must_use]
    pub fn with_internal_names(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.internal_names.extend(names);
        self
    }

    /// Context whose internal names are the names declared by `targets`.
    #[must_use]
    pub fn from_targets(
        workspace_root: impl Into<PathBuf>,
        is_monorepo: bool,
        targets: &[ManifestTarget],
    ) -> Self {
        Self::new(workspace_root, is_monorepo)
            .with_internal_names(targets.iter().filter_map(|t| t.manifest.name.clone()))
    }

    /// Whether the scan covers more than one manifest directory.
    #[must_use]
    pub const fn is_monorepo(&self) -> bool {
        self.is_monorepo
    }

    /// Whether a dependency resolves to a package inside the workspace.
    #[must_use]
    pub fn is_internal(&self, dependency: &Dependency) -> bool {
        self.internal_names.contains(&dependency.name)
            || is_local_protocol(&dependency.version_constraint)
            || is_local_protocol(&dependency.version)
    }

    /// Stamp `package_root`, `workspace_folder` and `is_internal` onto every
    /// node of a dependency file. Paths are only set for monorepos.
    pub fn annotate(&self, file: &mut DependencyFile) {
        let (package_root, workspace_folder) = if self.is_monorepo {
            (
                Some(file.directory().to_path_buf()),
                Some(self.workspace_root.clone()),
            )
        } else {
            (None, None)
        };

        for root in file.roots_mut() {
            root.visit_mut(&mut |node| {
                node.is_internal = self.is_internal(node);
                node.package_root.clone_from(&package_root);
                node.workspace_folder.clone_from(&workspace_folder);
            });
        }
        file.package_root = package_root;
        file.workspace_folder = workspace_folder;
    }
}
