//! The dependency tree model handed to downstream analyzers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// A node in a manifest's dependency tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    /// Package name (may be scoped, e.g. `@types/node`).
    pub name: String,
    /// Cleaned semantic version.
    pub version: String,
    /// Declared range as written by the depending package.
    pub version_constraint: String,
    /// Version string as reported by the resolver before cleaning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_version: Option<String>,
    /// Whether the dependency is only needed for development.
    pub is_dev: bool,
    /// Whether the dependency sits below another dependency in the tree.
    pub is_transitive: bool,
    /// Whether the dependency resolves to a package inside the workspace.
    pub is_internal: bool,
    /// Directory of the manifest that owns this node (monorepos only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_root: Option<PathBuf>,
    /// The scanned workspace root (monorepos only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_folder: Option<PathBuf>,
    /// Expanded children. `None` marks a leaf reference: either a repeat
    /// occurrence of an already expanded package or an unresolved entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Dependency>>,
}

impl Dependency {
    /// Create a direct (root-level) dependency without children.
    #[must_use]
    pub fn direct(
        name: impl Into<String>,
        version: impl Into<String>,
        version_constraint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            version_constraint: version_constraint.into(),
            resolved_version: None,
            is_dev: false,
            is_transitive: false,
            is_internal: false,
            package_root: None,
            workspace_folder: None,
            children: None,
        }
    }

    /// Create a transitive dependency without children.
    #[must_use]
    pub fn transitive(
        name: impl Into<String>,
        version: impl Into<String>,
        version_constraint: impl Into<String>,
    ) -> Self {
        Self {
            is_transitive: true,
            ..Self::direct(name, version, version_constraint)
        }
    }

    /// Set the raw resolved version.
    #[must_use]
    pub fn with_resolved(mut self, resolved: impl Into<String>) -> Self {
        self.resolved_version = Some(resolved.into());
        self
    }

    /// Set the development flag.
    #[must_use]
    pub fn with_dev(mut self, is_dev: bool) -> Self {
        self.is_dev = is_dev;
        self
    }

    /// Attach expanded children, marking every one of them transitive.
    #[must_use]
    pub fn with_children(mut self, mut children: Vec<Self>) -> Self {
        for child in &mut children {
            child.is_transitive = true;
        }
        self.children = Some(children);
        self
    }

    /// `name@version` identity used for dedup and graph nodes.
    #[must_use]
    pub fn id(&self) -> String {
        package_id(&self.name, self.resolved_or_version())
    }

    /// The raw resolved version if known, otherwise the cleaned version.
    #[must_use]
    pub fn resolved_or_version(&self) -> &str {
        self.resolved_version.as_deref().unwrap_or(&self.version)
    }

    /// Iterate over this node and all of its descendants, depth first.
    pub fn walk(&self) -> impl Iterator<Item = &Self> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            if let Some(children) = &node.children {
                stack.extend(children.iter().rev());
            }
            Some(node)
        })
    }

    /// Apply `f` to this node and every descendant.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut Self)) {
        f(self);
        if let Some(children) = &mut self.children {
            for child in children {
                child.visit_mut(f);
            }
        }
    }

    /// Apply the dev flag to this node and every descendant.
    pub fn mark_dev_recursive(&mut self) {
        self.visit_mut(&mut |node| node.is_dev = true);
    }
}

/// `name@version` identity string.
#[must_use]
pub fn package_id(name: &str, version: &str) -> String {
    format!("{name}@{version}")
}

/// Ecosystem tag of a dependency file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// The npm registry ecosystem (npm, pnpm and yarn all resolve from it).
    Npm,
}

impl Ecosystem {
    /// String tag used in [`ProjectInfo::ecosystem_types`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Npm => "npm",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JavaScript package managers that lockscan understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    /// npm (`package-lock.json`)
    Npm,
    /// pnpm (`pnpm-lock.yaml`)
    Pnpm,
    /// Yarn classic (`yarn.lock`)
    Yarn,
}

impl PackageManager {
    /// Lockfile name written by this manager.
    #[must_use]
    pub const fn lockfile_name(self) -> &'static str {
        match self {
            Self::Npm => "package-lock.json",
            Self::Pnpm => "pnpm-lock.yaml",
            Self::Yarn => "yarn.lock",
        }
    }

    /// Managers in lockfile preference order.
    pub const PREFERENCE: [Self; 3] = [Self::Pnpm, Self::Yarn, Self::Npm];
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Npm => write!(f, "npm"),
            Self::Pnpm => write!(f, "pnpm"),
            Self::Yarn => write!(f, "yarn"),
        }
    }
}

/// How a dependency file's tree was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStrategy {
    /// Output of the real package manager CLI.
    Native,
    /// Parsed from a lockfile.
    Static,
    /// Declared ranges from the manifest only.
    Manifest,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Static => write!(f, "static"),
            Self::Manifest => write!(f, "manifest"),
        }
    }
}

/// The resolved dependency trees of one manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyFile {
    /// Path of the manifest (`package.json`).
    pub path: PathBuf,
    /// Ecosystem tag.
    pub ecosystem: Ecosystem,
    /// Package name declared by the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    /// Directory of the manifest (monorepos only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_root: Option<PathBuf>,
    /// The scanned workspace root (monorepos only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_folder: Option<PathBuf>,
    /// Production dependency trees.
    pub dependencies: Vec<Dependency>,
    /// Development dependency trees.
    pub dev_dependencies: Vec<Dependency>,
    /// Package manager whose data produced the trees, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<PackageManager>,
    /// Strategy that produced the trees.
    pub strategy: ResolutionStrategy,
}

impl DependencyFile {
    /// Create an empty dependency file for a manifest.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, strategy: ResolutionStrategy) -> Self {
        Self {
            path: path.into(),
            ecosystem: Ecosystem::Npm,
            package_name: None,
            package_root: None,
            workspace_folder: None,
            dependencies: Vec::new(),
            dev_dependencies: Vec::new(),
            package_manager: None,
            strategy,
        }
    }

    /// Split root nodes into production and development lists by their flag.
    #[must_use]
    pub fn with_roots(mut self, roots: Vec<Dependency>) -> Self {
        let (dev, prod): (Vec<_>, Vec<_>) = roots.into_iter().partition(|dep| dep.is_dev);
        self.dependencies = prod;
        self.dev_dependencies = dev;
        self
    }

    /// Directory containing the manifest.
    #[must_use]
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// All root nodes, production first.
    pub fn roots(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().chain(&self.dev_dependencies)
    }

    /// Mutable access to all root nodes.
    pub fn roots_mut(&mut self) -> impl Iterator<Item = &mut Dependency> {
        self.dependencies
            .iter_mut()
            .chain(self.dev_dependencies.iter_mut())
    }
}

/// Result of one scan call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    /// The scanned root.
    pub root: PathBuf,
    /// Whether more than one manifest directory was found.
    pub is_monorepo: bool,
    /// Ecosystem tags present in the scan.
    pub ecosystem_types: BTreeSet<String>,
    /// One entry per successfully resolved manifest.
    pub dependency_files: Vec<DependencyFile>,
    /// Every top-level dependency across all manifests.
    pub dependencies: Vec<Dependency>,
}

impl ProjectInfo {
    /// Create an empty result for a root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, is_monorepo: bool) -> Self {
        Self {
            root: root.into(),
            is_monorepo,
            ..Self::default()
        }
    }

    /// Append a resolved manifest, updating the ecosystem set and the
    /// flattened dependency list.
    pub fn push(&mut self, file: DependencyFile) {
        self.ecosystem_types
            .insert(file.ecosystem.as_str().to_string());
        self.dependencies.extend(file.roots().cloned());
        self.dependency_files.push(file);
    }

    /// Merge another result into this one.
    pub fn merge(&mut self, other: Self) {
        self.ecosystem_types.extend(other.ecosystem_types);
        self.dependency_files.extend(other.dependency_files);
        self.dependencies.extend(other.dependencies);
        self.is_monorepo |= other.is_monorepo;
    }
}
