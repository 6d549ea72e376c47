//! `package.json` model.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of a JavaScript package manifest.
pub const MANIFEST_FILE: &str = "package.json";

/// The parts of a `package.json` that dependency resolution needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Declared package name.
    #[serde(default)]
    pub name: Option<String>,
    /// Declared package version.
    #[serde(default)]
    pub version: Option<String>,
    /// Production dependencies (name → declared range).
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Development dependencies (name → declared range).
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    /// Optional dependencies (name → declared range).
    #[serde(default)]
    pub optional_dependencies: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse manifest text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the text is not a valid `package.json`.
    pub fn from_str_at(contents: &str, path: Option<&Path>) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|source| Error::parse(MANIFEST_FILE, path, source.to_string()))
    }

    /// Read and parse a manifest from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileNotFound`] when the file is missing and
    /// [`Error::Parse`] when it is malformed.
    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|source| Error::io(source, Some(path), "reading package.json"))?;
        Self::from_str_at(&contents, Some(path))
    }

    /// Whether any dependency is declared at all.
    #[must_use]
    pub fn declares_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
            || !self.dev_dependencies.is_empty()
            || !self.optional_dependencies.is_empty()
    }

    /// Every declared dependency with its group, production groups first.
    ///
    /// A name that appears in several groups is reported once, in the first
    /// group that declares it.
    #[must_use]
    pub fn declared(&self) -> Vec<DeclaredDependency<'_>> {
        let mut seen = std::collections::BTreeSet::new();
        let groups = [
            (&self.dependencies, DependencyGroup::Production),
            (&self.optional_dependencies, DependencyGroup::Optional),
            (&self.dev_dependencies, DependencyGroup::Development),
        ];

        let mut declared = Vec::new();
        for (map, group) in groups {
            for (name, range) in map {
                if seen.insert(name.as_str()) {
                    declared.push(DeclaredDependency {
                        name,
                        range,
                        group,
                    });
                }
            }
        }
        declared
    }

    /// The group a dependency name is declared in, if any.
    #[must_use]
    pub fn group_of(&self, name: &str) -> Option<DependencyGroup> {
        if self.dependencies.contains_key(name) {
            Some(DependencyGroup::Production)
        } else if self.optional_dependencies.contains_key(name) {
            Some(DependencyGroup::Optional)
        } else if self.dev_dependencies.contains_key(name) {
            Some(DependencyGroup::Development)
        } else {
            None
        }
    }

    /// Declared range for a dependency name, if any.
    #[must_use]
    pub fn range_of(&self, name: &str) -> Option<&str> {
        self.dependencies
            .get(name)
            .or_else(|| self.optional_dependencies.get(name))
            .or_else(|| self.dev_dependencies.get(name))
            .map(String::as_str)
    }
}

/// Which manifest section declared a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyGroup {
    /// `dependencies`
    Production,
    /// `optionalDependencies`
    Optional,
    /// `devDependencies`
    Development,
}

impl DependencyGroup {
    /// Whether this group is development-only.
    #[must_use]
    pub const fn is_dev(self) -> bool {
        matches!(self, Self::Development)
    }
}

/// A dependency declaration borrowed from a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredDependency<'a> {
    /// Package name.
    pub name: &'a str,
    /// Declared range.
    pub range: &'a str,
    /// Declaring section.
    pub group: DependencyGroup,
}

/// A manifest located on disk, ready to be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestTarget {
    /// Path of the `package.json`.
    pub manifest_path: PathBuf,
    /// Directory containing the manifest.
    pub directory: PathBuf,
    /// Parsed manifest contents.
    pub manifest: Manifest,
}

impl ManifestTarget {
    /// Read the manifest at `manifest_path`.
    ///
    /// # Errors
    ///
    /// Propagates [`Manifest::read`] errors.
    pub fn load(manifest_path: &Path) -> Result<Self> {
        let manifest = Manifest::read(manifest_path)?;
        let directory = manifest_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Ok(Self {
            manifest_path: manifest_path.to_path_buf(),
            directory,
            manifest,
        })
    }
}
