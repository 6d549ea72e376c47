//! Lockfile detection.
//!
//! A manifest directory is matched to the first lockfile found in preference
//! order (`pnpm-lock.yaml`, `yarn.lock`, `package-lock.json`). Members of a
//! monorepo usually have no lockfile of their own, in which case the
//! workspace root's lockfile is used and the member is located inside it by
//! its path relative to the root.

use lockscan_core::PackageManager;
use std::path::{Component, Path, PathBuf};

/// A lockfile selected for a manifest directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedLockfile {
    /// Package manager that writes this lockfile.
    pub manager: PackageManager,
    /// Path of the lockfile.
    pub path: PathBuf,
    /// Path of the manifest directory relative to the lockfile directory,
    /// with `/` separators. Empty when the lockfile sits next to the manifest.
    pub importer: String,
}

impl DetectedLockfile {
    /// Whether the lockfile belongs to a parent directory.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        !self.importer.is_empty()
    }
}

/// Find the preferred lockfile inside `dir`.
#[must_use]
pub fn detect_in(dir: &Path) -> Option<DetectedLockfile> {
    PackageManager::PREFERENCE.into_iter().find_map(|manager| {
        let path = dir.join(manager.lockfile_name());
        path.is_file().then(|| DetectedLockfile {
            manager,
            path,
            importer: String::new(),
        })
    })
}

/// Find the lockfile for `dir`, falling back to the workspace root's.
#[must_use]
pub fn detect_for(dir: &Path, workspace_root: &Path) -> Option<DetectedLockfile> {
    if let Some(found) = detect_in(dir) {
        return Some(found);
    }
    if dir == workspace_root {
        return None;
    }

    let importer = relative_importer(dir, workspace_root)?;
    let mut found = detect_in(workspace_root)?;
    found.importer = importer;
    tracing::debug!(
        dir = %dir.display(),
        lockfile = %found.path.display(),
        importer = %found.importer,
        "Using workspace root lockfile"
    );
    Some(found)
}

fn relative_importer(dir: &Path, root: &Path) -> Option<String> {
    let relative = dir.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_preference_order() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("package-lock.json"), "{}").unwrap();
        fs::write(temp.path().join("yarn.lock"), "").unwrap();

        let found = detect_in(temp.path()).unwrap();
        assert_eq!(found.manager, PackageManager::Yarn);

        fs::write(temp.path().join("pnpm-lock.yaml"), "").unwrap();
        let found = detect_in(temp.path()).unwrap();
        assert_eq!(found.manager, PackageManager::Pnpm);
        assert!(!found.is_shared());
        assert_eq!(found.importer, "");
    }

    #[test]
    fn test_root_lockfile_fallback() {
        let temp = TempDir::new().unwrap();
        let member = temp.path().join("packages").join("a");
        fs::create_dir_all(&member).unwrap();
        fs::write(temp.path().join("pnpm-lock.yaml"), "").unwrap();

        let found = detect_for(&member, temp.path()).unwrap();
        assert_eq!(found.manager, PackageManager::Pnpm);
        assert_eq!(found.importer, "packages/a");
        assert!(found.is_shared());
    }

    #[test]
    fn test_no_lockfile() {
        let temp = TempDir::new().unwrap();
        assert!(detect_in(temp.path()).is_none());
        assert!(detect_for(temp.path(), temp.path()).is_none());
    }
}
