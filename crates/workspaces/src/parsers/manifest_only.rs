//! Resolution from `package.json` alone.
//!
//! Used when a manifest has no lockfile. Each declared dependency becomes a
//! leaf whose version is the declared range, because nothing better is known.

use lockscan_core::{Dependency, Manifest};

/// Root nodes for every dependency the manifest declares.
#[must_use]
pub fn parse_manifest(manifest: &Manifest) -> Vec<Dependency> {
    manifest
        .declared()
        .into_iter()
        .map(|declared| {
            Dependency::direct(declared.name, declared.range, declared.range)
                .with_dev(declared.group.is_dev())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_ranges_become_versions() {
        let manifest = Manifest::from_str_at(
            r#"{
                "dependencies": { "react": "^18.2.0" },
                "devDependencies": { "vitest": "~1.0.0" },
                "optionalDependencies": { "fsevents": "2.3.3" }
            }"#,
            None,
        )
        .unwrap();

        let roots = parse_manifest(&manifest);
        assert_eq!(roots.len(), 3);

        let react = roots.iter().find(|d| d.name == "react").unwrap();
        assert_eq!(react.version, "^18.2.0");
        assert_eq!(react.version_constraint, "^18.2.0");
        assert!(!react.is_dev);
        assert!(!react.is_transitive);
        assert!(react.children.is_none());

        assert!(roots.iter().find(|d| d.name == "vitest").unwrap().is_dev);
    }

    #[test]
    fn test_empty_manifest() {
        assert!(parse_manifest(&Manifest::default()).is_empty());
    }
}
