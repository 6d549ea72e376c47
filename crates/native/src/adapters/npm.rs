//! `npm ls --all --json`

use super::{CliAdapter, declared_root, into_root, missing};
use crate::executor::CommandSpec;
use lockscan_core::version::clean_version;
use lockscan_core::{
    Dependency, DependencyGroup, Error, Manifest, PackageManager, Result, TreeBuilder,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

const FORMAT: &str = "npm ls output";

/// Adapter for the npm CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct NpmCliAdapter;

/// A node of `npm ls --json` output. The root object has the same shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NpmListNode {
    #[serde(default)]
    version: Option<String>,
    /// Declared range; npm reports it for missing and invalid packages.
    #[serde(default)]
    required: Option<Required>,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    extraneous: bool,
    #[serde(default)]
    dependencies: BTreeMap<String, NpmListNode>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Required {
    Range(String),
    Package {
        #[serde(default)]
        version: String,
    },
}

impl NpmListNode {
    fn required(&self) -> Option<&str> {
        match self.required.as_ref()? {
            Required::Range(range) => Some(range),
            Required::Package { version } => Some(version),
        }
    }
}

impl CliAdapter for NpmCliAdapter {
    fn manager(&self) -> PackageManager {
        PackageManager::Npm
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new("npm", ["ls", "--all", "--json"])
    }

    fn parse(
        &self,
        output: &str,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Dependency>> {
        let root: NpmListNode =
            serde_json::from_str(output).map_err(|e| Error::parse(FORMAT, None, e.to_string()))?;

        let mut builder = TreeBuilder::new(cancel);
        let mut roots = Vec::with_capacity(root.dependencies.len());
        for (name, node) in &root.dependencies {
            let group = manifest.group_of(name);
            if node.extraneous && group.is_none() {
                tracing::trace!(name, "Skipping extraneous package");
                continue;
            }
            if node.missing && group == Some(DependencyGroup::Optional) {
                continue;
            }
            let fallback = node.required().or(node.version.as_deref()).unwrap_or_default();
            let (range, is_dev) = declared_root(manifest, name, fallback);
            let dependency = build(&mut builder, name, node, &range)?;
            roots.push(into_root(dependency, is_dev));
        }
        Ok(roots)
    }
}

fn build(
    builder: &mut TreeBuilder<'_>,
    name: &str,
    node: &NpmListNode,
    constraint: &str,
) -> Result<Dependency> {
    let raw = match node.version.as_deref() {
        Some(version) if !node.missing => version,
        _ => return Ok(missing(name, node.required().unwrap_or(constraint))),
    };

    let dependency =
        Dependency::transitive(name, clean_version(raw), constraint).with_resolved(raw);
    if !builder.claim(name, raw)? {
        return Ok(dependency);
    }

    let mut children = Vec::with_capacity(node.dependencies.len());
    for (child_name, child) in &node.dependencies {
        let child_constraint = child
            .required()
            .or(child.version.as_deref())
            .unwrap_or_default();
        children.push(build(builder, child_name, child, child_constraint)?);
    }
    Ok(dependency.with_children(children))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockscan_core::version::is_unresolved;

    const OUTPUT: &str = r#"{
        "name": "app",
        "version": "1.0.0",
        "dependencies": {
            "bravo": {
                "version": "1.2.3",
                "resolved": "https://registry.npmjs.org/bravo/-/bravo-1.2.3.tgz",
                "dependencies": {
                    "shared": {
                        "version": "3.0.0",
                        "dependencies": { "leaf": { "version": "0.1.0" } }
                    }
                }
            },
            "bravodev": {
                "version": "2.3.4",
                "dependencies": { "shared": { "version": "3.0.0" } }
            },
            "stray": { "version": "9.9.9", "extraneous": true }
        }
    }"#;

    fn manifest() -> Manifest {
        Manifest::from_str_at(
            r#"{
                "name": "app",
                "dependencies": { "bravo": "^1.0.0" },
                "devDependencies": { "bravodev": "^2.0.0" }
            }"#,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_parses_tree_with_dev_split() {
        let roots = NpmCliAdapter
            .parse(OUTPUT, &manifest(), &CancellationToken::new())
            .unwrap();

        assert_eq!(roots.len(), 2);
        let bravo = &roots[0];
        assert_eq!(bravo.name, "bravo");
        assert_eq!(bravo.version, "1.2.3");
        assert_eq!(bravo.version_constraint, "^1.0.0");
        assert!(!bravo.is_dev);
        assert!(!bravo.is_transitive);

        let shared = &bravo.children.as_ref().unwrap()[0];
        assert!(shared.is_transitive);
        assert_eq!(shared.children.as_ref().unwrap()[0].name, "leaf");

        let bravodev = &roots[1];
        assert!(bravodev.is_dev);
        assert!(bravodev.walk().all(|d| d.is_dev));
        // Second occurrence of shared@3.0.0 is a leaf reference.
        assert!(bravodev.children.as_ref().unwrap()[0].children.is_none());
    }

    #[test]
    fn test_missing_package_is_unresolved_leaf() {
        let output = r#"{
            "name": "app",
            "dependencies": {
                "bravo": { "required": "^1.0.0", "missing": true },
                "opt": { "required": "^3.0.0", "missing": true }
            },
            "problems": ["missing: bravo@^1.0.0, required by app@1.0.0"]
        }"#;
        let manifest = Manifest::from_str_at(
            r#"{
                "dependencies": { "bravo": "^1.0.0" },
                "optionalDependencies": { "opt": "^3.0.0" }
            }"#,
            None,
        )
        .unwrap();

        let roots = NpmCliAdapter
            .parse(output, &manifest, &CancellationToken::new())
            .unwrap();

        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].version, "^1.0.0");
        assert!(is_unresolved(&roots[0].version));
        assert!(roots[0].children.is_none());
    }

    #[test]
    fn test_empty_project() {
        let roots = NpmCliAdapter
            .parse(
                r#"{ "name": "app", "version": "1.0.0" }"#,
                &Manifest::default(),
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(roots.is_empty());
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = NpmCliAdapter
            .parse("npm ERR! something", &Manifest::default(), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}
