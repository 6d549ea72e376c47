//! `pnpm ls --depth Infinity --json`

use super::{CliAdapter, declared_root, into_root};
use crate::executor::CommandSpec;
use lockscan_core::version::{clean_version, is_local_protocol};
use lockscan_core::{Dependency, Error, Manifest, PackageManager, Result, TreeBuilder};
use serde::Deserialize;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

const FORMAT: &str = "pnpm ls output";

/// Adapter for the pnpm CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct PnpmCliAdapter;

/// pnpm 7+ prints an array of projects, older releases a single object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PnpmListOutput {
    Projects(Vec<PnpmProject>),
    Project(PnpmProject),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PnpmProject {
    #[serde(default)]
    dependencies: BTreeMap<String, PnpmListNode>,
    #[serde(default)]
    optional_dependencies: BTreeMap<String, PnpmListNode>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, PnpmListNode>,
}

#[derive(Debug, Deserialize)]
struct PnpmListNode {
    #[serde(default)]
    version: String,
    #[serde(default)]
    dependencies: BTreeMap<String, PnpmListNode>,
    #[serde(default, rename = "optionalDependencies")]
    optional_dependencies: BTreeMap<String, PnpmListNode>,
}

impl CliAdapter for PnpmCliAdapter {
    fn manager(&self) -> PackageManager {
        PackageManager::Pnpm
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new("pnpm", ["ls", "--depth", "Infinity", "--json"])
    }

    fn parse(
        &self,
        output: &str,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Dependency>> {
        let parsed: PnpmListOutput =
            serde_json::from_str(output).map_err(|e| Error::parse(FORMAT, None, e.to_string()))?;
        // Run from the manifest directory, pnpm lists that project first.
        let project = match parsed {
            PnpmListOutput::Projects(projects) => projects.into_iter().next().unwrap_or_default(),
            PnpmListOutput::Project(project) => project,
        };

        let mut builder = TreeBuilder::new(cancel);
        let mut roots = Vec::new();
        let sections = [
            (&project.dependencies, false),
            (&project.optional_dependencies, false),
            (&project.dev_dependencies, true),
        ];
        for (section, section_is_dev) in sections {
            for (name, node) in section {
                let (range, declared_dev) = declared_root(manifest, name, &node.version);
                let dependency = build(&mut builder, name, node, &range)?;
                roots.push(into_root(dependency, section_is_dev || declared_dev));
            }
        }
        Ok(roots)
    }
}

fn build(
    builder: &mut TreeBuilder<'_>,
    name: &str,
    node: &PnpmListNode,
    constraint: &str,
) -> Result<Dependency> {
    let raw = node.version.as_str();
    let dependency =
        Dependency::transitive(name, clean_version(raw), constraint).with_resolved(raw);
    if is_local_protocol(raw) || !builder.claim(name, raw)? {
        return Ok(dependency);
    }

    let mut children = Vec::new();
    for (child_name, child) in node.dependencies.iter().chain(&node.optional_dependencies) {
        children.push(build(builder, child_name, child, &child.version)?);
    }
    Ok(dependency.with_children(children))
}
