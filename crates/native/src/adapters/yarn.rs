//! `yarn list --json --no-progress` (Yarn classic)
//!
//! Yarn prints newline-delimited JSON events; the listing is the single event
//! with `"type": "tree"`. Its top-level trees are the hoisted packages, not
//! the direct dependencies. A child marked `shadow` points at a hoisted
//! package by range (`js-tokens@^3.0.0 || ^4.0.0`) and is resolved against
//! the top level; other children are nested installs carrying their own
//! subtree.

use super::{CliAdapter, into_root, missing};
use crate::executor::CommandSpec;
use lockscan_core::version::clean_version;
use lockscan_core::{
    Dependency, DependencyGroup, Error, Manifest, PackageManager, Result, TreeBuilder,
};
use serde::Deserialize;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

const FORMAT: &str = "yarn list output";

/// Adapter for the Yarn classic CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct YarnCliAdapter;

#[derive(Debug, Deserialize)]
struct YarnEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct YarnTreeData {
    #[serde(default)]
    trees: Vec<YarnTree>,
}

#[derive(Debug, Deserialize)]
struct YarnTree {
    name: String,
    #[serde(default)]
    children: Vec<YarnTree>,
    #[serde(default)]
    shadow: bool,
}

impl YarnTree {
    fn split(&self) -> (&str, &str) {
        split_name(&self.name)
    }
}

/// Split `name@version` (or `name@range`), keeping a leading scope `@`.
fn split_name(spec: &str) -> (&str, &str) {
    match spec.get(1..).and_then(|rest| rest.find('@')) {
        Some(at) => (&spec[..=at], &spec[at + 2..]),
        None => (spec, ""),
    }
}

impl CliAdapter for YarnCliAdapter {
    fn manager(&self) -> PackageManager {
        PackageManager::Yarn
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new("yarn", ["list", "--json", "--no-progress"])
    }

    fn parse(
        &self,
        output: &str,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Dependency>> {
        let trees = tree_event(output)?;
        let hoisted: HashMap<&str, &YarnTree> =
            trees.iter().map(|tree| (tree.split().0, tree)).collect();
        let mut walker = Walker {
            hoisted: &hoisted,
            builder: TreeBuilder::new(cancel),
        };

        let mut roots = Vec::new();
        for declared in manifest.declared() {
            let dependency = match hoisted.get(declared.name) {
                Some(tree) => walker.node(tree, declared.range)?,
                None if declared.group == DependencyGroup::Optional => continue,
                None => missing(declared.name, declared.range),
            };
            roots.push(into_root(dependency, declared.group.is_dev()));
        }
        Ok(roots)
    }
}

fn tree_event(output: &str) -> Result<Vec<YarnTree>> {
    let mut errors = Vec::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Ok(event) = serde_json::from_str::<YarnEvent>(line) else {
            continue;
        };
        match event.kind.as_str() {
            "tree" => {
                let data: YarnTreeData = serde_json::from_value(event.data)
                    .map_err(|e| Error::parse(FORMAT, None, e.to_string()))?;
                return Ok(data.trees);
            }
            "error" => errors.push(event.data.as_str().unwrap_or_default().to_string()),
            _ => {}
        }
    }

    let message = if errors.is_empty() {
        "no tree event in output".to_string()
    } else {
        errors.join("; ")
    };
    Err(Error::parse(FORMAT, None, message))
}

struct Walker<'a> {
    hoisted: &'a HashMap<&'a str, &'a YarnTree>,
    builder: TreeBuilder<'a>,
}

impl Walker<'_> {
    fn node(&mut self, tree: &YarnTree, constraint: &str) -> Result<Dependency> {
        let (name, raw) = tree.split();
        let dependency =
            Dependency::transitive(name, clean_version(raw), constraint).with_resolved(raw);
        if !self.builder.claim(name, raw)? {
            return Ok(dependency);
        }

        let mut children = Vec::with_capacity(tree.children.len());
        for child in &tree.children {
            let (child_name, spec) = child.split();
            if !child.shadow {
                children.push(self.node(child, spec)?);
                continue;
            }
            let hoisted = self.hoisted;
            match hoisted.get(child_name) {
                Some(target) => children.push(self.node(target, spec)?),
                None => children.push(missing(child_name, spec)),
            }
        }
        Ok(dependency.with_children(children))
    }
}
