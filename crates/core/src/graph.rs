//! Arena view of the dependency trees.
//!
//! Trees only expand each `name@version` once, so a repeat occurrence of a
//! diamond dependency appears as a leaf. The first occurrence always carries
//! the complete child list, which makes it possible to rebuild the full
//! directed graph from the trees without losing edges.

use crate::types::{Dependency, ProjectInfo};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// A package node in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageNode {
    /// Package name.
    pub name: String,
    /// Cleaned version.
    pub version: String,
    /// Whether any occurrence is a development dependency.
    pub is_dev: bool,
    /// Whether any occurrence is internal to the workspace.
    pub is_internal: bool,
}

/// Directed dependency graph keyed by `name@version`.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<PackageNode, ()>,
    index: HashMap<String, NodeIndex>,
    roots: Vec<NodeIndex>,
}

impl DependencyGraph {
    /// Build the graph from every tree in a scan result.
    #[must_use]
    pub fn from_project(info: &ProjectInfo) -> Self {
        let mut graph = Self::default();
        for file in &info.dependency_files {
            for root in file.roots() {
                graph.add_tree(root);
            }
        }
        graph
    }

    /// Add one tree to the graph.
    pub fn add_tree(&mut self, root: &Dependency) {
        let idx = self.add_subtree(root);
        if !self.roots.contains(&idx) {
            self.roots.push(idx);
        }
    }

    fn add_subtree(&mut self, node: &Dependency) -> NodeIndex {
        let idx = self.intern(node);
        if let Some(children) = &node.children {
            for child in children {
                let child_idx = self.add_subtree(child);
                self.graph.update_edge(idx, child_idx, ());
            }
        }
        idx
    }

    fn intern(&mut self, node: &Dependency) -> NodeIndex {
        let id = node.id();
        if let Some(&idx) = self.index.get(&id) {
            let existing = &mut self.graph[idx];
            existing.is_dev |= node.is_dev;
            existing.is_internal |= node.is_internal;
            return idx;
        }
        let idx = self.graph.add_node(PackageNode {
            name: node.name.clone(),
            version: node.version.clone(),
            is_dev: node.is_dev,
            is_internal: node.is_internal,
        });
        self.index.insert(id, idx);
        idx
    }

    /// Number of distinct packages.
    #[must_use]
    pub fn package_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct dependency edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Look up a package by `name@version` (resolved version when known).
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PackageNode> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    /// Packages that `id` depends on directly.
    #[must_use]
    pub fn dependencies_of(&self, id: &str) -> Vec<&PackageNode> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Packages that depend directly on `id`.
    #[must_use]
    pub fn dependents_of(&self, id: &str) -> Vec<&PackageNode> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Direct dependencies of the scanned manifests.
    pub fn roots(&self) -> impl Iterator<Item = &PackageNode> {
        self.roots.iter().map(|&idx| &self.graph[idx])
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<&PackageNode> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut nodes: Vec<&PackageNode> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| &self.graph[n])
            .collect();
        nodes.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
        nodes
    }
}
