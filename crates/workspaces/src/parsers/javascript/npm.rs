use crate::parsers::{LockfileParser, ParseContext};
use lockscan_core::version::clean_version;
use lockscan_core::{Dependency, DependencyGroup, Error, PackageManager, Result, TreeBuilder};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

const FORMAT: &str = "package-lock.json";
const MAX_LOCKFILE_VERSION: u32 = 3;

/// Parser for npm `package-lock.json` files (lockfileVersion 1, 2 and 3).
#[derive(Debug, Default, Clone, Copy)]
pub struct NpmLockfileParser;

impl LockfileParser for NpmLockfileParser {
    fn manager(&self) -> PackageManager {
        PackageManager::Npm
    }

    fn parse(&self, contents: &str, ctx: &ParseContext<'_>) -> Result<Vec<Dependency>> {
        let lockfile: PackageLock = serde_json::from_str(contents)
            .map_err(|e| Error::parse(FORMAT, ctx.lockfile_path, e.to_string()))?;

        if let Some(version) = lockfile.lockfile_version
            && version > MAX_LOCKFILE_VERSION
        {
            return Err(Error::parse(
                FORMAT,
                ctx.lockfile_path,
                format!("Unsupported lockfileVersion {version} (supported: 1 to {MAX_LOCKFILE_VERSION})"),
            ));
        }

        match NpmSchema::from(lockfile) {
            NpmSchema::Flat(packages) => FlatWalker {
                packages: &packages,
                builder: TreeBuilder::new(ctx.cancel),
            }
            .roots(ctx),
            NpmSchema::Nested(dependencies) => NestedWalker {
                top: &dependencies,
                builder: TreeBuilder::new(ctx.cancel),
            }
            .roots(ctx),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageLock {
    #[serde(default)]
    lockfile_version: Option<u32>,
    #[serde(default)]
    packages: Option<BTreeMap<String, PackageEntry>>,
    #[serde(default)]
    dependencies: Option<BTreeMap<String, NestedEntry>>,
}

/// Entry of the flat `packages` map (lockfileVersion 2 and 3).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageEntry {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    resolved: Option<String>,
    #[serde(default)]
    dev: bool,
    #[serde(default)]
    link: bool,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    optional_dependencies: BTreeMap<String, String>,
}

impl PackageEntry {
    fn declares_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
            || !self.dev_dependencies.is_empty()
            || !self.optional_dependencies.is_empty()
    }

    /// Declarations in group order, each name once.
    fn declared(&self) -> Vec<(&str, &str, DependencyGroup)> {
        let mut seen = BTreeSet::new();
        [
            (&self.dependencies, DependencyGroup::Production),
            (&self.optional_dependencies, DependencyGroup::Optional),
            (&self.dev_dependencies, DependencyGroup::Development),
        ]
        .into_iter()
        .flat_map(|(map, group)| {
            map.iter()
                .map(move |(name, range)| (name.as_str(), range.as_str(), group))
        })
        .filter(|(name, _, _)| seen.insert(*name))
        .collect()
    }
}

/// Entry of the nested `dependencies` map (lockfileVersion 1).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NestedEntry {
    #[serde(default)]
    version: String,
    #[serde(default)]
    dev: bool,
    #[serde(default)]
    requires: BTreeMap<String, String>,
    #[serde(default)]
    dependencies: BTreeMap<String, NestedEntry>,
}

/// The two shapes a `package-lock.json` can take, selected by the presence
/// of the `packages` key.
#[derive(Debug)]
enum NpmSchema {
    /// lockfileVersion 2 and 3: flat map keyed by install path.
    Flat(BTreeMap<String, PackageEntry>),
    /// lockfileVersion 1: nested map mirroring `node_modules`.
    Nested(BTreeMap<String, NestedEntry>),
}

impl From<PackageLock> for NpmSchema {
    fn from(lockfile: PackageLock) -> Self {
        match lockfile.packages {
            Some(packages) => Self::Flat(packages),
            None => Self::Nested(lockfile.dependencies.unwrap_or_default()),
        }
    }
}

fn owned_declarations(ctx: &ParseContext<'_>) -> Vec<(String, String, DependencyGroup)> {
    ctx.manifest
        .declared()
        .into_iter()
        .map(|d| (d.name.to_string(), d.range.to_string(), d.group))
        .collect()
}

fn unresolved(name: &str, range: &str) -> Dependency {
    Dependency::transitive(name, clean_version(range), range)
}

fn into_root(mut node: Dependency, group: DependencyGroup) -> Dependency {
    node.is_transitive = false;
    node.is_dev |= group.is_dev();
    node
}

struct FlatWalker<'a> {
    packages: &'a BTreeMap<String, PackageEntry>,
    builder: TreeBuilder<'a>,
}

impl FlatWalker<'_> {
    fn roots(mut self, ctx: &ParseContext<'_>) -> Result<Vec<Dependency>> {
        let importer = ctx.importer;
        let declarations = match self.packages.get(importer) {
            Some(entry) if entry.declares_dependencies() => entry
                .declared()
                .into_iter()
                .map(|(n, r, g)| (n.to_string(), r.to_string(), g))
                .collect(),
            _ => owned_declarations(ctx),
        };

        let mut roots = Vec::with_capacity(declarations.len());
        for (name, range, group) in declarations {
            match resolve_install_path(self.packages, importer, &name) {
                Some(path) => {
                    let node = self.node(&path, &name, &range)?;
                    roots.push(into_root(node, group));
                }
                None if group == DependencyGroup::Optional => {
                    tracing::trace!(name, "Optional dependency not installed");
                }
                None => roots.push(into_root(unresolved(&name, &range), group)),
            }
        }
        Ok(roots)
    }

    fn node(&mut self, path: &str, name: &str, constraint: &str) -> Result<Dependency> {
        let packages = self.packages;
        let Some((path, entry, raw)) = follow_link(packages, path) else {
            return Ok(unresolved(name, constraint));
        };

        let node = Dependency::transitive(name, clean_version(&raw), constraint)
            .with_resolved(raw.clone())
            .with_dev(entry.dev);
        if !self.builder.claim(name, &raw)? {
            return Ok(node);
        }

        let mut children = Vec::new();
        let required = entry.dependencies.iter().map(|(n, r)| (n, r, false));
        let optional = entry.optional_dependencies.iter().map(|(n, r)| (n, r, true));
        for (child, range, is_optional) in required.chain(optional) {
            match resolve_install_path(packages, path, child) {
                Some(child_path) => children.push(self.node(&child_path, child, range)?),
                None if is_optional => {}
                None => children.push(unresolved(child, range)),
            }
        }
        Ok(node.with_children(children))
    }
}

/// Resolve a `"link": true` entry to the workspace directory it points at.
///
/// Returns the effective install path, its entry and the raw version.
fn follow_link<'a>(
    packages: &'a BTreeMap<String, PackageEntry>,
    path: &'a str,
) -> Option<(&'a str, &'a PackageEntry, String)> {
    let entry = packages.get(path)?;
    if !entry.link {
        return Some((path, entry, entry.version.clone().unwrap_or_default()));
    }

    let target = entry.resolved.as_deref()?;
    match packages.get(target) {
        Some(target_entry) => {
            let raw = target_entry
                .version
                .clone()
                .unwrap_or_else(|| format!("file:{target}"));
            Some((target, target_entry, raw))
        }
        None => Some((path, entry, format!("file:{target}"))),
    }
}

/// Node's resolution algorithm: look in `<from>/node_modules`, then in each
/// enclosing `node_modules` up to the lockfile root.
fn resolve_install_path(
    packages: &BTreeMap<String, PackageEntry>,
    from: &str,
    name: &str,
) -> Option<String> {
    let mut base = from;
    loop {
        let candidate = if base.is_empty() {
            format!("node_modules/{name}")
        } else {
            format!("{base}/node_modules/{name}")
        };
        if packages.contains_key(&candidate) {
            return Some(candidate);
        }
        if base.is_empty() {
            return None;
        }
        base = base.rfind("/node_modules/").map_or("", |idx| &base[..idx]);
    }
}

struct NestedWalker<'a> {
    top: &'a BTreeMap<String, NestedEntry>,
    builder: TreeBuilder<'a>,
}

type Scope<'a> = &'a BTreeMap<String, NestedEntry>;

impl<'a> NestedWalker<'a> {
    fn roots(mut self, ctx: &ParseContext<'_>) -> Result<Vec<Dependency>> {
        let mut declarations = owned_declarations(ctx);
        if declarations.is_empty() {
            declarations = self.unreferenced();
        }

        let top = self.top;
        let chain = [top];
        let mut roots = Vec::with_capacity(declarations.len());
        for (name, range, group) in declarations {
            match top.get(&name) {
                Some(entry) => {
                    let node = self.node(&name, entry, &range, &chain)?;
                    roots.push(into_root(node, group));
                }
                None if group == DependencyGroup::Optional => {}
                None => roots.push(into_root(unresolved(&name, &range), group)),
            }
        }
        Ok(roots)
    }

    fn node(
        &mut self,
        name: &str,
        entry: &'a NestedEntry,
        constraint: &str,
        chain: &[Scope<'a>],
    ) -> Result<Dependency> {
        let raw = entry.version.as_str();
        let node = Dependency::transitive(name, clean_version(raw), constraint)
            .with_resolved(raw)
            .with_dev(entry.dev);
        if !self.builder.claim(name, raw)? {
            return Ok(node);
        }

        let mut own_chain = chain.to_vec();
        own_chain.push(&entry.dependencies);

        let mut children = Vec::with_capacity(entry.requires.len());
        for (child, range) in &entry.requires {
            let found = own_chain
                .iter()
                .copied()
                .enumerate()
                .rev()
                .find_map(|(depth, scope)| scope.get(child).map(|e| (depth, e)));
            match found {
                Some((depth, child_entry)) => {
                    children.push(self.node(child, child_entry, range, &own_chain[..=depth])?);
                }
                None => children.push(unresolved(child, range)),
            }
        }
        Ok(node.with_children(children))
    }

    /// Top-level entries that no other entry requires.
    fn unreferenced(&self) -> Vec<(String, String, DependencyGroup)> {
        fn collect<'m>(scope: &'m BTreeMap<String, NestedEntry>, out: &mut BTreeSet<&'m str>) {
            for entry in scope.values() {
                out.extend(entry.requires.keys().map(String::as_str));
                collect(&entry.dependencies, out);
            }
        }

        let mut required = BTreeSet::new();
        collect(self.top, &mut required);
        self.top
            .iter()
            .filter(|(name, _)| !required.contains(name.as_str()))
            .map(|(name, entry)| {
                let group = if entry.dev {
                    DependencyGroup::Development
                } else {
                    DependencyGroup::Production
                };
                (name.clone(), entry.version.clone(), group)
            })
            .collect()
    }
}
