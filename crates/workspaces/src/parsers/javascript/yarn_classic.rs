use crate::parsers::{LockfileParser, ParseContext};
use lockscan_core::version::clean_version;
use lockscan_core::{Dependency, DependencyGroup, Error, PackageManager, Result, TreeBuilder};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const FORMAT: &str = "yarn.lock";

/// Parser for Yarn Classic (v1.x) `yarn.lock` files.
///
/// The format is line oriented: an unindented header lists every specifier
/// that resolved to the entry, indented lines hold `key "value"` properties,
/// and `dependencies:` / `optionalDependencies:` open a nested block of
/// `name "range"` pairs. Yarn classic records nothing about dev status, so
/// every node is production unless it sits under a manifest `devDependencies`
/// root.
#[derive(Debug, Default, Clone, Copy)]
pub struct YarnClassicLockfileParser;

impl LockfileParser for YarnClassicLockfileParser {
    fn manager(&self) -> PackageManager {
        PackageManager::Yarn
    }

    fn parse(&self, contents: &str, ctx: &ParseContext<'_>) -> Result<Vec<Dependency>> {
        let builder = TreeBuilder::new(ctx.cancel);
        let entries = parse_entries(contents, ctx.lockfile_path, &builder)?;
        let index = EntryIndex::new(&entries);
        let mut walker = EntryWalker {
            entries: &entries,
            index: &index,
            builder,
        };

        let mut declarations: Vec<(String, String, DependencyGroup)> = ctx
            .manifest
            .declared()
            .into_iter()
            .map(|d| (d.name.to_string(), d.range.to_string(), d.group))
            .collect();
        if declarations.is_empty() {
            declarations = index.unreferenced(&entries);
        }

        let mut roots = Vec::with_capacity(declarations.len());
        for (name, range, group) in declarations {
            let mut node = match index.resolve(&name, &range) {
                Some(idx) => walker.node(idx, &range)?,
                None if group == DependencyGroup::Optional => continue,
                None => unresolved(&name, &range),
            };
            node.is_transitive = false;
            if group.is_dev() {
                node.mark_dev_recursive();
            }
            roots.push(node);
        }
        Ok(roots)
    }
}

#[derive(Debug, Default)]
struct YarnEntry {
    name: String,
    specifiers: Vec<String>,
    version: String,
    dependencies: Vec<YarnDependency>,
}

#[derive(Debug)]
struct YarnDependency {
    name: String,
    range: String,
    optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Dependencies,
    Optional,
    Other,
}

fn parse_error(path: Option<&Path>, line: usize, message: impl std::fmt::Display) -> Error {
    Error::parse(FORMAT, path, format!("line {line}: {message}"))
}

fn parse_entries(
    contents: &str,
    path: Option<&Path>,
    builder: &TreeBuilder<'_>,
) -> Result<Vec<YarnEntry>> {
    let mut entries = Vec::new();
    let mut current: Option<(usize, YarnEntry)> = None;
    let mut block: Option<(Block, usize)> = None;

    for (index, line) in contents.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = line.len() - line.trim_start().len();

        if indent == 0 {
            builder.checkpoint()?;
            if trimmed == "__metadata:" {
                return Err(parse_error(
                    path,
                    line_no,
                    "Yarn Berry (v2+) lockfiles are not supported",
                ));
            }
            let header = trimmed
                .strip_suffix(':')
                .ok_or_else(|| parse_error(path, line_no, "expected an entry header"))?;
            if let Some((start, entry)) = current.take() {
                entries.push(finish_entry(entry, path, start)?);
            }
            current = Some((line_no, parse_header(header, path, line_no)?));
            block = None;
            continue;
        }

        let Some((_, entry)) = current.as_mut() else {
            return Err(parse_error(path, line_no, "indented line outside of an entry"));
        };

        if let Some((kind, block_indent)) = block
            && indent > block_indent
        {
            let (name, range) = split_pair(trimmed)
                .ok_or_else(|| parse_error(path, line_no, "expected `name \"range\"`"))?;
            if kind != Block::Other {
                entry.dependencies.push(YarnDependency {
                    name,
                    range,
                    optional: kind == Block::Optional,
                });
            }
            continue;
        }
        block = None;

        if let Some(section) = trimmed.strip_suffix(':') {
            let kind = match section {
                "dependencies" => Block::Dependencies,
                "optionalDependencies" => Block::Optional,
                _ => Block::Other,
            };
            block = Some((kind, indent));
            continue;
        }

        let (key, value) = split_pair(trimmed)
            .ok_or_else(|| parse_error(path, line_no, "expected `key value`"))?;
        if key == "version" {
            entry.version = value;
        }
    }

    if let Some((start, entry)) = current {
        entries.push(finish_entry(entry, path, start)?);
    }
    Ok(entries)
}

fn parse_header(header: &str, path: Option<&Path>, line_no: usize) -> Result<YarnEntry> {
    let specifiers: Vec<String> = header
        .split(',')
        .map(|s| s.trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let name = specifiers
        .first()
        .and_then(|s| split_specifier(s))
        .map(|(name, _)| name.to_string())
        .ok_or_else(|| parse_error(path, line_no, format!("invalid entry header '{header}'")))?;
    Ok(YarnEntry {
        name,
        specifiers,
        ..YarnEntry::default()
    })
}

fn finish_entry(entry: YarnEntry, path: Option<&Path>, line_no: usize) -> Result<YarnEntry> {
    if entry.version.is_empty() {
        return Err(parse_error(
            path,
            line_no,
            format!("entry '{}' has no version", entry.name),
        ));
    }
    Ok(entry)
}

/// `name@range` → (`name`, `range`), keeping the scope `@` of scoped names.
fn split_specifier(specifier: &str) -> Option<(&str, &str)> {
    let at = specifier.get(1..)?.find('@')? + 1;
    let (name, range) = specifier.split_at(at);
    Some((name, &range[1..]))
}

/// `key "value"`, `key value` or `"quoted key" "value"`.
fn split_pair(line: &str) -> Option<(String, String)> {
    let (key, rest) = if let Some(quoted) = line.strip_prefix('"') {
        let end = quoted.find('"')?;
        (&quoted[..end], &quoted[end + 1..])
    } else {
        line.split_once(char::is_whitespace)?
    };
    let value = rest.trim().trim_matches('"');
    (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
}

fn unresolved(name: &str, range: &str) -> Dependency {
    Dependency::transitive(name, clean_version(range), range)
}

/// Lookup tables over the parsed entries.
struct EntryIndex {
    by_key: HashMap<String, usize>,
    by_name: HashMap<String, Vec<usize>>,
}

impl EntryIndex {
    fn new(entries: &[YarnEntry]) -> Self {
        let mut by_key = HashMap::new();
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            for specifier in &entry.specifiers {
                by_key.entry(specifier.clone()).or_insert(idx);
            }
            by_key
                .entry(format!("{}@{}", entry.name, entry.version))
                .or_insert(idx);
            by_name.entry(entry.name.clone()).or_default().push(idx);
        }
        Self { by_key, by_name }
    }

    /// Exact specifier, then `name@clean(range)`, then the only entry with that name.
    fn resolve(&self, name: &str, range: &str) -> Option<usize> {
        self.by_key
            .get(&format!("{name}@{range}"))
            .or_else(|| self.by_key.get(&format!("{name}@{}", clean_version(range))))
            .copied()
            .or_else(|| match self.by_name.get(name).map(Vec::as_slice) {
                Some([only]) => Some(*only),
                _ => None,
            })
    }

    /// Entries that no other entry depends on, as root declarations.
    fn unreferenced(&self, entries: &[YarnEntry]) -> Vec<(String, String, DependencyGroup)> {
        let referenced: HashSet<usize> = entries
            .iter()
            .enumerate()
            .flat_map(|(idx, entry)| {
                entry
                    .dependencies
                    .iter()
                    .filter_map(|dep| self.resolve(&dep.name, &dep.range))
                    .filter(move |&target| target != idx)
            })
            .collect();

        entries
            .iter()
            .enumerate()
            .filter(|(idx, _)| !referenced.contains(idx))
            .map(|(_, entry)| {
                let range = entry
                    .specifiers
                    .first()
                    .and_then(|s| split_specifier(s))
                    .map_or(entry.version.as_str(), |(_, range)| range);
                (entry.name.clone(), range.to_string(), DependencyGroup::Production)
            })
            .collect()
    }
}

struct EntryWalker<'a> {
    entries: &'a [YarnEntry],
    index: &'a EntryIndex,
    builder: TreeBuilder<'a>,
}

impl EntryWalker<'_> {
    fn node(&mut self, idx: usize, constraint: &str) -> Result<Dependency> {
        let entries = self.entries;
        let entry = &entries[idx];
        let node = Dependency::transitive(&entry.name, clean_version(&entry.version), constraint)
            .with_resolved(&entry.version);
        if !self.builder.claim(&entry.name, &entry.version)? {
            return Ok(node);
        }

        let mut children = Vec::with_capacity(entry.dependencies.len());
        for dep in &entry.dependencies {
            match self.index.resolve(&dep.name, &dep.range) {
                Some(child) => children.push(self.node(child, &dep.range)?),
                None if dep.optional => {}
                None => children.push(unresolved(&dep.name, &dep.range)),
            }
        }
        Ok(node.with_children(children))
    }
}
