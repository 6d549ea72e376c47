use crate::parsers::{LockfileParser, ParseContext};
use lockscan_core::version::{clean_version, strip_peer_suffix};
use lockscan_core::{Dependency, Error, PackageManager, Result, TreeBuilder};
use serde::Deserialize;
use std::collections::BTreeMap;

const FORMAT: &str = "pnpm-lock.yaml";
const ROOT_IMPORTER: &str = ".";
const NEWEST_TESTED_MAJOR: u32 = 9;

/// Parser for pnpm `pnpm-lock.yaml` files (lockfile v5, v6 and v9).
#[derive(Debug, Default, Clone, Copy)]
pub struct PnpmLockfileParser;

impl LockfileParser for PnpmLockfileParser {
    fn manager(&self) -> PackageManager {
        PackageManager::Pnpm
    }

    fn parse(&self, contents: &str, ctx: &ParseContext<'_>) -> Result<Vec<Dependency>> {
        let lockfile: PnpmLockfile = serde_yaml::from_str(contents)
            .map_err(|e| Error::parse(FORMAT, ctx.lockfile_path, e.to_string()))?;

        let schema = PnpmSchema::try_from(lockfile)
            .map_err(|message| Error::parse(FORMAT, ctx.lockfile_path, message))?;

        let importer_key = if ctx.importer.is_empty() {
            ROOT_IMPORTER
        } else {
            ctx.importer
        };
        let Some(importer) = schema.importer(importer_key) else {
            return Err(Error::parse(
                FORMAT,
                ctx.lockfile_path,
                format!("No importer entry for '{importer_key}'"),
            ));
        };

        let mut walker = SnapshotWalker {
            schema: &schema,
            builder: TreeBuilder::new(ctx.cancel),
        };

        let mut roots = Vec::new();
        let sections = [
            (&importer.dependencies, false),
            (&importer.optional_dependencies, false),
            (&importer.dev_dependencies, true),
        ];
        for (section, is_dev) in sections {
            for (name, entry) in section {
                let specifier = entry
                    .specifier()
                    .or_else(|| importer.specifiers.get(name).map(String::as_str))
                    .unwrap_or_else(|| entry.version());
                let mut node = walker.node(name, entry.version(), specifier)?;
                node.is_transitive = false;
                if is_dev {
                    node.mark_dev_recursive();
                }
                roots.push(node);
            }
        }
        Ok(roots)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LockfileVersion {
    Text(String),
    Number(f64),
}

impl LockfileVersion {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn major(&self) -> Option<u32> {
        match self {
            Self::Text(text) => text.trim().split('.').next()?.parse().ok(),
            Self::Number(number) => (number.is_finite() && *number >= 0.0).then(|| *number as u32),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PnpmLockfile {
    #[serde(default)]
    lockfile_version: Option<LockfileVersion>,
    #[serde(default)]
    importers: BTreeMap<String, PnpmImporter>,
    #[serde(default)]
    packages: BTreeMap<String, PnpmSnapshot>,
    #[serde(default)]
    snapshots: BTreeMap<String, PnpmSnapshot>,
    /// Single-project v5/v6 lockfiles keep the root importer at the top level.
    #[serde(flatten)]
    root: PnpmImporter,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PnpmImporter {
    #[serde(default)]
    specifiers: BTreeMap<String, String>,
    #[serde(default)]
    dependencies: BTreeMap<String, ImporterDependency>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, ImporterDependency>,
    #[serde(default)]
    optional_dependencies: BTreeMap<String, ImporterDependency>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImporterDependency {
    /// v6 and v9: `{ specifier, version }`.
    Detailed { specifier: String, version: String },
    /// v5: a bare version, with the range under `specifiers`.
    Bare(String),
}

impl ImporterDependency {
    fn version(&self) -> &str {
        match self {
            Self::Detailed { version, .. } | Self::Bare(version) => version,
        }
    }

    fn specifier(&self) -> Option<&str> {
        match self {
            Self::Detailed { specifier, .. } => Some(specifier),
            Self::Bare(_) => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PnpmSnapshot {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    optional_dependencies: BTreeMap<String, String>,
}

/// Where a lockfile keeps per-package dependency lists, by schema generation.
#[derive(Debug)]
enum PnpmSchema {
    /// Lockfile v9: `snapshots` keyed by `name@version(peers)`.
    V9 {
        importers: BTreeMap<String, PnpmImporter>,
        snapshots: BTreeMap<String, PnpmSnapshot>,
    },
    /// Lockfile v5 and v6: `packages` keyed by `/name/version` (v5) or
    /// `/name@version` (v6).
    Legacy {
        major: u32,
        importers: BTreeMap<String, PnpmImporter>,
        packages: BTreeMap<String, PnpmSnapshot>,
    },
}

impl TryFrom<PnpmLockfile> for PnpmSchema {
    type Error = String;

    fn try_from(lockfile: PnpmLockfile) -> std::result::Result<Self, String> {
        let major = match &lockfile.lockfile_version {
            Some(version) => version
                .major()
                .ok_or_else(|| format!("Invalid lockfileVersion {version:?}"))?,
            None if lockfile.snapshots.is_empty() => 6,
            None => NEWEST_TESTED_MAJOR,
        };
        if major > NEWEST_TESTED_MAJOR {
            tracing::warn!(
                major,
                "pnpm lockfile is newer than the newest tested version; parsing may be incomplete"
            );
        }

        let mut importers = lockfile.importers;
        if importers.is_empty() {
            importers.insert(ROOT_IMPORTER.to_string(), lockfile.root);
        }

        Ok(if major >= NEWEST_TESTED_MAJOR {
            Self::V9 {
                importers,
                snapshots: lockfile.snapshots,
            }
        } else {
            Self::Legacy {
                major,
                importers,
                packages: lockfile.packages,
            }
        })
    }
}

impl PnpmSchema {
    fn importer(&self, key: &str) -> Option<&PnpmImporter> {
        match self {
            Self::V9 { importers, .. } | Self::Legacy { importers, .. } => importers.get(key),
        }
    }

    /// Key of a package's snapshot and its peer-qualified version.
    ///
    /// `reference` is the version as it appears in a dependency list. It may
    /// carry a peer suffix (`5.2.2(react@19.1.1)`, or `1.0.0_react@18.2.0` in
    /// v5) or be an alias that names another package outright.
    fn locate<'r>(&self, name: &str, reference: &'r str) -> (String, &'r str) {
        match self {
            Self::V9 { .. } => {
                if is_v9_alias(reference) {
                    (reference.to_string(), alias_version(reference, '@'))
                } else {
                    (format!("{name}@{reference}"), reference)
                }
            }
            Self::Legacy { major, .. } => {
                let separator = if *major >= 6 { '@' } else { '/' };
                if reference.starts_with('/') {
                    (reference.to_string(), alias_version(reference, separator))
                } else if separator == '@' {
                    (format!("/{name}@{reference}"), reference)
                } else {
                    (format!("/{name}/{reference}"), reference)
                }
            }
        }
    }

    fn snapshot(&self, key: &str) -> Option<&PnpmSnapshot> {
        match self {
            Self::V9 { snapshots, .. } => snapshots.get(key),
            Self::Legacy { packages, .. } => packages.get(key),
        }
    }

    const fn strips_underscore_peers(&self) -> bool {
        matches!(self, Self::Legacy { major, .. } if *major < 6)
    }
}

/// `string-width@4.2.3`, as opposed to a plain version or a `link:` path.
fn is_v9_alias(reference: &str) -> bool {
    let base = strip_peer_suffix(reference);
    !base.starts_with(|c: char| c.is_ascii_digit())
        && !base.contains(':')
        && base.get(1..).is_some_and(|rest| rest.contains('@'))
}

fn alias_version(reference: &str, separator: char) -> &str {
    let base = strip_peer_suffix(reference);
    base.rsplit_once(separator).map_or(base, |(_, version)| version)
}

struct SnapshotWalker<'a> {
    schema: &'a PnpmSchema,
    builder: TreeBuilder<'a>,
}

impl SnapshotWalker<'_> {
    fn node(&mut self, name: &str, reference: &str, constraint: &str) -> Result<Dependency> {
        if reference.starts_with("link:") {
            return Ok(Dependency::transitive(name, reference, constraint).with_resolved(reference));
        }

        let schema = self.schema;
        let (key, qualified) = schema.locate(name, reference);
        let version = if schema.strips_underscore_peers() {
            qualified.split_once('_').map_or(qualified, |(base, _)| base)
        } else {
            qualified
        };

        let node = Dependency::transitive(name, clean_version(version), constraint)
            .with_resolved(reference);
        if !self.builder.claim(name, reference)? {
            return Ok(node);
        }

        let Some(snapshot) = schema.snapshot(&key) else {
            tracing::trace!(key, "No snapshot entry");
            return Ok(node.with_children(Vec::new()));
        };

        let mut children = Vec::new();
        for (child, child_reference) in snapshot
            .dependencies
            .iter()
            .chain(&snapshot.optional_dependencies)
        {
            children.push(self.node(child, child_reference, child_reference)?);
        }
        Ok(node.with_children(children))
    }
}
