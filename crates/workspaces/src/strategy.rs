//! Static resolution: lockfile parsing with a manifest-only fallback.

use crate::lockfile::{self, DetectedLockfile};
use crate::parsers::manifest_only::parse_manifest;
use crate::parsers::{ParseContext, parser_for};
use lockscan_core::{
    DependencyFile, Error, ManifestTarget, ResolutionStrategy, Result, ScanConfig,
};
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Resolves manifests by parsing the lockfile found next to them.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticStrategy {
    use_workspace_lockfile: bool,
}

impl StaticStrategy {
    /// Create a strategy. With `use_workspace_lockfile`, members without a
    /// lockfile of their own are resolved from the workspace root lockfile.
    #[must_use]
    pub const fn new(use_workspace_lockfile: bool) -> Self {
        Self {
            use_workspace_lockfile,
        }
    }

    /// Create a strategy from scan settings.
    #[must_use]
    pub const fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.use_workspace_lockfile)
    }

    /// The lockfile this strategy would read for a manifest directory.
    #[must_use]
    pub fn lockfile_for(&self, dir: &Path, workspace_root: &Path) -> Option<DetectedLockfile> {
        if self.use_workspace_lockfile {
            lockfile::detect_for(dir, workspace_root)
        } else {
            lockfile::detect_in(dir)
        }
    }

    /// Resolve one manifest.
    ///
    /// Without a usable lockfile the declared ranges are returned as-is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for malformed lockfiles, an I/O error when the
    /// lockfile cannot be read and [`Error::Cancelled`] when the token fires.
    #[tracing::instrument(
        name = "static_resolve",
        skip_all,
        fields(manifest = %target.manifest_path.display())
    )]
    pub fn resolve(
        &self,
        target: &ManifestTarget,
        workspace_root: &Path,
        cancel: &CancellationToken,
    ) -> Result<DependencyFile> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut file = DependencyFile::new(&target.manifest_path, ResolutionStrategy::Manifest);
        file.package_name.clone_from(&target.manifest.name);

        let Some(detected) = self.lockfile_for(&target.directory, workspace_root) else {
            tracing::debug!("No lockfile found, using declared ranges");
            return Ok(file.with_roots(parse_manifest(&target.manifest)));
        };
        let Some(parser) = parser_for(detected.manager) else {
            tracing::debug!(
                manager = %detected.manager,
                "Parser for this lockfile is not enabled, using declared ranges"
            );
            return Ok(file.with_roots(parse_manifest(&target.manifest)));
        };

        let contents = fs::read_to_string(&detected.path).map_err(|e| {
            Error::io(e, Some(&detected.path), format!("reading {}", parser.lockfile_name()))
        })?;
        let ctx = ParseContext::new(&target.manifest, cancel)
            .with_lockfile_path(&detected.path)
            .with_importer(&detected.importer);
        let roots = parser.parse(&contents, &ctx)?;

        tracing::debug!(
            manager = %detected.manager,
            roots = roots.len(),
            shared = detected.is_shared(),
            "Parsed lockfile"
        );

        file.strategy = ResolutionStrategy::Static;
        file.package_manager = Some(detected.manager);
        Ok(file.with_roots(roots))
    }
}
