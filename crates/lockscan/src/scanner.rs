//! The scan entry point: discovery, per-manifest resolution, annotation and merge.

use crate::selector::{ScanPhase, StrategySelector, enter};
use futures::StreamExt;
use lockscan_core::{
    Error, ManifestTarget, NoticeSink, ProjectInfo, Result, ScanConfig, ScanMode,
    TracingNoticeSink,
};
use lockscan_native::NativeStrategy;
use lockscan_workspaces::{MonorepoContext, StaticStrategy, WorkspaceDiscovery};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Scans a workspace root into a [`ProjectInfo`].
///
/// Strategies and the notice sink are injected once and reused by every
/// scan call.
#[derive(Clone)]
pub struct Scanner {
    config: ScanConfig,
    discovery: WorkspaceDiscovery,
    native: NativeStrategy,
    static_strategy: StaticStrategy,
    notices: Arc<dyn NoticeSink>,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("config", &self.config)
            .field("native", &self.native)
            .field("static_strategy", &self.static_strategy)
            .finish_non_exhaustive()
    }
}

impl Scanner {
    /// Scanner with the built-in strategies configured from `config`.
    /// Notices go to the tracing subscriber.
    #[must_use]
    pub fn new(config: ScanConfig) -> Self {
        Self {
            discovery: WorkspaceDiscovery::from_config(&config),
            native: NativeStrategy::from_config(&config),
            static_strategy: StaticStrategy::from_config(&config),
            notices: Arc::new(TracingNoticeSink),
            config,
        }
    }

    /// Replace the native strategy.
    #[must_use]
    pub fn with_native(mut self, native: NativeStrategy) -> Self {
        self.native = native;
        self
    }

    /// Replace the static strategy.
    #[must_use]
    pub fn with_static(mut self, static_strategy: StaticStrategy) -> Self {
        self.static_strategy = static_strategy;
        self
    }

    /// Send notices to `sink` instead of the tracing subscriber.
    #[must_use]
    pub fn with_notice_sink(mut self, sink: Arc<dyn NoticeSink>) -> Self {
        self.notices = sink;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan `root`.
    ///
    /// Manifests that cannot be read or resolved are logged and skipped, so
    /// one broken member never hides its siblings. Results are merged in
    /// discovery order.
    ///
    /// # Errors
    ///
    /// Returns discovery errors and [`Error::Cancelled`]. In native or static
    /// mode, returns the first resolution error when no manifest resolved.
    #[tracing::instrument(
        name = "scan",
        skip_all,
        fields(root = %root.display(), mode = %self.config.mode)
    )]
    pub async fn scan(&self, root: &Path, cancel: &CancellationToken) -> Result<ProjectInfo> {
        let start = Instant::now();
        let workspace = self.discovery.scan(root, cancel)?;
        let is_monorepo = workspace.is_monorepo();

        let targets: Vec<ManifestTarget> = workspace
            .manifests
            .iter()
            .filter_map(|path| match ManifestTarget::load(path) {
                Ok(target) => {
                    enter(ScanPhase::Idle, &target);
                    Some(target)
                }
                Err(e) => {
                    warn!(manifest = %path.display(), error = %e, "Skipping unreadable manifest");
                    None
                }
            })
            .collect();

        let context = MonorepoContext::from_targets(root, is_monorepo, &targets);
        let selector = StrategySelector::new(
            self.config.mode,
            &self.native,
            &self.static_strategy,
            self.notices.as_ref(),
        );

        let mut results = futures::stream::iter(targets.iter().map(|target| {
            let selector = &selector;
            async move { (target, selector.resolve(target, root, cancel).await) }
        }))
        .buffered(self.config.concurrency.max(1));

        let mut info = ProjectInfo::new(root, is_monorepo);
        let mut first_error = None;
        while let Some((target, result)) = results.next().await {
            match result {
                Ok(mut file) => {
                    enter(ScanPhase::Annotating, target);
                    context.annotate(&mut file);
                    enter(ScanPhase::Done, target);
                    info.push(file);
                }
                Err(Error::Cancelled) => {
                    enter(ScanPhase::Failed, target);
                    return Err(Error::Cancelled);
                }
                Err(err) => {
                    enter(ScanPhase::Failed, target);
                    warn!(
                        manifest = %target.manifest_path.display(),
                        error = %err,
                        "Skipping manifest that could not be resolved"
                    );
                    first_error.get_or_insert(err);
                }
            }
        }

        // Forced modes have no fallback, so a scan where nothing resolved fails.
        if info.dependency_files.is_empty()
            && self.config.mode != ScanMode::Auto
            && let Some(err) = first_error
        {
            return Err(err);
        }

        info!(
            manifests = info.dependency_files.len(),
            dependencies = info.dependencies.len(),
            is_monorepo,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Scan complete"
        );
        Ok(info)
    }
}

/// Scan `root` with the built-in strategies.
///
/// # Errors
///
/// See [`Scanner::scan`].
pub async fn scan(
    root: &Path,
    config: ScanConfig,
    cancel: &CancellationToken,
) -> Result<ProjectInfo> {
    Scanner::new(config).scan(root, cancel).await
}
