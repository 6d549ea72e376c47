//! Per-manifest choice between native and static resolution.

use lockscan_core::{
    DependencyFile, Error, FailureKind, ManifestTarget, Notice, NoticeSink, Result, ScanMode,
};
use lockscan_native::NativeStrategy;
use lockscan_workspaces::StaticStrategy;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Steps a manifest goes through during a scan, reported at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// Discovered, waiting for a resolution slot.
    Idle,
    /// Picking native or static resolution.
    SelectingStrategy,
    /// Running the package manager.
    Executing,
    /// Parsing a lockfile or manifest.
    Parsing,
    /// The native path failed; switching to static.
    FallingBack,
    /// Applying monorepo context.
    Annotating,
    /// Resolved and merged.
    Done,
    /// Dropped from the result or aborted the scan.
    Failed,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::SelectingStrategy => "selecting-strategy",
            Self::Executing => "executing",
            Self::Parsing => "parsing",
            Self::FallingBack => "falling-back",
            Self::Annotating => "annotating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Record a phase transition for a manifest directory.
pub fn enter(phase: ScanPhase, target: &ManifestTarget) {
    debug!(%phase, target = %target.directory.display(), "Phase");
}

/// Runs the strategy a [`ScanMode`] calls for and handles fallback.
///
/// One selector serves one scan call: it remembers which failure kinds were
/// already reported so that each kind produces a single notice.
pub struct StrategySelector<'a> {
    mode: ScanMode,
    native: &'a NativeStrategy,
    static_strategy: &'a StaticStrategy,
    sink: &'a dyn NoticeSink,
    notified: Mutex<BTreeSet<FailureKind>>,
}

impl<'a> StrategySelector<'a> {
    /// Selector for one scan.
    #[must_use]
    pub fn new(
        mode: ScanMode,
        native: &'a NativeStrategy,
        static_strategy: &'a StaticStrategy,
        sink: &'a dyn NoticeSink,
    ) -> Self {
        Self {
            mode,
            native,
            static_strategy,
            sink,
            notified: Mutex::new(BTreeSet::new()),
        }
    }

    /// Resolve one manifest.
    ///
    /// Forced modes return the strategy's error unchanged. In auto mode a
    /// recoverable native error is classified, reported once per kind and
    /// followed by static resolution of the same manifest.
    ///
    /// # Errors
    ///
    /// Returns the native error in native mode, the static error in static
    /// and auto mode, and [`Error::Cancelled`] whenever the token fires.
    pub async fn resolve(
        &self,
        target: &ManifestTarget,
        workspace_root: &Path,
        cancel: &CancellationToken,
    ) -> Result<DependencyFile> {
        enter(ScanPhase::SelectingStrategy, target);
        match self.mode {
            ScanMode::Native => {
                enter(ScanPhase::Executing, target);
                self.native.resolve(target, workspace_root, cancel).await
            }
            ScanMode::Static => {
                enter(ScanPhase::Parsing, target);
                self.resolve_static(target, workspace_root, cancel).await
            }
            ScanMode::Auto => {
                enter(ScanPhase::Executing, target);
                match self.native.resolve(target, workspace_root, cancel).await {
                    Ok(file) => Ok(file),
                    Err(err) if !err.is_recoverable() => Err(err),
                    Err(err) => {
                        enter(ScanPhase::FallingBack, target);
                        let kind = FailureKind::of(&err);
                        debug!(%kind, error = %err, "Native resolution failed");
                        self.notify_once(kind, &target.directory);

                        enter(ScanPhase::Parsing, target);
                        self.resolve_static(target, workspace_root, cancel).await
                    }
                }
            }
        }
    }

    /// Lockfile reads and parsing are blocking, so they run off the runtime
    /// threads that drive sibling package manager processes.
    async fn resolve_static(
        &self,
        target: &ManifestTarget,
        workspace_root: &Path,
        cancel: &CancellationToken,
    ) -> Result<DependencyFile> {
        let strategy = *self.static_strategy;
        let target = target.clone();
        let workspace_root = workspace_root.to_path_buf();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || strategy.resolve(&target, &workspace_root, &cancel))
            .await
            .map_err(|e| Error::unknown(format!("Static resolution panicked: {e}")))?
    }

    /// Failure kinds reported so far.
    #[must_use]
    pub fn notified_kinds(&self) -> BTreeSet<FailureKind> {
        self.lock_notified().clone()
    }

    fn notify_once(&self, kind: FailureKind, target: &Path) {
        if self.lock_notified().insert(kind) {
            info!(%kind, "Falling back to lockfile data");
            self.sink.notify(&Notice::fallback(kind, target));
        }
    }

    fn lock_notified(&self) -> std::sync::MutexGuard<'_, BTreeSet<FailureKind>> {
        self.notified
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl fmt::Debug for StrategySelector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategySelector")
            .field("mode", &self.mode)
            .field("notified", &self.notified_kinds())
            .finish_non_exhaustive()
    }
}
