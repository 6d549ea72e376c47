//! Native resolution: ask the package manager for its installed tree.

use crate::adapters::{CliAdapter, default_adapters, select_adapter};
use crate::executor::CommandExecutor;
use crate::failure::classify;
use lockscan_core::version::is_unresolved;
use lockscan_core::{
    Dependency, DependencyFile, Error, ManifestTarget, ResolutionStrategy, Result, ScanConfig,
};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Resolves manifests by running `npm ls`, `pnpm ls` or `yarn list`.
#[derive(Clone)]
pub struct NativeStrategy {
    adapters: Vec<Arc<dyn CliAdapter>>,
    executor: CommandExecutor,
}

impl std::fmt::Debug for NativeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeStrategy")
            .field(
                "adapters",
                &self.adapters.iter().map(|a| a.manager()).collect::<Vec<_>>(),
            )
            .field("executor", &self.executor)
            .finish()
    }
}

impl Default for NativeStrategy {
    fn default() -> Self {
        Self::new(default_adapters(), CommandExecutor::default())
    }
}

impl NativeStrategy {
    /// Strategy over an explicit adapter list, checked in order.
    #[must_use]
    pub fn new(adapters: Vec<Arc<dyn CliAdapter>>, executor: CommandExecutor) -> Self {
        Self { adapters, executor }
    }

    /// Built-in adapters with the configured command timeout.
    #[must_use]
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(
            default_adapters(),
            CommandExecutor::new(config.command_timeout()),
        )
    }

    /// Resolve one manifest through its package manager.
    ///
    /// A non-zero exit is tolerated when the printed tree is complete, since
    /// npm also exits non-zero for peer dependency warnings.
    ///
    /// # Errors
    ///
    /// - [`Error::Unknown`] when no adapter supports the directory
    /// - [`Error::NetworkFailure`], [`Error::MissingInstalledDependencies`] or
    ///   [`Error::ProcessFailure`] for a failed run, classified from stderr
    /// - [`Error::MissingInstalledDependencies`] when the tool lists nothing
    ///   although the manifest declares dependencies
    /// - executor errors ([`Error::ProcessTimeout`], [`Error::Cancelled`])
    #[tracing::instrument(
        name = "native_resolve",
        skip_all,
        fields(manifest = %target.manifest_path.display())
    )]
    pub async fn resolve(
        &self,
        target: &ManifestTarget,
        workspace_root: &Path,
        cancel: &CancellationToken,
    ) -> Result<DependencyFile> {
        let Some(adapter) = select_adapter(&self.adapters, &target.directory, workspace_root)
        else {
            return Err(Error::unknown(format!(
                "No supported package manager lockfile for {}",
                target.directory.display()
            )));
        };

        let command = adapter.command();
        debug!(
            manager = %adapter.manager(),
            command = %command.display(),
            "Running package manager"
        );
        let output = self.executor.run(&command, &target.directory, cancel).await?;
        let stdout = output.stdout()?;

        let roots = if output.success() {
            adapter.parse(&stdout, &target.manifest, cancel)?
        } else {
            match adapter.parse(&stdout, &target.manifest, cancel) {
                Ok(roots) if is_complete(&roots) => {
                    warn!(
                        exit_code = ?output.exit_code,
                        "Package manager exited unsuccessfully but printed a complete tree"
                    );
                    roots
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                _ => {
                    return Err(classify(
                        &command.display(),
                        output.exit_code,
                        &output.stderr,
                        &target.manifest_path,
                    ));
                }
            }
        };

        if roots.is_empty() && target.manifest.declares_dependencies() {
            return Err(Error::MissingInstalledDependencies {
                manifest: target.manifest_path.clone(),
                message: format!("'{}' listed no packages", command.display()),
            });
        }

        let mut file = DependencyFile::new(&target.manifest_path, ResolutionStrategy::Native);
        file.package_name.clone_from(&target.manifest.name);
        file.package_manager = Some(adapter.manager());
        Ok(file.with_roots(roots))
    }
}

fn is_complete(roots: &[Dependency]) -> bool {
    !roots
        .iter()
        .flat_map(Dependency::walk)
        .any(|node| is_unresolved(&node.version))
}
