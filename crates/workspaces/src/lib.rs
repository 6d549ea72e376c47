//! Workspace discovery and static dependency resolution for lockscan.
//!
//! This crate finds the `package.json` manifests under a scan root and turns
//! each one into a [`lockscan_core::DependencyFile`] without running any
//! package manager.
//!
//! # Architecture
//!
//! - [`WorkspaceDiscovery`] walks the root, honoring `.gitignore` files and a
//!   built-in denylist (`node_modules`, `.git`, `.next`, `.turbo`, ...).
//! - [`lockfile`] picks the lockfile that governs a manifest directory.
//! - [`LockfileParser`] implementations rebuild full-depth trees from
//!   `package-lock.json`, `pnpm-lock.yaml` and Yarn classic `yarn.lock`.
//! - [`StaticStrategy`] ties the above together and falls back to the
//!   declared ranges when no lockfile applies.
//! - [`MonorepoContext`] stamps package roots and internal markers onto the
//!   finished trees.
//!
//! ## Feature flags
//!
//! - `parsers-javascript` - every lockfile parser (**enabled by default**)
//! - `parser-npm` - npm's `package-lock.json` (lockfileVersion 1 to 3)
//! - `parser-pnpm` - pnpm's `pnpm-lock.yaml` (v5, v6 and v9)
//! - `parser-yarn-classic` - Yarn classic (v1.x) `yarn.lock`
//!
//! With a parser disabled its lockfile is ignored and the affected manifests
//! are resolved from their declared ranges.
//!
//! # Example
//!
//! ```rust,no_run
//! use lockscan_core::{ManifestTarget, Result};
//! use lockscan_workspaces::{MonorepoContext, StaticStrategy, WorkspaceDiscovery};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! fn resolve_all(root: &Path) -> Result<()> {
//!     let cancel = CancellationToken::new();
//!     let workspace = WorkspaceDiscovery::new().scan(root, &cancel)?;
//!     let context = MonorepoContext::new(root, workspace.is_monorepo());
//!
//!     for manifest in &workspace.manifests {
//!         let target = ManifestTarget::load(manifest)?;
//!         let mut file = StaticStrategy::default().resolve(&target, root, &cancel)?;
//!         context.annotate(&mut file);
//!         tracing::info!(path = %file.path.display(), roots = file.roots().count());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod annotate;
pub mod discovery;
pub mod lockfile;
pub mod parsers;
pub mod strategy;

pub use annotate::MonorepoContext;
pub use discovery::{DEFAULT_IGNORES, DiscoveredWorkspace, WorkspaceDiscovery};
pub use lockfile::{DetectedLockfile, detect_for, detect_in};
pub use parsers::{LockfileParser, ParseContext, parser_for};
pub use strategy::StaticStrategy;

#[cfg(feature = "parser-npm")]
pub use parsers::NpmLockfileParser;
#[cfg(feature = "parser-pnpm")]
pub use parsers::PnpmLockfileParser;
#[cfg(feature = "parser-yarn-classic")]
pub use parsers::YarnClassicLockfileParser;
