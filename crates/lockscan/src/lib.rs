//! lockscan: dependency trees for npm, pnpm and Yarn workspaces.
//!
//! A scan discovers every `package.json` under a root, resolves each one
//! either by asking the package manager (`npm ls`, `pnpm ls`, `yarn list`)
//! or by parsing its lockfile, and merges the resulting trees into one
//! [`ProjectInfo`].
//!
//! # Example
//!
//! ```rust,no_run
//! use lockscan::Scanner;
//! use lockscan_core::{ScanConfig, ScanMode};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> lockscan_core::Result<()> {
//! let config = ScanConfig {
//!     mode: ScanMode::Static,
//!     ..ScanConfig::default()
//! };
//! let info = Scanner::new(config)
//!     .scan(Path::new("."), &CancellationToken::new())
//!     .await?;
//! for file in &info.dependency_files {
//!     tracing::info!(path = %file.path.display(), strategy = %file.strategy);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod scanner;
pub mod selector;
pub mod tracing;

pub use lockscan_core::{Error, ProjectInfo, Result, ScanConfig, ScanMode};
pub use scanner::{Scanner, scan};
pub use selector::{ScanPhase, StrategySelector};
