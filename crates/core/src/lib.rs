//! Core types for lockscan.
//!
//! This crate holds everything the resolution strategies share: the
//! dependency tree model ([`Dependency`], [`DependencyFile`], [`ProjectInfo`]),
//! the `package.json` model, version cleaning, the per-pass tree builder,
//! scan configuration and the error taxonomy.
//!
//! # Example
//!
//! ```
//! use lockscan_core::{Dependency, DependencyFile, ProjectInfo, ResolutionStrategy};
//!
//! let file = DependencyFile::new("/repo/package.json", ResolutionStrategy::Manifest)
//!     .with_roots(vec![Dependency::direct("left-pad", "^1.3.0", "^1.3.0")]);
//!
//! let mut info = ProjectInfo::new("/repo", false);
//! info.push(file);
//! assert_eq!(info.dependencies.len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod manifest;
pub mod notice;
pub mod tree;
pub mod types;
pub mod version;

pub use config::{ScanConfig, ScanMode};
pub use error::{Error, FailureKind, Result};
pub use graph::DependencyGraph;
pub use manifest::{DeclaredDependency, DependencyGroup, MANIFEST_FILE, Manifest, ManifestTarget};
pub use notice::{CollectingNoticeSink, Notice, NoticeSink, TracingNoticeSink};
pub use tree::TreeBuilder;
pub use types::{
    Dependency, DependencyFile, Ecosystem, PackageManager, ProjectInfo, ResolutionStrategy,
    package_id,
};
