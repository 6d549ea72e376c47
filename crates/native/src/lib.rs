//! Native dependency resolution for lockscan.
//!
//! Runs the project's own package manager (`npm ls`, `pnpm ls`,
//! `yarn list`) and converts its JSON listing into
//! [`lockscan_core::DependencyFile`] trees. Failed runs are classified by
//! their stderr so that callers can decide whether to fall back to lockfile
//! parsing and which notice to show.

pub mod adapters;
pub mod executor;
pub mod failure;
pub mod strategy;

pub use adapters::{
    CliAdapter, NpmCliAdapter, PnpmCliAdapter, YarnCliAdapter, default_adapters, select_adapter,
};
pub use executor::{CapturedOutput, CommandExecutor, CommandSpec};
pub use failure::classify;
pub use strategy::NativeStrategy;
