//! NativeStrategy tests driven by shell scripts standing in for npm.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use lockscan_core::{
    Dependency, Error, FailureKind, Manifest, ManifestTarget, PackageManager, ResolutionStrategy,
    Result,
};
use lockscan_native::{CliAdapter, CommandExecutor, CommandSpec, NativeStrategy, NpmCliAdapter};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Runs a fixed shell script and parses its output as `npm ls --json`.
struct ScriptAdapter {
    script: String,
}

impl CliAdapter for ScriptAdapter {
    fn manager(&self) -> PackageManager {
        PackageManager::Npm
    }

    fn is_supported(&self, _dir: &Path) -> bool {
        true
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new("sh", ["-c", self.script.as_str()])
    }

    fn parse(
        &self,
        output: &str,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Dependency>> {
        NpmCliAdapter.parse(output, manifest, cancel)
    }
}

fn strategy(script: &str) -> NativeStrategy {
    NativeStrategy::new(
        vec![Arc::new(ScriptAdapter {
            script: script.to_string(),
        })],
        CommandExecutor::new(Duration::from_secs(10)),
    )
}

fn project(manifest: &str, listing: &str) -> (TempDir, ManifestTarget) {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("package.json"), manifest).unwrap();
    fs::write(temp.path().join("listing.json"), listing).unwrap();
    let target = ManifestTarget::load(&temp.path().join("package.json")).unwrap();
    (temp, target)
}

const MANIFEST: &str = r#"{
    "name": "app",
    "dependencies": { "bravo": "^1.0.0" },
    "devDependencies": { "bravodev": "^2.0.0" }
}"#;

const LISTING: &str = r#"{
    "name": "app",
    "dependencies": {
        "bravo": { "version": "1.2.3", "dependencies": { "charlie": { "version": "0.4.0" } } },
        "bravodev": { "version": "2.3.4" }
    }
}"#;

#[tokio::test]
async fn test_successful_listing() {
    let (temp, target) = project(MANIFEST, LISTING);

    let file = strategy("cat listing.json")
        .resolve(&target, temp.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(file.strategy, ResolutionStrategy::Native);
    assert_eq!(file.package_manager, Some(PackageManager::Npm));
    assert_eq!(file.package_name.as_deref(), Some("app"));
    assert_eq!(file.dependencies.len(), 1);
    assert_eq!(file.dev_dependencies.len(), 1);
    assert_eq!(
        file.dependencies[0].children.as_ref().unwrap()[0].name,
        "charlie"
    );
}

#[tokio::test]
async fn test_non_zero_exit_with_complete_tree_is_accepted() {
    let (temp, target) = project(MANIFEST, LISTING);

    let script = "cat listing.json; echo 'npm ERR! code ELSPROBLEMS invalid peer' >&2; exit 1";
    let file = strategy(script)
        .resolve(&target, temp.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(file.dependencies[0].version, "1.2.3");
}

#[tokio::test]
async fn test_non_zero_exit_with_missing_packages_is_classified() {
    let listing = r#"{
        "name": "app",
        "dependencies": {
            "bravo": { "required": "^1.0.0", "missing": true },
            "bravodev": { "version": "2.3.4" }
        }
    }"#;
    let (temp, target) = project(MANIFEST, listing);

    let script =
        "cat listing.json; echo 'npm ERR! missing: bravo@^1.0.0, required by app' >&2; exit 1";
    let err = strategy(script)
        .resolve(&target, temp.path(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.failure_kind(), FailureKind::MissingDependencies);
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_network_failure_is_classified() {
    let (temp, target) = project(MANIFEST, "");

    let err = strategy("echo 'npm ERR! getaddrinfo ENOTFOUND registry.npmjs.org' >&2; exit 1")
        .resolve(&target, temp.path(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.failure_kind(), FailureKind::Network);
}

#[tokio::test]
async fn test_empty_listing_with_declared_dependencies() {
    let (temp, target) = project(MANIFEST, r#"{ "name": "app" }"#);

    let err = strategy("cat listing.json")
        .resolve(&target, temp.path(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MissingInstalledDependencies { .. }));
}

#[tokio::test]
async fn test_empty_listing_without_declared_dependencies() {
    let (temp, target) = project(r#"{ "name": "app" }"#, r#"{ "name": "app" }"#);

    let file = strategy("cat listing.json")
        .resolve(&target, temp.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(file.roots().next().is_none());
}

#[tokio::test]
async fn test_timeout() {
    let (temp, target) = project(MANIFEST, LISTING);
    let native = NativeStrategy::new(
        vec![Arc::new(ScriptAdapter {
            script: "sleep 5".to_string(),
        })],
        CommandExecutor::new(Duration::from_millis(100)),
    );

    let err = native
        .resolve(&target, temp.path(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ProcessTimeout { .. }));
    assert_eq!(err.failure_kind(), FailureKind::Other);
}

#[tokio::test]
async fn test_no_supported_adapter() {
    let (temp, target) = project(MANIFEST, LISTING);

    let err = NativeStrategy::default()
        .resolve(&target, temp.path(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Unknown { .. }));
}
