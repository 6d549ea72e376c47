//! End-to-end scans over fixture workspaces built in temporary directories.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use lockscan::Scanner;
use lockscan_core::{
    CollectingNoticeSink, DependencyGraph, Error, FailureKind, ResolutionStrategy, ScanConfig,
    ScanMode,
};
use lockscan_native::{CommandExecutor, NativeStrategy};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn config(mode: ScanMode) -> ScanConfig {
    ScanConfig {
        mode,
        ..ScanConfig::default()
    }
}

/// Scanner whose native path never finds a package manager.
fn offline_scanner(mode: ScanMode) -> Scanner {
    Scanner::new(config(mode))
        .with_native(NativeStrategy::new(Vec::new(), CommandExecutor::default()))
}

const NPM_MANIFEST: &str = r#"{
    "name": "app",
    "dependencies": { "bravo": "^1.0.0" },
    "devDependencies": { "bravodev": "^2.0.0" }
}"#;

const NPM_LOCKFILE: &str = r#"{
    "name": "app",
    "lockfileVersion": 3,
    "packages": {
        "": {
            "name": "app",
            "dependencies": { "bravo": "^1.0.0" },
            "devDependencies": { "bravodev": "^2.0.0" }
        },
        "node_modules/bravo": {
            "version": "1.2.3",
            "dependencies": { "shared": "^3.0.0" }
        },
        "node_modules/bravodev": {
            "version": "2.3.4",
            "dev": true,
            "dependencies": { "shared": "^3.0.0" }
        },
        "node_modules/shared": { "version": "3.1.0" }
    }
}"#;

#[tokio::test]
async fn test_npm_dev_split() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "package.json", NPM_MANIFEST);
    write(temp.path(), "package-lock.json", NPM_LOCKFILE);

    let info = offline_scanner(ScanMode::Static)
        .scan(temp.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!info.is_monorepo);
    assert_eq!(info.dependency_files.len(), 1);
    let file = &info.dependency_files[0];
    assert_eq!(file.dependencies.len(), 1);
    assert_eq!(file.dependencies[0].name, "bravo");
    assert!(!file.dependencies[0].is_dev);
    assert_eq!(file.dev_dependencies.len(), 1);
    assert_eq!(file.dev_dependencies[0].name, "bravodev");
    assert!(file.dev_dependencies[0].is_dev);
    assert_eq!(info.dependencies.len(), 2);
    assert!(info.ecosystem_types.contains("npm"));
    assert!(file.package_root.is_none());
}

#[tokio::test]
async fn test_scan_is_idempotent() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "package.json", NPM_MANIFEST);
    write(temp.path(), "package-lock.json", NPM_LOCKFILE);

    let scanner = offline_scanner(ScanMode::Static);
    let cancel = CancellationToken::new();
    let first = scanner.scan(temp.path(), &cancel).await.unwrap();
    let second = scanner.scan(temp.path(), &cancel).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_graph_rebuilds_shared_dependency() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "package.json", NPM_MANIFEST);
    write(temp.path(), "package-lock.json", NPM_LOCKFILE);

    let info = offline_scanner(ScanMode::Static)
        .scan(temp.path(), &CancellationToken::new())
        .await
        .unwrap();
    let graph = DependencyGraph::from_project(&info);

    assert_eq!(graph.package_count(), 3);
    let dependents: Vec<&str> = graph
        .dependents_of("shared@3.1.0")
        .into_iter()
        .map(|node| node.name.as_str())
        .collect();
    assert_eq!(dependents.len(), 2);
    assert!(dependents.contains(&"bravo"));
    assert!(dependents.contains(&"bravodev"));
}

fn monorepo(root: &Path) {
    write(
        root,
        "package.json",
        r#"{ "name": "acme", "private": true, "devDependencies": { "typescript": "^5.4.0" } }"#,
    );
    write(
        root,
        "packages/ui/package.json",
        r#"{ "name": "@acme/ui", "dependencies": { "react": "^18.2.0" } }"#,
    );
    write(
        root,
        "apps/web/package.json",
        r#"{ "name": "web", "dependencies": { "@acme/ui": "workspace:*", "react": "^18.2.0" } }"#,
    );
    write(root, "apps/web/node_modules/react/package.json", r#"{ "name": "react" }"#);
    write(root, ".gitignore", "dist/\n");
    write(root, "dist/package.json", r#"{ "name": "build-output" }"#);
}

#[tokio::test]
async fn test_monorepo_package_root() {
    let temp = TempDir::new().unwrap();
    monorepo(temp.path());

    let info = offline_scanner(ScanMode::Static)
        .scan(temp.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(info.is_monorepo);
    assert_eq!(info.dependency_files.len(), 3);
    for file in &info.dependency_files {
        let dir = file.path.parent().unwrap();
        assert_eq!(file.package_root.as_deref(), Some(dir));
        assert_eq!(file.workspace_folder.as_deref(), Some(temp.path()));
        for node in file.roots().flat_map(|root| root.walk()) {
            assert_eq!(node.package_root.as_deref(), Some(dir));
            assert_eq!(node.workspace_folder.as_deref(), Some(temp.path()));
        }
    }
}

#[tokio::test]
async fn test_workspace_protocol_marks_internal() {
    let temp = TempDir::new().unwrap();
    monorepo(temp.path());

    let info = offline_scanner(ScanMode::Static)
        .scan(temp.path(), &CancellationToken::new())
        .await
        .unwrap();

    let web = info
        .dependency_files
        .iter()
        .find(|file| file.package_name.as_deref() == Some("web"))
        .unwrap();
    assert_eq!(web.strategy, ResolutionStrategy::Manifest);
    let ui = web.dependencies.iter().find(|d| d.name == "@acme/ui").unwrap();
    assert!(ui.is_internal);
    assert_eq!(ui.version_constraint, "workspace:*");
    let react = web.dependencies.iter().find(|d| d.name == "react").unwrap();
    assert!(!react.is_internal);
}

#[tokio::test]
async fn test_unreadable_manifest_is_skipped() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "package.json", NPM_MANIFEST);
    write(temp.path(), "package-lock.json", NPM_LOCKFILE);
    write(temp.path(), "broken/package.json", "{ not json");

    let info = offline_scanner(ScanMode::Static)
        .scan(temp.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(info.is_monorepo);
    assert_eq!(info.dependency_files.len(), 1);
}

#[tokio::test]
async fn test_auto_falls_back_transparently() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "package.json", NPM_MANIFEST);
    write(temp.path(), "package-lock.json", NPM_LOCKFILE);
    let sink = Arc::new(CollectingNoticeSink::new());

    let info = offline_scanner(ScanMode::Auto)
        .with_notice_sink(sink.clone())
        .scan(temp.path(), &CancellationToken::new())
        .await
        .unwrap();

    let file = &info.dependency_files[0];
    assert_eq!(file.strategy, ResolutionStrategy::Static);
    assert_eq!(file.dependencies[0].version, "1.2.3");
    assert_eq!(sink.notices().len(), 1);
}

#[tokio::test]
async fn test_forced_native_rejects() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "package.json", NPM_MANIFEST);
    write(temp.path(), "package-lock.json", NPM_LOCKFILE);

    let err = offline_scanner(ScanMode::Native)
        .scan(temp.path(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_recoverable());
    assert!(!matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn test_forced_static_propagates_parse_error() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "package.json", NPM_MANIFEST);
    write(temp.path(), "package-lock.json", "{ broken");

    let err = offline_scanner(ScanMode::Static)
        .scan(temp.path(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Parse { .. }));
}

#[tokio::test]
async fn test_forced_static_skips_broken_member() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "package.json", NPM_MANIFEST);
    write(temp.path(), "package-lock.json", NPM_LOCKFILE);
    write(
        temp.path(),
        "packages/a/package.json",
        r#"{ "name": "a", "dependencies": { "ms": "^2.0.0" } }"#,
    );
    write(temp.path(), "packages/b/package.json", r#"{ "name": "b" }"#);
    write(temp.path(), "packages/b/package-lock.json", "{ broken");

    let info = offline_scanner(ScanMode::Static)
        .scan(temp.path(), &CancellationToken::new())
        .await
        .unwrap();

    let names: Vec<_> = info
        .dependency_files
        .iter()
        .map(|f| f.package_name.as_deref().unwrap())
        .collect();
    assert_eq!(names, vec!["app", "a"]);
    assert!(info.is_monorepo);
}

#[tokio::test]
async fn test_auto_skips_target_when_fallback_fails() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "package.json", NPM_MANIFEST);
    write(temp.path(), "package-lock.json", NPM_LOCKFILE);
    write(temp.path(), "tools/package.json", r#"{ "name": "tools" }"#);
    write(temp.path(), "tools/package-lock.json", "{ broken");

    let info = offline_scanner(ScanMode::Auto)
        .scan(temp.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(info.dependency_files.len(), 1);
    assert_eq!(info.dependency_files[0].package_name.as_deref(), Some("app"));
}

#[tokio::test]
async fn test_concurrent_scan_keeps_discovery_order() {
    let temp = TempDir::new().unwrap();
    monorepo(temp.path());

    let sequential = offline_scanner(ScanMode::Static)
        .scan(temp.path(), &CancellationToken::new())
        .await
        .unwrap();
    let concurrent = Scanner::new(ScanConfig {
        concurrency: 4,
        ..config(ScanMode::Static)
    })
    .scan(temp.path(), &CancellationToken::new())
    .await
    .unwrap();

    let paths = |info: &lockscan_core::ProjectInfo| {
        info.dependency_files
            .iter()
            .map(|f| f.path.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(paths(&sequential), paths(&concurrent));
}

#[tokio::test]
async fn test_cancelled_scan() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "package.json", NPM_MANIFEST);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = offline_scanner(ScanMode::Auto)
        .scan(temp.path(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
}

#[cfg(unix)]
mod native_failures {
    use super::*;
    use lockscan_core::{Dependency, Manifest, PackageManager};
    use lockscan_native::{CliAdapter, CommandSpec, NpmCliAdapter};

    const UNREACHABLE_REGISTRY: &str = "echo 'npm ERR! request to https://registry.npmjs.org \
        failed, reason: getaddrinfo ENOTFOUND' >&2; exit 1";

    const NOT_INSTALLED: &str = r#"cat <<'JSON'
{
  "name": "app",
  "dependencies": { "bravo": { "required": "^1.0.0", "missing": true } }
}
JSON
echo 'npm ERR! code ELSPROBLEMS' >&2
echo 'npm ERR! missing: bravo@^1.0.0, required by app' >&2
exit 1"#;

    const EMPTY_LISTING: &str = r#"echo '{"name":"app"}'"#;

    /// npm adapter whose listing command is a shell script.
    struct ScriptedNpm(&'static str);

    impl CliAdapter for ScriptedNpm {
        fn manager(&self) -> PackageManager {
            PackageManager::Npm
        }

        fn command(&self) -> CommandSpec {
            CommandSpec::new("sh", ["-c", self.0])
        }

        fn parse(
            &self,
            output: &str,
            manifest: &Manifest,
            cancel: &CancellationToken,
        ) -> lockscan_core::Result<Vec<Dependency>> {
            NpmCliAdapter.parse(output, manifest, cancel)
        }
    }

    fn scanner(mode: ScanMode, script: &'static str, sink: Arc<CollectingNoticeSink>) -> Scanner {
        Scanner::new(config(mode))
            .with_native(NativeStrategy::new(
                vec![Arc::new(ScriptedNpm(script))],
                CommandExecutor::default(),
            ))
            .with_notice_sink(sink)
    }

    fn npm_project() -> TempDir {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "package.json", NPM_MANIFEST);
        write(temp.path(), "package-lock.json", NPM_LOCKFILE);
        temp
    }

    #[tokio::test]
    async fn test_network_failure_notifies_once_per_scan() {
        let temp = npm_project();
        write(temp.path(), "packages/a/package.json", NPM_MANIFEST);
        write(temp.path(), "packages/a/package-lock.json", NPM_LOCKFILE);
        let sink = Arc::new(CollectingNoticeSink::new());

        let info = scanner(ScanMode::Auto, UNREACHABLE_REGISTRY, sink.clone())
            .scan(temp.path(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(info.dependency_files.len(), 2);
        assert!(
            info.dependency_files
                .iter()
                .all(|f| f.strategy == ResolutionStrategy::Static)
        );
        let notices = sink.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, FailureKind::Network);
    }

    #[tokio::test]
    async fn test_forced_native_returns_classified_error() {
        let temp = npm_project();
        let sink = Arc::new(CollectingNoticeSink::new());

        let err = scanner(ScanMode::Native, UNREACHABLE_REGISTRY, sink.clone())
            .scan(temp.path(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NetworkFailure { .. }));
        assert!(sink.notices().is_empty());
    }

    #[tokio::test]
    async fn test_not_installed_falls_back_to_lockfile() {
        let temp = npm_project();
        let sink = Arc::new(CollectingNoticeSink::new());

        let info = scanner(ScanMode::Auto, NOT_INSTALLED, sink.clone())
            .scan(temp.path(), &CancellationToken::new())
            .await
            .unwrap();

        let file = &info.dependency_files[0];
        assert_eq!(file.strategy, ResolutionStrategy::Static);
        assert_eq!(file.dependencies[0].version, "1.2.3");
        let notices = sink.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, FailureKind::MissingDependencies);
    }

    #[tokio::test]
    async fn test_not_installed_rejects_in_native_mode() {
        let temp = npm_project();
        let sink = Arc::new(CollectingNoticeSink::new());

        let err = scanner(ScanMode::Native, NOT_INSTALLED, sink.clone())
            .scan(temp.path(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingInstalledDependencies { .. }));
        assert!(sink.notices().is_empty());
    }

    #[tokio::test]
    async fn test_empty_listing_counts_as_not_installed() {
        let temp = npm_project();
        let sink = Arc::new(CollectingNoticeSink::new());

        let info = scanner(ScanMode::Auto, EMPTY_LISTING, sink.clone())
            .scan(temp.path(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(info.dependency_files[0].strategy, ResolutionStrategy::Static);
        assert_eq!(sink.notices()[0].kind, FailureKind::MissingDependencies);

        let err = scanner(ScanMode::Native, EMPTY_LISTING, Arc::default())
            .scan(temp.path(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingInstalledDependencies { .. }));
    }
}
