//! Command-line interface.

use crate::scanner::Scanner;
use crate::tracing::{LogLevel, TracingFormat};
use clap::{Args, Parser, Subcommand, ValueEnum};
use lockscan_core::{Error, ProjectInfo, Result, ScanConfig, ScanMode};
use lockscan_workspaces::{DiscoveredWorkspace, WorkspaceDiscovery};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Resolve the dependency trees of npm, pnpm and Yarn projects.
#[derive(Debug, Parser)]
#[command(name = "lockscan", version, about, long_about = None)]
pub struct Cli {
    /// Log level for lockscan crates (overridden by `RUST_LOG`)
    #[arg(long, global = true, value_enum, default_value = "warn", env = "LOCKSCAN_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "compact", env = "LOCKSCAN_LOG_FORMAT")]
    pub log_format: TracingFormat,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve every manifest under a root and print the result
    Scan(ScanArgs),
    /// List the manifests a scan would cover
    Discover(DiscoverArgs),
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// One line per manifest
    Summary,
}

/// Arguments of `lockscan scan`.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Workspace root to scan
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Resolution mode: auto, native or static
    #[arg(long, env = "LOCKSCAN_MODE")]
    pub mode: Option<ScanMode>,

    /// Package manager command timeout in seconds
    #[arg(long, env = "LOCKSCAN_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Number of manifests resolved at the same time
    #[arg(long, env = "LOCKSCAN_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Configuration file (defaults to lockscan.toml in the root)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Resolve members without a lockfile from the workspace root lockfile
    #[arg(long)]
    pub use_workspace_lockfile: bool,

    /// Do not apply .gitignore rules during discovery
    #[arg(long)]
    pub no_gitignore: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Arguments of `lockscan discover`.
#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Workspace root to walk
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Configuration file (defaults to lockscan.toml in the root)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

impl ScanArgs {
    /// Merge the configuration file with command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns configuration errors for unreadable files or invalid values.
    pub fn resolve_config(&self) -> Result<ScanConfig> {
        let mut config = load_config(&self.root, self.config.as_deref())?;
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(timeout) = self.timeout {
            config.command_timeout_secs = timeout;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        config.use_workspace_lockfile |= self.use_workspace_lockfile;
        if self.no_gitignore {
            config.respect_gitignore = false;
        }
        config.validate()?;
        Ok(config)
    }
}

fn load_config(root: &Path, explicit: Option<&Path>) -> Result<ScanConfig> {
    match explicit {
        Some(path) => ScanConfig::load(path)?.ok_or_else(|| Error::FileNotFound {
            path: path.to_path_buf(),
        }),
        None => ScanConfig::discover(root),
    }
}

/// Run a parsed command line, writing results to `out`.
///
/// # Errors
///
/// Returns scan, configuration and output errors.
pub async fn run(cli: Cli, out: &mut impl Write, cancel: &CancellationToken) -> miette::Result<()> {
    match cli.command {
        Command::Scan(args) => {
            let config = args.resolve_config()?;
            let info = Scanner::new(config).scan(&args.root, cancel).await?;
            render_scan(&info, args.format, out)?;
        }
        Command::Discover(args) => {
            let config = load_config(&args.root, args.config.as_deref())?;
            let workspace = WorkspaceDiscovery::from_config(&config).scan(&args.root, cancel)?;
            render_discovery(&workspace, args.format, out)?;
        }
    }
    Ok(())
}

/// Write a scan result.
///
/// # Errors
///
/// Returns an I/O error when `out` fails.
pub fn render_scan(info: &ProjectInfo, format: OutputFormat, out: &mut impl Write) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(info, out),
        OutputFormat::Summary => {
            for file in &info.dependency_files {
                let manager = file
                    .package_manager
                    .map_or_else(|| "-".to_string(), |m| m.to_string());
                let total: usize = file.roots().map(|root| root.walk().count()).sum();
                writeln!(
                    out,
                    "{}\t{}\t{}\t{} direct, {} dev, {} total",
                    file.path.display(),
                    file.strategy,
                    manager,
                    file.dependencies.len(),
                    file.dev_dependencies.len(),
                    total,
                )?;
            }
            writeln!(
                out,
                "{} manifests, {} direct dependencies, monorepo: {}",
                info.dependency_files.len(),
                info.dependencies.len(),
                info.is_monorepo
            )?;
            Ok(())
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveryOutput<'a> {
    root: &'a Path,
    is_monorepo: bool,
    manifests: &'a [PathBuf],
}

/// Write a discovery result.
///
/// # Errors
///
/// Returns an I/O error when `out` fails.
pub fn render_discovery(
    workspace: &DiscoveredWorkspace,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(
            &DiscoveryOutput {
                root: &workspace.root,
                is_monorepo: workspace.is_monorepo(),
                manifests: &workspace.manifests,
            },
            out,
        ),
        OutputFormat::Summary => {
            for manifest in &workspace.manifests {
                writeln!(out, "{}", manifest.display())?;
            }
            writeln!(
                out,
                "{} manifests, monorepo: {}",
                workspace.manifests.len(),
                workspace.is_monorepo()
            )?;
            Ok(())
        }
    }
}

fn write_json(value: &impl Serialize, out: &mut impl Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)
        .map_err(|e| Error::unknown(format!("Failed to serialize output: {e}")))?;
    writeln!(out)?;
    Ok(())
}
