//! lockscan CLI

// The CLI writes results to stdout and panic reports to stderr.
#![allow(clippy::print_stderr)]

use clap::Parser;
use lockscan::cli::{self, Cli};
use lockscan::tracing::{TracingConfig, init_tracing};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // NOTE: eprintln! is used in the panic hook because the subscriber may be
    // unusable while panicking.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = Cli::parse();
    init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.log_level.into(),
        filter: None,
    })?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling scan");
            on_interrupt.cancel();
        }
    });

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    cli::run(cli, &mut out, &cancel).await
}
