//! KGF CLI - Knowledge Graph Federation
//!
//! Search, detail and subgraph queries over the entity store and the graph
//! store, plus the HTTP server that exposes them.

use anyhow::Result;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

use commands::{Cli, Commands};

/// Initialize tracing with optional file logging.
///
/// Logs go to stderr so `--json` output on stdout stays machine-readable.
/// The returned guard flushes the file writer and must outlive the program.
fn init_tracing(log_file: Option<&std::path::Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kgf=info,kgf_federation=debug,kgf_web=debug".into());

    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if let Some(path) = log_file {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let _ = std::fs::create_dir_all(dir);
        let file_name = path.file_name().unwrap_or_else(|| "kgf.log".as_ref());

        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

        // Log to both stderr and file when --log-file is used
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false),
            )
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console)
            .init();
        None
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = match &cli.command {
        Commands::Serve(args) => args.log_file.clone(),
        _ => None,
    };
    let _guard = init_tracing(log_file.as_deref());

    cli.execute().await
}
