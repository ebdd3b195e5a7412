//! wasmpool CLI entry point.
//!
//! Loads a shared-memory WebAssembly module from a path or URL, reports
//! transfer and instantiation progress, and fans out the worker pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wasmpool_common::{ConfigFile, PoolConfig};
use wasmpool_core::{FileSource, HttpSource, WasmEngine, WasmWorkerRuntime};
use wasmpool_pool::{ErrorChannel, Loader, LoaderHooks};

/// Bootstrap a shared-memory worker pool for a WebAssembly module.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path or URL of the WebAssembly module to load.
    module: Option<String>,

    /// TOML configuration file.
    #[arg(short, long, env = "WASMPOOL_CONFIG")]
    config: Option<PathBuf>,

    /// Worker count override (defaults to detected hardware concurrency).
    #[arg(short, long)]
    workers: Option<usize>,

    /// Entry point export invoked per task.
    #[arg(long)]
    entry: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wasmpool=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config_file = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load config from '{}'", path.display()))?,
        None => ConfigFile::default(),
    };

    let module = cli
        .module
        .or(config_file.module)
        .context("No module given. Pass a path or URL, or set `module` in the config file")?;

    let mut config: PoolConfig = config_file.pool;
    if let Some(workers) = cli.workers {
        config.loader.workers = Some(workers);
    }
    if let Some(entry) = cli.entry {
        config.instance.entry_point = entry;
    }

    info!(module = %module, "Starting wasmpool");

    let engine = WasmEngine::new(&config.engine)?;
    let runtime = Arc::new(WasmWorkerRuntime::new(
        engine.clone(),
        config.instance.clone(),
    ));
    let (sink, mut fatal_errors) = ErrorChannel::new();

    // Surface fatal worker errors as they arrive
    tokio::spawn(async move {
        while let Some(fatal) = fatal_errors.recv().await {
            error!(worker = %fatal.worker, error = %fatal.error, "Worker lost");
        }
    });

    let hooks = LoaderHooks::new()
        .on_start(|| info!("Loading module"))
        .on_progress(|current, total| match total {
            Some(total) if total > 0 => {
                info!(percent = current * 100 / total, "Loading module");
            }
            _ => info!(bytes = current, "Loading module"),
        })
        .on_complete(|| info!("Transfer complete"))
        .on_success(|handle| {
            info!(
                module = %handle.module().content_hash(),
                memory_bytes = handle.memory_bytes(),
                "Module instantiated"
            );
        })
        .on_failure(|err| warn!(%err, "Module load failed"));

    let chunk_size = config.loader.chunk_size;
    let loader = Loader::new(engine, runtime, Arc::new(sink), config);

    let outcome = if module.starts_with("http://") || module.starts_with("https://") {
        let source = HttpSource::parse(&module)?;
        loader.load(source, hooks).await?
    } else {
        let source = FileSource::new(&module, chunk_size);
        loader.load(source, hooks).await?
    };

    let pool = outcome
        .pool
        .context("pool missing despite an installed success hook")?;

    // Readiness is eventually consistent; give the handshakes a moment
    // and report what came up.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while pool.ready_workers() < pool.worker_count() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    info!(
        ready = pool.ready_workers(),
        total = pool.worker_count(),
        "Worker pool up"
    );

    Ok(())
}
