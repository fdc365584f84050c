//! mtag - batch audio tag editor
//!
//! Scans a file or directory, applies one operation to the selected fields of
//! every matching file, and prints a per-file and per-extension summary.
//! Exit codes: 0 success, 1 failure, 2 usage, 3 no files, 4 permission,
//! 5 disk full, 130 interrupted.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use mtag::cli::{self, Args};
use mtag::{
    BatchScheduler, FilePipeline, FileScanner, LoftyProvider, ReportAggregator, TagStoreProvider,
};
use mtag_common::{AliasTable, EditorConfig, LoggingConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            cli::EXIT_FAILURE
        }
    };
    std::process::exit(code);
}

async fn run(args: Args) -> Result<i32> {
    let config = match EditorConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return Ok(usage_error(e)),
    };
    init_logging(&config.logging, args.verbose)?;

    if let Err(e) = args.validate() {
        return Ok(usage_error(e));
    }

    let aliases = AliasTable::standard();
    let delimiter = args.delimiter.clone().unwrap_or_else(|| config.delimiter.clone());
    let operations = match args.operations(&delimiter, aliases) {
        Ok(ops) => ops,
        Err(e) => return Ok(usage_error(e)),
    };
    let filters = match args.filters(aliases) {
        Ok(filters) => filters,
        Err(e) => return Ok(usage_error(e)),
    };

    let provider = Arc::new(LoftyProvider::new());
    let files = match FileScanner::new()
        .recursive(args.recursive)
        .with_extensions(&args.extensions)
        .scan(&args.path, |ext| provider.supports(ext))
    {
        Ok(files) => files,
        Err(e) => return Ok(usage_error(e)),
    };

    if files.is_empty() {
        println!("No audio files found in {}", args.path.display());
        if let Some(report_path) = &args.json_report {
            ReportAggregator::new().write_json(report_path)?;
        }
        return Ok(cli::EXIT_NO_FILES);
    }

    let options = args.pipeline_options(&config);
    if let Some(dir) = &options.backup_dir {
        if !options.dry_run {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create backup directory {}", dir.display()))?;
        }
    }
    let dry_run = options.dry_run;
    info!(
        files = files.len(),
        operations = operations.len(),
        filters = filters.len(),
        dry_run,
        schema = %options.schema,
        "Configuration resolved"
    );

    let pipeline = Arc::new(FilePipeline::new(provider, operations, filters, options));
    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel_token.clone()));

    let scheduler = BatchScheduler::new(pipeline)
        .with_workers(args.threads.or(config.max_workers))
        .with_min_parallel(config.min_files_for_parallel)
        .with_cancel_token(cancel_token);

    println!("Processing {} file(s)...", files.len());
    if dry_run && args.operation != cli::OperationArg::Print {
        println!("Dry run: no files will be modified");
    }

    let show_details = args.show_details(files.len());
    let outcome = scheduler.run(files).await;

    let mut aggregator = ReportAggregator::new();
    let mut results = outcome.results;
    results.sort_by(|a, b| a.path.cmp(&b.path));
    for result in results {
        if show_details {
            print!("{}", cli::render_file(&result, dry_run));
        }
        aggregator.record(result);
    }
    println!();
    print!("{}", cli::render_summary(&aggregator));

    if let Some(report_path) = &args.json_report {
        aggregator
            .write_json(report_path)
            .with_context(|| format!("Failed to write report {}", report_path.display()))?;
        println!("Report written to {}", report_path.display());
    }

    if outcome.cancelled {
        warn!("Batch interrupted before every file was processed");
    }
    Ok(cli::exit_code(outcome.cancelled, aggregator.worst_failure()))
}

fn usage_error(err: impl std::fmt::Display) -> i32 {
    eprintln!("Error: {}", err);
    cli::EXIT_USAGE
}

/// Initialize tracing
///
/// `RUST_LOG` wins over `--verbose`, which wins over the configured level.
/// Logs go to stderr so stdout carries only the listing and summary.
fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { logging.level.as_str() };

    let file_layer = match &logging.file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("mtag={0},mtag_common={0}", level).into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Cancel `token` on Ctrl+C or SIGTERM
///
/// Dispatch stops; files already in flight finish.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, finishing in-flight files");
        },
        _ = terminate => {
            info!("Received terminate signal, finishing in-flight files");
        },
    }
    token.cancel();
}
