//! Batch scheduler
//!
//! Drives [`FilePipeline::process`] over a list of files and returns exactly
//! one [`ProcessResult`] per input.
//!
//! # Parallelism
//! Batches smaller than `min_parallel`, or a worker count of 1, run one file
//! at a time. Otherwise up to `workers` files are in flight at once: the
//! in-flight set is seeded with N tasks and topped up as each completes.
//! File pipelines do blocking I/O, so each runs on tokio's blocking pool.
//!
//! # Cancellation
//! Cancelling the token stops dispatch. Files already in flight run to
//! completion (no mid-write abort); files never dispatched get a
//! `cancelled` result.

use crate::pipeline::FilePipeline;
use crate::result::ProcessResult;
use futures::stream::{FuturesUnordered, StreamExt};
use mtag_common::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Batches below this size run sequentially unless configured otherwise
pub const DEFAULT_MIN_PARALLEL: usize = 10;

/// Results of one batch run
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// One per input file, in completion order
    pub results: Vec<ProcessResult>,
    /// True if the batch was cancelled before its last file finished
    pub cancelled: bool,
}

pub struct BatchScheduler {
    pipeline: Arc<FilePipeline>,
    workers: usize,
    min_parallel: usize,
    cancel_token: CancellationToken,
}

impl BatchScheduler {
    /// Scheduler sized to the machine's available parallelism
    pub fn new(pipeline: Arc<FilePipeline>) -> Self {
        Self {
            pipeline,
            workers: default_workers(),
            min_parallel: DEFAULT_MIN_PARALLEL,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Explicit worker count; `None` keeps available parallelism
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers.unwrap_or_else(default_workers).max(1);
        self
    }

    pub fn with_min_parallel(mut self, min_parallel: usize) -> Self {
        self.min_parallel = min_parallel;
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Run every file through the pipeline
    pub async fn run(&self, files: Vec<PathBuf>) -> BatchOutcome {
        let parallel = self.workers > 1 && files.len() >= self.min_parallel;
        tracing::info!(
            files = files.len(),
            workers = if parallel { self.workers } else { 1 },
            "Starting batch"
        );

        let outcome = if parallel {
            self.run_parallel(files).await
        } else {
            self.run_sequential(files).await
        };

        tracing::info!(
            results = outcome.results.len(),
            cancelled = outcome.cancelled,
            "Batch finished"
        );
        outcome
    }

    async fn run_sequential(&self, files: Vec<PathBuf>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut remaining = files.into_iter();

        for path in remaining.by_ref() {
            if self.cancel_token.is_cancelled() {
                outcome.cancelled = true;
                outcome.results.push(ProcessResult::cancelled(&path));
                break;
            }
            outcome.results.push(self.dispatch(path).await);
        }
        // Covers a cancel that arrives while the last file is in flight
        if self.cancel_token.is_cancelled() {
            outcome.cancelled = true;
        }

        outcome
            .results
            .extend(remaining.map(|path| ProcessResult::cancelled(&path)));
        outcome
    }

    async fn run_parallel(&self, files: Vec<PathBuf>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut file_iter = files.into_iter();
        let mut tasks = FuturesUnordered::new();

        // Seed initial batch of tasks
        for _ in 0..self.workers {
            if self.cancel_token.is_cancelled() {
                break;
            }
            match file_iter.next() {
                Some(path) => tasks.push(self.dispatch(path)),
                None => break,
            }
        }

        while let Some(result) = tasks.next().await {
            outcome.results.push(result);

            if self.cancel_token.is_cancelled() {
                outcome.cancelled = true;
                continue;
            }
            if let Some(path) = file_iter.next() {
                tasks.push(self.dispatch(path));
            }
        }

        let undispatched: Vec<_> = file_iter.collect();
        if !undispatched.is_empty() {
            outcome.cancelled = true;
            tracing::info!(count = undispatched.len(), "Files not dispatched after cancellation");
        }
        outcome
            .results
            .extend(undispatched.iter().map(|p| ProcessResult::cancelled(p)));
        outcome
    }

    /// Run one file on the blocking pool
    fn dispatch(&self, path: PathBuf) -> impl std::future::Future<Output = ProcessResult> {
        let pipeline = Arc::clone(&self.pipeline);
        async move {
            let task_path = path.clone();
            match tokio::task::spawn_blocking(move || pipeline.process(&task_path)).await {
                Ok(result) => result,
                Err(e) => worker_failure(&path, e.to_string()),
            }
        }
    }
}

fn worker_failure(path: &Path, message: String) -> ProcessResult {
    tracing::error!(file = %path.display(), error = %message, "Worker task failed");
    let mut result = ProcessResult::new(path);
    result.fail(Error::Write(format!("worker task failed: {}", message)));
    result
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
