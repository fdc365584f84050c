//! # mtag
//!
//! Batch audio tag editor. Applies field-level operations to many files in
//! parallel, each file going through validation, filtering, planning, backup,
//! write and verification on its own worker.
//!
//! The format-independent model (fields, schema views, operations, filters)
//! lives in `mtag-common`; this crate adds everything that touches files:
//! - [`tag_store`]: TagStore capability, lofty-backed and in-memory
//! - [`scanner`] and [`validation`]: which files to process
//! - [`backup`] and [`verify`]: write safety
//! - [`pipeline`], [`scheduler`] and [`report`]: the batch itself
//! - [`cli`]: argument to operation/filter translation and exit codes

pub mod backup;
pub mod cli;
pub mod pipeline;
pub mod report;
pub mod result;
pub mod scanner;
pub mod scheduler;
pub mod tag_store;
pub mod validation;
pub mod verify;

pub use backup::{BackupManager, BackupRecord};
pub use pipeline::{FilePipeline, PipelineOptions};
pub use report::{FailureClass, ReportAggregator, Summary};
pub use result::ProcessResult;
pub use scanner::{FileScanner, ScanError};
pub use scheduler::{BatchOutcome, BatchScheduler};
pub use tag_store::{LoftyProvider, MemoryProvider, TagStore, TagStoreProvider};
