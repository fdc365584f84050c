//! Per-file outcome record

use crate::backup::BackupRecord;
use crate::tag_store::extension_of;
use mtag_common::{Error, ErrorKind, FieldMap};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Note recorded when the planned map equals the original
pub const NOTE_NO_CHANGES: &str = "no changes";
/// Note recorded for dry runs
pub const NOTE_DRY_RUN: &str = "dry run";
/// Note recorded when filters reject the file
pub const NOTE_FILTERED: &str = "filtered out";
/// Note recorded for files never dispatched because the batch was cancelled
pub const NOTE_CANCELLED: &str = "cancelled";

/// Outcome of one file's pipeline run
///
/// Built by the worker that ran the file and handed to the aggregator as a
/// whole; nothing changes it afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub passed: bool,
    pub path: PathBuf,
    pub ext: String,
    pub original: FieldMap,
    pub planned: FieldMap,
    pub changed: FieldMap,
    pub wrote: bool,
    pub verified: Option<FieldMap>,
    pub error: Option<String>,
    pub skipped: bool,
    pub note: Option<String>,

    #[serde(skip)]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip)]
    pub disk_full: bool,
    #[serde(skip)]
    pub backup: Option<BackupRecord>,
}

impl ProcessResult {
    pub fn new(path: &Path) -> Self {
        Self {
            passed: false,
            path: path.to_path_buf(),
            ext: extension_of(path),
            original: FieldMap::new(),
            planned: FieldMap::new(),
            changed: FieldMap::new(),
            wrote: false,
            verified: None,
            error: None,
            skipped: false,
            note: None,
            error_kind: None,
            disk_full: false,
            backup: None,
        }
    }

    /// Result for a file the batch never dispatched
    pub fn cancelled(path: &Path) -> Self {
        let mut result = Self::new(path);
        result.skipped = true;
        result.note = Some(NOTE_CANCELLED.to_string());
        result
    }

    /// Record a failure
    pub fn fail(&mut self, error: Error) {
        self.passed = false;
        self.error_kind = Some(error.kind());
        self.disk_full = error.is_disk_full();
        self.error = Some(error.to_string());
    }

    /// Finish as passed with an explanatory note
    pub fn pass_with_note(&mut self, note: &str) {
        self.passed = true;
        self.note = Some(note.to_string());
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Report status: `skipped`, `error` or `success`
    pub fn status(&self) -> &'static str {
        if self.skipped {
            "skipped"
        } else if self.is_failure() {
            "error"
        } else {
            "success"
        }
    }
}
