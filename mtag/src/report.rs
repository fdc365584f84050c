//! Report aggregator
//!
//! Folds per-file results into summary counts, per-extension pass rates and
//! the JSON report document:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "timestamp": "...",
//!   "summary": {"total": 0, "success": 0, "failed": 0, "skipped": 0,
//!               "backups_created": 0, "backups_removed": 0},
//!   "files": [{"path": "...", "status": "success|error|skipped",
//!              "changes": {"field": {"old": [], "new": []}},
//!              "error": null, "backup_path": null, "backup_kept": null}]
//! }
//! ```

use crate::result::ProcessResult;
use mtag_common::diff::changes_with_originals;
use mtag_common::{Error, ErrorKind, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Report format version
pub const REPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub backups_created: usize,
    pub backups_removed: usize,
}

/// Passed / total for one file extension
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtensionStats {
    pub passed: usize,
    pub total: usize,
}

impl ExtensionStats {
    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub old: Vec<String>,
    pub new: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    pub path: String,
    pub status: &'static str,
    pub changes: BTreeMap<String, FieldChange>,
    pub error: Option<String>,
    pub backup_path: Option<String>,
    pub backup_kept: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub version: &'static str,
    pub timestamp: String,
    pub summary: Summary,
    pub files: Vec<FileEntry>,
}

/// Collects results as workers finish
///
/// Owned by the single task that drains the scheduler; results arrive whole.
#[derive(Debug, Default)]
pub struct ReportAggregator {
    results: Vec<ProcessResult>,
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: ProcessResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[ProcessResult] {
        &self.results
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            total: self.results.len(),
            ..Default::default()
        };

        for result in &self.results {
            if result.skipped {
                summary.skipped += 1;
            } else if result.is_failure() {
                summary.failed += 1;
            } else {
                summary.success += 1;
            }
            if let Some(backup) = &result.backup {
                summary.backups_created += 1;
                if !backup.kept {
                    summary.backups_removed += 1;
                }
            }
        }

        summary
    }

    /// Extension -> passed/total, keyed by lowercase extension
    pub fn per_extension(&self) -> BTreeMap<String, ExtensionStats> {
        let mut stats: BTreeMap<String, ExtensionStats> = BTreeMap::new();
        for result in &self.results {
            let entry = stats.entry(result.ext.clone()).or_default();
            entry.total += 1;
            if result.passed {
                entry.passed += 1;
            }
        }
        stats
    }

    /// Most significant failure kind, for the process exit code
    ///
    /// Disk-full outranks permission errors, which outrank everything else.
    pub fn worst_failure(&self) -> Option<FailureClass> {
        let failures = self.results.iter().filter(|r| r.is_failure());
        let mut worst: Option<FailureClass> = None;
        for result in failures {
            let class = if result.disk_full {
                FailureClass::DiskFull
            } else if result.error_kind == Some(ErrorKind::Permission) {
                FailureClass::Permission
            } else {
                FailureClass::Other
            };
            worst = Some(worst.map_or(class, |w| w.max(class)));
        }
        worst
    }

    pub fn to_report(&self) -> Report {
        Report {
            version: REPORT_VERSION,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: self.summary(),
            files: self.results.iter().map(file_entry).collect(),
        }
    }

    /// Write the JSON report to `path`
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.to_report())
            .map_err(|e| Error::Write(format!("serializing report: {}", e)))?;
        std::fs::write(path, json)
            .map_err(|e| Error::from_io(format!("writing report {}", path.display()), e))?;
        tracing::info!(path = %path.display(), "JSON report written");
        Ok(())
    }
}

/// Failure classes in increasing severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureClass {
    Other,
    Permission,
    DiskFull,
}

fn file_entry(result: &ProcessResult) -> FileEntry {
    let changes = changes_with_originals(&result.original, &result.changed)
        .map(|(field, old, new)| {
            (
                field.to_string(),
                FieldChange {
                    old: old.to_vec(),
                    new: new.to_vec(),
                },
            )
        })
        .collect();

    FileEntry {
        path: result.path.display().to_string(),
        status: result.status(),
        changes,
        error: result.error.clone(),
        backup_path: result
            .backup
            .as_ref()
            .map(|b| b.backup.display().to_string()),
        backup_kept: result.backup.as_ref().map(|b| b.kept),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupRecord;
    use std::path::PathBuf;

    fn ok(path: &str) -> ProcessResult {
        let mut r = ProcessResult::new(Path::new(path));
        r.passed = true;
        r.wrote = true;
        r.original.insert("title".into(), vec!["Old".into()]);
        r.changed.insert("title".into(), vec!["New".into()]);
        r
    }

    fn failed(path: &str, error: Error) -> ProcessResult {
        let mut r = ProcessResult::new(Path::new(path));
        r.fail(error);
        r
    }

    #[test]
    fn test_summary_counts() {
        let mut agg = ReportAggregator::new();
        let mut with_backup = ok("/m/a.mp3");
        with_backup.backup = Some(BackupRecord {
            original: PathBuf::from("/m/a.mp3"),
            backup: PathBuf::from("/b/a.mp3"),
            kept: false,
        });
        agg.record(with_backup);
        agg.record(failed("/m/b.flac", Error::Write("x".into())));
        agg.record(ProcessResult::cancelled(Path::new("/m/c.mp3")));

        assert_eq!(
            agg.summary(),
            Summary {
                total: 3,
                success: 1,
                failed: 1,
                skipped: 1,
                backups_created: 1,
                backups_removed: 1,
            }
        );

        let per_ext = agg.per_extension();
        assert_eq!(per_ext["mp3"], ExtensionStats { passed: 1, total: 2 });
        assert!(!per_ext["flac"].all_passed());
    }

    #[test]
    fn test_report_shape() {
        let mut agg = ReportAggregator::new();
        agg.record(ok("/m/a.mp3"));

        let json = serde_json::to_value(agg.to_report()).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["summary"]["success"], 1);
        let file = &json["files"][0];
        assert_eq!(file["status"], "success");
        assert_eq!(file["changes"]["title"]["old"][0], "Old");
        assert_eq!(file["changes"]["title"]["new"][0], "New");
        assert!(file["backup_path"].is_null());
    }

    #[test]
    fn test_worst_failure() {
        let mut agg = ReportAggregator::new();
        assert_eq!(agg.worst_failure(), None);

        agg.record(failed("/m/a.mp3", Error::Write("x".into())));
        assert_eq!(agg.worst_failure(), Some(FailureClass::Other));

        agg.record(failed("/m/b.mp3", Error::Permission("ro".into())));
        assert_eq!(agg.worst_failure(), Some(FailureClass::Permission));
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut agg = ReportAggregator::new();
        agg.record(ok("/m/a.mp3"));
        agg.write_json(&path).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["summary"]["total"], 1);
    }
}
