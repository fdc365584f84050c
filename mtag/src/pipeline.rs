//! Per-file pipeline
//!
//! # Stages
//! `Validated -> Filtered -> Planned -> (DryRunStop | BackedUp) -> Written ->
//! Verified -> Finalized`
//!
//! Each file runs every stage on one worker, start to finish. Failures at any
//! stage end in a failed [`ProcessResult`]; once a backup exists it is kept on
//! every failure path, and a failed write restores the original bytes from it.
//!
//! TagStore handles are scoped to the stage that needs them, so the file is
//! closed before verification re-opens it and on every early return.

use crate::backup::BackupManager;
use crate::result::{ProcessResult, NOTE_DRY_RUN, NOTE_FILTERED, NOTE_NO_CHANGES};
use crate::tag_store::{apply_writes, TagStoreProvider};
use crate::validation::Validator;
use crate::verify::Verifier;
use mtag_common::{
    compute_planned, diff, AliasTable, EditorConfig, Error, FilterSet, Operation, Result, Schema,
    SchemaViewBuilder,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Batch-wide pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub dry_run: bool,
    pub backup_dir: Option<PathBuf>,
    pub delete_backups: bool,
    pub force: bool,
    pub verify: bool,
    pub schema: Schema,
    pub max_file_size: u64,
    pub backup_retry_limit: u32,
}

impl PipelineOptions {
    /// Options seeded from configuration; CLI flags are applied on top
    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            dry_run: false,
            backup_dir: None,
            delete_backups: false,
            force: false,
            verify: config.verify,
            schema: config.default_schema,
            max_file_size: config.max_file_size,
            backup_retry_limit: config.backup_retry_limit,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}

/// Runs the full stage sequence for one file at a time
///
/// Shared read-only between workers.
pub struct FilePipeline {
    provider: Arc<dyn TagStoreProvider>,
    aliases: &'static AliasTable,
    operations: Vec<Operation>,
    filters: FilterSet,
    options: PipelineOptions,
    validator: Validator,
    backups: Option<BackupManager>,
}

impl FilePipeline {
    pub fn new(
        provider: Arc<dyn TagStoreProvider>,
        operations: Vec<Operation>,
        filters: FilterSet,
        options: PipelineOptions,
    ) -> Self {
        let writes = !options.dry_run && !operations.is_empty();
        let validator = Validator::new(options.max_file_size, writes);
        let backups = options.backup_dir.as_ref().map(|dir| {
            BackupManager::new(
                dir,
                options.force,
                options.delete_backups,
                options.backup_retry_limit,
            )
        });

        Self {
            provider,
            aliases: AliasTable::standard(),
            operations,
            filters,
            options,
            validator,
            backups,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Process one file; never panics on file errors, always returns a result
    pub fn process(&self, path: &Path) -> ProcessResult {
        let mut result = ProcessResult::new(path);

        if let Err(e) = self.run(path, &mut result) {
            match e.kind() {
                mtag_common::ErrorKind::Verification => {
                    tracing::warn!(file = %path.display(), error = %e, "Verification failed")
                }
                _ => tracing::error!(file = %path.display(), error = %e, "File failed"),
            }
            if let Some(record) = &result.backup {
                tracing::warn!(
                    file = %path.display(),
                    backup = %record.backup.display(),
                    "Backup retained after failure"
                );
            }
            result.fail(e);
        }

        result
    }

    fn run(&self, path: &Path, result: &mut ProcessResult) -> Result<()> {
        let schema = self.options.schema;
        let builder = SchemaViewBuilder::new(self.aliases);

        self.validator.validate(path, self.provider.as_ref())?;
        tracing::debug!(file = %path.display(), "Validated");

        let mut store = self.provider.open(path)?;
        let frames = store.read_native()?;
        let original = builder.build(&frames, schema);
        result.original = original.clone();

        if !self.filters.is_empty() {
            let canonical = if schema == Schema::Canonical {
                original.clone()
            } else {
                builder.build(&frames, Schema::Canonical)
            };
            if !self.filters.matches(&canonical) {
                tracing::debug!(file = %path.display(), "Filtered out");
                result.skipped = true;
                result.pass_with_note(NOTE_FILTERED);
                return Ok(());
            }
        }

        let planned = compute_planned(&original, &self.operations, schema, self.aliases);
        let changed = diff(&original, &planned);
        result.planned = planned.clone();
        result.changed = changed.clone();
        tracing::debug!(file = %path.display(), changed = changed.len(), "Planned");

        if changed.is_empty() {
            result.pass_with_note(NOTE_NO_CHANGES);
            return Ok(());
        }
        if self.options.dry_run {
            result.pass_with_note(NOTE_DRY_RUN);
            return Ok(());
        }

        if let Some(manager) = &self.backups {
            let record = manager.create(path)?;
            result.backup = Some(record);
        }

        let writes = builder.plan_writes(&frames, &planned, &changed, schema);
        let written = apply_writes(store.as_mut(), &writes).and_then(|()| store.save());
        drop(store);

        if let Err(e) = written {
            self.restore_after_failed_write(result);
            return Err(write_error(e));
        }
        result.wrote = true;
        tracing::info!(
            file = %path.display(),
            fields = ?changed.keys().collect::<Vec<_>>(),
            "Tags written"
        );

        if self.options.verify {
            let mut reread = self
                .provider
                .open(path)
                .map_err(|e| Error::Verification(format!("re-open failed: {}", e)))?;
            let verified = Verifier::new(self.aliases, schema).verify(reread.as_mut(), &changed)?;
            result.verified = Some(verified);
            tracing::debug!(file = %path.display(), "Verified");
        }

        if let (Some(manager), Some(record)) = (&self.backups, result.backup.as_mut()) {
            manager.resolve(record, true);
        }
        result.passed = true;
        Ok(())
    }

    fn restore_after_failed_write(&self, result: &mut ProcessResult) {
        let (Some(manager), Some(record)) = (&self.backups, result.backup.as_mut()) else {
            return;
        };
        record.kept = true;
        if let Err(e) = manager.restore(record) {
            tracing::error!(
                file = %record.original.display(),
                backup = %record.backup.display(),
                error = %e,
                "Could not restore original from backup"
            );
        }
    }
}

/// Classify a TagStore failure during the write stage
fn write_error(err: Error) -> Error {
    match err {
        Error::Permission(_) | Error::Write(_) => err,
        Error::Io(_) if err.is_disk_full() => err,
        other => Error::Write(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag_store::MemoryProvider;
    use mtag_common::{Filter, Frame};
    use std::fs;

    fn v(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// A placeholder file on disk with frames held by a MemoryProvider
    fn fixture(frames: Vec<Frame>) -> (tempfile::TempDir, PathBuf, MemoryProvider) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        fs::write(&path, b"placeholder").unwrap();
        let provider = MemoryProvider::new(&["mp3"]);
        provider.insert(&path, frames);
        (dir, path, provider)
    }

    fn pipeline(provider: &MemoryProvider, ops: Vec<Operation>, options: PipelineOptions) -> FilePipeline {
        FilePipeline::new(Arc::new(provider.clone()), ops, FilterSet::default(), options)
    }

    #[test]
    fn test_write_and_verify() {
        let (_dir, path, provider) = fixture(vec![Frame::text("TIT2", "Old")]);
        let p = pipeline(
            &provider,
            vec![Operation::write("title", "New", ";")],
            PipelineOptions::default(),
        );

        let result = p.process(&path);
        assert!(result.passed, "{:?}", result.error);
        assert!(result.wrote);
        assert_eq!(result.verified.unwrap()["title"], v(&["New"]));
        assert_eq!(provider.frames(&path).unwrap(), vec![Frame::text("title", "New")]);
    }

    #[test]
    fn test_no_changes_short_circuits() {
        let (_dir, path, provider) = fixture(vec![Frame::text("title", "Same")]);
        let p = pipeline(
            &provider,
            vec![Operation::write("title", "Same", ";")],
            PipelineOptions::default(),
        );

        let result = p.process(&path);
        assert!(result.passed);
        assert!(!result.wrote);
        assert_eq!(result.note.as_deref(), Some(NOTE_NO_CHANGES));
    }

    #[test]
    fn test_dry_run_stops_before_backup() {
        let (dir, path, provider) = fixture(vec![Frame::text("title", "Old")]);
        let options = PipelineOptions {
            dry_run: true,
            backup_dir: Some(dir.path().join("backups")),
            ..Default::default()
        };
        let p = pipeline(&provider, vec![Operation::write("title", "New", ";")], options);

        let result = p.process(&path);
        assert!(result.passed);
        assert!(!result.wrote);
        assert_eq!(result.changed["title"], v(&["New"]));
        assert!(result.backup.is_none());
        assert!(!dir.path().join("backups").exists());
        assert_eq!(provider.frames(&path).unwrap(), vec![Frame::text("title", "Old")]);
    }

    #[test]
    fn test_filter_skip() {
        let (_dir, path, provider) = fixture(vec![Frame::text("TPE1", "Stones")]);
        let p = FilePipeline::new(
            Arc::new(provider.clone()),
            vec![Operation::write("title", "New", ";")],
            FilterSet::new(vec![Filter::new("artist", "beatles", false).unwrap()]),
            PipelineOptions::default(),
        );

        let result = p.process(&path);
        assert!(result.skipped);
        assert!(!result.wrote);
        assert_eq!(result.status(), "skipped");
    }

    #[test]
    fn test_validation_failure_is_result() {
        let (dir, _path, provider) = fixture(vec![]);
        let p = pipeline(&provider, vec![Operation::clear("comment")], PipelineOptions::default());

        let result = p.process(&dir.path().join("missing.mp3"));
        assert!(!result.passed);
        assert_eq!(result.error_kind, Some(mtag_common::ErrorKind::Validation));
    }

    #[test]
    fn test_backup_deleted_on_success_when_requested() {
        let (dir, path, provider) = fixture(vec![Frame::text("title", "Old")]);
        let options = PipelineOptions {
            backup_dir: Some(dir.path().join("backups")),
            delete_backups: true,
            ..Default::default()
        };
        let p = pipeline(&provider, vec![Operation::write("title", "New", ";")], options);

        let result = p.process(&path);
        assert!(result.passed);
        let record = result.backup.unwrap();
        assert!(!record.kept);
        assert!(!record.backup.exists());
    }
}
