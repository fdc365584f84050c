//! Backup manager
//!
//! Copies a file into the backup directory before its first write. The copy
//! is created exclusively (an existing backup is never overwritten) and
//! checked against the original by SHA-256.
//!
//! # Resolution
//! - Any failure after the backup exists: the backup is kept
//! - Success: the backup is kept unless `delete_on_success` was requested

use mtag_common::error::is_disk_full_io;
use mtag_common::{Error, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// A backup copy and whether it is being kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRecord {
    pub original: PathBuf,
    pub backup: PathBuf,
    pub kept: bool,
}

/// Creates, restores and resolves backups in one directory
#[derive(Debug, Clone)]
pub struct BackupManager {
    dir: PathBuf,
    force: bool,
    delete_on_success: bool,
    retry_limit: u32,
}

impl BackupManager {
    pub fn new(dir: impl Into<PathBuf>, force: bool, delete_on_success: bool, retry_limit: u32) -> Self {
        Self {
            dir: dir.into(),
            force,
            delete_on_success,
            retry_limit,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the backup directory if missing
    ///
    /// Safe to call from several workers at once.
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::from_io(format!("creating backup directory {}", self.dir.display()), e)
        })
    }

    /// Copy `original` into the backup directory
    pub fn create(&self, original: &Path) -> Result<BackupRecord> {
        self.ensure_dir()?;
        let (backup_path, target) = self.claim_backup_path(original)?;

        if let Err(e) = copy_verified(original, &backup_path, target) {
            // Remove the partial copy; nothing has been written yet
            let _ = fs::remove_file(&backup_path);
            return Err(e);
        }

        tracing::debug!(
            file = %original.display(),
            backup = %backup_path.display(),
            "Backup created"
        );

        Ok(BackupRecord {
            original: original.to_path_buf(),
            backup: backup_path,
            kept: true,
        })
    }

    /// Exclusively create the backup file, picking a numbered name on collision when forced
    fn claim_backup_path(&self, original: &Path) -> Result<(PathBuf, File)> {
        let file_name = original
            .file_name()
            .ok_or_else(|| Error::Backup(format!("no file name in {}", original.display())))?;
        let first = self.dir.join(file_name);

        match create_new(&first) {
            Ok(file) => return Ok((first, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if !self.force {
                    return Err(Error::Backup(format!(
                        "backup already exists: {} (use --force)",
                        first.display()
                    )));
                }
            }
            Err(e) => return Err(backup_io_error(&first, e)),
        }

        let stem = original
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = original
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        for n in 1..=self.retry_limit {
            let candidate = self.dir.join(format!("{}_{}{}", stem, n, ext));
            match create_new(&candidate) {
                Ok(file) => return Ok((candidate, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(backup_io_error(&candidate, e)),
            }
        }

        Err(Error::Backup(format!(
            "no free backup name for {} after {} attempts",
            original.display(),
            self.retry_limit
        )))
    }

    /// Copy the backup over the original
    pub fn restore(&self, record: &BackupRecord) -> Result<()> {
        fs::copy(&record.backup, &record.original).map_err(|e| {
            Error::from_io(
                format!(
                    "restoring {} from {}",
                    record.original.display(),
                    record.backup.display()
                ),
                e,
            )
        })?;
        tracing::info!(
            file = %record.original.display(),
            backup = %record.backup.display(),
            "Restored original from backup"
        );
        Ok(())
    }

    /// Keep or delete the backup once the file's outcome is known
    ///
    /// Returns true if the backup was removed.
    pub fn resolve(&self, record: &mut BackupRecord, success: bool) -> bool {
        if !success || !self.delete_on_success {
            record.kept = true;
            return false;
        }

        match fs::remove_file(&record.backup) {
            Ok(()) => {
                record.kept = false;
                tracing::debug!(backup = %record.backup.display(), "Backup removed");
                true
            }
            Err(e) => {
                record.kept = true;
                tracing::warn!(
                    backup = %record.backup.display(),
                    error = %e,
                    "Could not remove backup, keeping it"
                );
                false
            }
        }
    }
}

fn create_new(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

fn backup_io_error(path: &Path, err: io::Error) -> Error {
    if is_disk_full_io(&err) || err.kind() == io::ErrorKind::PermissionDenied {
        Error::from_io(format!("backup {}", path.display()), err)
    } else {
        Error::Backup(format!("{}: {}", path.display(), err))
    }
}

/// Stream `source` into `target`, then compare checksums
fn copy_verified(source: &Path, backup_path: &Path, mut target: File) -> Result<()> {
    let mut input = File::open(source).map_err(|e| backup_io_error(source, e))?;
    io::copy(&mut input, &mut target).map_err(|e| backup_io_error(backup_path, e))?;
    target.sync_all().map_err(|e| backup_io_error(backup_path, e))?;
    drop(target);

    let expected = sha256_file(source)?;
    let actual = sha256_file(backup_path)?;
    if expected != actual {
        return Err(Error::Backup(format!(
            "checksum mismatch for {} (expected {}, got {})",
            backup_path.display(),
            expected,
            actual
        )));
    }
    Ok(())
}

/// Hex SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|e| Error::from_io(format!("opening {} for hashing", path.display()), e))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024]; // 1MB chunks

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| Error::from_io(format!("hashing {}", path.display()), e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
