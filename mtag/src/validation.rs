//! Per-file validation
//!
//! Runs before any TagStore is opened. A failure here is recorded in the
//! file's result; it never aborts the batch.

use crate::tag_store::{extension_of, TagStoreProvider};
use mtag_common::{Error, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;

/// File checks applied before reading tags
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    max_file_size: u64,
    require_writable: bool,
}

impl Validator {
    pub fn new(max_file_size: u64, require_writable: bool) -> Self {
        Self {
            max_file_size,
            require_writable,
        }
    }

    /// Check existence, type, size, extension and access
    ///
    /// Returns the file size.
    pub fn validate(&self, path: &Path, provider: &dyn TagStoreProvider) -> Result<u64> {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::Validation(format!("file not found: {}", path.display())));
            }
            Err(e) => return Err(Error::from_io(path.display(), e)),
        };

        if !metadata.is_file() {
            return Err(Error::Validation(format!("not a regular file: {}", path.display())));
        }

        let size = metadata.len();
        if size == 0 {
            return Err(Error::Validation(format!("empty file: {}", path.display())));
        }
        if size > self.max_file_size {
            return Err(Error::Validation(format!(
                "file too large: {} ({} bytes, limit {})",
                path.display(),
                size,
                self.max_file_size
            )));
        }

        let ext = extension_of(path);
        if !provider.supports(&ext) {
            return Err(Error::Validation(format!(
                "unsupported file type '{}': {}",
                ext,
                path.display()
            )));
        }

        File::open(path).map_err(|e| Error::from_io(format!("reading {}", path.display()), e))?;

        if self.require_writable && metadata.permissions().readonly() {
            return Err(Error::Permission(format!("file is read-only: {}", path.display())));
        }

        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag_store::MemoryProvider;
    use mtag_common::ErrorKind;

    fn provider() -> MemoryProvider {
        MemoryProvider::new(&["mp3"])
    }

    #[test]
    fn test_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        fs::write(&path, b"ID3").unwrap();
        assert_eq!(Validator::new(1024, true).validate(&path, &provider()).unwrap(), 3);
    }

    #[test]
    fn test_missing_empty_and_oversized() {
        let dir = tempfile::tempdir().unwrap();
        let validator = Validator::new(4, true);

        let missing = dir.path().join("missing.mp3");
        assert!(matches!(
            validator.validate(&missing, &provider()),
            Err(Error::Validation(_))
        ));

        let empty = dir.path().join("empty.mp3");
        fs::write(&empty, b"").unwrap();
        assert!(validator.validate(&empty, &provider()).is_err());

        let big = dir.path().join("big.mp3");
        fs::write(&big, b"0123456789").unwrap();
        assert!(validator.validate(&big, &provider()).is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"hello").unwrap();
        let err = Validator::new(1024, true).validate(&path, &provider()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_read_only_rejected_only_when_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.mp3");
        fs::write(&path, b"ID3").unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms).unwrap();

        let err = Validator::new(1024, true).validate(&path, &provider()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert!(Validator::new(1024, false).validate(&path, &provider()).is_ok());
    }
}
