//! Common error types for mtag
//!
//! Every failure the engine can report is a variant of [`Error`]. Each variant
//! belongs to one [`ErrorKind`], which is what the batch layer and the CLI use
//! to classify outcomes (per-file result vs. fatal usage error, exit codes).

use std::io;
use thiserror::Error;

/// Common result type for mtag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Classification shared by every [`Error`] variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad arguments, unreadable or unsupported file
    Validation,
    /// The tag container could not be parsed
    Format,
    /// Filesystem access denied
    Permission,
    /// Post-write readback did not match the planned values
    Verification,
    /// Backup could not be created
    Backup,
    /// Tag write failed
    Write,
    /// Configuration loading or validation error
    Config,
    /// Plain I/O failure
    Io,
}

/// Common error type across mtag crates
#[derive(Error, Debug)]
pub enum Error {
    /// File or argument failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Container unreadable by the TagStore
    #[error("Format error: {0}")]
    Format(String),

    /// Filesystem permission denied
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Readback mismatch after a successful write
    #[error("Verification failed: {0}")]
    Verification(String),

    /// Backup creation failed
    #[error("Backup failed: {0}")]
    Backup(String),

    /// Writing tags failed
    #[error("Write failed: {0}")]
    Write(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input (patterns, filter expressions, field names)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::InvalidInput(_) => ErrorKind::Validation,
            Error::Format(_) => ErrorKind::Format,
            Error::Permission(_) => ErrorKind::Permission,
            Error::Verification(_) => ErrorKind::Verification,
            Error::Backup(_) => ErrorKind::Backup,
            Error::Write(_) => ErrorKind::Write,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(e) if e.kind() == io::ErrorKind::PermissionDenied => ErrorKind::Permission,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Wrap an I/O error with context, promoting `PermissionDenied` to [`Error::Permission`]
    pub fn from_io(context: impl std::fmt::Display, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            Error::Permission(format!("{}: {}", context, err))
        } else if is_disk_full_io(&err) {
            // Rewrapping would drop the OS error code
            Error::Io(err)
        } else {
            Error::Io(io::Error::new(err.kind(), format!("{}: {}", context, err)))
        }
    }

    /// True when the underlying cause is a full disk (ENOSPC)
    pub fn is_disk_full(&self) -> bool {
        match self {
            Error::Io(e) => is_disk_full_io(e),
            _ => false,
        }
    }
}

/// True when an I/O error reports a full disk
pub fn is_disk_full_io(err: &io::Error) -> bool {
    // ENOSPC is 28 on Linux and macOS, ERROR_DISK_FULL is 112 on Windows
    #[cfg(unix)]
    const DISK_FULL: i32 = 28;
    #[cfg(windows)]
    const DISK_FULL: i32 = 112;
    #[cfg(not(any(unix, windows)))]
    const DISK_FULL: i32 = -1;

    err.raw_os_error() == Some(DISK_FULL)
}
