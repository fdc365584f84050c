//! Audio file scanner
//!
//! Collects the files a batch will process. A path naming a file is taken as
//! is; a directory is walked (one level, or fully with `recursive`), skipping
//! system files and symlink loops, and keeping files whose extension passes
//! the extension filter.

use crate::tag_store::extension_of;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// File scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Permission denied when accessing path
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
}

/// Audio file scanner
#[derive(Debug, Clone)]
pub struct FileScanner {
    ignore_patterns: Vec<String>,
    recursive: bool,
    extensions: Option<HashSet<String>>,
}

impl FileScanner {
    /// Create new file scanner with default ignore patterns
    ///
    /// Ignores system files like .DS_Store, Thumbs.db, .git, etc.
    pub fn new() -> Self {
        Self {
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
            ],
            recursive: false,
            extensions: None,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Keep only these extensions (case-insensitive, leading dot optional)
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: HashSet<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self.extensions = if set.is_empty() { None } else { Some(set) };
        self
    }

    /// Files under `root` accepted by `supports` and the extension filter
    ///
    /// Directory results are sorted by path.
    pub fn scan(
        &self,
        root: &Path,
        supports: impl Fn(&str) -> bool,
    ) -> Result<Vec<PathBuf>, ScanError> {
        let metadata = match std::fs::metadata(root) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(ScanError::PermissionDenied(root.to_path_buf()));
            }
            Err(_) => return Err(ScanError::PathNotFound(root.to_path_buf())),
        };

        if metadata.is_file() {
            return Ok(vec![root.to_path_buf()]);
        }

        let mut symlink_visited = HashSet::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .max_depth(if self.recursive { usize::MAX } else { 1 })
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e, &mut symlink_visited));

        let mut files = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.accepts(entry.path(), &supports) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                }
            }
        }

        tracing::debug!(root = %root.display(), files = files.len(), "Scan complete");
        Ok(files)
    }

    fn accepts(&self, path: &Path, supports: &impl Fn(&str) -> bool) -> bool {
        let ext = extension_of(path);
        let wanted = self
            .extensions
            .as_ref()
            .map_or(true, |set| set.contains(&ext));
        wanted && supports(&ext)
    }

    /// Check if entry should be processed
    fn should_process_entry(&self, entry: &DirEntry, symlink_visited: &mut HashSet<PathBuf>) -> bool {
        if entry.depth() == 0 {
            return true;
        }

        let file_name = entry.file_name().to_string_lossy();
        if self
            .ignore_patterns
            .iter()
            .any(|pattern| file_name.contains(pattern.as_str()))
        {
            return false;
        }

        // Detect symlink loops
        if entry.file_type().is_symlink() {
            if let Ok(canonical) = entry.path().canonicalize() {
                if !symlink_visited.insert(canonical) {
                    tracing::warn!("Symlink loop detected: {}", entry.path().display());
                    return false;
                }
            }
        }

        true
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn audio(ext: &str) -> bool {
        matches!(ext, "mp3" | "flac")
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        for name in ["b.mp3", "a.FLAC", "notes.txt", "sub/c.mp3", ".git/d.mp3"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        dir
    }

    #[test]
    fn test_top_level_only_by_default() {
        let dir = tree();
        let files = FileScanner::new().scan(dir.path(), audio).unwrap();
        assert_eq!(files, vec![dir.path().join("a.FLAC"), dir.path().join("b.mp3")]);
    }

    #[test]
    fn test_recursive_skips_ignored() {
        let dir = tree();
        let files = FileScanner::new().recursive(true).scan(dir.path(), audio).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.contains(&dir.path().join("sub").join("c.mp3")));
        assert!(!files.iter().any(|f| f.to_string_lossy().contains(".git")));
    }

    #[test]
    fn test_extension_filter() {
        let dir = tree();
        let files = FileScanner::new()
            .recursive(true)
            .with_extensions([".MP3"])
            .scan(dir.path(), audio)
            .unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_single_file_and_missing_path() {
        let dir = tree();
        let file = dir.path().join("notes.txt");
        assert_eq!(FileScanner::new().scan(&file, audio).unwrap(), vec![file]);
        assert!(matches!(
            FileScanner::new().scan(&dir.path().join("nope"), audio),
            Err(ScanError::PathNotFound(_))
        ));
    }
}
