//! In-memory TagStore
//!
//! Frames live in a shared map keyed by path; the file itself is never
//! touched. Useful for exercising the pipeline against real (placeholder)
//! files without an audio container.

use super::{TagStore, TagStoreProvider};
use mtag_common::{Error, Frame, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

type Library = Arc<Mutex<HashMap<PathBuf, Vec<Frame>>>>;

/// Provider over a shared path -> frames map
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    library: Library,
    extensions: Vec<String>,
}

impl MemoryProvider {
    /// Provider accepting the given extensions
    pub fn new(extensions: &[&str]) -> Self {
        Self {
            library: Library::default(),
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    /// Seed the frames reported for `path`
    pub fn insert(&self, path: impl Into<PathBuf>, frames: Vec<Frame>) {
        if let Ok(mut library) = self.library.lock() {
            library.insert(path.into(), frames);
        }
    }

    /// Current frames of `path`
    pub fn frames(&self, path: &Path) -> Option<Vec<Frame>> {
        self.library.lock().ok()?.get(path).cloned()
    }
}

impl TagStoreProvider for MemoryProvider {
    fn open(&self, path: &Path) -> Result<Box<dyn TagStore>> {
        let frames = self
            .frames(path)
            .ok_or_else(|| Error::Format(format!("no tags for {}", path.display())))?;
        Ok(Box::new(MemoryStore {
            path: path.to_path_buf(),
            frames,
            library: Arc::clone(&self.library),
        }))
    }

    fn supports(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }
}

struct MemoryStore {
    path: PathBuf,
    frames: Vec<Frame>,
    library: Library,
}

impl TagStore for MemoryStore {
    fn read_native(&mut self) -> Result<Vec<Frame>> {
        Ok(self.frames.clone())
    }

    fn write_native(&mut self, raw_key: &str, values: Option<&[String]>) -> Result<()> {
        self.frames.retain(|f| f.raw_key != raw_key);
        if let Some(values) = values {
            self.frames.push(Frame::new(raw_key, values.to_vec()));
        }
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        let mut library = self
            .library
            .lock()
            .map_err(|_| Error::Write("tag library lock poisoned".to_string()))?;
        library.insert(self.path.clone(), self.frames.clone());
        Ok(())
    }
}
