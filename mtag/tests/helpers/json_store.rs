//! TagStore over `.json` files holding a frame list
//!
//! Writes really change the file bytes, so backups, restores and dry runs can
//! be checked byte for byte. A [`Fault`] makes `save` misbehave.

use mtag::tag_store::{TagStore, TagStoreProvider};
use mtag_common::{Error, Frame, Result};
use std::io;
use std::path::{Path, PathBuf};

/// How `save` misbehaves
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// Scribble over the file, then fail
    FailSave,
    /// Fail with ENOSPC before touching the file
    DiskFull,
    /// Save normally but lose every frame stored under this key
    DropOnSave(String),
}

#[derive(Debug, Clone, Default)]
pub struct JsonProvider {
    fault: Option<Fault>,
}

impl JsonProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(fault: Fault) -> Self {
        Self { fault: Some(fault) }
    }
}

impl TagStoreProvider for JsonProvider {
    fn open(&self, path: &Path) -> Result<Box<dyn TagStore>> {
        let bytes = std::fs::read(path).map_err(|e| Error::from_io(path.display(), e))?;
        let frames: Vec<Frame> = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Format(format!("{}: {}", path.display(), e)))?;
        Ok(Box::new(JsonStore {
            path: path.to_path_buf(),
            frames,
            fault: self.fault.clone(),
        }))
    }

    fn supports(&self, ext: &str) -> bool {
        ext == "json"
    }
}

struct JsonStore {
    path: PathBuf,
    frames: Vec<Frame>,
    fault: Option<Fault>,
}

impl TagStore for JsonStore {
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
        let mut frames = self.frames.clone();
        match &self.fault {
            Some(Fault::FailSave) => {
                std::fs::write(&self.path, b"{ truncated")?;
                return Err(Error::Write("simulated write failure".into()));
            }
            Some(Fault::DiskFull) => {
                return Err(Error::from_io(
                    self.path.display(),
                    io::Error::from_raw_os_error(28),
                ));
            }
            Some(Fault::DropOnSave(key)) => frames.retain(|f| !f.raw_key.eq_ignore_ascii_case(key)),
            None => {}
        }
        let json = serde_json::to_vec_pretty(&frames)
            .map_err(|e| Error::Write(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| Error::from_io(self.path.display(), e))
    }
}
