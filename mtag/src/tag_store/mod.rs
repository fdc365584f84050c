//! TagStore capability
//!
//! A TagStore is one open file's native tag structure seen as an ordered list
//! of [`Frame`]s. Everything format-specific lives behind this trait; the
//! pipeline only reads frames, applies [`NativeWrite`]s and saves.
//!
//! Handles are scoped: a store holds whatever it needs for one file and
//! releases it on drop, so every pipeline exit path (success, skip, error)
//! closes the file.

mod id3v2_store;
pub mod lofty_store;
pub mod memory;

pub use lofty_store::LoftyProvider;
pub use memory::MemoryProvider;

use mtag_common::{Frame, NativeWrite, Result};
use std::path::Path;

/// One open file's native tags
pub trait TagStore: Send {
    /// Raw frames in file order
    fn read_native(&mut self) -> Result<Vec<Frame>>;

    /// Replace (`Some`) or remove (`None`) every entry stored under `raw_key`
    ///
    /// Takes effect in memory; [`TagStore::save`] persists it.
    fn write_native(&mut self, raw_key: &str, values: Option<&[String]>) -> Result<()>;

    /// Persist pending writes to the file
    fn save(&mut self) -> Result<()>;
}

/// Opens TagStores for the formats it understands
pub trait TagStoreProvider: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn TagStore>>;

    /// True when files with this (lowercase, dotless) extension can be opened
    fn supports(&self, ext: &str) -> bool;
}

/// Apply planned writes in order
pub fn apply_writes(store: &mut dyn TagStore, writes: &[NativeWrite]) -> Result<()> {
    for write in writes {
        tracing::trace!(
            key = %write.raw_key,
            delete = write.values.is_none(),
            "Native write"
        );
        store.write_native(&write.raw_key, write.values.as_deref())?;
    }
    Ok(())
}

/// Lowercase extension of `path`, empty when it has none
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
