//! Test library generation

use mtag_common::{AliasTable, FieldMap, Frame, Schema, SchemaViewBuilder};
use std::path::{Path, PathBuf};

pub fn v(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Write a `.json` track holding `frames`
pub fn write_track(dir: &Path, name: &str, frames: &[Frame]) -> PathBuf {
    let path = dir.join(format!("{}.json", name));
    std::fs::write(&path, serde_json::to_vec_pretty(frames).unwrap()).unwrap();
    path
}

pub fn read_track(path: &Path) -> Vec<Frame> {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

/// View of a track as currently stored
pub fn view(path: &Path, schema: Schema) -> FieldMap {
    SchemaViewBuilder::new(AliasTable::standard()).build(&read_track(path), schema)
}
