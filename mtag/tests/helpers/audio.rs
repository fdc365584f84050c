//! Real audio fixtures for the lofty-backed store

use mtag::{LoftyProvider, TagStore, TagStoreProvider};
use mtag_common::{AliasTable, FieldMap, Frame, Schema, SchemaViewBuilder};
use std::path::{Path, PathBuf};

/// Write a tagless mono 16-bit PCM WAV with four silent samples
pub fn write_wav(dir: &Path, name: &str) -> PathBuf {
    let samples = [0u8; 8];
    let mut bytes = Vec::with_capacity(44 + samples.len());
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + samples.len() as u32).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // channels
    bytes.extend_from_slice(&8000u32.to_le_bytes()); // sample rate
    bytes.extend_from_slice(&16000u32.to_le_bytes()); // byte rate
    bytes.extend_from_slice(&2u16.to_le_bytes()); // block align
    bytes.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&(samples.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&samples);

    let path = dir.join(format!("{}.wav", name));
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Raw frames as the lofty store reads them
pub fn read_frames(path: &Path) -> Vec<Frame> {
    LoftyProvider::new()
        .open(path)
        .unwrap()
        .read_native()
        .unwrap()
}

/// View of an audio file as currently stored
pub fn audio_view(path: &Path, schema: Schema) -> FieldMap {
    SchemaViewBuilder::new(AliasTable::standard()).build(&read_frames(path), schema)
}
