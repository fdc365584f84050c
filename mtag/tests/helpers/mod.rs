//! Test Helper Utilities
//!
//! Shared utilities for mtag integration tests

#![allow(dead_code)]

pub mod audio;
pub mod json_store;
pub mod library;

// Re-export commonly used items
pub use audio::{audio_view, read_frames, write_wav};
pub use json_store::{Fault, JsonProvider};
pub use library::{read_track, v, view, write_track};
