//! # mtag Common Library
//!
//! Format-independent core of the mtag tag editor:
//! - Canonical fields, alias table and key sanitizer
//! - Value normalization (cardinality, dedup, smart empty)
//! - Schema views over raw tag frames and native write planning
//! - Operation, filter and diff engines
//! - Error types and configuration loading
//!
//! Nothing here touches audio files; the `mtag` crate supplies the TagStore,
//! the per-file pipeline and the batch scheduler.

pub mod config;
pub mod diff;
pub mod error;
pub mod fields;
pub mod filter;
pub mod operations;
pub mod pattern;
pub mod schema;
pub mod values;

pub use config::{EditorConfig, LoggingConfig};
pub use diff::diff;
pub use error::{Error, ErrorKind, Result};
pub use fields::{AliasTable, CanonicalField, Cardinality, DedupPolicy, FieldRules};
pub use filter::{Filter, FilterSet};
pub use operations::{compute_planned, Operation, OperationKind};
pub use pattern::Pattern;
pub use schema::{Frame, NativeWrite, Schema, SchemaViewBuilder};
pub use values::{FieldMap, FieldValues};
