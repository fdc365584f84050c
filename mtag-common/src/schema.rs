//! Schema view builder
//!
//! Turns the raw frames a TagStore reports for one file into a [`FieldMap`]
//! view, and turns a set of changed fields back into native writes.
//!
//! # Read algorithm (Canonical / Extended)
//! 1. Group frames by canonical field (alias table) or sanitized custom key
//! 2. Frame-level merge: frames whose stripped value sequences are equal
//!    collapse to the first one; distinct sequences are concatenated in
//!    first-seen order
//! 3. Split `n/total` track and disc values
//! 4. Value normalizer (cardinality, dedup, smart empty)
//!
//! `Raw` keeps native keys verbatim and only applies the whitespace and
//! frame-merge rules.

use crate::fields::{
    custom_read_key, custom_write_key, AliasTable, Cardinality, DedupPolicy, FieldRules,
};
use crate::values::{normalize_read, strip_values, FieldMap, FieldValues};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which view of a file's frames to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    /// Canonical fields only
    Canonical,
    /// Canonical plus sanitized custom fields
    #[default]
    Extended,
    /// Native keys unchanged
    Raw,
}

impl Schema {
    pub fn as_str(&self) -> &'static str {
        match self {
            Schema::Canonical => "canonical",
            Schema::Extended => "extended",
            Schema::Raw => "raw",
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Schema {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "canonical" => Ok(Schema::Canonical),
            "extended" => Ok(Schema::Extended),
            "raw" => Ok(Schema::Raw),
            other => Err(Error::InvalidInput(format!(
                "unknown schema '{}' (expected canonical, extended or raw)",
                other
            ))),
        }
    }
}

/// One raw tag unit as reported by a TagStore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub raw_key: String,
    pub values: Vec<String>,
}

impl Frame {
    pub fn new(raw_key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            raw_key: raw_key.into(),
            values,
        }
    }

    /// Single-valued convenience constructor
    pub fn text(raw_key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(raw_key, vec![value.into()])
    }
}

/// One native write: `values == None` deletes the native entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeWrite {
    pub raw_key: String,
    pub values: Option<Vec<String>>,
}

/// Frames sharing a group key, in first-seen order
struct FrameGroup {
    key: String,
    frames: Vec<FieldValues>,
}

impl FrameGroup {
    /// Add a frame unless an identical (stripped) sequence is already present
    fn merge(&mut self, values: &[String]) {
        let stripped = strip_values(values);
        if !self.frames.contains(&stripped) {
            self.frames.push(stripped);
        }
    }

    fn flatten(self) -> (String, FieldValues) {
        let values = self.frames.into_iter().flatten().collect();
        (self.key, values)
    }
}

/// Builds field-map views from frames and plans native writes
#[derive(Debug, Clone, Copy)]
pub struct SchemaViewBuilder<'a> {
    aliases: &'a AliasTable,
}

impl<'a> SchemaViewBuilder<'a> {
    pub fn new(aliases: &'a AliasTable) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &'a AliasTable {
        self.aliases
    }

    /// Field-map key a raw frame key lands on under `schema`
    ///
    /// `None` when the schema excludes the frame (custom keys under `Canonical`).
    pub fn group_key(&self, raw_key: &str, schema: Schema) -> Option<String> {
        match schema {
            Schema::Raw => Some(raw_key.to_string()),
            Schema::Canonical => self.aliases.resolve(raw_key).map(|f| f.name.to_string()),
            Schema::Extended => Some(self.aliases.field_key(raw_key)),
        }
    }

    /// Build the view of `frames` selected by `schema`
    pub fn build(&self, frames: &[Frame], schema: Schema) -> FieldMap {
        let mut groups: Vec<FrameGroup> = Vec::new();

        for frame in frames {
            let Some(key) = self.group_key(&frame.raw_key, schema) else {
                continue;
            };
            match groups.iter_mut().find(|g| g.key == key) {
                Some(group) => group.merge(&frame.values),
                None => {
                    let mut group = FrameGroup {
                        key,
                        frames: Vec::new(),
                    };
                    group.merge(&frame.values);
                    groups.push(group);
                }
            }
        }

        let mut merged: Vec<(String, FieldValues)> =
            groups.into_iter().map(FrameGroup::flatten).collect();

        if schema != Schema::Raw {
            for (number, total) in NUMBER_PAIRS {
                split_number_pair(&mut merged, number, total);
            }
        }

        merged
            .into_iter()
            .map(|(key, values)| {
                let rules = match schema {
                    Schema::Raw => FieldRules {
                        cardinality: Cardinality::Multi,
                        dedup: DedupPolicy::None,
                    },
                    _ => self.aliases.rules_for(&key),
                };
                let values = normalize_read(rules, &values);
                (key, values)
            })
            .collect()
    }

    /// Native writes that store `changes` into a file currently holding `existing`
    ///
    /// Each changed field is written exactly once under a single raw key: the
    /// canonical name for canonical fields, the write-sanitized key for custom
    /// fields, the key itself under `Raw`. Other frames that fold onto the same
    /// field (aliases, differently-cased custom keys) are deleted first so the
    /// field never survives under an alias.
    ///
    /// Rewriting `track` (or `disc`) also rewrites its total from `planned`,
    /// since deleting a `3/12` style frame would otherwise drop the total.
    /// All deletes come before the first value write.
    pub fn plan_writes(
        &self,
        existing: &[Frame],
        planned: &FieldMap,
        changed: &FieldMap,
        schema: Schema,
    ) -> Vec<NativeWrite> {
        let mut to_write = changed.clone();
        if schema != Schema::Raw {
            for (number, total) in NUMBER_PAIRS {
                if changed.contains_key(number) && !changed.contains_key(total) {
                    if let Some(values) = planned.get(total).filter(|v| !v.is_empty()) {
                        to_write.insert(total.to_string(), values.clone());
                    }
                }
            }
        }

        let mut deletes: Vec<NativeWrite> = Vec::new();
        let mut writes = Vec::new();

        for (key, values) in &to_write {
            let target = match schema {
                Schema::Raw => key.clone(),
                _ => match self.aliases.resolve(key) {
                    Some(field) => field.name.to_string(),
                    None => custom_write_key(key),
                },
            };

            for frame in existing {
                let raw = frame.raw_key.as_str();
                if raw == target || deletes.iter().any(|d| d.raw_key == raw) {
                    continue;
                }
                if self.folds_onto(raw, key, schema) {
                    deletes.push(NativeWrite {
                        raw_key: raw.to_string(),
                        values: None,
                    });
                }
            }

            writes.push(NativeWrite {
                raw_key: target,
                values: if values.is_empty() {
                    None
                } else {
                    Some(values.clone())
                },
            });
        }

        // Every alias delete precedes every value write
        deletes.extend(writes);
        deletes
    }

    /// True when the raw key `raw` belongs to field-map key `key`
    fn folds_onto(&self, raw: &str, key: &str, schema: Schema) -> bool {
        match schema {
            Schema::Raw => false,
            _ => match (self.aliases.resolve(raw), self.aliases.resolve(key)) {
                (Some(a), Some(b)) => a.name == b.name,
                (None, None) => custom_read_key(raw) == custom_read_key(key),
                _ => false,
            },
        }
    }
}

/// Counter fields that may carry their total as `n/total`
const NUMBER_PAIRS: [(&str, &str); 2] = [("track", "totaltracks"), ("disc", "totaldiscs")];

/// Split `"3/12"` into `number=["3"]` and, when `total` is absent, `total=["12"]`
fn split_number_pair(merged: &mut Vec<(String, FieldValues)>, number: &str, total: &str) {
    let Some(pos) = merged.iter().position(|(k, _)| k == number) else {
        return;
    };
    let Some(first) = merged[pos].1.first().cloned() else {
        return;
    };
    let Some((n, t)) = first.split_once('/') else {
        return;
    };

    let (n, t) = (n.trim().to_string(), t.trim().to_string());
    merged[pos].1[0] = n;

    let has_total = merged.iter().any(|(k, _)| k == total);
    if !has_total && !t.is_empty() {
        merged.push((total.to_string(), vec![t]));
    }
}
