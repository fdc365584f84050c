//! Canonical fields, alias table and key sanitizer
//!
//! Containers name the same concept differently (`TPE1` in ID3, `ARTIST` in a
//! Vorbis comment, `aART` in MP4). The [`AliasTable`] folds every known raw key
//! onto one [`CanonicalField`]; keys it does not know are custom keys and go
//! through [`custom_read_key`] / [`custom_write_key`] instead.
//!
//! The table is built once, never mutated, and handed to every component by
//! reference.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// How many values a field may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cardinality {
    Single,
    Multi,
}

/// Deduplication applied to multi-valued fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DedupPolicy {
    /// Drop later entries equal to an earlier one ignoring case
    CaseInsensitiveOrdered,
    /// Keep every entry (reserved for `comment`)
    None,
}

/// Cardinality and dedup rules for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRules {
    pub cardinality: Cardinality,
    pub dedup: DedupPolicy,
}

impl FieldRules {
    /// Rules for custom fields and raw keys
    pub const CUSTOM: FieldRules = FieldRules {
        cardinality: Cardinality::Multi,
        dedup: DedupPolicy::CaseInsensitiveOrdered,
    };

    pub fn is_single(&self) -> bool {
        self.cardinality == Cardinality::Single
    }
}

/// Immutable descriptor of a cross-format field
#[derive(Debug, PartialEq, Eq)]
pub struct CanonicalField {
    /// Lowercase slug, also the key used in field maps
    pub name: &'static str,
    pub cardinality: Cardinality,
    pub dedup: DedupPolicy,
    /// Recognized raw keys (lowercase, includes `name`)
    pub aliases: &'static [&'static str],
}

impl CanonicalField {
    pub fn rules(&self) -> FieldRules {
        FieldRules {
            cardinality: self.cardinality,
            dedup: self.dedup,
        }
    }

    /// Track/disc counters, compared numerically on verification
    pub fn is_numeric(&self) -> bool {
        matches!(self.name, "track" | "totaltracks" | "disc" | "totaldiscs")
    }
}

const fn single(name: &'static str, aliases: &'static [&'static str]) -> CanonicalField {
    CanonicalField {
        name,
        cardinality: Cardinality::Single,
        dedup: DedupPolicy::CaseInsensitiveOrdered,
        aliases,
    }
}

const fn multi(name: &'static str, aliases: &'static [&'static str]) -> CanonicalField {
    CanonicalField {
        name,
        cardinality: Cardinality::Multi,
        dedup: DedupPolicy::CaseInsensitiveOrdered,
        aliases,
    }
}

/// Every canonical field, in display order
pub static CANONICAL_FIELDS: [CanonicalField; 13] = [
    single("title", &["title", "tit2"]),
    multi("artist", &["artist", "tpe1"]),
    single("album", &["album", "talb"]),
    multi("albumartist", &["albumartist", "album_artist", "tpe2", "aart"]),
    multi("genre", &["genre", "tcon"]),
    CanonicalField {
        name: "comment",
        cardinality: Cardinality::Multi,
        dedup: DedupPolicy::None,
        aliases: &["comment", "comm"],
    },
    multi("composer", &["composer", "tcom"]),
    multi("performer", &["performer", "performers", "perf", "tpe3"]),
    single("date", &["date", "year", "originaldate", "tdrc", "tory", "tdat"]),
    single("track", &["track", "tracknumber", "trck"]),
    single("totaltracks", &["totaltracks", "tracktotal"]),
    single("disc", &["disc", "discnumber", "tpos"]),
    single("totaldiscs", &["totaldiscs", "disctotal"]),
];

static STANDARD: Lazy<AliasTable> = Lazy::new(|| AliasTable::new(&CANONICAL_FIELDS));

/// Bidirectional, case-insensitive mapping between canonical fields and raw keys
#[derive(Debug)]
pub struct AliasTable {
    fields: &'static [CanonicalField],
    by_alias: HashMap<&'static str, &'static CanonicalField>,
}

impl AliasTable {
    /// Build a table over a static field list
    pub fn new(fields: &'static [CanonicalField]) -> Self {
        let mut by_alias = HashMap::new();
        for field in fields {
            by_alias.insert(field.name, field);
            for alias in field.aliases {
                by_alias.insert(*alias, field);
            }
        }
        Self { fields, by_alias }
    }

    /// The process-wide table over [`CANONICAL_FIELDS`]
    pub fn standard() -> &'static AliasTable {
        &STANDARD
    }

    /// Resolve a raw key to its canonical field
    ///
    /// Case-insensitive; spaces and hyphens are accepted in place of `_`
    /// (`Album Artist` and `album-artist` both resolve to `albumartist`).
    pub fn resolve(&self, raw_key: &str) -> Option<&'static CanonicalField> {
        let key = raw_key.trim().to_lowercase();
        if let Some(field) = self.by_alias.get(key.as_str()).copied() {
            return Some(field);
        }
        let underscored: String = key
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        self.by_alias.get(underscored.as_str()).copied()
    }

    /// Look up a canonical field by its exact name
    pub fn field(&self, name: &str) -> Option<&'static CanonicalField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Canonical fields in display order
    pub fn fields(&self) -> impl Iterator<Item = &'static CanonicalField> {
        self.fields.iter()
    }

    /// Raw keys recognized for a canonical field
    pub fn aliases_of(&self, name: &str) -> &'static [&'static str] {
        self.field(name).map(|f| f.aliases).unwrap_or(&[])
    }

    /// Rules for a key already in field-map form (canonical name or sanitized custom key)
    pub fn rules_for(&self, key: &str) -> FieldRules {
        self.field(key)
            .map(CanonicalField::rules)
            .unwrap_or(FieldRules::CUSTOM)
    }

    /// Map a user- or file-supplied key to its field-map key
    ///
    /// Canonical fields come back under their canonical name, everything else
    /// through the read sanitizer.
    pub fn field_key(&self, raw_key: &str) -> String {
        match self.resolve(raw_key) {
            Some(field) => field.name.to_string(),
            None => custom_read_key(raw_key),
        }
    }
}

/// Read-side custom key: lowercase, every non-`[a-z0-9_]` char becomes `_`
pub fn custom_read_key(raw_key: &str) -> String {
    raw_key
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Write-side custom key: uppercase, every non-`[A-Z0-9_]` char becomes `_`
pub fn custom_write_key(key: &str) -> String {
    key.chars()
        .flat_map(char::to_uppercase)
        .map(|c| {
            if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
