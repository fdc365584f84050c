//! Field values and the value normalizer
//!
//! A [`FieldMap`] maps a field key to its ordered values. Presence of a key
//! means the field exists; an empty list is a request to delete it; the
//! one-element list `[""]` is the "smart empty" sentinel for a field that
//! exists but is blank.

use crate::fields::{DedupPolicy, FieldRules};
use std::collections::{BTreeMap, HashSet};

/// Ordered values of one field
pub type FieldValues = Vec<String>;

/// Field key -> ordered values
pub type FieldMap = BTreeMap<String, FieldValues>;

/// The smart-empty sentinel `[""]`
pub fn smart_empty() -> FieldValues {
    vec![String::new()]
}

/// True for `[""]`
pub fn is_smart_empty(values: &[String]) -> bool {
    values.len() == 1 && values[0].is_empty()
}

/// Split `s` on `delimiter`, trimming items and dropping empty ones
pub fn parse_list(s: &str, delimiter: &str) -> FieldValues {
    if delimiter.is_empty() {
        let item = s.trim();
        return if item.is_empty() {
            Vec::new()
        } else {
            vec![item.to_string()]
        };
    }
    s.split(delimiter)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Trim every value and drop the ones left empty
pub fn strip_values<S: AsRef<str>>(values: &[S]) -> FieldValues {
    values
        .iter()
        .map(|v| v.as_ref().trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Remove later duplicates, comparing trimmed values ignoring case
pub fn unique_case_insensitive(values: FieldValues) -> FieldValues {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.trim().to_lowercase()))
        .collect()
}

/// Case-insensitive membership test
pub fn contains_case_insensitive(values: &[String], needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    values.iter().any(|v| v.trim().to_lowercase() == needle)
}

/// Apply cardinality, dedup and whitespace rules to a field's values
///
/// An empty input stays empty (deletion intent). A non-empty input whose
/// values are all blank collapses to the smart-empty sentinel.
pub fn normalize(rules: FieldRules, values: &[String]) -> FieldValues {
    if values.is_empty() {
        return Vec::new();
    }

    let mut cleaned = strip_values(values);
    if cleaned.is_empty() {
        return smart_empty();
    }

    if rules.is_single() {
        cleaned.truncate(1);
        return cleaned;
    }

    match rules.dedup {
        DedupPolicy::CaseInsensitiveOrdered => unique_case_insensitive(cleaned),
        DedupPolicy::None => cleaned,
    }
}

/// Read-side normalization: a field that exists is never reported empty
pub fn normalize_read(rules: FieldRules, values: &[String]) -> FieldValues {
    let out = normalize(rules, values);
    if out.is_empty() {
        smart_empty()
    } else {
        out
    }
}

/// Values an operation works on: blanks (including the sentinel) removed
pub fn effective_values(values: &[String]) -> FieldValues {
    strip_values(values)
}
