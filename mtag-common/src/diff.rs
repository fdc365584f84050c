//! Diff computer

use crate::values::FieldMap;

/// Fields of `planned` whose values differ from `original`, with their planned values
///
/// A field planned as `[]` (delete) is a change only if `original` has it.
/// Fields absent from `planned` are untouched, never deletions.
pub fn diff(original: &FieldMap, planned: &FieldMap) -> FieldMap {
    planned
        .iter()
        .filter(|(key, values)| match original.get(*key) {
            Some(old) => old != *values,
            None => !values.is_empty(),
        })
        .map(|(key, values)| (key.clone(), values.clone()))
        .collect()
}

/// `(old, new)` pairs for every changed field; `old` is `[]` when the field was absent
pub fn changes_with_originals<'a>(
    original: &'a FieldMap,
    changed: &'a FieldMap,
) -> impl Iterator<Item = (&'a str, &'a [String], &'a [String])> {
    changed.iter().map(move |(key, new)| {
        let old = original.get(key).map(Vec::as_slice).unwrap_or(&[]);
        (key.as_str(), old, new.as_slice())
    })
}
