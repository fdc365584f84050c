//! Operation engine
//!
//! A closed set of pure value transforms. Every [`Operation`] names its target
//! field and carries its parameters as data; [`Operation::apply`] is the single
//! dispatch point. Nothing here touches a TagStore.

use crate::fields::{AliasTable, FieldRules};
use crate::pattern::Pattern;
use crate::schema::Schema;
use crate::values::{
    contains_case_insensitive, effective_values, normalize, parse_list, smart_empty, FieldMap,
    FieldValues,
};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Default item delimiter for value parsing
pub const DEFAULT_DELIMITER: &str = ";";

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

/// Operation kinds and their parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OperationKind {
    /// Replace all values with an exact list (no parsing)
    Set { values: Vec<String> },
    /// Replace all values with the parsed list
    Write {
        value: String,
        #[serde(default = "default_delimiter")]
        delimiter: String,
    },
    /// Single: concatenate onto the value. Multi: add parsed items not present
    Append {
        value: String,
        #[serde(default = "default_delimiter")]
        delimiter: String,
    },
    /// Prepend to the single value or to every value
    Prefix { value: String },
    /// Substitute in every value, re-splitting results on the delimiter
    FindReplace {
        find: Pattern,
        replace: String,
        #[serde(default = "default_delimiter")]
        delimiter: String,
    },
    /// Add parsed items not already present (case-insensitive)
    Enlist {
        value: String,
        #[serde(default = "default_delimiter")]
        delimiter: String,
    },
    /// Remove parsed items (case-insensitive)
    Delist {
        value: String,
        #[serde(default = "default_delimiter")]
        delimiter: String,
    },
    /// Keep the field, blank
    Clear,
    /// Remove the field
    Delete,
}

/// A pure transform bound to its target field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub field: String,
    #[serde(flatten)]
    pub kind: OperationKind,
}

impl Operation {
    pub fn new(field: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }

    pub fn write(field: &str, value: &str, delimiter: &str) -> Self {
        Self::new(
            field,
            OperationKind::Write {
                value: value.to_string(),
                delimiter: delimiter.to_string(),
            },
        )
    }

    /// Replace the field with `values` as given
    pub fn set(field: &str, values: Vec<String>) -> Self {
        Self::new(field, OperationKind::Set { values })
    }

    pub fn append(field: &str, value: &str, delimiter: &str) -> Self {
        Self::new(
            field,
            OperationKind::Append {
                value: value.to_string(),
                delimiter: delimiter.to_string(),
            },
        )
    }

    pub fn prefix(field: &str, value: &str) -> Self {
        Self::new(
            field,
            OperationKind::Prefix {
                value: value.to_string(),
            },
        )
    }

    /// Fails if `regex` is set and `find` does not compile
    pub fn find_replace(
        field: &str,
        find: &str,
        replace: &str,
        regex: bool,
        delimiter: &str,
    ) -> Result<Self> {
        Ok(Self::new(
            field,
            OperationKind::FindReplace {
                find: Pattern::new(find, regex)?,
                replace: replace.to_string(),
                delimiter: delimiter.to_string(),
            },
        ))
    }

    pub fn enlist(field: &str, value: &str, delimiter: &str) -> Self {
        Self::new(
            field,
            OperationKind::Enlist {
                value: value.to_string(),
                delimiter: delimiter.to_string(),
            },
        )
    }

    pub fn delist(field: &str, value: &str, delimiter: &str) -> Self {
        Self::new(
            field,
            OperationKind::Delist {
                value: value.to_string(),
                delimiter: delimiter.to_string(),
            },
        )
    }

    pub fn clear(field: &str) -> Self {
        Self::new(field, OperationKind::Clear)
    }

    pub fn delete(field: &str) -> Self {
        Self::new(field, OperationKind::Delete)
    }

    /// Transform `values` for a field governed by `rules`
    ///
    /// The smart-empty sentinel counts as no values. The result is not yet
    /// normalized; [`compute_planned`] does that.
    pub fn apply(&self, values: &[String], rules: FieldRules) -> FieldValues {
        let current = effective_values(values);

        match &self.kind {
            OperationKind::Set { values } => values.clone(),

            OperationKind::Write { value, delimiter } => parse_list(value, delimiter),

            OperationKind::Append { value, delimiter } => {
                if rules.is_single() {
                    match current.first() {
                        Some(existing) => vec![format!("{}{}", existing, value)],
                        None => vec![value.clone()],
                    }
                } else {
                    add_missing(current, parse_list(value, delimiter))
                }
            }

            OperationKind::Prefix { value } => {
                if current.is_empty() {
                    vec![value.clone()]
                } else if rules.is_single() {
                    vec![format!("{}{}", value, current[0])]
                } else {
                    current.iter().map(|v| format!("{}{}", value, v)).collect()
                }
            }

            OperationKind::FindReplace {
                find,
                replace,
                delimiter,
            } => {
                let mut out = Vec::with_capacity(current.len());
                for v in &current {
                    let replaced = find.replace_all(v, replace).into_owned();
                    if !rules.is_single() && !delimiter.is_empty() && replaced.contains(delimiter.as_str()) {
                        out.extend(parse_list(&replaced, delimiter));
                    } else {
                        out.push(replaced);
                    }
                }
                out
            }

            OperationKind::Enlist { value, delimiter } => {
                add_missing(current, parse_list(value, delimiter))
            }

            OperationKind::Delist { value, delimiter } => {
                let remove = parse_list(value, delimiter);
                current
                    .into_iter()
                    .filter(|v| !contains_case_insensitive(&remove, v))
                    .collect()
            }

            OperationKind::Clear => smart_empty(),

            OperationKind::Delete => Vec::new(),
        }
    }
}

/// One [`Operation::set`] per entry, in key order
///
/// Keys may be canonical fields, aliases or custom keys.
pub fn set_fields(fields: &FieldMap) -> Vec<Operation> {
    fields
        .iter()
        .map(|(field, values)| Operation::set(field, values.clone()))
        .collect()
}

/// Append each item of `items` not already in `values` (case-insensitive)
fn add_missing(mut values: FieldValues, items: FieldValues) -> FieldValues {
    for item in items {
        if !contains_case_insensitive(&values, &item) {
            values.push(item);
        }
    }
    values
}

/// Resolve an operation's target to a key of `original` (or a new key)
///
/// Canonical fields resolve through the alias table, custom keys through the
/// read sanitizer. Under `Raw`, an existing key is matched ignoring case.
pub fn target_key(field: &str, original: &FieldMap, schema: Schema, aliases: &AliasTable) -> String {
    match schema {
        Schema::Raw => original
            .keys()
            .find(|k| k.eq_ignore_ascii_case(field))
            .cloned()
            .unwrap_or_else(|| field.to_string()),
        _ => aliases.field_key(field),
    }
}

/// Apply `operations` in order over `original`, producing the planned map
///
/// Later operations see the results of earlier ones. Values are normalized
/// after each step, so the planned map obeys the same invariants as a read.
pub fn compute_planned(
    original: &FieldMap,
    operations: &[Operation],
    schema: Schema,
    aliases: &AliasTable,
) -> FieldMap {
    let mut planned = original.clone();

    for op in operations {
        let key = target_key(&op.field, original, schema, aliases);
        let rules = match schema {
            Schema::Raw => FieldRules::CUSTOM,
            _ => aliases.rules_for(&key),
        };
        let before = planned.get(&key).cloned().unwrap_or_default();
        let after = normalize(rules, &op.apply(&before, rules));

        if after.is_empty() && !planned.contains_key(&key) {
            // Deleting a field the file never had is a no-op
            continue;
        }
        planned.insert(key, after);
    }

    planned
}
