//! Post-write verification
//!
//! Re-reads a written file through a fresh TagStore and checks every changed
//! field against its planned values. A mismatch fails the file even though
//! the write itself succeeded.

use crate::tag_store::TagStore;
use mtag_common::values::is_smart_empty;
use mtag_common::{AliasTable, Error, FieldMap, Result, Schema, SchemaViewBuilder};

pub struct Verifier<'a> {
    builder: SchemaViewBuilder<'a>,
    schema: Schema,
}

impl<'a> Verifier<'a> {
    pub fn new(aliases: &'a AliasTable, schema: Schema) -> Self {
        Self {
            builder: SchemaViewBuilder::new(aliases),
            schema,
        }
    }

    /// Compare the re-read view with `changed`
    ///
    /// Returns the re-read values of the changed fields. A field planned as
    /// `[]` must be absent.
    pub fn verify(&self, store: &mut dyn TagStore, changed: &FieldMap) -> Result<FieldMap> {
        let frames = store
            .read_native()
            .map_err(|e| Error::Verification(format!("re-read failed: {}", e)))?;
        let view = self.builder.build(&frames, self.schema);

        let mut verified = FieldMap::new();
        let mut mismatches = Vec::new();

        for (field, expected) in changed {
            let actual = view.get(field);
            let ok = match actual {
                None => expected.is_empty(),
                Some(actual) => self.values_match(field, expected, actual),
            };

            if let Some(actual) = actual {
                verified.insert(field.clone(), actual.clone());
            }
            if !ok {
                mismatches.push(format!(
                    "{}: expected {:?}, found {:?}",
                    field,
                    expected,
                    actual.map(Vec::as_slice).unwrap_or(&[])
                ));
            }
        }

        if mismatches.is_empty() {
            Ok(verified)
        } else {
            Err(Error::Verification(mismatches.join("; ")))
        }
    }

    fn values_match(&self, field: &str, expected: &[String], actual: &[String]) -> bool {
        if expected == actual {
            return true;
        }
        if expected.is_empty() {
            return false;
        }
        // Some containers drop a blank value entirely
        if is_smart_empty(expected) && actual.iter().all(|v| v.trim().is_empty()) {
            return true;
        }

        let numeric = self.schema != Schema::Raw
            && self
                .builder
                .aliases()
                .field(field)
                .is_some_and(|f| f.is_numeric());
        numeric && numbers_equal(expected, actual)
    }
}

/// `"03"` and `"3/12"` both equal `"3"`; non-numeric values compare as text
fn numbers_equal(expected: &[String], actual: &[String]) -> bool {
    expected.len() == actual.len()
        && expected.iter().zip(actual).all(|(e, a)| {
            let (e, a) = (leading_number(e), leading_number(a));
            match (e.parse::<u32>(), a.parse::<u32>()) {
                (Ok(e), Ok(a)) => e == a,
                _ => e == a,
            }
        })
}

/// Number half of an `n/total` value
fn leading_number(value: &str) -> &str {
    value.split('/').next().unwrap_or(value).trim()
}
