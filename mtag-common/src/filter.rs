//! Filter engine
//!
//! Filters gate which files an operation set touches. Every filter in a
//! [`FilterSet`] must match (AND); an empty set matches everything.
//!
//! Patterns are matched case-insensitively as substrings (literal) or
//! anywhere in the value (regex). A file that lacks the filtered field never
//! matches.
//!
//! The plural forms `artists` / `albumartists` take a `;`-separated pattern
//! list and match when every pattern can be assigned to a different value of
//! `artist` / `albumartist`.

use crate::fields::AliasTable;
use crate::pattern::Pattern;
use crate::values::FieldMap;
use crate::{Error, Result};

/// Plural filter fields and the field they match against
const PLURAL_FIELDS: [(&str, &str); 2] = [("artists", "artist"), ("albumartists", "albumartist")];

/// Separator between patterns of a plural filter
const PLURAL_SEPARATOR: char = ';';

#[derive(Debug, Clone, PartialEq)]
enum MatchMode {
    /// Pattern found in any value
    Any(Pattern),
    /// Each pattern matched by a distinct value
    Distinct(Vec<Pattern>),
}

/// One predicate over a file's canonical view
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    field: String,
    mode: MatchMode,
}

impl Filter {
    /// Build a filter on `field`
    ///
    /// `field` may be any alias of a canonical field, a custom key, or one of
    /// the plural forms. Regex patterns are compiled here.
    pub fn new(field: &str, pattern: &str, is_regex: bool) -> Result<Self> {
        Self::with_aliases(field, pattern, is_regex, AliasTable::standard())
    }

    pub fn with_aliases(
        field: &str,
        pattern: &str,
        is_regex: bool,
        aliases: &AliasTable,
    ) -> Result<Self> {
        let field = field.trim();
        if field.is_empty() {
            return Err(Error::InvalidInput("filter field is empty".to_string()));
        }
        if pattern.trim().is_empty() {
            return Err(Error::InvalidInput(format!("filter pattern for '{}' is empty", field)));
        }

        let lowered = field.to_lowercase();
        if let Some((_, target)) = PLURAL_FIELDS.iter().find(|(plural, _)| *plural == lowered) {
            let patterns = pattern
                .split(PLURAL_SEPARATOR)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| Pattern::case_insensitive(p, is_regex))
                .collect::<Result<Vec<_>>>()?;
            if patterns.is_empty() {
                return Err(Error::InvalidInput(format!("filter pattern for '{}' is empty", field)));
            }
            return Ok(Self {
                field: target.to_string(),
                mode: MatchMode::Distinct(patterns),
            });
        }

        Ok(Self {
            field: aliases.field_key(field),
            mode: MatchMode::Any(Pattern::case_insensitive(pattern, is_regex)?),
        })
    }

    /// Parse a `FIELD=PATTERN` expression
    ///
    /// Both sides are trimmed. The field must be a canonical field (any alias) or a plural form.
    pub fn parse_expression(expr: &str, is_regex: bool, aliases: &AliasTable) -> Result<Self> {
        let (field, pattern) = expr.split_once('=').ok_or_else(|| {
            Error::InvalidInput(format!("filter '{}' is not of the form FIELD=PATTERN", expr))
        })?;

        let field = field.trim();
        let pattern = pattern.trim();
        let is_plural = PLURAL_FIELDS
            .iter()
            .any(|(plural, _)| plural.eq_ignore_ascii_case(field));
        if !is_plural && aliases.resolve(field).is_none() {
            return Err(Error::InvalidInput(format!(
                "unknown filter field '{}'",
                field
            )));
        }

        Self::with_aliases(field, pattern, is_regex, aliases)
    }

    /// Field-map key this filter reads
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Evaluate against a canonical view
    pub fn matches(&self, view: &FieldMap) -> bool {
        let Some(values) = view.get(&self.field) else {
            return false;
        };
        match &self.mode {
            MatchMode::Any(pattern) => values.iter().any(|v| pattern.is_match(v)),
            MatchMode::Distinct(patterns) => distinct_match(patterns, values),
        }
    }
}

/// True if every pattern can be paired with a different value
///
/// Augmenting-path bipartite matching; pattern and value lists are short.
fn distinct_match(patterns: &[Pattern], values: &[String]) -> bool {
    if patterns.len() > values.len() {
        return false;
    }

    let edges: Vec<Vec<usize>> = patterns
        .iter()
        .map(|p| {
            values
                .iter()
                .enumerate()
                .filter(|(_, v)| p.is_match(v))
                .map(|(i, _)| i)
                .collect()
        })
        .collect();

    let mut owner: Vec<Option<usize>> = vec![None; values.len()];
    for pattern in 0..patterns.len() {
        let mut visited = vec![false; values.len()];
        if !augment(pattern, &edges, &mut owner, &mut visited) {
            return false;
        }
    }
    true
}

fn augment(
    pattern: usize,
    edges: &[Vec<usize>],
    owner: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for &value in &edges[pattern] {
        if visited[value] {
            continue;
        }
        visited[value] = true;
        let free = match owner[value] {
            None => true,
            Some(other) => augment(other, edges, owner, visited),
        };
        if free {
            owner[value] = Some(pattern);
            return true;
        }
    }
    false
}

/// AND-combined filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    /// True when every filter matches (vacuously true when empty)
    pub fn matches(&self, view: &FieldMap) -> bool {
        self.filters.iter().all(|f| f.matches(view))
    }
}

impl FromIterator<Filter> for FilterSet {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
