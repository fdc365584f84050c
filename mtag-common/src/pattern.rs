//! Literal-or-regex text patterns
//!
//! Compiled once when an operation or filter is built, so a bad regex is
//! rejected before any file is touched.

use crate::{Error, Result};
use regex::{NoExpand, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Serialized form of a [`Pattern`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub pattern: String,
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub case_insensitive: bool,
}

/// A compiled find pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PatternSpec", into = "PatternSpec")]
pub struct Pattern {
    spec: PatternSpec,
    compiled: Regex,
}

impl Pattern {
    /// Compile a case-sensitive pattern
    pub fn new(pattern: &str, regex: bool) -> Result<Self> {
        Self::from_spec(PatternSpec {
            pattern: pattern.to_string(),
            regex,
            case_insensitive: false,
        })
    }

    /// Compile a pattern that ignores case
    pub fn case_insensitive(pattern: &str, regex: bool) -> Result<Self> {
        Self::from_spec(PatternSpec {
            pattern: pattern.to_string(),
            regex,
            case_insensitive: true,
        })
    }

    fn from_spec(spec: PatternSpec) -> Result<Self> {
        let source = if spec.regex {
            Cow::Borrowed(spec.pattern.as_str())
        } else {
            Cow::Owned(regex::escape(&spec.pattern))
        };
        let compiled = RegexBuilder::new(&source)
            .case_insensitive(spec.case_insensitive)
            .build()
            .map_err(|e| Error::InvalidInput(format!("invalid regex {:?}: {}", spec.pattern, e)))?;
        Ok(Self { spec, compiled })
    }

    pub fn as_str(&self) -> &str {
        &self.spec.pattern
    }

    pub fn is_regex(&self) -> bool {
        self.spec.regex
    }

    /// True if the pattern occurs anywhere in `haystack`
    pub fn is_match(&self, haystack: &str) -> bool {
        self.compiled.is_match(haystack)
    }

    /// Replace every occurrence
    ///
    /// Regex patterns expand `$1`-style groups in `replacement`; literal
    /// patterns insert it verbatim.
    pub fn replace_all<'h>(&self, haystack: &'h str, replacement: &str) -> Cow<'h, str> {
        if self.spec.regex {
            self.compiled.replace_all(haystack, replacement)
        } else {
            self.compiled.replace_all(haystack, NoExpand(replacement))
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}

impl TryFrom<PatternSpec> for Pattern {
    type Error = Error;

    fn try_from(spec: PatternSpec) -> Result<Self> {
        Self::from_spec(spec)
    }
}

impl From<Pattern> for PatternSpec {
    fn from(pattern: Pattern) -> Self {
        pattern.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_escapes_metacharacters() {
        let p = Pattern::new("a.b", false).unwrap();
        assert!(p.is_match("xa.by"));
        assert!(!p.is_match("axb"));
    }

    #[test]
    fn test_literal_replacement_is_verbatim() {
        let p = Pattern::new("feat.", false).unwrap();
        assert_eq!(p.replace_all("A feat. B", "$1"), "A $1 B");
    }

    #[test]
    fn test_regex_group_expansion() {
        let p = Pattern::new(r"(\w+), The", true).unwrap();
        assert_eq!(p.replace_all("Beatles, The", "The $1"), "The Beatles");
    }

    #[test]
    fn test_case_insensitive() {
        let p = Pattern::case_insensitive("beatles", false).unwrap();
        assert!(p.is_match("The BEATLES"));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = Pattern::new("(unclosed", true).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_serde_round_trip_recompiles() {
        let p = Pattern::new("^19[6-7]", true).unwrap();
        let json = serde_json::to_string(&p).unwrap();
        let back: Pattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
        assert!(back.is_match("1969"));
    }
}
