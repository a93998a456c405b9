//! Exact or glob string matching for package names and build strings

use std::fmt;
use std::hash::{Hash, Hasher};

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid glob pattern \"{pattern}\": {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

/// Matches a string exactly or against a `*` glob.
#[derive(Debug, Clone)]
pub enum StringMatcher {
    Exact(String),
    Glob { pattern: String, regex: Regex },
}

impl StringMatcher {
    /// Build a matcher, treating any `*` as a wildcard
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.contains('*') {
            return Ok(StringMatcher::Exact(pattern.to_string()));
        }

        let escaped = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^{}$", escaped)).map_err(|e| PatternError {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(StringMatcher::Glob {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn is_glob(&self) -> bool {
        matches!(self, StringMatcher::Glob { .. })
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            StringMatcher::Exact(exact) => exact == value,
            StringMatcher::Glob { regex, .. } => regex.is_match(value),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StringMatcher::Exact(exact) => exact,
            StringMatcher::Glob { pattern, .. } => pattern,
        }
    }
}

impl fmt::Display for StringMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq for StringMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for StringMatcher {}

impl Hash for StringMatcher {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}
