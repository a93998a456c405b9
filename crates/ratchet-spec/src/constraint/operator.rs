//! Operator types for version constraints

use std::fmt;
use thiserror::Error;

use crate::Version;

/// Comparison operators for version constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equal (==)
    Equal,
    /// Not equal (!=)
    NotEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal (<=)
    LessThanOrEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal (>=)
    GreaterThanOrEqual,
    /// Compatible release (~=)
    Compatible,
    /// Prefix match (`1.0.*` or `=1.0`)
    StartsWith,
    /// Negated prefix match (`!=1.0.*`)
    NotStartsWith,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid operator: {0}")]
pub struct InvalidOperatorError(pub String);

impl Operator {
    /// Parse operator from string
    pub fn from_str(s: &str) -> Result<Self, InvalidOperatorError> {
        match s {
            "==" => Ok(Operator::Equal),
            "!=" => Ok(Operator::NotEqual),
            "<" => Ok(Operator::LessThan),
            "<=" => Ok(Operator::LessThanOrEqual),
            ">" => Ok(Operator::GreaterThan),
            ">=" => Ok(Operator::GreaterThanOrEqual),
            "~=" => Ok(Operator::Compatible),
            "=" => Ok(Operator::StartsWith),
            _ => Err(InvalidOperatorError(s.to_string())),
        }
    }

    /// Get the string representation of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual | Operator::NotStartsWith => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::Compatible => "~=",
            Operator::StartsWith => "=",
        }
    }

    /// Get all supported operators, longest first so prefix scanning is unambiguous
    pub fn supported_operators() -> &'static [&'static str] {
        &["==", "!=", "<=", ">=", "~=", "<", ">", "="]
    }

    /// Check whether `candidate` satisfies `operator target`
    pub fn matches(&self, candidate: &Version, target: &Version) -> bool {
        match self {
            Operator::Equal => candidate == target,
            Operator::NotEqual => candidate != target,
            Operator::LessThan => candidate < target,
            Operator::LessThanOrEqual => candidate <= target,
            Operator::GreaterThan => candidate > target,
            Operator::GreaterThanOrEqual => candidate >= target,
            Operator::Compatible => candidate.is_compatible_with(target),
            Operator::StartsWith => candidate.starts_with(target),
            Operator::NotStartsWith => !candidate.starts_with(target),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
