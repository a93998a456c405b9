//! Version specs: single constraints combined with `,` (and) and `|` (or)

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

use super::Operator;
use crate::version::{Version, VersionParseError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionSpecError {
    #[error("Empty version spec")]
    Empty,
    #[error("Missing version after operator in \"{0}\"")]
    MissingVersion(String),
    #[error("Unsupported version spec syntax \"{0}\"")]
    Unsupported(String),
    #[error(transparent)]
    Version(#[from] VersionParseError),
}

/// How the members of a [`VersionSpec::Group`] are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    fn separator(&self) -> &'static str {
        match self {
            LogicalOperator::And => ",",
            LogicalOperator::Or => "|",
        }
    }
}

/// A predicate over versions.
///
/// Equality and hashing use the canonical string form, so `1.0.*` and `=1.0`
/// are the same spec.
#[derive(Debug, Clone)]
pub enum VersionSpec {
    /// Matches every version (`*`)
    Any,
    /// A single operator and version
    Constraint(Operator, Version),
    /// Several specs joined by `,` or `|`
    Group(LogicalOperator, Vec<VersionSpec>),
}

impl VersionSpec {
    /// Parse a version spec such as `>=1.0,<2`, `1.2.*`, `=1.2` or `1.0|2.0`
    pub fn parse(input: &str) -> Result<Self, VersionSpecError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(VersionSpecError::Empty);
        }
        if s.contains('(') || s.contains(')') {
            return Err(VersionSpecError::Unsupported(s.to_string()));
        }

        let alternatives = s
            .split('|')
            .map(parse_conjunction)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::group(LogicalOperator::Or, alternatives))
    }

    /// An exact `==version` spec
    pub fn exact(version: Version) -> Self {
        VersionSpec::Constraint(Operator::Equal, version)
    }

    /// A `version.*` prefix spec
    pub fn starts_with(version: Version) -> Self {
        VersionSpec::Constraint(Operator::StartsWith, version)
    }

    /// A `<version` spec
    pub fn less_than(version: Version) -> Self {
        VersionSpec::Constraint(Operator::LessThan, version)
    }

    fn group(op: LogicalOperator, mut members: Vec<VersionSpec>) -> Self {
        if members.iter().any(|m| m.is_any()) {
            match op {
                // `*` in an alternative makes the whole thing match everything
                LogicalOperator::Or => return VersionSpec::Any,
                LogicalOperator::And => members.retain(|m| !m.is_any()),
            }
        }
        match members.len() {
            0 => VersionSpec::Any,
            1 => members.remove(0),
            _ => VersionSpec::Group(op, members),
        }
    }

    /// Check if a version satisfies this spec
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionSpec::Any => true,
            VersionSpec::Constraint(op, target) => op.matches(version, target),
            VersionSpec::Group(LogicalOperator::And, members) => {
                members.iter().all(|m| m.matches(version))
            }
            VersionSpec::Group(LogicalOperator::Or, members) => {
                members.iter().any(|m| m.matches(version))
            }
        }
    }

    /// Check if this spec matches everything
    pub fn is_any(&self) -> bool {
        matches!(self, VersionSpec::Any)
    }

    /// The pinned version if this is an exact `==` spec
    pub fn exact_version(&self) -> Option<&Version> {
        match self {
            VersionSpec::Constraint(Operator::Equal, version) => Some(version),
            _ => None,
        }
    }
}

fn parse_conjunction(part: &str) -> Result<VersionSpec, VersionSpecError> {
    let members = part
        .split(',')
        .map(parse_atom)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(VersionSpec::group(LogicalOperator::And, members))
}

fn parse_atom(raw: &str) -> Result<VersionSpec, VersionSpecError> {
    let atom = raw.trim();
    if atom.is_empty() {
        return Err(VersionSpecError::Empty);
    }

    let operator = Operator::supported_operators()
        .iter()
        .find(|op| atom.starts_with(**op))
        .copied();
    let rest = match operator {
        Some(op) => atom[op.len()..].trim(),
        None => atom,
    };
    if rest.is_empty() {
        return Err(VersionSpecError::MissingVersion(atom.to_string()));
    }
    if rest == "*" || rest == "*.*" {
        return match operator {
            None | Some("==") | Some("=") | Some(">=") => Ok(VersionSpec::Any),
            _ => Err(VersionSpecError::Unsupported(atom.to_string())),
        };
    }

    let (wildcard, version_str) = if let Some(v) = rest.strip_suffix(".*") {
        (true, v)
    } else if let Some(v) = rest.strip_suffix('*') {
        (true, v)
    } else {
        (false, rest)
    };
    let version = Version::parse(version_str)?;

    let op = match operator {
        None | Some("==") => {
            if wildcard {
                Operator::StartsWith
            } else {
                Operator::Equal
            }
        }
        Some("=") => Operator::StartsWith,
        Some("!=") => {
            if wildcard {
                Operator::NotStartsWith
            } else {
                Operator::NotEqual
            }
        }
        Some("~=") if wildcard => {
            return Err(VersionSpecError::Unsupported(atom.to_string()));
        }
        // `>=1.0.*` reads as `>=1.0`
        Some(other) => Operator::from_str(other)
            .map_err(|_| VersionSpecError::Unsupported(atom.to_string()))?,
    };

    Ok(VersionSpec::Constraint(op, version))
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Any => write!(f, "*"),
            VersionSpec::Constraint(Operator::StartsWith, version) => write!(f, "{}.*", version),
            VersionSpec::Constraint(Operator::NotStartsWith, version) => write!(f, "!={}.*", version),
            VersionSpec::Constraint(op, version) => write!(f, "{}{}", op, version),
            VersionSpec::Group(op, members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(op.separator())?;
                    }
                    write!(f, "{}", member)?;
                }
                Ok(())
            }
        }
    }
}

impl PartialEq for VersionSpec {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for VersionSpec {}

impl Hash for VersionSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl FromStr for VersionSpec {
    type Err = VersionSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionSpec::parse(s)
    }
}
