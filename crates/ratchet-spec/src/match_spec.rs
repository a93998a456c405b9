//! Package match specs (`[channel::]name[ version[ build]]`)

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constraint::{VersionSpec, VersionSpecError};
use crate::string_matcher::StringMatcher;
use crate::version::Version;

/// Error type for match spec parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecParseError {
    #[error("Empty match spec")]
    Empty,
    #[error("Invalid package name \"{name}\" in \"{spec}\": {reason}")]
    InvalidName {
        spec: String,
        name: String,
        reason: String,
    },
    #[error("Invalid version in \"{spec}\": {source}")]
    InvalidVersion {
        spec: String,
        source: VersionSpecError,
    },
    #[error("Invalid build string in \"{spec}\": {reason}")]
    InvalidBuild { spec: String, reason: String },
    #[error("Could not parse match spec \"{0}\"")]
    Unparseable(String),
}

lazy_static! {
    static ref BRACKET_ATTR_RE: Regex =
        Regex::new(r#"(\w+)\s*=\s*(?:'([^']*)'|"([^"]*)"|([^,\]]*))"#).unwrap();
    static ref OPERATOR_SPACE_RE: Regex = Regex::new(r"(==|!=|<=|>=|~=|<|>|=)\s+").unwrap();
    static ref SEPARATOR_SPACE_RE: Regex = Regex::new(r"\s*([,|])\s*").unwrap();
    static ref EQUALS_BUILD_RE: Regex = Regex::new(r"^==?([^=<>!~,|\s]+)=([^=\s]+)$").unwrap();
}

/// A record that a [`MatchSpec`] can be tested against
pub trait Matchable {
    fn name(&self) -> &str;
    fn version(&self) -> &Version;
    fn build(&self) -> &str;

    /// Channel the record came from, as a name or URL
    fn channel(&self) -> Option<&str> {
        None
    }
}

/// A predicate over package name, version and build string.
///
/// Specs are immutable once parsed. Equality and hashing use the canonical
/// string form produced by `Display`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MatchSpec {
    channel: Option<String>,
    name: StringMatcher,
    version: Option<VersionSpec>,
    build: Option<StringMatcher>,
}

impl MatchSpec {
    /// Parse a match spec.
    ///
    /// Accepted forms include `numpy`, `numpy >=1.20`, `numpy>=1.20,<2`,
    /// `numpy 1.21.* py39_0`, `numpy=1.21`, `numpy==1.21.0=py39_0`,
    /// `conda-forge::numpy` and `numpy[version='>=1.20', build=py39*]`.
    pub fn parse(input: &str) -> Result<Self, SpecParseError> {
        let spec = input.trim();
        if spec.is_empty() {
            return Err(SpecParseError::Empty);
        }

        let (body, attrs) = split_brackets(spec)?;
        let (channel, body) = match body.split_once("::") {
            Some((channel, rest)) if !channel.trim().is_empty() => {
                (Some(channel.trim().to_string()), rest.trim())
            }
            Some((_, rest)) => (None, rest.trim()),
            None => (None, body),
        };
        let body = body.trim_end_matches('=').trim();

        let name_end = body
            .find(|c: char| c.is_whitespace() || "<>=!~".contains(c))
            .unwrap_or(body.len());
        let raw_name = &body[..name_end];
        if raw_name.is_empty() {
            return Err(SpecParseError::Unparseable(spec.to_string()));
        }
        let name = raw_name.to_lowercase();
        validate_package_name(&name).map_err(|reason| SpecParseError::InvalidName {
            spec: spec.to_string(),
            name: raw_name.to_string(),
            reason,
        })?;

        let (mut version_str, mut build_str) = split_version_build(spec, body[name_end..].trim())?;
        for (key, value) in attrs {
            match key.as_str() {
                "version" => version_str = Some(value),
                "build" => build_str = Some(value),
                _ => {}
            }
        }

        let version = match version_str.as_deref().map(str::trim) {
            None | Some("") | Some("*") => None,
            Some(v) => Some(VersionSpec::parse(v).map_err(|source| {
                SpecParseError::InvalidVersion {
                    spec: spec.to_string(),
                    source,
                }
            })?),
        }
        .filter(|v| !v.is_any());

        let build = match build_str.as_deref().map(str::trim) {
            None | Some("") | Some("*") => None,
            Some(b) => Some(StringMatcher::parse(b).map_err(|e| SpecParseError::InvalidBuild {
                spec: spec.to_string(),
                reason: e.reason,
            })?),
        };

        Ok(MatchSpec {
            channel,
            name: name_matcher(spec, &name)?,
            version,
            build,
        })
    }

    /// A spec that only names a package
    pub fn name_only(name: &str) -> Result<Self, SpecParseError> {
        let name = name.trim().to_lowercase();
        validate_package_name(&name).map_err(|reason| SpecParseError::InvalidName {
            spec: name.clone(),
            name: name.clone(),
            reason,
        })?;
        Ok(MatchSpec {
            channel: None,
            name: name_matcher(&name, &name)?,
            version: None,
            build: None,
        })
    }

    /// `name ==version build`, or `name ==version` when no build is given
    pub fn exact(name: &str, version: &Version, build: Option<&str>) -> Result<Self, SpecParseError> {
        let mut spec = Self::name_only(name)?;
        spec.version = Some(VersionSpec::exact(version.clone()));
        if let Some(build) = build.filter(|b| !b.is_empty()) {
            spec.build = Some(StringMatcher::Exact(build.to_string()));
        }
        Ok(spec)
    }

    /// `name <0.0.0a0`, a constraint no real package version can satisfy
    pub fn excluding(name: &str) -> Result<Self, SpecParseError> {
        let spec = Self::name_only(name)?;
        Ok(spec.with_version(VersionSpec::less_than(Version::lowest())))
    }

    /// The name (or name glob) this spec matches
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn name_matcher(&self) -> &StringMatcher {
        &self.name
    }

    pub fn has_glob_name(&self) -> bool {
        self.name.is_glob()
    }

    pub fn name_matches(&self, name: &str) -> bool {
        self.name.matches(name)
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn version(&self) -> Option<&VersionSpec> {
        self.version.as_ref()
    }

    pub fn build(&self) -> Option<&StringMatcher> {
        self.build.as_ref()
    }

    pub fn is_name_only(&self) -> bool {
        self.version.is_none() && self.build.is_none()
    }

    /// 1 for name only, 2 with a version, 3 with a build string
    pub fn strictness(&self) -> u8 {
        if self.build.is_some() {
            3
        } else if self.version.is_some() {
            2
        } else {
            1
        }
    }

    /// Check if a record satisfies every part of this spec
    pub fn matches<R: Matchable + ?Sized>(&self, record: &R) -> bool {
        if !self.name.matches(record.name()) {
            return false;
        }
        if let Some(version) = &self.version {
            if !version.matches(record.version()) {
                return false;
            }
        }
        if let Some(build) = &self.build {
            if !build.matches(record.build()) {
                return false;
            }
        }
        match (&self.channel, record.channel()) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(wanted), Some(actual)) => channel_matches(wanted, actual),
        }
    }

    /// The same spec with its build string dropped
    pub fn without_build(&self) -> Self {
        MatchSpec {
            build: None,
            ..self.clone()
        }
    }

    /// Only the channel and name of this spec
    pub fn to_name_only(&self) -> Self {
        MatchSpec {
            channel: self.channel.clone(),
            name: self.name.clone(),
            version: None,
            build: None,
        }
    }

    /// The same spec with a different version constraint
    pub fn with_version(&self, version: VersionSpec) -> Self {
        MatchSpec {
            version: if version.is_any() { None } else { Some(version) },
            ..self.clone()
        }
    }
}

/// Check a (lowercased) package name for characters a package name cannot hold.
///
/// Path separators in particular mean the caller passed a file path where a
/// spec was expected.
pub fn validate_package_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name is empty".to_string());
    }
    if name.contains('/') || name.contains('\\') {
        return Err("name contains a path separator".to_string());
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || "-_.+*".contains(*c)))
    {
        return Err(format!("name contains invalid character '{}'", c));
    }
    Ok(())
}

fn name_matcher(spec: &str, name: &str) -> Result<StringMatcher, SpecParseError> {
    StringMatcher::parse(name).map_err(|e| SpecParseError::InvalidName {
        spec: spec.to_string(),
        name: name.to_string(),
        reason: e.reason,
    })
}

fn split_brackets(spec: &str) -> Result<(&str, Vec<(String, String)>), SpecParseError> {
    let Some(open) = spec.find('[') else {
        return Ok((spec, Vec::new()));
    };
    let Some(inner) = spec[open + 1..].strip_suffix(']') else {
        return Err(SpecParseError::Unparseable(spec.to_string()));
    };

    let attrs = BRACKET_ATTR_RE
        .captures_iter(inner)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            Some((key, value))
        })
        .collect();

    Ok((spec[..open].trim(), attrs))
}

fn split_version_build(
    spec: &str,
    rest: &str,
) -> Result<(Option<String>, Option<String>), SpecParseError> {
    if rest.is_empty() {
        return Ok((None, None));
    }

    // `=1.0=py_0` and `==1.0=py_0` pin an exact version and build
    if let Some(caps) = EQUALS_BUILD_RE.captures(rest) {
        return Ok((Some(format!("=={}", &caps[1])), Some(caps[2].to_string())));
    }

    let normalized = OPERATOR_SPACE_RE.replace_all(rest, "$1");
    let normalized = SEPARATOR_SPACE_RE.replace_all(&normalized, "$1");
    let mut tokens = normalized.split_whitespace();
    let version = tokens.next().map(str::to_string);
    let build = tokens.next().map(str::to_string);
    if tokens.next().is_some() {
        return Err(SpecParseError::Unparseable(spec.to_string()));
    }
    Ok((version, build))
}

fn channel_matches(wanted: &str, actual: &str) -> bool {
    let wanted = wanted.trim_end_matches('/');
    let actual = actual.trim_end_matches('/');
    if wanted == actual {
        return true;
    }
    actual
        .rsplit('/')
        .next()
        .is_some_and(|last| last == wanted)
}

impl fmt::Display for MatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(channel) = &self.channel {
            write!(f, "{}::", channel)?;
        }
        write!(f, "{}", self.name)?;
        match (&self.version, &self.build) {
            (Some(version), Some(build)) => write!(f, " {} {}", version, build),
            (Some(version), None) => write!(f, " {}", version),
            (None, Some(build)) => write!(f, " * {}", build),
            (None, None) => Ok(()),
        }
    }
}

impl PartialEq for MatchSpec {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for MatchSpec {}

impl Hash for MatchSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl FromStr for MatchSpec {
    type Err = SpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MatchSpec::parse(s)
    }
}

impl TryFrom<String> for MatchSpec {
    type Error = SpecParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MatchSpec::parse(&value)
    }
}

impl From<MatchSpec> for String {
    fn from(spec: MatchSpec) -> Self {
        spec.to_string()
    }
}
