//! Conda-style version parsing and ordering

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for version parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("Empty version string")]
    Empty,
    #[error("Invalid version string \"{0}\"")]
    InvalidVersion(String),
    #[error("Invalid epoch in version \"{0}\"")]
    InvalidEpoch(String),
    #[error("Empty version component in \"{0}\"")]
    EmptyComponent(String),
}

lazy_static! {
    static ref VERSION_CHARS_RE: Regex = Regex::new(r"^[a-z0-9_.+!-]+$").unwrap();
    static ref SEGMENT_RE: Regex = Regex::new(r"\d+|[a-z]+").unwrap();
}

static ZERO_SEGMENT: Segment = Segment::Number(0);

/// A run of digits or letters inside a version component.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Number(u64),
    Text(String),
}

impl Segment {
    fn compare(&self, other: &Segment) -> Ordering {
        match (self, other) {
            (Segment::Number(a), Segment::Number(b)) => a.cmp(b),
            (Segment::Number(_), Segment::Text(t)) => {
                if t == "post" {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (Segment::Text(t), Segment::Number(_)) => {
                if t == "post" {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (Segment::Text(a), Segment::Text(b)) => {
                if a == b {
                    Ordering::Equal
                } else if a == "dev" || b == "post" {
                    Ordering::Less
                } else if a == "post" || b == "dev" {
                    Ordering::Greater
                } else {
                    a.cmp(b)
                }
            }
        }
    }
}

/// A single dot-separated component, e.g. `0a1` in `1.0a1`.
#[derive(Debug, Clone)]
struct Component {
    raw: String,
    segments: Vec<Segment>,
}

/// A package version.
///
/// Versions are ordered the way conda orders them: an optional `N!` epoch, then
/// components separated by `.`, `-` or `_`, then an optional `+local` part.
/// Inside a component, numeric runs compare numerically, text runs sort below
/// numbers (`dev` below every other text, `post` above everything), and missing
/// segments are padded with `0`, so `1.0 == 1.0.0` and `1.0a1 < 1.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    source: String,
    epoch: u64,
    components: Vec<Component>,
    local: Vec<Component>,
}

impl Version {
    /// Parse a version string
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let source = input.trim();
        if source.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let lowered = source.to_lowercase();
        if !VERSION_CHARS_RE.is_match(&lowered) {
            return Err(VersionParseError::InvalidVersion(source.to_string()));
        }

        let (epoch, rest) = match lowered.split_once('!') {
            Some((epoch, rest)) => {
                let epoch = epoch
                    .parse::<u64>()
                    .map_err(|_| VersionParseError::InvalidEpoch(source.to_string()))?;
                (epoch, rest)
            }
            None => (0, lowered.as_str()),
        };
        if rest.contains('!') {
            return Err(VersionParseError::InvalidVersion(source.to_string()));
        }

        let (main, local) = match rest.split_once('+') {
            Some((main, local)) => (main, Some(local)),
            None => (rest, None),
        };
        if local.is_some_and(|l| l.contains('+')) {
            return Err(VersionParseError::InvalidVersion(source.to_string()));
        }

        let components = parse_components(main, source)?;
        let local = match local {
            Some(local) => parse_components(local, source)?,
            None => Vec::new(),
        };

        Ok(Version {
            source: source.to_string(),
            epoch,
            components,
            local,
        })
    }

    /// The lowest version any real package can have (`0.0.0a0`).
    ///
    /// Used to build "exclude this package" constraints of the form `name <0.0.0a0`.
    pub fn lowest() -> Self {
        let zero = || Component {
            raw: "0".to_string(),
            segments: vec![Segment::Number(0)],
        };
        Version {
            source: "0.0.0a0".to_string(),
            epoch: 0,
            components: vec![
                zero(),
                zero(),
                Component {
                    raw: "0a0".to_string(),
                    segments: vec![
                        Segment::Number(0),
                        Segment::Text("a".to_string()),
                        Segment::Number(0),
                    ],
                },
            ],
            local: Vec::new(),
        }
    }

    /// The original string this version was parsed from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The epoch (`N!` prefix), `0` when absent
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of main components
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Keep only the first `n` components, dropping any local part.
    ///
    /// `3.10.4` truncated to 2 is `3.10`.
    pub fn truncate(&self, n: usize) -> Version {
        let components: Vec<Component> = self.components.iter().take(n.max(1)).cloned().collect();
        let joined = components
            .iter()
            .map(|c| c.raw.as_str())
            .collect::<Vec<_>>()
            .join(".");
        let source = if self.epoch > 0 {
            format!("{}!{}", self.epoch, joined)
        } else {
            joined
        };
        Version {
            source,
            epoch: self.epoch,
            components,
            local: Vec::new(),
        }
    }

    /// Check if this version lies under `prefix`, component by component.
    ///
    /// `1.0.3` starts with `1.0`; `1.1` and `10.0` do not.
    pub fn starts_with(&self, prefix: &Version) -> bool {
        if self.epoch != prefix.epoch {
            return false;
        }
        prefix.components.iter().enumerate().all(|(i, pc)| {
            let own = self.components.get(i).map(|c| c.segments.as_slice()).unwrap_or(&[]);
            compare_segments(own, &pc.segments) == Ordering::Equal
        })
    }

    /// Check `~=` compatibility: at least `base` and sharing all but its last component.
    pub fn is_compatible_with(&self, base: &Version) -> bool {
        if self < base {
            return false;
        }
        let keep = base.components.len().saturating_sub(1);
        if keep == 0 {
            return true;
        }
        self.starts_with(&base.truncate(keep))
    }
}

fn parse_components(part: &str, source: &str) -> Result<Vec<Component>, VersionParseError> {
    part.split(['.', '-', '_'])
        .map(|raw| {
            if raw.is_empty() {
                return Err(VersionParseError::EmptyComponent(source.to_string()));
            }
            let mut segments = Vec::new();
            for m in SEGMENT_RE.find_iter(raw) {
                let text = m.as_str();
                let segment = if text.as_bytes()[0].is_ascii_digit() {
                    let n = text
                        .parse::<u64>()
                        .map_err(|_| VersionParseError::InvalidVersion(source.to_string()))?;
                    Segment::Number(n)
                } else {
                    Segment::Text(text.to_string())
                };
                segments.push(segment);
            }
            // A component starting with letters sorts as if it had a leading zero.
            if matches!(segments.first(), Some(Segment::Text(_))) {
                segments.insert(0, Segment::Number(0));
            }
            Ok(Component {
                raw: raw.to_string(),
                segments,
            })
        })
        .collect()
}

fn compare_segments(a: &[Segment], b: &[Segment]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let sa = a.get(i).unwrap_or(&ZERO_SEGMENT);
        let sb = b.get(i).unwrap_or(&ZERO_SEGMENT);
        match sa.compare(sb) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn compare_components(a: &[Component], b: &[Component]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let ca = a.get(i).map(|c| c.segments.as_slice()).unwrap_or(&[]);
        let cb = b.get(i).map(|c| c.segments.as_slice()).unwrap_or(&[]);
        match compare_segments(ca, cb) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_components(&self.components, &other.components))
            .then_with(|| compare_components(&self.local, &other.local))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Version::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.source
    }
}
