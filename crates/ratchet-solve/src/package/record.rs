use chrono::{DateTime, Utc};
use ratchet_spec::{Matchable, MatchSpec, SpecParseError, Version};
use serde::{Deserialize, Serialize};

/// Kind of `noarch` package, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoArchType {
    Generic,
    Python,
}

/// Metadata of a single package build, as stored in a channel index or an
/// environment's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: Version,
    pub build: String,

    #[serde(default)]
    pub build_number: u64,

    /// Dependency specs, e.g. `python >=3.9,<3.12`
    #[serde(default)]
    pub depends: Vec<String>,

    /// Constraints applied to other packages if they are installed
    #[serde(default)]
    pub constrains: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noarch: Option<NoArchType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, version: Version, build: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            version,
            build: build.into(),
            build_number: 0,
            depends: Vec::new(),
            constrains: Vec::new(),
            channel: None,
            subdir: None,
            noarch: None,
            timestamp: None,
        }
    }

    pub fn with_depends<S: Into<String>>(mut self, depends: impl IntoIterator<Item = S>) -> Self {
        self.depends = depends.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_build_number(mut self, build_number: u64) -> Self {
        self.build_number = build_number;
        self
    }

    pub fn with_noarch(mut self, noarch: NoArchType) -> Self {
        self.noarch = Some(noarch);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Names of the packages this record depends on
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.depends.iter().filter_map(|dep| {
            let dep = dep.trim();
            let end = dep
                .find(|c: char| c.is_whitespace() || "<>=!~[".contains(c))
                .unwrap_or(dep.len());
            let name = &dep[..end];
            (!name.is_empty()).then_some(name)
        })
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependency_names().any(|dep| dep.eq_ignore_ascii_case(name))
    }

    /// `name ==version build` for exactly this build
    pub fn to_match_spec(&self) -> Result<MatchSpec, SpecParseError> {
        MatchSpec::exact(&self.name, &self.version, Some(&self.build))
    }

    /// Human readable `name-version-build`
    pub fn dist_str(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.build)
    }
}

impl Matchable for PackageRecord {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &Version {
        &self.version
    }

    fn build(&self) -> &str {
        &self.build
    }

    fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }
}

fn default_manageable() -> bool {
    true
}

/// A package currently installed in the target environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledRecord {
    #[serde(flatten)]
    pub record: PackageRecord,

    /// Spec the user originally asked for when installing this package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_spec: Option<MatchSpec>,

    /// `false` for core/system packages that are never released from their
    /// installed version
    #[serde(default = "default_manageable")]
    pub manageable: bool,
}

impl InstalledRecord {
    pub fn new(record: PackageRecord) -> Self {
        Self {
            record,
            requested_spec: None,
            manageable: true,
        }
    }

    pub fn unmanageable(mut self) -> Self {
        self.manageable = false;
        self
    }

    pub fn with_requested_spec(mut self, spec: MatchSpec) -> Self {
        self.requested_spec = Some(spec);
        self
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }
}

impl From<PackageRecord> for InstalledRecord {
    fn from(record: PackageRecord) -> Self {
        InstalledRecord::new(record)
    }
}

impl Matchable for InstalledRecord {
    fn name(&self) -> &str {
        &self.record.name
    }

    fn version(&self) -> &Version {
        &self.record.version
    }

    fn build(&self) -> &str {
        &self.record.build
    }

    fn channel(&self) -> Option<&str> {
        self.record.channel.as_deref()
    }
}
