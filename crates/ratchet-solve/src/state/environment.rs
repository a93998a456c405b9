use std::fs;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use ratchet_spec::{MatchSpec, Matchable};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::package::{InstalledRecord, VirtualPackage};

/// How installed packages outside the request are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateModifier {
    /// Lock user-installed packages to their installed version where possible
    #[default]
    UpdateSpecs,
    /// Pin user-installed packages to their installed version
    FreezeInstalled,
    /// Let every user-installed package move
    UpdateAll,
}

/// Everything the solving loop knows about the target environment and the
/// change requested for it.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentState {
    pub prefix: Option<PathBuf>,
    /// Installed packages by name
    pub installed: IndexMap<String, InstalledRecord>,
    /// Specs the user asked for in earlier transactions
    pub history: IndexMap<String, MatchSpec>,
    pub pinned: IndexMap<String, MatchSpec>,
    pub aggressive_updates: IndexSet<String>,
    pub do_not_remove: IndexSet<String>,
    /// Specs requested in this transaction, grouped by package name
    pub requested: IndexMap<String, Vec<MatchSpec>>,
    pub is_removing: bool,
    pub update_modifier: UpdateModifier,
    pub ignore_pinned: bool,
    pub virtual_packages: Vec<VirtualPackage>,
}

impl EnvironmentState {
    pub fn builder() -> EnvironmentStateBuilder {
        EnvironmentStateBuilder::default()
    }

    /// Load a snapshot written as JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: EnvironmentSnapshot = serde_json::from_str(json)?;
        snapshot.into_builder().build()
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.installed.contains_key(name)
    }

    /// Installed because the user asked for it (history, pins, aggressive
    /// updates or protected names), as opposed to being a dependency
    pub fn is_user_installed(&self, name: &str) -> bool {
        self.history.contains_key(name)
            || self.pinned.contains_key(name)
            || self.aggressive_updates.contains(name)
            || self.do_not_remove.contains(name)
    }

    pub fn is_requested(&self, name: &str) -> bool {
        self.requested.get(name).is_some_and(|specs| !specs.is_empty())
    }

    /// Pins in effect for this resolution
    pub fn effective_pins(&self) -> IndexMap<String, MatchSpec> {
        if self.ignore_pinned {
            IndexMap::new()
        } else {
            self.pinned.clone()
        }
    }

    pub fn requested_specs(&self) -> impl Iterator<Item = &MatchSpec> {
        self.requested.values().flatten()
    }

    /// Installed records matched by `spec`, honouring glob names
    pub fn installed_matching<'a>(&'a self, spec: &'a MatchSpec) -> impl Iterator<Item = &'a InstalledRecord> {
        self.installed.values().filter(move |record| {
            if spec.has_glob_name() {
                spec.matches(*record)
            } else {
                spec.name_matches(record.name())
            }
        })
    }
}

/// Builds an [`EnvironmentState`] from spec strings, rejecting malformed specs
#[derive(Debug, Default)]
pub struct EnvironmentStateBuilder {
    prefix: Option<PathBuf>,
    installed: Vec<InstalledRecord>,
    history: Vec<String>,
    pinned: Vec<String>,
    requested: Vec<String>,
    aggressive_updates: Vec<String>,
    do_not_remove: Vec<String>,
    is_removing: bool,
    update_modifier: UpdateModifier,
    ignore_pinned: bool,
    virtual_packages: Vec<VirtualPackage>,
}

impl EnvironmentStateBuilder {
    pub fn prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn installed(mut self, record: impl Into<InstalledRecord>) -> Self {
        self.installed.push(record.into());
        self
    }

    pub fn history(mut self, spec: impl Into<String>) -> Self {
        self.history.push(spec.into());
        self
    }

    pub fn pin(mut self, spec: impl Into<String>) -> Self {
        self.pinned.push(spec.into());
        self
    }

    pub fn request(mut self, spec: impl Into<String>) -> Self {
        self.requested.push(spec.into());
        self
    }

    pub fn aggressive_update(mut self, name: impl Into<String>) -> Self {
        self.aggressive_updates.push(name.into());
        self
    }

    pub fn do_not_remove(mut self, name: impl Into<String>) -> Self {
        self.do_not_remove.push(name.into());
        self
    }

    pub fn removing(mut self, is_removing: bool) -> Self {
        self.is_removing = is_removing;
        self
    }

    pub fn update_modifier(mut self, modifier: UpdateModifier) -> Self {
        self.update_modifier = modifier;
        self
    }

    pub fn ignore_pinned(mut self, ignore: bool) -> Self {
        self.ignore_pinned = ignore;
        self
    }

    pub fn virtual_package(mut self, package: VirtualPackage) -> Self {
        self.virtual_packages.push(package);
        self
    }

    pub fn build(self) -> Result<EnvironmentState> {
        let installed = self
            .installed
            .into_iter()
            .map(|record| (record.name().to_string(), record))
            .collect();

        let mut requested: IndexMap<String, Vec<MatchSpec>> = IndexMap::new();
        for spec in parse_specs(&self.requested)? {
            let specs = requested.entry(spec.name().to_string()).or_default();
            if !specs.contains(&spec) {
                specs.push(spec);
            }
        }

        Ok(EnvironmentState {
            prefix: self.prefix,
            installed,
            history: by_name(parse_specs(&self.history)?),
            pinned: by_name(parse_specs(&self.pinned)?),
            aggressive_updates: self.aggressive_updates.iter().map(|n| n.to_lowercase()).collect(),
            do_not_remove: self.do_not_remove.iter().map(|n| n.to_lowercase()).collect(),
            requested,
            is_removing: self.is_removing,
            update_modifier: self.update_modifier,
            ignore_pinned: self.ignore_pinned,
            virtual_packages: self.virtual_packages,
        })
    }
}

fn parse_specs(specs: &[String]) -> Result<Vec<MatchSpec>> {
    specs
        .iter()
        .map(|spec| MatchSpec::parse(spec).map_err(Into::into))
        .collect()
}

fn by_name(specs: Vec<MatchSpec>) -> IndexMap<String, MatchSpec> {
    specs
        .into_iter()
        .map(|spec| (spec.name().to_string(), spec))
        .collect()
}

/// On-disk form of an [`EnvironmentState`]
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
struct EnvironmentSnapshot {
    prefix: Option<PathBuf>,
    installed: Vec<InstalledRecord>,
    history: Vec<String>,
    pinned: Vec<String>,
    requested: Vec<String>,
    aggressive_updates: Vec<String>,
    do_not_remove: Vec<String>,
    is_removing: bool,
    update_modifier: UpdateModifier,
    ignore_pinned: bool,
    virtual_packages: Vec<VirtualPackage>,
}

impl EnvironmentSnapshot {
    fn into_builder(self) -> EnvironmentStateBuilder {
        EnvironmentStateBuilder {
            prefix: self.prefix,
            installed: self.installed,
            history: self.history,
            pinned: self.pinned,
            requested: self.requested,
            aggressive_updates: self.aggressive_updates,
            do_not_remove: self.do_not_remove,
            is_removing: self.is_removing,
            update_modifier: self.update_modifier,
            ignore_pinned: self.ignore_pinned,
            virtual_packages: self.virtual_packages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolveError;
    use crate::package::PackageRecord;
    use ratchet_spec::Version;

    fn installed(name: &str, version: &str) -> PackageRecord {
        PackageRecord::new(name, Version::parse(version).unwrap(), "0")
    }

    #[test]
    fn test_builder_groups_requests_by_name() {
        let env = EnvironmentState::builder()
            .installed(installed("python", "3.11.4"))
            .history("python 3.11.*")
            .request("numpy >=1.20")
            .request("numpy <2")
            .request("numpy <2")
            .request("scipy")
            .build()
            .unwrap();

        assert_eq!(env.requested.len(), 2);
        assert_eq!(env.requested["numpy"].len(), 2);
        assert!(env.is_installed("python"));
        assert!(env.is_user_installed("python"));
        assert!(!env.is_user_installed("numpy"));
        assert!(env.is_requested("scipy"));
    }

    #[test]
    fn test_builder_rejects_path_names() {
        let err = EnvironmentState::builder()
            .request("./some/local/pkg")
            .build()
            .unwrap_err();
        assert!(matches!(err, SolveError::MalformedSpec(_)));
    }

    #[test]
    fn test_ignore_pinned() {
        let env = EnvironmentState::builder()
            .pin("python 3.10.*")
            .ignore_pinned(true)
            .build()
            .unwrap();
        assert!(env.effective_pins().is_empty());
        assert_eq!(env.pinned.len(), 1);
    }

    #[test]
    fn test_installed_matching_glob() {
        let env = EnvironmentState::builder()
            .installed(installed("libfoo", "1.0"))
            .installed(installed("libbar", "1.0"))
            .installed(installed("numpy", "1.0"))
            .build()
            .unwrap();
        let spec = MatchSpec::parse("lib*").unwrap();
        let names: Vec<&str> = env.installed_matching(&spec).map(|r| r.name()).collect();
        assert_eq!(names, vec!["libfoo", "libbar"]);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "installed": [
                {"name": "a", "version": "1.0", "build": "0"},
                {"name": "conda", "version": "24.1", "build": "0", "manageable": false}
            ],
            "history": ["a ==1.0"],
            "requested": ["b >=3.0"],
            "update_modifier": "freeze-installed"
        }"#;
        let env = EnvironmentState::from_json(json).unwrap();
        assert_eq!(env.installed.len(), 2);
        assert!(!env.installed["conda"].manageable);
        assert_eq!(env.history["a"].to_string(), "a ==1.0");
        assert_eq!(env.update_modifier, UpdateModifier::FreezeInstalled);
        assert!(!env.is_removing);
    }

    #[test]
    fn test_from_json_errors() {
        assert!(matches!(EnvironmentState::from_json("{"), Err(SolveError::Json(_))));
        assert!(matches!(
            EnvironmentState::from_json(r#"{"pinned": ["a\\b"]}"#),
            Err(SolveError::MalformedSpec(_))
        ));
    }
}
