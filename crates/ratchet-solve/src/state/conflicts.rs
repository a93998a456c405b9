use std::collections::BTreeSet;

use indexmap::IndexMap;
use ratchet_spec::MatchSpec;

use crate::package::InstalledRecord;

/// Packages the solver has reported as blocking a solution, by name.
///
/// One set is threaded through a whole resolution. Names are only ever added
/// until a successful attempt empties it with [`ConflictSet::clear`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictSet {
    entries: IndexMap<String, MatchSpec>,
    /// Spec strings reported by the most recent failed attempt
    last_reported: BTreeSet<String>,
}

impl ConflictSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&MatchSpec> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MatchSpec)> {
        self.entries.iter()
    }

    /// Canonical spec strings of every entry, for set comparisons
    pub fn spec_strings(&self) -> BTreeSet<String> {
        self.entries.values().map(|spec| spec.to_string()).collect()
    }

    pub fn last_reported(&self) -> &BTreeSet<String> {
        &self.last_reported
    }

    pub fn set_last_reported(&mut self, reported: BTreeSet<String>) {
        self.last_reported = reported;
    }

    /// Add newly reported conflicts; a name already present takes the newer spec
    pub fn merge(&mut self, conflicts: impl IntoIterator<Item = (String, MatchSpec)>) {
        for (name, spec) in conflicts {
            self.entries.insert(name, spec);
        }
    }

    /// Mark every given installed record as conflicting so that none stays frozen
    pub fn unfreeze<'a>(&mut self, records: impl IntoIterator<Item = &'a InstalledRecord>) {
        for installed in records {
            match installed.record.to_match_spec() {
                Ok(spec) => {
                    self.entries.insert(installed.name().to_string(), spec);
                }
                Err(e) => log::debug!("Not unfreezing {}: {}", installed.name(), e),
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_reported.clear();
    }
}
