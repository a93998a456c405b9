use std::sync::Arc;

use ratchet_spec::MatchSpec;

use crate::package::PackageRecord;

/// The four-bucket payload handed to the solver engine for one attempt.
///
/// A name is never both locked and pinned: [`SolverRequest::pin`] evicts a
/// locked record of the same name and [`SolverRequest::lock`] refuses names
/// that are already pinned.
#[derive(Debug, Clone, Default)]
pub struct SolverRequest {
    /// Specs that must be satisfied by the solution
    specs: Vec<MatchSpec>,
    /// Specs that only bind if the package ends up in the solution
    constraints: Vec<MatchSpec>,
    /// Installed records to keep if possible
    locked: Vec<Arc<PackageRecord>>,
    /// Installed records to keep whenever the package is part of the solution
    pinned: Vec<Arc<PackageRecord>>,
}

impl SolverRequest {
    /// Create a new empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a spec to satisfy
    pub fn add_spec(&mut self, spec: MatchSpec) -> &mut Self {
        if !self.specs.contains(&spec) {
            self.specs.push(spec);
        }
        self
    }

    /// Add a conditional constraint
    pub fn constrain(&mut self, spec: MatchSpec) -> &mut Self {
        if !self.constraints.contains(&spec) {
            self.constraints.push(spec);
        }
        self
    }

    /// Prefer an installed record, unless the name is already pinned
    pub fn lock(&mut self, record: Arc<PackageRecord>) -> &mut Self {
        if self.is_pinned(&record.name) {
            log::debug!("Not locking {}: already pinned", record.name);
        } else if !self.is_locked(&record.name) {
            self.locked.push(record);
        }
        self
    }

    /// Require an installed record, replacing any lock on the same name
    pub fn pin(&mut self, record: Arc<PackageRecord>) -> &mut Self {
        self.locked.retain(|locked| locked.name != record.name);
        if !self.is_pinned(&record.name) {
            self.pinned.push(record);
        }
        self
    }

    pub fn specs(&self) -> &[MatchSpec] {
        &self.specs
    }

    pub fn constraints(&self) -> &[MatchSpec] {
        &self.constraints
    }

    pub fn locked(&self) -> &[Arc<PackageRecord>] {
        &self.locked
    }

    pub fn pinned(&self) -> &[Arc<PackageRecord>] {
        &self.pinned
    }

    pub fn is_locked(&self, name: &str) -> bool {
        self.locked.iter().any(|record| record.name == name)
    }

    pub fn is_pinned(&self, name: &str) -> bool {
        self.pinned.iter().any(|record| record.name == name)
    }

    /// Check if any spec to satisfy names this package
    pub fn has_spec_for(&self, name: &str) -> bool {
        self.specs.iter().any(|spec| spec.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
            && self.constraints.is_empty()
            && self.locked.is_empty()
            && self.pinned.is_empty()
    }
}
