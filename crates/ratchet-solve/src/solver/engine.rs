use std::fmt;

use async_trait::async_trait;
use ratchet_spec::MatchSpec;

use super::request::SolverRequest;
use crate::package::{PackageRecord, VirtualPackage};
use crate::repository::RepoHandle;

/// Channel priority as understood by the solver engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityMode {
    Strict,
    Disabled,
}

/// Everything the engine needs for one attempt
#[derive(Debug, Clone)]
pub struct SolverTask {
    pub request: SolverRequest,
    pub repos: Vec<RepoHandle>,
    pub virtual_packages: Vec<VirtualPackage>,
    pub channel_priority: PriorityMode,
}

/// Why a package blocks a solution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Locked, but another version is required
    Locked,
    /// No candidate satisfies the requirement
    NoViableOptions,
    /// A constraint cannot be fulfilled
    ConstraintUnfulfilled,
    /// Only some alternatives are installable and none fit
    AnyOfOptions,
    /// No candidate with this name exists in any channel
    NotFound,
}

/// One package implicated in a failed solve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    pub kind: ConflictKind,
    pub spec: MatchSpec,
}

impl ConflictReport {
    pub fn new(kind: ConflictKind, spec: MatchSpec) -> Self {
        Self { kind, spec }
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ConflictKind::NotFound
    }
}

/// A failed solve as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverFailure {
    /// Free-form, line oriented diagnostic text
    Diagnostic(String),
    /// Conflicts the engine could name itself, plus the text shown to users
    Structured {
        message: String,
        reports: Vec<ConflictReport>,
    },
}

impl SolverFailure {
    /// Diagnostic text for humans
    pub fn message(&self) -> &str {
        match self {
            SolverFailure::Diagnostic(text) => text,
            SolverFailure::Structured { message, .. } => message,
        }
    }
}

impl fmt::Display for SolverFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// An external constraint solver
#[async_trait]
pub trait SolverEngine: Send + Sync {
    /// Solve one request, returning one record per package in the solution
    async fn solve(&self, task: SolverTask) -> Result<Vec<PackageRecord>, SolverFailure>;
}
