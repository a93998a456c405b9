use indexmap::IndexMap;
use ratchet_spec::MatchSpec;

use super::engine::{ConflictKind, ConflictReport, SolverFailure};
use crate::error::{Result, SolveError};
use crate::repository::Channel;
use crate::state::ConflictSet;

/// Number of newly conflicting packages in one attempt at which the loop
/// stops treating the problem as converging
const DIVERGENCE_THRESHOLD: usize = 10;

const PREAMBLE: &str = "Cannot solve the request because of:";
const NOT_FOUND_MARKER: &str = "No candidates were found for ";

/// Turns a solver failure into conflict reports
pub trait DiagnosticClassifier: Send + Sync {
    fn classify(&self, failure: &SolverFailure) -> Vec<ConflictReport>;
}

/// Reads the tree-drawn diagnostic text of a resolvo-style solver engine.
///
/// Structured failures are passed through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDiagnosticClassifier;

impl TextDiagnosticClassifier {
    fn classify_line(line: &str) -> Option<ConflictReport> {
        let mut line = line.trim_matches(|c: char| " ─│└├".contains(c));
        if let Some(rest) = line.strip_prefix(PREAMBLE) {
            line = rest;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let first = *words.first()?;

        let (kind, spec) = if line.contains("is locked, but another version is required as reported above") {
            (ConflictKind::Locked, format!("{} {}", first, words.get(1)?))
        } else if line.contains("which cannot be installed because there are no viable options") {
            let version = words.get(1)?.trim_end_matches(',');
            (ConflictKind::NoViableOptions, format!("{} {}", first, version))
        } else if line.contains("cannot be installed because there are no viable options") {
            (ConflictKind::NoViableOptions, format!("{} {}", first, words.get(1)?))
        } else if line.contains("the constraint") && line.contains("cannot be fulfilled") {
            if words.len() < 6 {
                return None;
            }
            (ConflictKind::ConstraintUnfulfilled, words[2..words.len() - 3].join(" "))
        } else if line.contains("can be installed with any of the following options") && !line.contains("which") {
            let position = line.find(" can be installed with")?;
            (ConflictKind::AnyOfOptions, line[..position].to_string())
        } else if let Some(position) = line.find(NOT_FOUND_MARKER) {
            (ConflictKind::NotFound, line[position + NOT_FOUND_MARKER.len()..].to_string())
        } else {
            return None;
        };

        match MatchSpec::parse(&spec) {
            Ok(spec) => Some(ConflictReport::new(kind, spec)),
            Err(e) => {
                log::debug!("Skipping unparseable conflict \"{}\": {}", spec, e);
                None
            }
        }
    }
}

impl DiagnosticClassifier for TextDiagnosticClassifier {
    fn classify(&self, failure: &SolverFailure) -> Vec<ConflictReport> {
        match failure {
            SolverFailure::Structured { reports, .. } => reports.clone(),
            SolverFailure::Diagnostic(text) => text.lines().filter_map(Self::classify_line).collect(),
        }
    }
}

/// What the attempt loop should do after a classified failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    /// New conflicts were merged; try again
    Retry,
    /// Nothing could be learned from the failure
    Stalled,
}

/// Decides, from a failure and the conflicts seen so far, whether the loop
/// may continue
pub struct ConflictClassifier {
    diagnostics: Box<dyn DiagnosticClassifier>,
}

impl Default for ConflictClassifier {
    fn default() -> Self {
        Self::new(Box::new(TextDiagnosticClassifier))
    }
}

impl ConflictClassifier {
    pub fn new(diagnostics: Box<dyn DiagnosticClassifier>) -> Self {
        Self { diagnostics }
    }

    /// Classify `failure`, merging new conflicts into `conflicts` on retry.
    ///
    /// Fails with `PackagesNotFound` when only missing packages were reported,
    /// and with a final `Unsatisfiable` when an attempt repeats the previous
    /// attempt's conflicts, adds none beyond those already freed, or adds too
    /// many packages at once.
    pub fn classify(
        &self,
        failure: &SolverFailure,
        conflicts: &mut ConflictSet,
        channels: &[Channel],
    ) -> Result<ConflictDecision> {
        let mut unsatisfiable: IndexMap<String, MatchSpec> = IndexMap::new();
        let mut not_found: IndexMap<String, MatchSpec> = IndexMap::new();
        for report in self.diagnostics.classify(failure) {
            let target = if report.is_not_found() {
                &mut not_found
            } else {
                &mut unsatisfiable
            };
            target.insert(report.name().to_string(), report.spec);
        }

        if unsatisfiable.is_empty() {
            if not_found.is_empty() {
                log::debug!("Could not classify solver failure:\n{}", failure.message());
                return Ok(ConflictDecision::Stalled);
            }
            log::debug!(
                "Inferred packages not found {:?} from conflicts:\n{}",
                not_found.keys().collect::<Vec<_>>(),
                failure.message()
            );
            return Err(SolveError::PackagesNotFound {
                specs: not_found.values().map(|spec| spec.to_string()).collect(),
                channels: channels.iter().map(|c| c.to_string()).collect(),
            });
        }

        let previous = conflicts.spec_strings();
        let current: std::collections::BTreeSet<String> =
            unsatisfiable.values().map(|spec| spec.to_string()).collect();
        let introduced = current.difference(&previous).count();
        let repeated = current == *conflicts.last_reported();
        log::debug!(
            "Conflicts changed by {:?}",
            current.symmetric_difference(&previous).collect::<Vec<_>>()
        );

        // python changes cascade through the whole environment; free it last
        if introduced > 1 && unsatisfiable.shift_remove("python").is_some() {
            log::debug!("Deferring python conflict while other packages conflict");
        }

        // nothing new to free means the next request would be the same one
        if repeated || introduced == 0 || introduced >= DIVERGENCE_THRESHOLD {
            return Err(SolveError::Unsatisfiable {
                message: failure.message().to_string(),
                allow_retry: false,
            });
        }

        log::debug!(
            "Attempt failed with {} conflicts:\n{}",
            unsatisfiable.len(),
            failure.message()
        );
        conflicts.set_last_reported(current);
        conflicts.merge(unsatisfiable);
        Ok(ConflictDecision::Retry)
    }
}
