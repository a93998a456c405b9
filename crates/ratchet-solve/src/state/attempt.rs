use indexmap::IndexMap;
use ratchet_spec::MatchSpec;

use super::environment::EnvironmentState;
use crate::package::PackageRecord;

/// Working copy for a single solver attempt.
///
/// A failed attempt is superseded by [`AttemptState::next_attempt`], which keeps
/// the accumulated bookkeeping but never the partial solution.
#[derive(Debug, Clone)]
pub struct AttemptState {
    number: usize,
    /// Known records by name: the installed set, replaced by the solution on success
    pub records: IndexMap<String, PackageRecord>,
    /// Specs to record in the environment history on success
    pub for_history: IndexMap<String, MatchSpec>,
    /// History specs relaxed because they conflicted
    pub neutered: IndexMap<String, MatchSpec>,
    pub pins: IndexMap<String, MatchSpec>,
    solution: Option<Vec<PackageRecord>>,
}

impl AttemptState {
    pub fn new(env: &EnvironmentState) -> Self {
        let records = env
            .installed
            .iter()
            .map(|(name, installed)| (name.clone(), installed.record.clone()))
            .collect();

        let for_history = if env.is_removing {
            IndexMap::new()
        } else {
            env.requested
                .iter()
                .filter_map(|(name, specs)| specs.last().map(|spec| (name.clone(), spec.clone())))
                .collect()
        };

        Self {
            number: 1,
            records,
            for_history,
            neutered: IndexMap::new(),
            pins: env.effective_pins(),
            solution: None,
        }
    }

    /// 1-based attempt number
    pub fn number(&self) -> usize {
        self.number
    }

    /// State for the following attempt
    pub fn next_attempt(&self) -> Self {
        Self {
            number: self.number + 1,
            records: self.records.clone(),
            for_history: self.for_history.clone(),
            neutered: self.neutered.clone(),
            pins: self.pins.clone(),
            solution: None,
        }
    }

    pub fn set_solution(&mut self, records: Vec<PackageRecord>) {
        self.records = records
            .iter()
            .map(|record| (record.name.clone(), record.clone()))
            .collect();
        self.solution = Some(records);
    }

    pub fn solution(&self) -> Option<&[PackageRecord]> {
        self.solution.as_deref()
    }

    pub fn take_solution(&mut self) -> Option<Vec<PackageRecord>> {
        self.solution.take()
    }
}
