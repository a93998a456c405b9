use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use ratchet_spec::MatchSpec;

use super::classifier::{ConflictClassifier, ConflictDecision};
use super::compiler::RequestCompiler;
use super::engine::{SolverEngine, SolverFailure, SolverTask};
use super::notifier::{OutdatedNotice, OutdatedNotifier};
use super::solution::order_records;
use crate::config::SolverConfig;
use crate::error::{Result, SolveError};
use crate::package::{PackageRecord, RecordCache, VirtualPackage};
use crate::repository::Index;
use crate::state::{AttemptState, ConflictSet, EnvironmentState};

/// Result of a successful resolution
#[derive(Debug, Clone, Default)]
pub struct SolveOutcome {
    /// Final records, dependencies first
    pub records: Vec<PackageRecord>,
    /// History specs that had to be relaxed, by name
    pub neutered: IndexMap<String, MatchSpec>,
    /// Specs to record in the environment history
    pub for_history: IndexMap<String, MatchSpec>,
    /// Number of solver engine calls
    pub attempts: usize,
    pub outdated: Option<OutdatedNotice>,
}

enum LoopState {
    Attempting(usize),
    Success,
    ExhaustedRetry(usize),
    Fatal(SolveError),
}

/// Iterative, conflict-driven resolution of an environment's final state
pub struct Solver {
    engine: Arc<dyn SolverEngine>,
    index: Arc<dyn Index>,
    config: SolverConfig,
    classifier: ConflictClassifier,
}

impl Solver {
    pub fn new(engine: Arc<dyn SolverEngine>, index: Arc<dyn Index>, config: SolverConfig) -> Self {
        Self {
            engine,
            index,
            config,
            classifier: ConflictClassifier::default(),
        }
    }

    /// Use a different conflict classifier, e.g. for another engine's diagnostics
    pub fn with_classifier(mut self, classifier: ConflictClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Attempts before installed packages are unfrozen
    pub fn max_attempts(&self, env: &EnvironmentState) -> usize {
        self.config.max_attempts_for(env.installed.len())
    }

    /// Blocking wrapper around [`Solver::solve_final_state_async`].
    ///
    /// Must not be called from within a tokio runtime.
    pub fn solve_final_state(&self, env: &EnvironmentState, cache: &mut RecordCache) -> Result<SolveOutcome> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(SolveError::Runtime(
                "solve_final_state called inside an async runtime; use solve_final_state_async".to_string(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.solve_final_state_async(env, cache))
    }

    /// Resolve the final set of records for `env`.
    ///
    /// Each failed attempt is classified; newly conflicting packages are freed
    /// and the request is compiled again. Once the attempt budget is spent,
    /// every installed manageable package is unfrozen for one last attempt.
    pub async fn solve_final_state_async(
        &self,
        env: &EnvironmentState,
        cache: &mut RecordCache,
    ) -> Result<SolveOutcome> {
        let started = Instant::now();
        cache.clear();

        let compiler = RequestCompiler::new(env, self.config.compiler_policy());
        compiler.validate()?;

        if let Some(outcome) = self.early_exit(env)? {
            return Ok(outcome);
        }
        self.check_pin_conflicts(env).await?;

        let budget = self.max_attempts(env);
        let virtual_packages = if env.virtual_packages.is_empty() {
            VirtualPackage::detect_host()
        } else {
            env.virtual_packages.clone()
        };

        let mut conflicts = ConflictSet::new();
        let mut attempt = AttemptState::new(env);
        let mut state = LoopState::Attempting(1);

        loop {
            state = match state {
                LoopState::Attempting(n) => {
                    log::debug!("Starting solver attempt {} of {}", n, budget);
                    match self
                        .run_attempt(&compiler, &mut attempt, &conflicts, cache, &virtual_packages)
                        .await?
                    {
                        Ok(records) => {
                            conflicts.clear();
                            attempt.set_solution(records);
                            LoopState::Success
                        }
                        Err(failure) => match self.classifier.classify(&failure, &mut conflicts, self.index.channels()) {
                            Err(e) => LoopState::Fatal(e),
                            Ok(ConflictDecision::Retry) if n < budget => {
                                attempt = attempt.next_attempt();
                                LoopState::Attempting(n + 1)
                            }
                            Ok(_) => LoopState::ExhaustedRetry(n),
                        },
                    }
                }
                LoopState::ExhaustedRetry(n) => {
                    log::debug!("No solution after {} attempts, unfreezing installed packages", n);
                    conflicts.unfreeze(env.installed.values().filter(|installed| installed.manageable));
                    attempt = attempt.next_attempt();
                    match self
                        .run_attempt(&compiler, &mut attempt, &conflicts, cache, &virtual_packages)
                        .await?
                    {
                        Ok(records) => {
                            conflicts.clear();
                            attempt.set_solution(records);
                            LoopState::Success
                        }
                        Err(failure) => match self.classifier.classify(&failure, &mut conflicts, self.index.channels()) {
                            Err(e) => LoopState::Fatal(e),
                            Ok(_) => LoopState::Fatal(SolveError::Unsatisfiable {
                                message: failure.message().to_string(),
                                allow_retry: false,
                            }),
                        },
                    }
                }
                LoopState::Success => break,
                LoopState::Fatal(e) => return Err(e),
            };
        }

        let attempts = attempt.number();
        let records = order_records(attempt.take_solution().unwrap_or_default());
        let outdated = if self.config.notify_outdated {
            OutdatedNotifier::new(self.config.self_package.as_str(), self.config.channel_alias.clone())
                .check(self.index.as_ref(), &records, env)
                .await
        } else {
            None
        };

        log::info!(
            "Solved environment in {} attempt(s) ({:.2}s): {} packages",
            attempts,
            started.elapsed().as_secs_f64(),
            records.len()
        );

        Ok(SolveOutcome {
            records,
            neutered: attempt.neutered,
            for_history: attempt.for_history,
            attempts,
            outdated,
        })
    }

    async fn run_attempt(
        &self,
        compiler: &RequestCompiler<'_>,
        attempt: &mut AttemptState,
        conflicts: &ConflictSet,
        cache: &mut RecordCache,
        virtual_packages: &[VirtualPackage],
    ) -> Result<std::result::Result<Vec<PackageRecord>, SolverFailure>> {
        let request = compiler.compile(attempt, conflicts, cache)?;
        let task = SolverTask {
            request,
            repos: self.index.repos(),
            virtual_packages: virtual_packages.to_vec(),
            channel_priority: self.config.channel_priority.solver_mode(),
        };
        Ok(self.engine.solve(task).await)
    }

    /// Outcomes decided without calling the engine
    fn early_exit(&self, env: &EnvironmentState) -> Result<Option<SolveOutcome>> {
        if env.is_removing {
            let missing: Vec<String> = env
                .requested_specs()
                .filter(|spec| env.installed_matching(spec).next().is_none())
                .map(|spec| spec.to_string())
                .collect();
            if !missing.is_empty() {
                log::debug!("Cannot remove packages that are not installed: {:?}", missing);
                return Err(SolveError::PackagesNotFound {
                    specs: missing,
                    channels: self.index.channels().iter().map(|c| c.to_string()).collect(),
                });
            }
        } else if env.requested.is_empty() && env.installed.is_empty() {
            log::debug!("Nothing requested for an empty environment");
            return Ok(Some(SolveOutcome::default()));
        }
        Ok(None)
    }

    /// Fail when a requested spec only has candidates a qualified pin forbids
    async fn check_pin_conflicts(&self, env: &EnvironmentState) -> Result<()> {
        if env.is_removing {
            return Ok(());
        }
        let pins = env.effective_pins();
        for spec in env.requested_specs() {
            let Some(pin) = pins.get(spec.name()).filter(|pin| !pin.is_name_only()) else {
                continue;
            };
            let candidates = self.index.search(spec).await;
            if !candidates.is_empty() && !candidates.iter().any(|candidate| pin.matches(candidate)) {
                log::debug!("Requested spec {} conflicts with pin {}", spec, pin);
                return Err(SolveError::PinConflict {
                    requested: spec.to_string(),
                    pin: pin.to_string(),
                });
            }
        }
        Ok(())
    }
}
