//! Compiles environment state into the solver request for one attempt

use std::collections::HashSet;

use indexmap::IndexSet;
use ratchet_spec::{validate_package_name, MatchSpec, SpecParseError, VersionSpec};

use super::request::SolverRequest;
use crate::error::Result;
use crate::package::RecordCache;
use crate::state::{AttemptState, ConflictSet, EnvironmentState, UpdateModifier};

/// Tunable compiler behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerPolicy {
    /// Constrain an installed, unrequested python to its installed `X.Y.*`
    pub constrain_python_minor: bool,
    /// When the request changes python, stop freezing installed packages built
    /// against it
    pub unlock_python_dependents: bool,
}

impl Default for CompilerPolicy {
    fn default() -> Self {
        Self {
            constrain_python_minor: true,
            unlock_python_dependents: true,
        }
    }
}

/// Relax a history spec by one step.
///
/// A build string is dropped first; otherwise `==V` widens to `V.*`. Other
/// ranges are returned unchanged.
pub fn neuter(spec: &MatchSpec) -> MatchSpec {
    if spec.build().is_some() {
        return spec.without_build();
    }
    match spec.version().and_then(|v| v.exact_version()) {
        Some(exact) => spec.with_version(VersionSpec::starts_with(exact.clone())),
        None if spec.version().is_none() => spec.to_name_only(),
        None => spec.clone(),
    }
}

/// Builds a [`SolverRequest`] from an environment, the running attempt's
/// bookkeeping and the current conflicts
pub struct RequestCompiler<'a> {
    env: &'a EnvironmentState,
    policy: CompilerPolicy,
}

impl<'a> RequestCompiler<'a> {
    pub fn new(env: &'a EnvironmentState, policy: CompilerPolicy) -> Self {
        Self { env, policy }
    }

    /// Reject requested, history and pin specs whose names cannot be package names
    pub fn validate(&self) -> Result<()> {
        let requested = self
            .env
            .requested
            .iter()
            .flat_map(|(key, specs)| specs.iter().map(move |spec| (key, spec)));
        let recorded = self.env.history.iter().chain(self.env.pinned.iter());

        for (key, spec) in requested.chain(recorded) {
            let invalid = |reason: String| SpecParseError::InvalidName {
                spec: spec.to_string(),
                name: key.clone(),
                reason,
            };
            validate_package_name(key).map_err(invalid)?;
            validate_package_name(spec.name()).map_err(invalid)?;
            if key != spec.name() {
                return Err(invalid(format!("spec is listed under \"{}\"", key)).into());
            }
        }
        Ok(())
    }

    pub fn compile(
        &self,
        attempt: &mut AttemptState,
        conflicts: &ConflictSet,
        cache: &mut RecordCache,
    ) -> Result<SolverRequest> {
        self.validate()?;

        let mut request = SolverRequest::new();
        let removed = self.compile_removals(&mut request)?;
        let unlocked = self.python_dependents_to_unlock();

        for name in self.implicated_names(attempt) {
            if removed.contains(&name) {
                continue;
            }
            self.compile_name(&name, attempt, conflicts, cache, &unlocked, &mut request)?;
        }

        if !self.env.is_removing {
            for spec in self.env.requested_specs().filter(|spec| spec.has_glob_name()) {
                request.add_spec(spec.clone());
            }
        }

        log::debug!(
            "Attempt {} request: {} specs, {} constraints, {} locked, {} pinned",
            attempt.number(),
            request.specs().len(),
            request.constraints().len(),
            request.locked().len(),
            request.pinned().len()
        );
        Ok(request)
    }

    /// Requested names, then known records, history and pins, deduplicated
    fn implicated_names(&self, attempt: &AttemptState) -> IndexSet<String> {
        self.env
            .requested
            .iter()
            .filter(|(_, specs)| specs.iter().all(|spec| !spec.has_glob_name()))
            .map(|(name, _)| name)
            .chain(attempt.records.keys())
            .chain(self.env.history.keys())
            .chain(attempt.pins.keys())
            .cloned()
            .collect()
    }

    /// Exclude every package a removal request names or matches
    fn compile_removals(&self, request: &mut SolverRequest) -> Result<HashSet<String>> {
        let mut removed = HashSet::new();
        if !self.env.is_removing {
            return Ok(removed);
        }

        for spec in self.env.requested_specs() {
            let names: Vec<String> = if spec.has_glob_name() {
                self.env
                    .installed_matching(spec)
                    .map(|record| record.name().to_string())
                    .collect()
            } else {
                vec![spec.name().to_string()]
            };
            for name in names {
                request.constrain(MatchSpec::excluding(&name)?);
                removed.insert(name);
            }
        }
        Ok(removed)
    }

    fn python_may_change(&self) -> bool {
        let Some(specs) = self.env.requested.get("python") else {
            return false;
        };
        match self.env.installed.get("python") {
            Some(installed) => specs.iter().any(|spec| !spec.matches(installed)),
            None => !specs.is_empty(),
        }
    }

    /// Installed, non-noarch packages built against python, when python may change
    fn python_dependents_to_unlock(&self) -> HashSet<String> {
        if !self.policy.unlock_python_dependents || !self.python_may_change() {
            return HashSet::new();
        }
        self.env
            .installed
            .values()
            .filter(|installed| {
                installed.record.noarch.is_none()
                    && (installed.record.depends_on("python") || installed.record.depends_on("python_abi"))
            })
            .map(|installed| installed.name().to_string())
            .collect()
    }

    fn compile_name(
        &self,
        name: &str,
        attempt: &mut AttemptState,
        conflicts: &ConflictSet,
        cache: &mut RecordCache,
        unlocked: &HashSet<String>,
        request: &mut SolverRequest,
    ) -> Result<()> {
        let env = self.env;
        let conflicting = conflicts.contains(name);
        let installed = env.installed.get(name);
        let requested = env.requested.get(name).filter(|specs| !specs.is_empty());
        let aggressive = env.aggressive_updates.contains(name);
        let pin = attempt.pins.get(name).cloned();

        // Pins bind whether or not the package conflicts
        let mut pinned_installed = false;
        let qualified_pin = match &pin {
            Some(pin) if pin.is_name_only() => {
                if let Some(installed) = installed {
                    request.pin(cache.solver_record(installed));
                    pinned_installed = true;
                }
                None
            }
            Some(pin) => {
                request.constrain(pin.clone());
                Some(pin)
            }
            None => None,
        };

        if !env.is_removing {
            if let Some(specs) = requested {
                for spec in specs {
                    match qualified_pin {
                        Some(pin) if spec.is_name_only() => request.add_spec(pin.clone()),
                        _ => request.add_spec(spec.clone()),
                    };
                }
            } else if aggressive {
                request.add_spec(MatchSpec::name_only(name)?);
            } else if let Some(history) = env.history.get(name) {
                let spec = self.history_spec(name, history, conflicting, attempt);
                request.add_spec(spec);
            }
        }

        if name == "python"
            && self.policy.constrain_python_minor
            && pin.is_none()
            && requested.is_none()
            && !aggressive
            && !conflicting
        {
            if let Some(installed) = installed {
                let minor = installed.record.version.truncate(2);
                request.constrain(MatchSpec::name_only(name)?.with_version(VersionSpec::starts_with(minor)));
            }
        }

        let user_installed = env.is_user_installed(name);
        let freeze = user_installed
            && !conflicting
            && requested.is_none()
            && !aggressive
            && !pinned_installed
            && !unlocked.contains(name);
        if let Some(installed) = installed.filter(|_| freeze) {
            match env.update_modifier {
                UpdateModifier::UpdateSpecs => {
                    request.lock(cache.solver_record(installed));
                }
                UpdateModifier::FreezeInstalled => {
                    request.pin(cache.solver_record(installed));
                }
                UpdateModifier::UpdateAll => {}
            }
        }

        // Keep user-installed packages in the environment
        if !env.is_removing && installed.is_some() && user_installed && !request.has_spec_for(name) {
            request.add_spec(MatchSpec::name_only(name)?);
        }

        Ok(())
    }

    /// The history spec to use for `name`, relaxed at most once per resolution
    fn history_spec(
        &self,
        name: &str,
        history: &MatchSpec,
        conflicting: bool,
        attempt: &mut AttemptState,
    ) -> MatchSpec {
        if let Some(neutered) = attempt.neutered.get(name) {
            return neutered.clone();
        }
        if !conflicting {
            return history.clone();
        }

        let relaxed = neuter(history);
        if relaxed != *history {
            log::debug!("Neutering history spec {} to {}", history, relaxed);
            attempt.neutered.insert(name.to_string(), relaxed.clone());
        }
        relaxed
    }
}
