//! Attempt loop scenarios against a scripted solver engine
//!
//! The engine replays canned responses in order and records every task it
//! receives, so each test can check both the outcome and what each attempt
//! asked for.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ratchet_spec::{MatchSpec, Version};
use url::Url;

use super::*;
use crate::config::{ChannelPriority, SolverConfig};
use crate::error::SolveError;
use crate::package::{InstalledRecord, PackageRecord, RecordCache, VirtualPackage};
use crate::repository::{Channel, InMemoryIndex};
use crate::state::{EnvironmentState, EnvironmentStateBuilder, UpdateModifier};

type Response = std::result::Result<Vec<PackageRecord>, SolverFailure>;

/// Replays canned engine responses
struct ScriptedEngine {
    responses: Mutex<VecDeque<Response>>,
    tasks: Mutex<Vec<SolverTask>>,
}

impl ScriptedEngine {
    fn new(responses: Vec<Response>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            tasks: Mutex::new(Vec::new()),
        })
    }

    fn tasks(&self) -> Vec<SolverTask> {
        self.tasks.lock().unwrap().clone()
    }

    fn calls(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

#[async_trait]
impl SolverEngine for ScriptedEngine {
    async fn solve(&self, task: SolverTask) -> Response {
        self.tasks.lock().unwrap().push(task);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SolverFailure::Diagnostic("script exhausted".to_string())))
    }
}

/// Helper to create a record with a given name and version
fn rec(name: &str, version: &str) -> PackageRecord {
    PackageRecord::new(name, Version::parse(version).unwrap(), "0")
}

/// Helper to create a record with dependencies
fn rec_with_deps(name: &str, version: &str, depends: &[&str]) -> PackageRecord {
    rec(name, version).with_depends(depends.iter().copied())
}

/// A failure naming conflicting packages directly
fn conflict(kind: ConflictKind, specs: &[&str]) -> Response {
    Err(SolverFailure::Structured {
        message: format!("conflicts: {}", specs.join(", ")),
        reports: specs
            .iter()
            .map(|spec| ConflictReport::new(kind, MatchSpec::parse(spec).unwrap()))
            .collect(),
    })
}

fn diagnostic(lines: &[&str]) -> Response {
    Err(SolverFailure::Diagnostic(lines.join("\n")))
}

fn index() -> Arc<InMemoryIndex> {
    let alias = Url::parse("https://conda.anaconda.org/").unwrap();
    let mut index = InMemoryIndex::new();
    index.add_repo(
        Channel::parse("conda-forge", &alias).unwrap(),
        "linux-64",
        vec![
            rec("a", "1.0"),
            rec("a", "1.5"),
            rec("b", "2.0"),
            rec("b", "3.2"),
            rec("numpy", "1.24.0"),
            rec("numpy", "1.26.0"),
            rec("python", "3.11.4"),
            rec("python", "3.12.0"),
            rec("ratchet", "1.0"),
            rec("ratchet", "2.0"),
        ],
    );
    Arc::new(index)
}

fn quiet_config() -> SolverConfig {
    let mut config = SolverConfig::default();
    config.notify_outdated = false;
    config
}

fn solver(engine: &Arc<ScriptedEngine>, config: SolverConfig) -> Solver {
    Solver::new(engine.clone(), index(), config)
}

/// Environment builder with a fixed host so nothing is probed
fn env() -> EnvironmentStateBuilder {
    EnvironmentState::builder().virtual_package(VirtualPackage::new("__unix", Version::parse("0").unwrap(), "0"))
}

fn solved(records: &[PackageRecord]) -> Vec<String> {
    records.iter().map(|r| format!("{}@{}", r.name, r.version)).collect()
}

fn spec_strings(specs: &[MatchSpec]) -> Vec<String> {
    specs.iter().map(|s| s.to_string()).collect()
}

fn assert_disjoint(task: &SolverTask) {
    for locked in task.request.locked() {
        assert!(
            !task.request.is_pinned(&locked.name),
            "{} is both locked and pinned",
            locked.name
        );
    }
}

// ============================================================================
// End-to-end Scenarios
// ============================================================================

#[tokio::test]
async fn test_conflicting_history_is_neutered() {
    let engine = ScriptedEngine::new(vec![
        diagnostic(&[
            "Cannot solve the request because of: a 1.0 is locked, but another version is required as reported above",
            "└─ b >=3.0 cannot be installed because there are no viable options:",
        ]),
        Ok(vec![rec_with_deps("a", "1.5", &["b >=3"]), rec("b", "3.2")]),
    ]);
    let env = env()
        .installed(rec_with_deps("a", "1.0", &["b <3"]))
        .installed(rec("b", "2.0"))
        .history("a ==1.0")
        .request("b >=3.0")
        .build()
        .unwrap();

    let outcome = solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 2);
    assert_eq!(solved(&outcome.records), vec!["b@3.2", "a@1.5"]);
    assert_eq!(outcome.neutered["a"].to_string(), "a 1.0.*");
    assert_eq!(outcome.for_history["b"].to_string(), "b >=3.0");

    let tasks = engine.tasks();
    assert!(tasks[0].request.is_locked("a"));
    assert_eq!(spec_strings(tasks[0].request.specs()), vec!["b >=3.0", "a ==1.0"]);
    assert!(!tasks[1].request.is_locked("a"));
    assert_eq!(spec_strings(tasks[1].request.specs()), vec!["b >=3.0", "a 1.0.*"]);
}

#[tokio::test]
async fn test_missing_package_is_not_retried() {
    let engine = ScriptedEngine::new(vec![diagnostic(&[
        "Cannot solve the request because of: No candidates were found for does-not-exist",
    ])]);
    let env = env().request("does-not-exist").build().unwrap();

    let result = solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await;

    match result {
        Err(SolveError::PackagesNotFound { specs, channels }) => {
            assert_eq!(specs, vec!["does-not-exist".to_string()]);
            assert_eq!(channels, vec!["conda-forge".to_string()]);
        }
        other => panic!("expected PackagesNotFound, got {:?}", other),
    }
    assert_eq!(engine.calls(), 1);
}

// ============================================================================
// Loop Properties
// ============================================================================

fn three_locked_env() -> EnvironmentState {
    env()
        .installed(rec("a", "1.0"))
        .installed(rec("b", "1.0"))
        .installed(rec("c", "1.0"))
        .history("a ==1.0")
        .history("b ==1.0")
        .history("c ==1.0")
        .request("d")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_converges_as_conflicts_grow() {
    let engine = ScriptedEngine::new(vec![
        conflict(ConflictKind::Locked, &["a 1.0"]),
        conflict(ConflictKind::Locked, &["b 1.0"]),
        Ok(vec![rec("a", "1.0"), rec("b", "1.0"), rec("c", "1.0"), rec("d", "1.0")]),
    ]);
    let env = three_locked_env();
    let mut cache = RecordCache::new();

    let outcome = solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut cache)
        .await
        .unwrap();
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.records.len(), 4);

    // A freed package never gets locked again
    let tasks = engine.tasks();
    let locked: Vec<Vec<&str>> = tasks
        .iter()
        .map(|task| task.request.locked().iter().map(|r| r.name.as_str()).collect())
        .collect();
    assert_eq!(locked, vec![vec!["a", "b", "c"], vec!["b", "c"], vec!["c"]]);

    // Each installed record was converted once per resolution
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.hits(), 3);
}

#[tokio::test]
async fn test_repeated_conflicts_are_final() {
    let engine = ScriptedEngine::new(vec![
        conflict(ConflictKind::Locked, &["a 1.0"]),
        conflict(ConflictKind::Locked, &["a 1.0"]),
    ]);
    let env = three_locked_env();

    let err = solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await
        .unwrap_err();

    match &err {
        SolveError::Unsatisfiable { message, allow_retry } => {
            assert_eq!(message, "conflicts: a 1.0");
            assert!(!allow_retry);
        }
        other => panic!("expected Unsatisfiable, got {:?}", other),
    }
    assert!(!err.allow_retry());
    assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn test_oscillating_conflicts_stop_without_repeating_a_request() {
    let engine = ScriptedEngine::new(vec![
        conflict(ConflictKind::Locked, &["a 1.0"]),
        conflict(ConflictKind::Locked, &["b 1.0"]),
        conflict(ConflictKind::Locked, &["b 1.0"]),
        conflict(ConflictKind::Locked, &["b 1.0"]),
    ]);
    let env = three_locked_env();
    let mut config = quiet_config();
    config.max_attempts = Some(6);

    let err = solver(&engine, config)
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await
        .unwrap_err();

    match err {
        SolveError::Unsatisfiable { message, allow_retry } => {
            assert_eq!(message, "conflicts: b 1.0");
            assert!(!allow_retry);
        }
        other => panic!("expected Unsatisfiable, got {:?}", other),
    }
    assert_eq!(engine.calls(), 3);
    let tasks = engine.tasks();
    assert_ne!(spec_strings(tasks[1].request.specs()), spec_strings(tasks[2].request.specs()));
}

#[tokio::test]
async fn test_diverging_conflicts_are_final() {
    let many: Vec<String> = (0..10).map(|i| format!("pkg{} 1.0", i)).collect();
    let many: Vec<&str> = many.iter().map(String::as_str).collect();
    let engine = ScriptedEngine::new(vec![conflict(ConflictKind::NoViableOptions, &many)]);
    let env = three_locked_env();

    let result = solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await;
    assert!(matches!(result, Err(SolveError::Unsatisfiable { .. })));
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_neutered_spec_reused_across_attempts() {
    let engine = ScriptedEngine::new(vec![
        conflict(ConflictKind::Locked, &["a 1.0"]),
        conflict(ConflictKind::Locked, &["b 1.0"]),
        Ok(vec![rec("a", "1.0")]),
    ]);
    let env = three_locked_env();

    let outcome = solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await
        .unwrap();

    let tasks = engine.tasks();
    for task in &tasks[1..] {
        assert!(task.request.specs().iter().any(|s| s.to_string() == "a 1.0.*"));
    }
    assert_eq!(spec_strings(tasks[2].request.specs()), vec!["d", "a 1.0.*", "b 1.0.*", "c ==1.0"]);
    assert_eq!(outcome.neutered.len(), 2);
}

#[tokio::test]
async fn test_python_freed_last() {
    let engine = ScriptedEngine::new(vec![
        conflict(ConflictKind::Locked, &["python 3.11.4", "numpy 1.24.0"]),
        Ok(vec![rec("python", "3.11.4"), rec("numpy", "1.26.0")]),
    ]);
    let env = env()
        .installed(rec("python", "3.11.4"))
        .installed(rec("numpy", "1.24.0"))
        .history("python")
        .history("numpy")
        .request("pandas")
        .build()
        .unwrap();

    solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await
        .unwrap();

    let tasks = engine.tasks();
    assert!(tasks[1].request.is_locked("python"));
    assert!(!tasks[1].request.is_locked("numpy"));
    assert!(spec_strings(tasks[1].request.constraints()).contains(&"python 3.11.*".to_string()));
}

// ============================================================================
// Unfreezing
// ============================================================================

#[tokio::test]
async fn test_unfreeze_after_budget() {
    let engine = ScriptedEngine::new(vec![
        diagnostic(&["the engine gave up"]),
        Ok(vec![rec("a", "1.5"), rec("c", "1.0")]),
    ]);
    let env = env()
        .installed(rec("a", "1.0"))
        .installed(InstalledRecord::new(rec("conda", "24.1")).unmanageable())
        .history("a ==1.0")
        .history("conda")
        .request("c")
        .build()
        .unwrap();
    let mut config = quiet_config();
    config.max_attempts = Some(1);

    let outcome = solver(&engine, config)
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 2);
    let tasks = engine.tasks();
    assert!(tasks[0].request.is_locked("a"));
    assert!(!tasks[1].request.is_locked("a"));
    assert!(tasks[1].request.is_locked("conda"));
    assert_eq!(outcome.neutered["a"].to_string(), "a 1.0.*");
}

#[tokio::test]
async fn test_unfreeze_failure_is_final() {
    let engine = ScriptedEngine::new(vec![
        diagnostic(&["the engine gave up"]),
        diagnostic(&["the engine gave up again"]),
    ]);
    let env = three_locked_env();
    let mut config = quiet_config();
    config.max_attempts = Some(1);

    let err = solver(&engine, config)
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await
        .unwrap_err();

    match err {
        SolveError::Unsatisfiable { message, allow_retry } => {
            assert_eq!(message, "the engine gave up again");
            assert!(!allow_retry);
        }
        other => panic!("expected Unsatisfiable, got {:?}", other),
    }
    assert_eq!(engine.calls(), 2);
}

// ============================================================================
// Early Exits
// ============================================================================

#[tokio::test]
async fn test_malformed_spec_rejected_before_solving() {
    let engine = ScriptedEngine::new(vec![]);
    let mut env = env().request("numpy").build().unwrap();
    env.history.insert("pkgs/main".to_string(), MatchSpec::parse("numpy").unwrap());

    let result = solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await;
    assert!(matches!(result, Err(SolveError::MalformedSpec(_))));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_removing_missing_package() {
    let engine = ScriptedEngine::new(vec![]);
    let env = env()
        .installed(rec("bar", "1.0"))
        .request("foo")
        .removing(true)
        .build()
        .unwrap();

    let result = solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await;
    match result {
        Err(SolveError::PackagesNotFound { specs, .. }) => assert_eq!(specs, vec!["foo".to_string()]),
        other => panic!("expected PackagesNotFound, got {:?}", other),
    }
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_empty_request_on_empty_environment() {
    let engine = ScriptedEngine::new(vec![]);
    let env = env().build().unwrap();

    let outcome = solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await
        .unwrap();
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.attempts, 0);
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_pin_conflict() {
    let engine = ScriptedEngine::new(vec![Ok(vec![rec("numpy", "1.24.0")])]);
    let builder = || {
        env()
            .installed(rec("numpy", "1.24.0"))
            .pin("numpy 1.24.*")
            .request("numpy >=1.25")
    };

    let result = solver(&engine, quiet_config())
        .solve_final_state_async(&builder().build().unwrap(), &mut RecordCache::new())
        .await;
    match result {
        Err(SolveError::PinConflict { requested, pin }) => {
            assert_eq!(requested, "numpy >=1.25");
            assert_eq!(pin, "numpy 1.24.*");
        }
        other => panic!("expected PinConflict, got {:?}", other),
    }
    assert_eq!(engine.calls(), 0);

    // Ignored pins cannot conflict
    let env = builder().ignore_pinned(true).build().unwrap();
    let outcome = solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await;
    assert!(outcome.is_ok());
}

// ============================================================================
// Removal, Pins and Modifiers
// ============================================================================

#[tokio::test]
async fn test_removal_excludes_package() {
    let engine = ScriptedEngine::new(vec![Ok(vec![rec("bar", "1.0")])]);
    let env = env()
        .installed(rec("foo", "1.0"))
        .installed(rec("bar", "1.0"))
        .history("foo")
        .history("bar")
        .request("foo")
        .removing(true)
        .build()
        .unwrap();

    let outcome = solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await
        .unwrap();
    assert_eq!(solved(&outcome.records), vec!["bar@1.0"]);
    assert!(outcome.for_history.is_empty());

    let task = &engine.tasks()[0];
    assert_eq!(spec_strings(task.request.constraints()), vec!["foo <0.0.0a0"]);
    assert!(!task.request.has_spec_for("foo"));
    assert!(!task.request.is_locked("foo"));
    assert!(!task.request.is_pinned("foo"));
}

#[tokio::test]
async fn test_pins_and_locks_stay_disjoint() {
    let engine = ScriptedEngine::new(vec![
        conflict(ConflictKind::Locked, &["b 1.0"]),
        Ok(vec![rec("a", "1.0"), rec("b", "1.1")]),
    ]);
    let env = env()
        .installed(rec("a", "1.0"))
        .installed(rec("b", "1.0"))
        .installed(rec("c", "1.0"))
        .history("a")
        .history("b ==1.0")
        .pin("a")
        .do_not_remove("c")
        .request("d")
        .update_modifier(UpdateModifier::FreezeInstalled)
        .build()
        .unwrap();

    solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await
        .unwrap();

    let tasks = engine.tasks();
    assert_eq!(tasks.len(), 2);
    tasks.iter().for_each(assert_disjoint);
    assert!(tasks[0].request.is_pinned("a"));
    assert!(tasks[0].request.is_pinned("b"));
    assert!(!tasks[1].request.is_pinned("b"));
    assert!(tasks[1].request.is_pinned("c"));
}

#[tokio::test]
async fn test_update_all_keeps_packages_installed() {
    let engine = ScriptedEngine::new(vec![Ok(vec![rec("a", "1.5")])]);
    let env = env()
        .installed(rec("a", "1.0"))
        .history("a")
        .request("b")
        .update_modifier(UpdateModifier::UpdateAll)
        .build()
        .unwrap();

    solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await
        .unwrap();

    let task = &engine.tasks()[0];
    assert!(task.request.locked().is_empty());
    assert!(task.request.pinned().is_empty());
    assert_eq!(spec_strings(task.request.specs()), vec!["b", "a"]);
}

// ============================================================================
// Engine Input and Output
// ============================================================================

#[tokio::test]
async fn test_task_carries_priority_and_host() {
    let engine = ScriptedEngine::new(vec![Ok(vec![]), Ok(vec![])]);
    let env = env().request("numpy").build().unwrap();

    let mut config = quiet_config();
    config.channel_priority = ChannelPriority::Strict;
    solver(&engine, config)
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await
        .unwrap();
    solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await
        .unwrap();

    let tasks = engine.tasks();
    assert_eq!(tasks[0].channel_priority, PriorityMode::Strict);
    assert_eq!(tasks[1].channel_priority, PriorityMode::Disabled);
    assert_eq!(tasks[0].virtual_packages.len(), 1);
    assert_eq!(tasks[0].virtual_packages[0].name, "__unix");
    assert_eq!(tasks[0].repos.len(), 1);
}

#[tokio::test]
async fn test_outdated_notice() {
    let env = env()
        .installed(rec("ratchet", "1.0"))
        .request("numpy")
        .build()
        .unwrap();

    let engine = ScriptedEngine::new(vec![Ok(vec![rec("numpy", "1.26.0")]), Ok(vec![rec("numpy", "1.26.0")])]);
    let outcome = solver(&engine, SolverConfig::default())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await
        .unwrap();
    let notice = outcome.outdated.unwrap();
    assert_eq!(notice.package, "ratchet");
    assert_eq!(notice.latest.as_str(), "2.0");

    let outcome = solver(&engine, quiet_config())
        .solve_final_state_async(&env, &mut RecordCache::new())
        .await
        .unwrap();
    assert!(outcome.outdated.is_none());
}

#[test]
fn test_blocking_solve() {
    let engine = ScriptedEngine::new(vec![Ok(vec![rec("numpy", "1.26.0")])]);
    let env = env().request("numpy").build().unwrap();

    let outcome = solver(&engine, quiet_config())
        .solve_final_state(&env, &mut RecordCache::new())
        .unwrap();
    assert_eq!(solved(&outcome.records), vec!["numpy@1.26.0"]);
    assert_eq!(outcome.attempts, 1);
}

#[tokio::test]
async fn test_blocking_solve_inside_runtime() {
    let engine = ScriptedEngine::new(vec![]);
    let env = env().request("numpy").build().unwrap();

    let result = solver(&engine, quiet_config()).solve_final_state(&env, &mut RecordCache::new());
    assert!(matches!(result, Err(SolveError::Runtime(_))));
    assert_eq!(engine.calls(), 0);
}
