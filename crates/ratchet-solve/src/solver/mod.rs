//! Iterative, conflict-driven solving loop.
//!
//! An external [`SolverEngine`] is called repeatedly. Every failure is
//! classified into the packages that block a solution; those packages are
//! freed from their installed versions and the request is compiled again.
//!
//! # Architecture
//!
//! - [`RequestCompiler`]: turns environment state and conflicts into a [`SolverRequest`]
//! - [`SolverEngine`]: the constraint solver called once per attempt
//! - [`ConflictClassifier`]: maps an engine failure to new conflicts or a final error
//! - [`Solver`]: the bounded attempt loop tying the above together
//!
//! # Attempt loop
//!
//! 1. Compile a request; user-installed packages are locked to what is installed
//! 2. Solve; on success the solution is ordered dependencies-first
//! 3. On failure, merge the reported conflicts and go back to 1
//! 4. When the attempt budget is spent, unfreeze everything for one last attempt
//!
//! # Example
//!
//! ```ignore
//! use ratchet_solve::solver::Solver;
//!
//! let solver = Solver::new(engine, index, SolverConfig::default());
//! let mut cache = RecordCache::new();
//! let outcome = solver.solve_final_state(&env, &mut cache)?;
//! for record in &outcome.records {
//!     println!("{}", record.dist_str());
//! }
//! ```

mod classifier;
mod compiler;
mod engine;
mod notifier;
mod request;
mod solution;
mod solver;

#[cfg(test)]
mod tests;

pub use classifier::{ConflictClassifier, ConflictDecision, DiagnosticClassifier, TextDiagnosticClassifier};
pub use compiler::{neuter, CompilerPolicy, RequestCompiler};
pub use engine::{ConflictKind, ConflictReport, PriorityMode, SolverEngine, SolverFailure, SolverTask};
pub use notifier::{OutdatedNotice, OutdatedNotifier};
pub use request::SolverRequest;
pub use solution::order_records;
pub use solver::{SolveOutcome, Solver};
