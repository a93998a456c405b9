pub mod config;
pub mod error;
pub mod package;
pub mod repository;
pub mod solver;
pub mod state;

pub use config::{ChannelPriority, SolverConfig};
pub use error::{Result, SolveError};
pub use package::{InstalledRecord, PackageRecord, RecordCache, VirtualPackage};
pub use repository::{Channel, InMemoryIndex, Index, RepoHandle};
pub use solver::{
    ConflictClassifier, SolveOutcome, Solver, SolverEngine, SolverFailure, SolverRequest, SolverTask,
};
pub use state::{EnvironmentState, UpdateModifier};
