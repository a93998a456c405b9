mod attempt;
mod conflicts;
mod environment;

pub use attempt::AttemptState;
pub use conflicts::ConflictSet;
pub use environment::{EnvironmentState, EnvironmentStateBuilder, UpdateModifier};
