//! Version constraints

mod operator;
mod version_spec;

pub use operator::{InvalidOperatorError, Operator};
pub use version_spec::{LogicalOperator, VersionSpec, VersionSpecError};
