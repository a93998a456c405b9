//! Conda-style package match specs
//!
//! This crate provides version parsing and ordering, version spec matching and
//! `MatchSpec` parsing for conda-style package metadata.

pub mod constraint;
mod match_spec;
mod string_matcher;
mod version;

pub use constraint::{LogicalOperator, Operator, VersionSpec, VersionSpecError};
pub use match_spec::{validate_package_name, MatchSpec, Matchable, SpecParseError};
pub use string_matcher::{PatternError, StringMatcher};
pub use version::{Version, VersionParseError};
