//! Solver configuration
//!
//! Values are merged from several sources, highest priority first:
//!
//! 1. Environment variables (`RATCHET_*`)
//! 2. The environment's `<prefix>/ratchet.json` (`"solver"` section)
//! 3. Global `<RATCHET_HOME>/config.json` (`"solver"` section)
//! 4. Built-in defaults
//!
//! # Example
//!
//! ```rust,no_run
//! use ratchet_solve::config::SolverConfig;
//! use std::path::Path;
//!
//! let config = SolverConfig::build(Some(Path::new("/opt/envs/data")), true).unwrap();
//! println!("Attempt budget for 12 installed packages: {}", config.max_attempts_for(12));
//! ```

mod config;
mod source;

pub use config::{ChannelPriority, SolverConfig};
pub use source::{ConfigLoader, ConfigSource, RawConfig, PROJECT_CONFIG_FILE};
