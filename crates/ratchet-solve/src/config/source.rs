use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SolveError};

/// Name of the per-environment configuration file
pub const PROJECT_CONFIG_FILE: &str = "ratchet.json";

/// Represents the source of a configuration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Default built-in value
    Default,
    /// From global config (`<RATCHET_HOME>/config.json`)
    Global,
    /// From the environment's `ratchet.json`
    Project,
    /// From environment variable
    Environment(String),
    /// Set by the embedding application through `SolverConfig::set`
    Override,
}

impl ConfigSource {
    pub fn as_str(&self) -> &str {
        match self {
            ConfigSource::Default => "default",
            ConfigSource::Global => "global",
            ConfigSource::Project => "project",
            ConfigSource::Environment(var) => var,
            ConfigSource::Override => "override",
        }
    }
}

/// Raw configuration data that can be loaded from JSON files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver: Option<HashMap<String, serde_json::Value>>,
}

/// Loads configuration from various sources
#[derive(Debug)]
pub struct ConfigLoader {
    use_environment: bool,
}

impl ConfigLoader {
    pub fn new(use_environment: bool) -> Self {
        Self { use_environment }
    }

    /// Get RATCHET_* environment variable
    pub fn get_ratchet_env(&self, var: &str) -> Option<String> {
        if !self.use_environment {
            return None;
        }

        env::var(var).ok().filter(|s| !s.is_empty())
    }

    /// Get the ratchet home directory
    pub fn get_ratchet_home(&self) -> PathBuf {
        if let Some(home) = self.get_ratchet_env("RATCHET_HOME") {
            return PathBuf::from(home);
        }

        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "ratchet") {
            proj_dirs.config_dir().to_path_buf()
        } else if let Some(home_dir) = directories::BaseDirs::new() {
            home_dir.home_dir().join(".ratchet")
        } else {
            PathBuf::from(".ratchet")
        }
    }

    /// Load configuration from a JSON file
    pub fn load_config_file<P: AsRef<Path>>(&self, path: P) -> Result<RawConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(RawConfig::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| SolveError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: RawConfig = serde_json::from_str(&contents)
            .map_err(|e| SolveError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Load global configuration from `<RATCHET_HOME>/config.json`
    pub fn load_global_config(&self) -> Result<RawConfig> {
        let config_file = self.get_ratchet_home().join("config.json");
        self.load_config_file(config_file)
    }

    /// Load the environment-local configuration from `<prefix>/ratchet.json`
    pub fn load_project_config<P: AsRef<Path>>(&self, prefix: P) -> Result<RawConfig> {
        self.load_config_file(prefix.as_ref().join(PROJECT_CONFIG_FILE))
    }

    /// Environment variable name for a config key.
    /// Converts "foo-bar" to "RATCHET_FOO_BAR"
    pub fn env_var_name(key: &str) -> String {
        format!("RATCHET_{}", key.replace('-', "_").to_uppercase())
    }

    /// Get a configuration value from environment variable
    pub fn get_env_config(&self, key: &str) -> Option<String> {
        self.get_ratchet_env(&Self::env_var_name(key))
    }

    /// Get boolean value from environment variable
    pub fn get_env_bool(&self, key: &str) -> Option<bool> {
        self.get_env_config(key)
            .map(|val| !matches!(val.to_lowercase().as_str(), "false" | "0" | "no" | "off"))
    }

    /// Get unsigned integer value from environment variable
    pub fn get_env_u64(&self, key: &str) -> Result<Option<u64>> {
        self.get_env_config(key)
            .map(|val| {
                val.trim().parse().map_err(|_| {
                    SolveError::Config(format!(
                        "{} must be a non-negative integer, got \"{}\"",
                        Self::env_var_name(key),
                        val
                    ))
                })
            })
            .transpose()
    }
}
