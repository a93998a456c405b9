use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use url::Url;

use super::source::{ConfigLoader, ConfigSource, RawConfig};
use crate::error::{Result, SolveError};
use crate::repository::Channel;
use crate::solver::{CompilerPolicy, PriorityMode};

/// How channel order influences candidate selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelPriority {
    Strict,
    Flexible,
    Disabled,
}

impl Default for ChannelPriority {
    fn default() -> Self {
        ChannelPriority::Flexible
    }
}

impl ChannelPriority {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Some(ChannelPriority::Strict),
            "flexible" | "true" => Some(ChannelPriority::Flexible),
            "disabled" | "false" => Some(ChannelPriority::Disabled),
            _ => None,
        }
    }

    /// Mode passed to the solver engine; only `strict` is enforced there
    pub fn solver_mode(&self) -> PriorityMode {
        match self {
            ChannelPriority::Strict => PriorityMode::Strict,
            ChannelPriority::Flexible | ChannelPriority::Disabled => PriorityMode::Disabled,
        }
    }
}

fn default_attempt_cap() -> usize {
    10
}

fn default_channel_alias() -> Url {
    Url::parse("https://conda.anaconda.org/").expect("default channel alias is a valid URL")
}

fn default_self_package() -> String {
    "ratchet".to_string()
}

/// Solver configuration
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Explicit attempt budget; overrides the installed-count heuristic
    pub max_attempts: Option<usize>,
    pub attempt_cap: usize,
    pub channel_priority: ChannelPriority,
    /// Base URL bare channel names are resolved against
    pub channel_alias: Url,
    pub notify_outdated: bool,
    pub self_package: String,
    pub constrain_python_minor: bool,
    pub unlock_python_dependents: bool,
    sources: HashMap<String, ConfigSource>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            max_attempts: None,
            attempt_cap: default_attempt_cap(),
            channel_priority: ChannelPriority::default(),
            channel_alias: default_channel_alias(),
            notify_outdated: true,
            self_package: default_self_package(),
            constrain_python_minor: true,
            unlock_python_dependents: true,
            sources: HashMap::new(),
        }
    }
}

impl SolverConfig {
    /// Build configuration by merging defaults, the global config file, the
    /// environment's `ratchet.json` and `RATCHET_*` variables, in that order.
    pub fn build<P: AsRef<Path>>(prefix: Option<P>, use_environment: bool) -> Result<Self> {
        let loader = ConfigLoader::new(use_environment);
        let mut config = Self::default();

        for key in Self::config_keys() {
            config.sources.insert(key.to_string(), ConfigSource::Default);
        }

        // 1. Global config
        let global_config = loader.load_global_config()?;
        config.merge_raw_config(global_config, ConfigSource::Global)?;

        // 2. Environment-local config
        if let Some(prefix) = &prefix {
            let project_config = loader.load_project_config(prefix)?;
            config.merge_raw_config(project_config, ConfigSource::Project)?;
        }

        // 3. Environment variable overrides
        if use_environment {
            config.apply_env_overrides(&loader)?;
        }

        Ok(config)
    }

    /// Get the source of a configuration value
    pub fn get_source(&self, key: &str) -> Option<&ConfigSource> {
        self.sources.get(key)
    }

    /// Override a value after loading; takes precedence over every file and variable
    pub fn set(&mut self, key: &str, value: serde_json::Value) -> Result<()> {
        self.merge_config_value(key, value, ConfigSource::Override)
    }

    /// Number of solver attempts before the unfreeze attempt
    pub fn max_attempts_for(&self, installed: usize) -> usize {
        if let Some(max) = self.max_attempts {
            return max.max(1);
        }
        if installed > 0 {
            installed.min(self.attempt_cap).max(1)
        } else {
            1
        }
    }

    /// Resolve a channel name or URL against the configured alias
    pub fn channel(&self, name_or_url: &str) -> Result<Channel> {
        Channel::parse(name_or_url, &self.channel_alias)
    }

    pub fn compiler_policy(&self) -> CompilerPolicy {
        CompilerPolicy {
            constrain_python_minor: self.constrain_python_minor,
            unlock_python_dependents: self.unlock_python_dependents,
        }
    }

    fn merge_raw_config(&mut self, raw: RawConfig, source: ConfigSource) -> Result<()> {
        if let Some(config_map) = raw.solver {
            for (key, value) in config_map {
                self.merge_config_value(&key, value, source.clone())?;
            }
        }
        Ok(())
    }

    fn merge_config_value(
        &mut self,
        key: &str,
        value: serde_json::Value,
        source: ConfigSource,
    ) -> Result<()> {
        match key {
            "max-attempts" => {
                if value.is_null() {
                    self.max_attempts = None;
                } else {
                    self.max_attempts = Some(parse_attempts(key, value.as_u64())?);
                }
            }
            "attempt-cap" => {
                self.attempt_cap = parse_attempts(key, value.as_u64())?;
            }
            "channel-priority" => {
                self.channel_priority = parse_channel_priority(&value_to_string(&value))?;
            }
            "channel-alias" => {
                self.channel_alias = parse_channel_alias(&value_to_string(&value))?;
            }
            "notify-outdated" => {
                self.notify_outdated = expect_bool(key, &value)?;
            }
            "self-package" => {
                self.self_package = value_to_string(&value).trim().to_lowercase();
            }
            "constrain-python-minor" => {
                self.constrain_python_minor = expect_bool(key, &value)?;
            }
            "unlock-python-dependents" => {
                self.unlock_python_dependents = expect_bool(key, &value)?;
            }
            _ => {
                log::debug!("Ignoring unknown solver config key \"{}\"", key);
                return Ok(());
            }
        }
        self.sources.insert(key.to_string(), source);
        Ok(())
    }

    fn apply_env_overrides(&mut self, loader: &ConfigLoader) -> Result<()> {
        if let Some(max) = loader.get_env_u64("max-attempts")? {
            self.max_attempts = Some(parse_attempts("max-attempts", Some(max))?);
            self.record_env_source("max-attempts");
        }

        if let Some(cap) = loader.get_env_u64("attempt-cap")? {
            self.attempt_cap = parse_attempts("attempt-cap", Some(cap))?;
            self.record_env_source("attempt-cap");
        }

        if let Some(priority) = loader.get_env_config("channel-priority") {
            self.channel_priority = parse_channel_priority(&priority)?;
            self.record_env_source("channel-priority");
        }

        if let Some(alias) = loader.get_env_config("channel-alias") {
            self.channel_alias = parse_channel_alias(&alias)?;
            self.record_env_source("channel-alias");
        }

        if let Some(notify) = loader.get_env_bool("notify-outdated") {
            self.notify_outdated = notify;
            self.record_env_source("notify-outdated");
        }

        Ok(())
    }

    fn record_env_source(&mut self, key: &str) {
        self.sources.insert(
            key.to_string(),
            ConfigSource::Environment(ConfigLoader::env_var_name(key)),
        );
    }

    fn config_keys() -> [&'static str; 8] {
        [
            "max-attempts",
            "attempt-cap",
            "channel-priority",
            "channel-alias",
            "notify-outdated",
            "self-package",
            "constrain-python-minor",
            "unlock-python-dependents",
        ]
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_attempts(key: &str, value: Option<u64>) -> Result<usize> {
    match value {
        Some(n) if n >= 1 => Ok(n as usize),
        _ => Err(SolveError::Config(format!("{} must be an integer >= 1", key))),
    }
}

fn parse_channel_priority(value: &str) -> Result<ChannelPriority> {
    ChannelPriority::from_str(value)
        .ok_or_else(|| SolveError::Config(format!("Unknown channel priority \"{}\"", value)))
}

fn parse_channel_alias(value: &str) -> Result<Url> {
    let value = value.trim();
    let with_slash = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{}/", value)
    };
    Url::parse(&with_slash)
        .map_err(|e| SolveError::Config(format!("Invalid channel alias \"{}\": {}", value, e)))
}

fn expect_bool(key: &str, value: &serde_json::Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| SolveError::Config(format!("{} must be a boolean", key)))
}
