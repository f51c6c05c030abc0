//! Configuration types for merging contexts.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment variable read by [`MergeOptions::from_env`].
pub const STRATEGY_ENV_VAR: &str = "CTXMERGE_STRATEGY";

/// How a merged context learns that `extra` was canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Register a callback on both sources when the merge is created.
    #[default]
    Callback,
    /// Start a watcher thread the first time someone asks for `done()`.
    Watcher,
}

impl MergeStrategy {
    /// Returns the configuration name of the strategy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Callback => "callback",
            Self::Watcher => "watcher",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "callback" => Ok(Self::Callback),
            "watcher" => Ok(Self::Watcher),
            _ => Err(ConfigError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Options for [`add_cancel_with`](super::add_cancel_with).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    /// Propagation strategy.
    #[serde(default)]
    pub strategy: MergeStrategy,
    /// Name given to watcher threads.
    #[serde(default = "default_watcher_thread_name")]
    pub watcher_thread_name: String,
}

fn default_watcher_thread_name() -> String {
    "ctxmerge-watcher".to_string()
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::default(),
            watcher_thread_name: default_watcher_thread_name(),
        }
    }
}

impl MergeOptions {
    /// Creates options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the watcher thread name.
    #[must_use]
    pub fn with_watcher_thread_name(mut self, name: impl Into<String>) -> Self {
        self.watcher_thread_name = name.into();
        self
    }

    /// Loads options from the environment.
    ///
    /// Reads the strategy from `CTXMERGE_STRATEGY`; unset means default.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(STRATEGY_ENV_VAR) {
            Ok(value) => Self::from_strategy_var(Some(&value)),
            Err(std::env::VarError::NotPresent) => Self::from_strategy_var(None),
            Err(std::env::VarError::NotUnicode(raw)) => Err(ConfigError::UnknownStrategy(
                raw.to_string_lossy().into_owned(),
            )),
        }
    }

    fn from_strategy_var(value: Option<&str>) -> Result<Self, ConfigError> {
        let strategy = match value {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => MergeStrategy::default(),
        };
        Ok(Self::default().with_strategy(strategy))
    }

    /// Parses options from a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}
