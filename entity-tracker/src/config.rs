use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::TrackerResult;

/// Decides whether an entity of a tracked class is diffed at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    /// Every loaded entity in the change set is diffed. Unloaded proxies are
    /// skipped without consulting their lifecycle state: a proxy nobody
    /// loaded cannot carry changes.
    #[default]
    Initialized,
    /// Only entities the unit of work reports as managed are diffed. New
    /// entities reached through cascade persist are skipped until persisted,
    /// and managed proxies are loaded before diffing.
    Managed,
}

/// Behaviour of change-set traversal when it meets an unloaded proxy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyTraversal {
    /// Keep the proxy in the change set but do not walk its associations.
    #[default]
    Skip,
    /// Ask the host to load the proxy, then walk it.
    Load,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub eligibility: Eligibility,
    pub proxy_traversal: ProxyTraversal,
}

impl TrackerConfig {
    pub fn from_toml_str(source: &str) -> TrackerResult<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> TrackerResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}
