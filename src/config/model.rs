// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{CancelPolicy, EmptyOutputPolicy, ExecutorConfig};

/// Graph file as read from TOML, before validation.
///
/// ```toml
/// [executor]
/// cancel_on_drop = "abort"
/// empty_output = "complete"
/// default_timeout = "30s"
///
/// [node.fetch]
/// cmd = "curl -s https://example.com"
///
/// [node.count]
/// cmd = "wc -c"
/// after = ["fetch"]
/// timeout = "5s"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub executor: ExecutorSection,

    /// All nodes from `[node.<name>]`, keyed by name.
    #[serde(default)]
    pub node: BTreeMap<String, NodeConfig>,
}

/// `[executor]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutorSection {
    /// `"abort"` (default) or `"detach"`.
    #[serde(default)]
    pub cancel_on_drop: CancelPolicy,

    /// `"complete"` (default) or `"fail"`.
    #[serde(default)]
    pub empty_output: EmptyOutputPolicy,

    /// Timeout for nodes that don't set one, e.g. `"30s"`.
    #[serde(default)]
    pub default_timeout: Option<String>,
}

/// `[node.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Shell command; every stdout line is streamed as a chunk.
    pub cmd: String,

    /// Nodes that must all complete before this one starts.
    #[serde(default)]
    pub after: Vec<String>,

    /// Optional per-node timeout, e.g. `"500ms"`.
    #[serde(default)]
    pub timeout: Option<String>,
}

/// A validated node definition with parsed durations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub cmd: String,
    pub after: Vec<String>,
    pub timeout: Option<Duration>,
}

/// Validated graph file. Build one with `ConfigFile::try_from(raw)` or
/// [`crate::config::load_and_validate`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    executor: ExecutorConfig,
    nodes: BTreeMap<String, NodeSpec>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(executor: ExecutorConfig, nodes: BTreeMap<String, NodeSpec>) -> Self {
        Self { executor, nodes }
    }

    pub fn executor(&self) -> ExecutorConfig {
        self.executor
    }

    pub fn nodes(&self) -> &BTreeMap<String, NodeSpec> {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.get(name)
    }

    /// Names of nodes without `after` dependencies.
    pub fn root_names(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(|(_, spec)| spec.after.is_empty())
            .map(|(name, _)| name.as_str())
    }
}
