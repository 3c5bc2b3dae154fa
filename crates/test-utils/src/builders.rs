#![allow(dead_code)]

use std::collections::BTreeMap;

use dagstream::config::{ConfigFile, ExecutorSection, NodeConfig, RawConfigFile};
use dagstream::{CancelPolicy, EmptyOutputPolicy};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                executor: ExecutorSection::default(),
                node: BTreeMap::new(),
            },
        }
    }

    pub fn with_node(mut self, name: &str, node: NodeConfig) -> Self {
        self.config.node.insert(name.to_string(), node);
        self
    }

    pub fn cancel_on_drop(mut self, policy: CancelPolicy) -> Self {
        self.config.executor.cancel_on_drop = policy;
        self
    }

    pub fn empty_output(mut self, policy: EmptyOutputPolicy) -> Self {
        self.config.executor.empty_output = policy;
        self
    }

    pub fn default_timeout(mut self, duration: &str) -> Self {
        self.config.executor.default_timeout = Some(duration.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `NodeConfig`.
pub struct NodeConfigBuilder {
    node: NodeConfig,
}

impl NodeConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            node: NodeConfig {
                cmd: cmd.to_string(),
                after: vec![],
                timeout: None,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.node.after.push(dep.to_string());
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.node.timeout = Some(duration.to_string());
        self
    }

    pub fn build(self) -> NodeConfig {
        self.node
    }
}
