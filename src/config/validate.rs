// src/config/validate.rs

use std::collections::{BTreeMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, NodeSpec, RawConfigFile};
use crate::errors::{DagstreamError, Result};
use crate::types::ExecutorConfig;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DagstreamError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_nodes(&raw)?;
        validate_node_dependencies(&raw)?;
        validate_dag(&raw)?;

        let executor = executor_config(&raw)?;
        let mut nodes = BTreeMap::new();
        for (name, node) in raw.node {
            let timeout = node
                .timeout
                .as_deref()
                .map(|s| parse_duration(s).map_err(|e| invalid_duration(&format!("node.{name}.timeout"), e)))
                .transpose()?;
            nodes.insert(
                name,
                NodeSpec {
                    cmd: node.cmd,
                    after: node.after,
                    timeout,
                },
            );
        }

        Ok(ConfigFile::new_unchecked(executor, nodes))
    }
}

fn ensure_has_nodes(cfg: &RawConfigFile) -> Result<()> {
    if cfg.node.is_empty() {
        return Err(DagstreamError::ConfigError(
            "config must contain at least one [node.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn executor_config(cfg: &RawConfigFile) -> Result<ExecutorConfig> {
    let default_timeout = cfg
        .executor
        .default_timeout
        .as_deref()
        .map(|s| parse_duration(s).map_err(|e| invalid_duration("executor.default_timeout", e)))
        .transpose()?;

    Ok(ExecutorConfig {
        cancel_on_drop: cfg.executor.cancel_on_drop,
        empty_output: cfg.executor.empty_output,
        default_timeout,
    })
}

fn validate_node_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, node) in cfg.node.iter() {
        let mut seen = HashSet::new();
        for dep in node.after.iter() {
            if !seen.insert(dep.as_str()) {
                return Err(DagstreamError::ConfigError(format!(
                    "node '{}' lists dependency '{}' more than once in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(DagstreamError::ConfigError(format!(
                    "node '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if !cfg.node.contains_key(dep) {
                return Err(DagstreamError::ConfigError(format!(
                    "node '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> node.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.node.keys() {
        graph.add_node(name.as_str());
    }

    for (name, node) in cfg.node.iter() {
        for dep in node.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(DagstreamError::DagCycle(format!(
            "cycle detected in node graph involving node '{}'",
            cycle.node_id()
        ))),
    }
}

fn invalid_duration(field: &str, reason: String) -> DagstreamError {
    DagstreamError::ConfigError(format!("invalid duration for `{field}`: {reason}"))
}
