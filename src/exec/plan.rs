// src/exec/plan.rs

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::ConfigFile;
use crate::errors::{DagstreamError, Result};
use crate::exec::command::command_work;
use crate::graph::{Node, NodeId};

/// Nodes built from a config file, ready to hand to a `TreeExecutor`.
#[derive(Debug)]
pub struct Plan {
    nodes: BTreeMap<String, Node<String>>,
    roots: Vec<Node<String>>,
}

impl Plan {
    pub fn roots(&self) -> &[Node<String>] {
        &self.roots
    }

    pub fn node(&self, name: &str) -> Option<&Node<String>> {
        self.nodes.get(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Config name of the node with the given id.
    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.nodes
            .iter()
            .find(|(_, node)| node.uuid() == id)
            .map(|(name, _)| name.as_str())
    }
}

/// Create one command node per `[node.<name>]` and connect the `after` edges.
pub async fn build_plan(cfg: &ConfigFile) -> Result<Plan> {
    let mut nodes = BTreeMap::new();

    for (name, spec) in cfg.nodes() {
        let mut builder = Node::builder(command_work(spec.cmd.clone())).name(name.clone());
        if let Some(timeout) = spec.timeout {
            builder = builder.timeout(timeout);
        }
        nodes.insert(name.clone(), builder.build());
    }

    for (name, spec) in cfg.nodes() {
        let child = nodes
            .get(name)
            .ok_or_else(|| DagstreamError::ConfigError(format!("node '{name}' missing from plan")))?;
        for dep in &spec.after {
            let parent = nodes.get(dep).ok_or_else(|| {
                DagstreamError::ConfigError(format!(
                    "node '{name}' has unknown dependency '{dep}' in `after`"
                ))
            })?;
            parent.connect(child).await?;
        }
    }

    let roots: Vec<Node<String>> = cfg
        .root_names()
        .filter_map(|name| nodes.get(name).cloned())
        .collect();

    debug!(nodes = nodes.len(), roots = roots.len(), "built plan from config");
    Ok(Plan { nodes, roots })
}
