// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

use crate::graph::NodeId;

#[derive(Error, Debug)]
pub enum DagstreamError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// The node's work did not settle within its configured timeout.
    #[error("node {node} timed out after {after:?}")]
    Timeout { node: NodeId, after: Duration },

    /// The node's work returned an error; `source` is the error as raised.
    #[error("node {node} failed: {source}")]
    Work {
        node: NodeId,
        #[source]
        source: anyhow::Error,
    },

    /// A streaming node finished without producing a value while
    /// `EmptyOutputPolicy::Fail` was in effect.
    #[error("node {node} finished without producing any output")]
    EmptyOutput { node: NodeId },

    #[error("node {node} panicked: {message}")]
    Panicked { node: NodeId, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DagstreamError {
    /// `true` for errors caused by a node exceeding its timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DagstreamError::Timeout { .. })
    }

    /// The node this error was recorded for, if it is a node failure.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            DagstreamError::Timeout { node, .. }
            | DagstreamError::Work { node, .. }
            | DagstreamError::EmptyOutput { node }
            | DagstreamError::Panicked { node, .. } => Some(*node),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DagstreamError>;
