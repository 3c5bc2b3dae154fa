// src/graph/node.rs

//! Graph vertex: a unit of work plus its edges and lifecycle state.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::errors::{DagstreamError, Result};
use crate::graph::Work;

/// Stable identifier of a node for its whole lifetime.
pub type NodeId = Uuid;

/// Lifecycle of a node within one execution.
///
/// `Pending -> Running -> {Completed, Failed}`. A node enters `Running` at
/// most once and never leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Pending,
    Running,
    Completed,
    /// The work returned an error, panicked or exceeded its timeout.
    Failed,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Completed | NodeState::Failed)
    }
}

/// Parents are kept by id only; strong references point downwards, so an
/// acyclic graph of handles never forms a reference cycle.
struct Edges<T> {
    parents: Vec<NodeId>,
    children: Vec<Node<T>>,
}

struct NodeInner<T> {
    uuid: NodeId,
    name: Option<String>,
    work: Work<T>,
    timeout: Option<Duration>,
    edges: Mutex<Edges<T>>,
    state: Mutex<NodeState>,
    output: Mutex<Option<T>>,
}

/// Shared handle to a graph vertex.
///
/// Cloning is cheap and every clone refers to the same vertex. Equality and
/// hashing use the node's `uuid`.
pub struct Node<T> {
    inner: Arc<NodeInner<T>>,
}

/// Builder for nodes that need more than a work function.
pub struct NodeBuilder<T> {
    uuid: NodeId,
    name: Option<String>,
    work: Work<T>,
    timeout: Option<Duration>,
}

impl<T> NodeBuilder<T> {
    pub fn uuid(mut self, uuid: NodeId) -> Self {
        self.uuid = uuid;
        self
    }

    /// Human-readable label used in logs and CLI output.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Bound the total execution time of the node, including every
    /// intermediate value it produces.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Node<T> {
        Node {
            inner: Arc::new(NodeInner {
                uuid: self.uuid,
                name: self.name,
                work: self.work,
                timeout: self.timeout,
                edges: Mutex::new(Edges {
                    parents: Vec::new(),
                    children: Vec::new(),
                }),
                state: Mutex::new(NodeState::Pending),
                output: Mutex::new(None),
            }),
        }
    }
}

impl<T> Node<T> {
    pub fn new(work: Work<T>) -> Self {
        Self::builder(work).build()
    }

    pub fn named(name: impl Into<String>, work: Work<T>) -> Self {
        Self::builder(work).name(name).build()
    }

    pub fn builder(work: Work<T>) -> NodeBuilder<T> {
        NodeBuilder {
            uuid: Uuid::new_v4(),
            name: None,
            work,
            timeout: None,
        }
    }

    pub fn uuid(&self) -> NodeId {
        self.inner.uuid
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// The node's name, or its uuid when unnamed.
    pub fn label(&self) -> String {
        match &self.inner.name {
            Some(name) => name.clone(),
            None => self.inner.uuid.to_string(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    pub fn work(&self) -> &Work<T> {
        &self.inner.work
    }

    pub fn state(&self) -> NodeState {
        *lock(&self.inner.state)
    }

    /// Ids of the direct parents, one entry per connected edge.
    pub fn parents(&self) -> Vec<NodeId> {
        lock(&self.inner.edges).parents.clone()
    }

    /// Direct children, one entry per connected edge.
    pub fn children(&self) -> Vec<Node<T>> {
        lock(&self.inner.edges).children.clone()
    }

    /// Number of incoming edges; this is the initial join counter the
    /// scheduler uses for the node.
    pub fn parent_count(&self) -> usize {
        lock(&self.inner.edges).parents.len()
    }

    pub fn is_root(&self) -> bool {
        self.parent_count() == 0
    }

    /// Register `child` as depending on this node. See [`connect`].
    pub async fn connect(&self, child: &Node<T>) -> Result<()> {
        connect(self, child).await
    }

    /// `Pending -> Running`. Returns `false` if the node was already started.
    pub(crate) fn start(&self) -> bool {
        let mut state = lock(&self.inner.state);
        if *state != NodeState::Pending {
            return false;
        }
        *state = NodeState::Running;
        true
    }

    /// Move a running node into a terminal state.
    pub(crate) fn settle(&self, terminal: NodeState) {
        debug_assert!(terminal.is_terminal());
        let mut state = lock(&self.inner.state);
        if !state.is_terminal() {
            *state = terminal;
        }
    }

    pub(crate) fn set_output(&self, value: T) {
        *lock(&self.inner.output) = Some(value);
    }
}

impl<T: Clone> Node<T> {
    /// Last value produced by the work, if any.
    pub fn output(&self) -> Option<T> {
        lock(&self.inner.output).clone()
    }
}

/// Connect `parent -> child`.
///
/// The child joins on every parent: it is launched only after all of them
/// completed successfully. Edges are not deduplicated; connecting the same
/// pair twice registers two edges, and the parent's completion releases both.
///
/// Graphs must be fully connected before execution starts; connecting a node
/// that has already been launched is rejected.
pub async fn connect<T>(parent: &Node<T>, child: &Node<T>) -> Result<()> {
    if parent.uuid() == child.uuid() {
        return Err(DagstreamError::InvalidGraph(format!(
            "node '{}' cannot depend on itself",
            parent.label()
        )));
    }

    for node in [parent, child] {
        let state = node.state();
        if state != NodeState::Pending {
            return Err(DagstreamError::InvalidGraph(format!(
                "cannot connect node '{}' in state {:?}; graphs are immutable once launched",
                node.label(),
                state
            )));
        }
    }

    lock(&parent.inner.edges).children.push(child.clone());
    lock(&child.inner.edges).parents.push(parent.uuid());

    debug!(parent = %parent.label(), child = %child.label(), "connected nodes");
    Ok(())
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> Clone for Node<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Node<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.uuid == other.inner.uuid
    }
}

impl<T> Eq for Node<T> {}

impl<T> Hash for Node<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.uuid.hash(state);
    }
}

impl<T> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("uuid", &self.inner.uuid)
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("work", &self.inner.work)
            .finish_non_exhaustive()
    }
}
