// src/engine/executor.rs

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use uuid::Uuid;

use crate::engine::multiplexer::Yielding;
use crate::engine::scheduler::Scheduler;
use crate::errors::{DagstreamError, Result};
use crate::graph::Node;
use crate::types::ExecutorConfig;

/// Append-only list of failures shared between an executor and its stream.
#[derive(Clone, Default)]
pub(crate) struct ErrorLog {
    entries: Arc<Mutex<Vec<Arc<DagstreamError>>>>,
}

impl ErrorLog {
    pub(crate) fn push(&self, err: DagstreamError) {
        self.lock().push(Arc::new(err));
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<DagstreamError>> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<DagstreamError>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Executes a node graph from its roots and streams results as they arrive.
///
/// One executor drives one execution: node state is mutated in place and is
/// not reset, so running the same graph again needs freshly built nodes.
pub struct TreeExecutor<T> {
    uuid: String,
    roots: Vec<Node<T>>,
    errors: ErrorLog,
    config: ExecutorConfig,
}

impl<T> TreeExecutor<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(uuid: impl Into<String>, roots: Vec<Node<T>>) -> Self {
        Self::with_config(uuid, roots, ExecutorConfig::default())
    }

    /// Executor with a random uuid.
    pub fn from_roots(roots: Vec<Node<T>>) -> Self {
        Self::new(Uuid::new_v4().to_string(), roots)
    }

    pub fn with_config(uuid: impl Into<String>, roots: Vec<Node<T>>, config: ExecutorConfig) -> Self {
        Self {
            uuid: uuid.into(),
            roots,
            errors: ErrorLog::default(),
            config,
        }
    }

    /// Identifier of this execution, used to correlate log lines.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn roots(&self) -> &[Node<T>] {
        &self.roots
    }

    pub fn config(&self) -> ExecutorConfig {
        self.config
    }

    /// Check the graph without running anything.
    ///
    /// `yielding()` performs the same checks when it starts; an invalid graph
    /// there is recorded in `errors()` instead of being returned.
    pub fn validate(&self) -> Result<()> {
        let scheduler = Scheduler::from_roots(&self.roots)?;
        debug!(executor = %self.uuid, nodes = scheduler.len(), "graph is valid");
        Ok(())
    }

    /// Stream every chunk and every completed node, in arrival order.
    ///
    /// The stream ends once every node reachable from the roots has
    /// completed, failed, or been blocked by a failed ancestor. Failures
    /// never surface as stream items; inspect [`TreeExecutor::errors`]
    /// afterwards. Descendants of a failed node are neither run nor reported
    /// as errors: they simply never appear in the stream.
    ///
    /// Must be polled from within a Tokio runtime.
    pub fn yielding(&self) -> Yielding<T> {
        Yielding::new(
            self.uuid.clone(),
            self.roots.clone(),
            self.errors.clone(),
            self.config,
        )
    }

    /// Every failure recorded so far, in the order the nodes settled.
    ///
    /// Failures are recorded by the execution as nodes settle, not as the
    /// stream is read. Under [`CancelPolicy::Abort`] dropping the stream early
    /// stops the execution, so nodes that had not settled by then are never
    /// recorded; under [`CancelPolicy::Detach`] the list keeps growing until
    /// the background execution finishes.
    ///
    /// [`CancelPolicy::Abort`]: crate::types::CancelPolicy::Abort
    /// [`CancelPolicy::Detach`]: crate::types::CancelPolicy::Detach
    pub fn errors(&self) -> Vec<Arc<DagstreamError>> {
        self.errors.snapshot()
    }

    pub fn has_errors(&self) -> bool {
        self.errors.len() > 0
    }
}

impl<T> fmt::Debug for TreeExecutor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeExecutor")
            .field("uuid", &self.uuid)
            .field("roots", &self.roots)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
