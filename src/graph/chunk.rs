// src/graph/chunk.rs

use crate::graph::NodeId;

/// One value produced by a streaming node while it is still running.
///
/// Chunks are never stored in the graph; they exist only on their way
/// through the `yielding()` stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<T> {
    uuid: NodeId,
    output: T,
}

impl<T> Chunk<T> {
    pub fn new(uuid: NodeId, output: T) -> Self {
        Self { uuid, output }
    }

    /// Identifier of the node that produced this chunk.
    pub fn uuid(&self) -> NodeId {
        self.uuid
    }

    pub fn output(&self) -> &T {
        &self.output
    }
}
