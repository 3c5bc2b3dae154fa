// src/engine/mod.rs

//! Execution engine.
//!
//! - [`scheduler`] turns the node graph into a launch order (AND-join on
//!   parents, blocking of subtrees below failures).
//! - [`runner`] executes one node with its timeout and error isolation.
//! - [`multiplexer`] merges chunks and completed nodes from every running
//!   node into the single [`Yielding`] stream.
//! - [`executor`] is the [`TreeExecutor`] façade over all of the above.

pub mod executor;
pub mod multiplexer;
pub(crate) mod runner;
pub mod scheduler;

pub use executor::TreeExecutor;
pub use multiplexer::Yielding;
pub use scheduler::{Scheduler, SchedulerStep, SlotState};

use crate::graph::{Chunk, Node, NodeId};

/// One element of the `yielding()` stream.
#[derive(Debug, Clone)]
pub enum Item<T> {
    /// Intermediate value from a node that is still running.
    Chunk(Chunk<T>),
    /// A node that has just completed successfully.
    Node(Node<T>),
}

impl<T> Item<T> {
    /// Identifier of the node this item belongs to.
    pub fn uuid(&self) -> NodeId {
        match self {
            Item::Chunk(chunk) => chunk.uuid(),
            Item::Node(node) => node.uuid(),
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Item::Node(_))
    }

    pub fn as_node(&self) -> Option<&Node<T>> {
        match self {
            Item::Node(node) => Some(node),
            Item::Chunk(_) => None,
        }
    }

    pub fn as_chunk(&self) -> Option<&Chunk<T>> {
        match self {
            Item::Chunk(chunk) => Some(chunk),
            Item::Node(_) => None,
        }
    }
}

impl<T: Clone> Item<T> {
    /// The chunk's value, or the node's final output.
    pub fn output(&self) -> Option<T> {
        match self {
            Item::Chunk(chunk) => Some(chunk.output().clone()),
            Item::Node(node) => node.output(),
        }
    }
}
