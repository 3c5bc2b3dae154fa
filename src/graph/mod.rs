// src/graph/mod.rs

//! Graph vertices and the values they produce.
//!
//! - [`node`] holds the `Node` handle: identity, edges, timeout, lifecycle
//!   state and last output.
//! - [`work`] describes the two shapes of user work a node can wrap.
//! - [`chunk`] is the envelope for intermediate values of streaming nodes.

pub mod chunk;
pub mod node;
pub mod work;

pub use chunk::Chunk;
pub use node::{Node, NodeBuilder, NodeId, NodeState, connect};
pub use work::Work;
