// src/exec/mod.rs

//! Built-in work and graph construction for the `dagstream` binary.
//!
//! - [`command`] runs a shell command as streaming work: every stdout line
//!   becomes a chunk and the last line is the node's output.
//! - [`plan`] builds a connected node graph from a validated config file.

pub mod command;
pub mod plan;

pub use command::command_work;
pub use plan::{Plan, build_plan};
