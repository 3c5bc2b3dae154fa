// src/lib.rs

//! Concurrent execution of node graphs with streamed results.
//!
//! Build [`Node`]s around async work, [`connect`] them into a DAG, and drive
//! them with a [`TreeExecutor`]: every node starts as soon as all of its
//! parents have completed, and [`TreeExecutor::yielding`] streams each
//! intermediate [`Chunk`] and each completed node as it happens.
//!
//! ```no_run
//! use dagstream::{Item, Node, TreeExecutor, Work};
//! use futures::StreamExt;
//!
//! # async fn demo() -> dagstream::errors::Result<()> {
//! let fetch = Node::named("fetch", Work::single(|_| async {
//!     Ok::<_, anyhow::Error>("payload".to_string())
//! }));
//! let parse = Node::named("parse", Work::single(|node| async move {
//!     Ok::<_, anyhow::Error>(format!("{} parsed", node.label()))
//! }));
//! fetch.connect(&parse).await?;
//!
//! let executor = TreeExecutor::new("demo", vec![fetch]);
//! let mut stream = executor.yielding();
//! while let Some(item) = stream.next().await {
//!     if let Item::Node(node) = item {
//!         println!("{} -> {:?}", node.label(), node.output());
//!     }
//! }
//! assert!(executor.errors().is_empty());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod graph;
pub mod logging;
pub mod types;

use anyhow::{Result, bail};
use futures::StreamExt;
use tracing::{debug, error, info};

pub use crate::engine::{Item, TreeExecutor, Yielding};
pub use crate::graph::{Chunk, Node, NodeId, NodeState, Work, connect};
pub use crate::types::{CancelPolicy, EmptyOutputPolicy, ExecutorConfig};

use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::config::load_and_validate;
use crate::exec::build_plan;

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the graph file, builds one command node per entry,
/// runs the graph and prints results to stdout as they arrive. Returns an
/// error if any node failed.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = &args.config;
    let cfg = load_and_validate(config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let plan = build_plan(&cfg).await?;
    let executor = TreeExecutor::with_config(
        config_path.display().to_string(),
        plan.roots().to_vec(),
        cfg.executor(),
    );
    info!(nodes = plan.len(), executor = %executor.uuid(), "running graph");

    let mut stream = executor.yielding();
    while let Some(item) = stream.next().await {
        let name = plan.name_of(item.uuid()).unwrap_or("?");
        match item {
            Item::Chunk(chunk) => {
                if !args.quiet {
                    println!("[{name}] {}", chunk.output());
                }
            }
            Item::Node(node) => {
                println!("done {name}: {}", node.output().unwrap_or_default());
            }
        }
    }

    let errors = executor.errors();
    if errors.is_empty() {
        info!("all nodes completed");
        return Ok(());
    }

    for err in &errors {
        let name = err.node().and_then(|id| plan.name_of(id)).unwrap_or("?");
        error!(node = %name, error = %err, "node failed");
    }
    bail!("{} node(s) failed", errors.len())
}

/// Simple dry-run output: print nodes, deps and commands.
fn print_dry_run(cfg: &ConfigFile) {
    let executor = cfg.executor();

    println!("dagstream dry-run");
    println!("  executor.cancel_on_drop = {:?}", executor.cancel_on_drop);
    println!("  executor.empty_output = {:?}", executor.empty_output);
    if let Some(timeout) = executor.default_timeout {
        println!("  executor.default_timeout = {timeout:?}");
    }
    println!();

    println!("nodes ({}):", cfg.nodes().len());
    for (name, spec) in cfg.nodes() {
        println!("  - {name}");
        println!("      cmd: {}", spec.cmd);
        if !spec.after.is_empty() {
            println!("      after: {:?}", spec.after);
        }
        if let Some(timeout) = spec.timeout {
            println!("      timeout: {timeout:?}");
        }
    }

    debug!("dry-run complete (no execution)");
}
