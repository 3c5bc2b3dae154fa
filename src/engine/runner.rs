// src/engine/runner.rs

//! Execution of a single node inside its own Tokio task.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::multiplexer::Event;
use crate::errors::{DagstreamError, Result};
use crate::graph::{Chunk, Node, NodeState, Work};
use crate::types::{EmptyOutputPolicy, ExecutorConfig};

/// Run one node to a terminal state and report it on `events`.
///
/// Chunks are sent as they are produced; the `Settled` event is always the
/// last thing this node sends. Errors, timeouts and panics are turned into
/// a failed outcome here and never unwind into the caller.
pub(crate) async fn run_node<T>(
    node: Node<T>,
    events: mpsc::UnboundedSender<Event<T>>,
    config: ExecutorConfig,
) where
    T: Clone + Send + 'static,
{
    let id = node.uuid();

    if !node.start() {
        warn!(node = %node.label(), state = ?node.state(), "node launched twice; refusing to run it again");
        let result = Err(DagstreamError::InvalidGraph(format!(
            "node '{}' was launched more than once",
            node.label()
        )));
        let _ = events.send(Event::Settled { node, result });
        return;
    }

    let timeout = node.timeout().or(config.default_timeout);
    info!(node = %node.label(), ?timeout, streaming = node.work().is_streaming(), "starting node");

    let guarded = AssertUnwindSafe(execute(&node, &events, config.empty_output)).catch_unwind();

    let outcome = match timeout {
        Some(after) => match tokio::time::timeout(after, guarded).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => Ok(Err(DagstreamError::Timeout { node: id, after })),
        },
        None => guarded.await,
    };

    let result = match outcome {
        Ok(result) => result,
        Err(payload) => Err(DagstreamError::Panicked {
            node: id,
            message: panic_message(payload.as_ref()),
        }),
    };

    match &result {
        Ok(()) => {
            node.settle(NodeState::Completed);
            info!(node = %node.label(), "node completed");
        }
        Err(err) => {
            node.settle(NodeState::Failed);
            warn!(node = %node.label(), error = %err, "node failed");
        }
    }

    if events.send(Event::Settled { node, result }).is_err() {
        debug!(node = %id, "consumer is gone; dropping node outcome");
    }
}

async fn execute<T>(
    node: &Node<T>,
    events: &mpsc::UnboundedSender<Event<T>>,
    empty_output: EmptyOutputPolicy,
) -> Result<()>
where
    T: Clone + Send + 'static,
{
    let id = node.uuid();

    match node.work() {
        Work::Single(work) => {
            let output = work(node.clone())
                .await
                .map_err(|source| DagstreamError::Work { node: id, source })?;
            node.set_output(output);
        }
        Work::Streaming(work) => {
            let mut stream = work(node.clone());
            let mut produced = 0usize;

            while let Some(item) = stream.next().await {
                let value = item.map_err(|source| DagstreamError::Work { node: id, source })?;
                produced += 1;
                node.set_output(value.clone());
                if events.send(Event::Chunk(Chunk::new(id, value))).is_err() {
                    debug!(node = %id, "consumer is gone; dropping chunk");
                }
            }

            if produced == 0 {
                match empty_output {
                    EmptyOutputPolicy::Complete => {
                        debug!(node = %node.label(), "stream produced no values; completing without output");
                    }
                    EmptyOutputPolicy::Fail => {
                        return Err(DagstreamError::EmptyOutput { node: id });
                    }
                }
            }
        }
    }

    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
