// src/engine/multiplexer.rs

//! Merges everything the running nodes produce into one stream.
//!
//! Every launched node gets a clone of a single unbounded sender. A node
//! sends its chunks as they are produced and then exactly one `Settled`
//! event. Because each node sends from a single task, per-node order is
//! preserved; there is no ordering between nodes beyond arrival order.
//!
//! A driver task owns the [`Scheduler`] and the event receiver. It settles
//! each node, records failures and launches released children as soon as
//! the `Settled` event arrives, independently of how fast the consumer
//! reads. Items are forwarded to the consumer over a second channel, which
//! closes once every node is completed, failed or blocked.

use std::collections::HashMap;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use futures::stream::FusedStream;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::engine::Item;
use crate::engine::executor::ErrorLog;
use crate::engine::runner::run_node;
use crate::engine::scheduler::Scheduler;
use crate::errors::Result;
use crate::graph::{Chunk, Node, NodeId};
use crate::types::{CancelPolicy, ExecutorConfig};

/// Message from a node task to the driver.
pub(crate) enum Event<T> {
    Chunk(Chunk<T>),
    Settled {
        node: Node<T>,
        result: Result<()>,
    },
}

pub(crate) struct Multiplexer<T> {
    executor: String,
    scheduler: Scheduler<T>,
    events_tx: mpsc::UnboundedSender<Event<T>>,
    events_rx: mpsc::UnboundedReceiver<Event<T>>,
    running: HashMap<NodeId, AbortHandle>,
    errors: ErrorLog,
    config: ExecutorConfig,
}

impl<T> Multiplexer<T>
where
    T: Clone + Send + 'static,
{
    /// Snapshot the graph, seed the roots and launch them.
    pub(crate) fn start(
        executor: String,
        roots: &[Node<T>],
        errors: ErrorLog,
        config: ExecutorConfig,
    ) -> Result<Self> {
        let scheduler = Scheduler::from_roots(roots)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        info!(
            executor = %executor,
            nodes = scheduler.len(),
            "starting execution"
        );

        let mut mux = Self {
            executor,
            scheduler,
            events_tx,
            events_rx,
            running: HashMap::new(),
            errors,
            config,
        };
        let roots = mux.scheduler.seed();
        mux.launch(roots);
        Ok(mux)
    }

    fn launch(&mut self, nodes: Vec<Node<T>>) {
        for node in nodes {
            let id = node.uuid();
            debug!(executor = %self.executor, node = %node.label(), "launching node");
            let handle = tokio::spawn(run_node(node, self.events_tx.clone(), self.config));
            self.running.insert(id, handle.abort_handle());
        }
    }

    /// Run the execution to the end, forwarding items to `items`.
    ///
    /// Keeps scheduling after the consumer has gone away; only aborting the
    /// task that runs this stops it.
    pub(crate) async fn drive(mut self, items: mpsc::UnboundedSender<Item<T>>) {
        let mut consumer_gone = false;
        while let Some(item) = self.next_item().await {
            if items.send(item).is_err() && !consumer_gone {
                consumer_gone = true;
                debug!(executor = %self.executor, "consumer is gone; finishing in the background");
            }
        }
    }

    /// Wait for the next chunk or completed node.
    ///
    /// Failed nodes are recorded in the error log and never yielded.
    async fn next_item(&mut self) -> Option<Item<T>> {
        loop {
            if self.scheduler.is_finished() {
                info!(
                    executor = %self.executor,
                    errors = self.errors.len(),
                    "execution finished"
                );
                return None;
            }

            // The multiplexer holds a sender itself, so `recv` only returns
            // `None` if that invariant is broken.
            let Some(event) = self.events_rx.recv().await else {
                warn!(executor = %self.executor, "event channel closed before all nodes settled");
                return None;
            };

            match event {
                Event::Chunk(chunk) => return Some(Item::Chunk(chunk)),
                Event::Settled { node, result } => {
                    let id = node.uuid();
                    self.running.remove(&id);

                    match result {
                        Ok(()) => {
                            let step = self.scheduler.handle_completion(id);
                            self.launch(step.newly_ready);
                            return Some(Item::Node(node));
                        }
                        Err(err) => {
                            self.errors.push(err);
                            let step = self.scheduler.handle_failure(id);
                            if !step.newly_blocked.is_empty() {
                                info!(
                                    executor = %self.executor,
                                    node = %node.label(),
                                    blocked = step.newly_blocked.len(),
                                    "descendants of failed node will not run"
                                );
                            }
                        }
                    }
                }
            }
        }
    }
}

// Only reached with nodes still running when the driver task is aborted.
impl<T> Drop for Multiplexer<T> {
    fn drop(&mut self) {
        if self.running.is_empty() {
            return;
        }
        info!(
            executor = %self.executor,
            running = self.running.len(),
            "execution cancelled; aborting running nodes"
        );
        for handle in self.running.values() {
            handle.abort();
        }
    }
}

struct Launch<T> {
    executor: String,
    roots: Vec<Node<T>>,
    errors: ErrorLog,
    config: ExecutorConfig,
}

/// Consumer end of a started execution.
struct Driver<T> {
    executor: String,
    items: mpsc::UnboundedReceiver<Item<T>>,
    task: AbortHandle,
    cancel_on_drop: CancelPolicy,
    exhausted: bool,
}

impl<T> Drop for Driver<T> {
    fn drop(&mut self) {
        if self.exhausted || self.task.is_finished() {
            return;
        }
        match self.cancel_on_drop {
            CancelPolicy::Abort => {
                info!(executor = %self.executor, "stream dropped early; aborting execution");
                self.task.abort();
            }
            CancelPolicy::Detach => {
                info!(executor = %self.executor, "stream dropped early; execution continues detached");
            }
        }
    }
}

enum Phase<T> {
    Idle(Launch<T>),
    Running(Driver<T>),
    Done,
}

/// The consumer-facing stream returned by `TreeExecutor::yielding`.
///
/// Nothing runs until the stream is first polled. Dropping the stream before
/// it ends applies the executor's [`CancelPolicy`]. Once it has returned
/// `None` it keeps returning `None`.
pub struct Yielding<T> {
    phase: Phase<T>,
}

impl<T> Yielding<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn new(
        executor: String,
        roots: Vec<Node<T>>,
        errors: ErrorLog,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            phase: Phase::Idle(Launch {
                executor,
                roots,
                errors,
                config,
            }),
        }
    }

    fn launch(launch: Launch<T>) -> Option<Driver<T>> {
        let Launch {
            executor,
            roots,
            errors,
            config,
        } = launch;

        let mux = match Multiplexer::start(executor.clone(), &roots, errors.clone(), config) {
            Ok(mux) => mux,
            Err(err) => {
                warn!(executor = %executor, error = %err, "graph rejected; nothing was launched");
                errors.push(err);
                return None;
            }
        };

        let (items_tx, items_rx) = mpsc::unbounded_channel();
        let span = info_span!("execution", executor = %executor);
        let task = tokio::spawn(mux.drive(items_tx).instrument(span)).abort_handle();
        Some(Driver {
            executor,
            items: items_rx,
            task,
            cancel_on_drop: config.cancel_on_drop,
            exhausted: false,
        })
    }
}

impl<T> Stream for Yielding<T>
where
    T: Clone + Send + 'static,
{
    type Item = Item<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match mem::replace(&mut this.phase, Phase::Done) {
                Phase::Idle(launch) => {
                    if let Some(driver) = Self::launch(launch) {
                        this.phase = Phase::Running(driver);
                    }
                }
                Phase::Running(mut driver) => {
                    return match driver.items.poll_recv(cx) {
                        Poll::Ready(Some(item)) => {
                            this.phase = Phase::Running(driver);
                            Poll::Ready(Some(item))
                        }
                        Poll::Ready(None) => {
                            driver.exhausted = true;
                            Poll::Ready(None)
                        }
                        Poll::Pending => {
                            this.phase = Phase::Running(driver);
                            Poll::Pending
                        }
                    };
                }
                Phase::Done => return Poll::Ready(None),
            }
        }
    }
}

impl<T> FusedStream for Yielding<T>
where
    T: Clone + Send + 'static,
{
    fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }
}

impl<T> std::fmt::Debug for Yielding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self.phase {
            Phase::Idle(_) => "idle",
            Phase::Running(_) => "running",
            Phase::Done => "done",
        };
        f.debug_struct("Yielding").field("phase", &phase).finish()
    }
}
