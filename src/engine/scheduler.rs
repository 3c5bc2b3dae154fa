// src/engine/scheduler.rs

//! Dependency-aware scheduling over a snapshot of the node graph.
//!
//! The scheduler owns an arena keyed by [`NodeId`] holding, per node, the
//! child ids and the live join counter. It never runs work itself: callers
//! launch the nodes it hands back and report every terminal outcome through
//! [`Scheduler::handle_completion`] / [`Scheduler::handle_failure`]. All
//! counter updates go through `&mut self`, so each decrement-and-compare is a
//! single serialized step.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, info, warn};

use crate::errors::{DagstreamError, Result};
use crate::graph::{Node, NodeId, NodeState};

/// Scheduler-side state of one node in the current execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Waiting for parents to complete.
    Waiting,
    /// Handed out for execution and not yet settled.
    Launched,
    Completed,
    Failed,
    /// An ancestor failed; the node will never be launched.
    Blocked,
}

impl SlotState {
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            SlotState::Completed | SlotState::Failed | SlotState::Blocked
        )
    }
}

struct Slot<T> {
    node: Node<T>,
    /// One entry per edge, duplicates included.
    children: Vec<NodeId>,
    pending_parents: usize,
    state: SlotState,
}

/// Structured result of a single scheduler step.
#[derive(Debug)]
pub struct SchedulerStep<T> {
    /// Nodes whose join counter just reached zero; the caller must launch them.
    pub newly_ready: Vec<Node<T>>,
    /// Nodes that can no longer run because an ancestor failed.
    pub newly_blocked: Vec<NodeId>,
    /// Whether every node in the snapshot is now settled.
    pub finished: bool,
}

impl<T> SchedulerStep<T> {
    fn idle(finished: bool) -> Self {
        Self {
            newly_ready: Vec::new(),
            newly_blocked: Vec::new(),
            finished,
        }
    }
}

pub struct Scheduler<T> {
    slots: HashMap<NodeId, Slot<T>>,
    roots: Vec<NodeId>,
    /// Nodes that are neither settled nor blocked.
    outstanding: usize,
}

impl<T> Scheduler<T> {
    /// Snapshot the graph reachable from `roots` and validate it.
    ///
    /// Rejects:
    /// - roots that have parents, or roots listed twice
    /// - nodes that were already launched by an earlier execution
    /// - nodes whose parents are not reachable from any root (their join
    ///   counter could never reach zero)
    /// - cycles
    pub fn from_roots(roots: &[Node<T>]) -> Result<Self> {
        let mut slots: HashMap<NodeId, Slot<T>> = HashMap::new();
        let mut parents_of: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut queue: VecDeque<Node<T>> = VecDeque::new();
        let mut root_ids = Vec::with_capacity(roots.len());
        let mut seen_roots = HashSet::new();

        for root in roots {
            if !seen_roots.insert(root.uuid()) {
                return Err(DagstreamError::InvalidGraph(format!(
                    "node '{}' is listed as a root more than once",
                    root.label()
                )));
            }
            let parent_count = root.parent_count();
            if parent_count > 0 {
                return Err(DagstreamError::InvalidGraph(format!(
                    "root node '{}' has {} parent(s)",
                    root.label(),
                    parent_count
                )));
            }
            root_ids.push(root.uuid());
            queue.push_back(root.clone());
        }

        while let Some(node) = queue.pop_front() {
            let id = node.uuid();
            if slots.contains_key(&id) {
                continue;
            }

            let state = node.state();
            if state != NodeState::Pending {
                return Err(DagstreamError::InvalidGraph(format!(
                    "node '{}' is in state {:?}; node state is not reset between executions",
                    node.label(),
                    state
                )));
            }

            let parents = node.parents();
            let children = node.children();
            let child_ids = children.iter().map(Node::uuid).collect();
            queue.extend(children);

            slots.insert(
                id,
                Slot {
                    pending_parents: parents.len(),
                    node,
                    children: child_ids,
                    state: SlotState::Waiting,
                },
            );
            parents_of.insert(id, parents);
        }

        for (id, parents) in &parents_of {
            for parent in parents {
                if !slots.contains_key(parent) {
                    let label = slots
                        .get(id)
                        .map(|slot| slot.node.label())
                        .unwrap_or_else(|| id.to_string());
                    return Err(DagstreamError::InvalidGraph(format!(
                        "node '{label}' depends on node {parent}, which is not reachable from any root"
                    )));
                }
            }
        }

        ensure_acyclic(&slots)?;

        let outstanding = slots.len();
        debug!(
            nodes = outstanding,
            roots = root_ids.len(),
            "scheduler: graph snapshot validated"
        );

        Ok(Self {
            slots,
            roots: root_ids,
            outstanding,
        })
    }

    /// Number of nodes in the snapshot.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Nodes that have not yet settled and are not blocked.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// `true` once every node is completed, failed or blocked.
    pub fn is_finished(&self) -> bool {
        self.outstanding == 0
    }

    pub fn state_of(&self, id: NodeId) -> Option<SlotState> {
        self.slots.get(&id).map(|slot| slot.state)
    }

    /// Live join counter of a node: parent edges not yet completed.
    pub fn pending_parents(&self, id: NodeId) -> Option<usize> {
        self.slots.get(&id).map(|slot| slot.pending_parents)
    }

    /// Launch every root. Returns the nodes to start, in root order.
    pub fn seed(&mut self) -> Vec<Node<T>> {
        let mut ready = Vec::with_capacity(self.roots.len());
        for id in &self.roots {
            if let Some(slot) = self.slots.get_mut(id) {
                if slot.state == SlotState::Waiting && slot.pending_parents == 0 {
                    slot.state = SlotState::Launched;
                    ready.push(slot.node.clone());
                }
            }
        }
        info!(roots = ready.len(), "scheduler: seeding root nodes");
        ready
    }

    /// Record a successful completion and release children whose join
    /// counter reaches zero.
    pub fn handle_completion(&mut self, id: NodeId) -> SchedulerStep<T> {
        let children = match self.settle(id, SlotState::Completed) {
            Some(children) => children,
            None => return SchedulerStep::idle(self.is_finished()),
        };

        let mut newly_ready = Vec::new();
        for child_id in children {
            let Some(child) = self.slots.get_mut(&child_id) else {
                warn!(node = %child_id, "child missing from scheduler snapshot");
                continue;
            };
            child.pending_parents = child.pending_parents.saturating_sub(1);
            if child.pending_parents == 0 && child.state == SlotState::Waiting {
                debug!(
                    node = %child.node.label(),
                    "all parents completed; launching"
                );
                child.state = SlotState::Launched;
                newly_ready.push(child.node.clone());
            }
        }

        SchedulerStep {
            newly_ready,
            newly_blocked: Vec::new(),
            finished: self.is_finished(),
        }
    }

    /// Record a failure and block every waiting descendant.
    ///
    /// Children of a failed node never get their counter decremented for that
    /// edge, so they and everything below them can never run. They are
    /// subtracted from the outstanding count here so the execution still
    /// terminates.
    pub fn handle_failure(&mut self, id: NodeId) -> SchedulerStep<T> {
        let mut stack = match self.settle(id, SlotState::Failed) {
            Some(children) => children,
            None => return SchedulerStep::idle(self.is_finished()),
        };

        let mut newly_blocked = Vec::new();
        while let Some(child_id) = stack.pop() {
            let Some(child) = self.slots.get_mut(&child_id) else {
                continue;
            };
            if child.state != SlotState::Waiting {
                continue;
            }
            child.state = SlotState::Blocked;
            self.outstanding -= 1;
            debug!(
                node = %child.node.label(),
                "upstream failure; node will not run"
            );
            newly_blocked.push(child_id);
            stack.extend(child.children.iter().copied());
        }

        SchedulerStep {
            newly_ready: Vec::new(),
            newly_blocked,
            finished: self.is_finished(),
        }
    }

    /// Move a launched slot into a terminal state, returning its children.
    fn settle(&mut self, id: NodeId, terminal: SlotState) -> Option<Vec<NodeId>> {
        let Some(slot) = self.slots.get_mut(&id) else {
            warn!(node = %id, "outcome for unknown node; ignoring");
            return None;
        };
        if slot.state != SlotState::Launched {
            warn!(
                node = %slot.node.label(),
                state = ?slot.state,
                outcome = ?terminal,
                "outcome for node that is not running; ignoring"
            );
            return None;
        }
        slot.state = terminal;
        self.outstanding -= 1;
        Some(slot.children.clone())
    }
}

fn ensure_acyclic<T>(slots: &HashMap<NodeId, Slot<T>>) -> Result<()> {
    // Edge direction: parent -> child.
    let mut graph: DiGraphMap<NodeId, ()> = DiGraphMap::new();

    for id in slots.keys() {
        graph.add_node(*id);
    }
    for (id, slot) in slots {
        for child in &slot.children {
            graph.add_edge(*id, *child, ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let id = cycle.node_id();
            let label = slots
                .get(&id)
                .map(|slot| slot.node.label())
                .unwrap_or_else(|| id.to_string());
            Err(DagstreamError::DagCycle(format!(
                "cycle detected in node graph involving node '{label}'"
            )))
        }
    }
}
