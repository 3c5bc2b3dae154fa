// tests/scheduler_property.rs

use std::collections::{HashMap, HashSet};

use dagstream::engine::{Scheduler, SlotState};
use dagstream::{Node, NodeId};
use dagstream_test_utils::work::result_node;
use futures::executor::block_on;
use proptest::prelude::*;

// Node `i` may only depend on nodes `0..i`, which keeps the graph acyclic.
// Nodes with no parents become roots.
fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_nodes).prop_flat_map(|count| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), count).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        let mut deps: Vec<usize> = if i == 0 {
                            Vec::new()
                        } else {
                            deps.into_iter().map(|d| d % i).collect()
                        };
                        deps.sort_unstable();
                        deps.dedup();
                        deps
                    })
                    .collect()
            },
        )
    })
}

fn build_graph(deps: &[Vec<usize>]) -> (Vec<Node<String>>, Vec<Node<String>>) {
    let nodes: Vec<Node<String>> = (0..deps.len())
        .map(|i| result_node(&format!("n{i}")))
        .collect();
    for (i, parents) in deps.iter().enumerate() {
        for &p in parents {
            block_on(nodes[p].connect(&nodes[i])).unwrap();
        }
    }
    let roots = nodes.iter().filter(|n| n.is_root()).cloned().collect();
    (nodes, roots)
}

proptest! {
    #[test]
    fn test_scheduler_launches_each_node_once_after_its_parents(
        deps in dag_strategy(12),
        picks in proptest::collection::vec(any::<usize>(), 64),
        failing in proptest::collection::hash_set(0..12usize, 0..4),
    ) {
        let (nodes, roots) = build_graph(&deps);
        let index: HashMap<NodeId, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.uuid(), i)).collect();

        let mut scheduler = Scheduler::from_roots(&roots).unwrap();
        prop_assert_eq!(scheduler.len(), nodes.len());

        let mut running: Vec<usize> = scheduler.seed().iter().map(|n| index[&n.uuid()]).collect();
        let mut launched: HashSet<usize> = running.iter().copied().collect();
        let mut completed: HashSet<usize> = HashSet::new();
        let mut step = 0usize;

        while !running.is_empty() {
            let pick = picks[step % picks.len()] % running.len();
            step += 1;
            let current = running.swap_remove(pick);
            let id = nodes[current].uuid();

            let outcome = if failing.contains(&current) {
                scheduler.handle_failure(id)
            } else {
                completed.insert(current);
                scheduler.handle_completion(id)
            };

            for node in outcome.newly_ready {
                let i = index[&node.uuid()];
                prop_assert!(launched.insert(i), "node n{} launched twice", i);
                for &p in &deps[i] {
                    prop_assert!(completed.contains(&p), "n{} launched before parent n{}", i, p);
                }
                running.push(i);
            }
            prop_assert!(step <= nodes.len(), "more steps than nodes");
        }

        // Once nothing is running, every node has settled.
        prop_assert!(scheduler.is_finished());
        prop_assert_eq!(scheduler.outstanding(), 0);

        for (i, node) in nodes.iter().enumerate() {
            let state = scheduler.state_of(node.uuid()).unwrap();
            prop_assert!(state.is_settled());
            let has_failed_ancestor_path = state == SlotState::Blocked;
            if has_failed_ancestor_path {
                prop_assert!(!launched.contains(&i));
            } else {
                prop_assert!(launched.contains(&i));
            }
        }
    }
}

#[test]
fn test_scheduler_blocks_whole_subtree() {
    let deps = vec![vec![], vec![0], vec![1], vec![2], vec![0]];
    let (nodes, roots) = build_graph(&deps);
    let mut scheduler = Scheduler::from_roots(&roots).unwrap();

    let seeded = scheduler.seed();
    assert_eq!(seeded.len(), 1);

    let step = scheduler.handle_completion(nodes[0].uuid());
    assert_eq!(step.newly_ready.len(), 2);

    let step = scheduler.handle_failure(nodes[1].uuid());
    assert_eq!(step.newly_blocked.len(), 2);
    assert!(!step.finished);
    assert_eq!(scheduler.state_of(nodes[3].uuid()), Some(SlotState::Blocked));

    let step = scheduler.handle_completion(nodes[4].uuid());
    assert!(step.finished);
}

#[test]
fn test_join_counter_counts_down_per_parent() {
    let deps = vec![vec![], vec![0], vec![0], vec![1, 2]];
    let (nodes, roots) = build_graph(&deps);
    let mut scheduler = Scheduler::from_roots(&roots).unwrap();
    let join = nodes[3].uuid();

    scheduler.seed();
    assert_eq!(scheduler.pending_parents(join), Some(2));
    scheduler.handle_completion(nodes[0].uuid());

    let step = scheduler.handle_completion(nodes[1].uuid());
    assert!(step.newly_ready.is_empty());
    assert_eq!(scheduler.pending_parents(join), Some(1));

    let step = scheduler.handle_completion(nodes[2].uuid());
    assert_eq!(step.newly_ready.len(), 1);
    assert_eq!(step.newly_ready[0].uuid(), join);
    assert_eq!(scheduler.state_of(join), Some(SlotState::Launched));
}

#[test]
fn test_outcome_for_unknown_node_is_ignored() {
    let (_nodes, roots) = build_graph(&[vec![]]);
    let mut scheduler = Scheduler::from_roots(&roots).unwrap();
    scheduler.seed();

    let stranger = result_node("stranger");
    let step = scheduler.handle_completion(stranger.uuid());
    assert!(step.newly_ready.is_empty());
    assert_eq!(scheduler.outstanding(), 1);
}
