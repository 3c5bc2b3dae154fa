// tests/command_work.rs
#![cfg(unix)]

use std::time::{Duration, Instant};

use dagstream::errors::DagstreamError;
use dagstream::exec::command_work;
use dagstream::{Item, Node, NodeState, TreeExecutor};
use dagstream_test_utils::{collect_items, init_tracing};

#[tokio::test]
async fn test_stdout_lines_become_chunks() {
    init_tracing();

    let node = Node::named("echo", command_work("echo one; echo two; echo three"));
    let executor = TreeExecutor::new("cmd", vec![node.clone()]);
    let items = collect_items(executor.yielding()).await;

    let chunks: Vec<String> = items
        .iter()
        .filter_map(Item::as_chunk)
        .map(|chunk| chunk.output().clone())
        .collect();
    assert_eq!(chunks, vec!["one", "two", "three"]);
    assert!(items.last().is_some_and(Item::is_node));
    assert_eq!(node.output(), Some("three".to_string()));
    assert!(executor.errors().is_empty());
}

#[tokio::test]
async fn test_non_zero_exit_fails_node() {
    init_tracing();

    let node = Node::named("broken", command_work("echo partial; exit 3"));
    let child = Node::named("after", command_work("echo never"));
    node.connect(&child).await.unwrap();

    let executor = TreeExecutor::new("cmd-fail", vec![node.clone()]);
    let items = collect_items(executor.yielding()).await;

    assert_eq!(items.len(), 1);
    assert!(matches!(&items[0], Item::Chunk(chunk) if chunk.output() == "partial"));
    assert_eq!(node.state(), NodeState::Failed);
    assert_eq!(child.state(), NodeState::Pending);

    let errors = executor.errors();
    assert_eq!(errors.len(), 1);
    match errors[0].as_ref() {
        DagstreamError::Work { source, .. } => {
            assert!(source.to_string().contains("exited with status 3"), "{source}");
        }
        other => panic!("expected Work error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_stops_long_command() {
    init_tracing();

    let node = Node::builder(command_work("echo begin; sleep 10; echo end"))
        .name("sleepy")
        .timeout(Duration::from_millis(300))
        .build();
    let executor = TreeExecutor::new("cmd-timeout", vec![node.clone()]);

    let started = Instant::now();
    let items = collect_items(executor.yielding()).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(items.len(), 1);
    assert_eq!(node.output(), Some("begin".to_string()));
    assert!(executor.errors()[0].is_timeout());
}

#[tokio::test]
async fn test_command_output_feeds_children_in_order() {
    init_tracing();

    let first = Node::named("first", command_work("echo 1"));
    let second = Node::named("second", command_work("echo 2"));
    first.connect(&second).await.unwrap();

    let executor = TreeExecutor::new("cmd-chain", vec![first.clone()]);
    let items = collect_items(executor.yielding()).await;

    let nodes: Vec<_> = items.iter().filter_map(Item::as_node).map(Node::uuid).collect();
    assert_eq!(nodes, vec![first.uuid(), second.uuid()]);
    assert_eq!(second.output(), Some("2".to_string()));
}
