// tests/failures.rs

use std::time::Duration;

use dagstream::errors::DagstreamError;
use dagstream::{EmptyOutputPolicy, ExecutorConfig, Item, Node, NodeState, TreeExecutor, Work};
use dagstream_test_utils::work::{failing, result_node};
use dagstream_test_utils::{collect_items, init_tracing};
use futures::StreamExt;

fn completed(items: &[Item<String>]) -> Vec<dagstream::NodeId> {
    items
        .iter()
        .filter_map(Item::as_node)
        .map(Node::uuid)
        .collect()
}

fn slow_yielding() -> Work<String> {
    Work::streaming(|node: Node<String>| {
        let label = node.label();
        futures::stream::iter([format!("{label} first"), format!("{label} second")]).then(
            |value| async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, anyhow::Error>(value)
            },
        )
    })
}

#[tokio::test]
async fn test_yielding_timeout() {
    init_tracing();

    let root = result_node("root");
    let slow = Node::builder(slow_yielding())
        .name("slow")
        .timeout(Duration::from_millis(500))
        .build();
    root.connect(&slow).await.unwrap();

    let executor = TreeExecutor::new("Yielding Timeout Tree", vec![root.clone()]);
    let items = collect_items(executor.yielding()).await;
    let done = completed(&items);

    assert!(done.contains(&root.uuid()));
    assert!(!done.contains(&slow.uuid()));
    assert!(items.iter().all(|item| item.uuid() != slow.uuid()));

    let errors = executor.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].is_timeout());
    assert_eq!(errors[0].node(), Some(slow.uuid()));
    assert_eq!(slow.state(), NodeState::Failed);
    assert_eq!(root.state(), NodeState::Completed);
}

#[tokio::test]
async fn test_chunks_before_timeout_are_still_delivered() {
    init_tracing();

    let node = Node::builder(Work::streaming(|_node: Node<String>| {
        futures::stream::iter(0..3).then(|i| async move {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            Ok::<_, anyhow::Error>(format!("tick {i}"))
        })
    }))
    .name("ticker")
    .timeout(Duration::from_millis(100))
    .build();

    let executor = TreeExecutor::new("partial", vec![node.clone()]);
    let items = collect_items(executor.yielding()).await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_chunk().map(|c| c.output().as_str()), Some("tick 0"));
    assert_eq!(node.output(), Some("tick 0".to_string()));
    assert_eq!(executor.errors().len(), 1);
    assert!(executor.errors()[0].is_timeout());
}

#[tokio::test]
async fn test_default_timeout_applies_to_nodes_without_one() {
    init_tracing();

    let slow = Node::named(
        "slow",
        dagstream_test_utils::work::value_after(Duration::from_secs(2)),
    );
    let config = ExecutorConfig {
        default_timeout: Some(Duration::from_millis(50)),
        ..ExecutorConfig::default()
    };
    let executor = TreeExecutor::with_config("default-timeout", vec![slow.clone()], config);
    let items = collect_items(executor.yielding()).await;

    assert!(items.is_empty());
    assert_eq!(executor.errors().len(), 1);
    assert!(executor.errors()[0].is_timeout());
}

#[tokio::test]
async fn test_work_error_is_recorded_unmodified() {
    init_tracing();

    let root = result_node("root");
    let broken = Node::named("broken", failing("disk on fire", Duration::from_millis(5)));
    let sibling = result_node("sibling");
    root.connect(&broken).await.unwrap();
    root.connect(&sibling).await.unwrap();

    let executor = TreeExecutor::new("work-error", vec![root.clone()]);
    let items = collect_items(executor.yielding()).await;
    let done = completed(&items);

    assert_eq!(done.len(), 2);
    assert!(done.contains(&sibling.uuid()));
    assert!(!done.contains(&broken.uuid()));

    let errors = executor.errors();
    assert_eq!(errors.len(), 1);
    match errors[0].as_ref() {
        DagstreamError::Work { node, source } => {
            assert_eq!(*node, broken.uuid());
            assert_eq!(source.to_string(), "disk on fire");
        }
        other => panic!("expected Work error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_node_blocks_subtree_but_not_siblings() {
    init_tracing();

    // root -> broken -> child -> grandchild
    // root -> healthy -> healthy_child
    // broken + healthy -> join
    let root = result_node("root");
    let broken = Node::named("broken", failing("boom", Duration::from_millis(5)));
    let child = result_node("child");
    let grandchild = result_node("grandchild");
    let healthy = result_node("healthy");
    let healthy_child = result_node("healthy_child");
    let join = result_node("join");

    root.connect(&broken).await.unwrap();
    broken.connect(&child).await.unwrap();
    child.connect(&grandchild).await.unwrap();
    root.connect(&healthy).await.unwrap();
    healthy.connect(&healthy_child).await.unwrap();
    broken.connect(&join).await.unwrap();
    healthy.connect(&join).await.unwrap();

    let executor = TreeExecutor::new("blocked", vec![root.clone()]);
    let items = collect_items(executor.yielding()).await;
    let done = completed(&items);

    assert_eq!(done.len(), 3);
    for node in [&root, &healthy, &healthy_child] {
        assert!(done.contains(&node.uuid()), "{} should complete", node.label());
    }
    for node in [&child, &grandchild, &join] {
        assert!(items.iter().all(|item| item.uuid() != node.uuid()));
        assert_eq!(node.state(), NodeState::Pending, "{} must never run", node.label());
    }

    // Blocked descendants are not errors of their own.
    assert_eq!(executor.errors().len(), 1);
}

#[tokio::test]
async fn test_failing_root_ends_stream() {
    init_tracing();

    let root = Node::named("root", failing("nope", Duration::from_millis(1)));
    let child = result_node("child");
    root.connect(&child).await.unwrap();

    let executor = TreeExecutor::new("failing-root", vec![root]);
    let items = collect_items(executor.yielding()).await;

    assert!(items.is_empty());
    assert_eq!(executor.errors().len(), 1);
    assert_eq!(child.state(), NodeState::Pending);
}

#[tokio::test]
async fn test_panicking_work_is_isolated() {
    init_tracing();

    let root = result_node("root");
    let panicky = Node::named(
        "panicky",
        Work::single(|_node: Node<String>| async move {
            if true {
                panic!("work exploded");
            }
            Ok::<_, anyhow::Error>(String::new())
        }),
    );
    let sibling = result_node("sibling");
    root.connect(&panicky).await.unwrap();
    root.connect(&sibling).await.unwrap();

    let executor = TreeExecutor::new("panic", vec![root]);
    let items = collect_items(executor.yielding()).await;

    assert_eq!(completed(&items).len(), 2);
    let errors = executor.errors();
    assert_eq!(errors.len(), 1);
    match errors[0].as_ref() {
        DagstreamError::Panicked { node, message } => {
            assert_eq!(*node, panicky.uuid());
            assert!(message.contains("work exploded"));
        }
        other => panic!("expected Panicked error, got {other:?}"),
    }
    assert_eq!(panicky.state(), NodeState::Failed);
}

#[tokio::test]
async fn test_stream_item_error_fails_node_after_earlier_chunks() {
    init_tracing();

    let node = Node::named(
        "flaky",
        Work::streaming(|_node: Node<String>| {
            futures::stream::iter(vec![
                Ok("first".to_string()),
                Err(anyhow::anyhow!("second went wrong")),
                Ok("third".to_string()),
            ])
        }),
    );

    let executor = TreeExecutor::new("flaky", vec![node.clone()]);
    let items = collect_items(executor.yielding()).await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].output(), Some("first".to_string()));
    assert_eq!(node.state(), NodeState::Failed);
    assert_eq!(executor.errors().len(), 1);
}

fn empty_stream() -> Work<String> {
    Work::streaming(|_node: Node<String>| futures::stream::empty::<anyhow::Result<String>>())
}

#[tokio::test]
async fn test_empty_stream_completes_by_default() {
    init_tracing();

    let root = Node::named("silent", empty_stream());
    let child = result_node("child");
    root.connect(&child).await.unwrap();

    let executor = TreeExecutor::new("empty-complete", vec![root.clone()]);
    let items = collect_items(executor.yielding()).await;

    assert_eq!(completed(&items), vec![root.uuid(), child.uuid()]);
    assert_eq!(root.output(), None);
    assert_eq!(root.state(), NodeState::Completed);
    assert!(executor.errors().is_empty());
}

#[tokio::test]
async fn test_empty_stream_fails_when_configured() {
    init_tracing();

    let root = Node::named("silent", empty_stream());
    let child = result_node("child");
    root.connect(&child).await.unwrap();

    let config = ExecutorConfig {
        empty_output: EmptyOutputPolicy::Fail,
        ..ExecutorConfig::default()
    };
    let executor = TreeExecutor::with_config("empty-fail", vec![root.clone()], config);
    let items = collect_items(executor.yielding()).await;

    assert!(items.is_empty());
    let errors = executor.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0].as_ref(),
        DagstreamError::EmptyOutput { node } if *node == root.uuid()
    ));
    assert_eq!(child.state(), NodeState::Pending);
}

#[tokio::test]
async fn test_errors_are_stable_after_stream_end() {
    init_tracing();

    let root = result_node("root");
    let a = Node::named("a", failing("a failed", Duration::from_millis(5)));
    let b = Node::named("b", failing("b failed", Duration::from_millis(40)));
    root.connect(&a).await.unwrap();
    root.connect(&b).await.unwrap();

    let executor = TreeExecutor::new("stable", vec![root]);
    let _ = collect_items(executor.yielding()).await;

    let first: Vec<String> = executor.errors().iter().map(|e| e.to_string()).collect();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second: Vec<String> = executor.errors().iter().map(|e| e.to_string()).collect();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    // Completion order: `a` fails well before `b`.
    assert!(first[0].contains("a failed"));
    assert!(first[1].contains("b failed"));
}
