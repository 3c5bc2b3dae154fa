//! Ready-made work functions and nodes for tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dagstream::{Node, Work};
use futures::StreamExt;

/// Shared, ordered record of `start:<name>` / `end:<name>` markers.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Position of `entry` in the log, if present.
pub fn position(log: &EventLog, entry: &str) -> Option<usize> {
    log.lock().unwrap().iter().position(|e| e == entry)
}

/// Single-shot node that sleeps briefly and returns `"<name> result"`.
pub fn result_node(name: &str) -> Node<String> {
    Node::named(name, value_after(Duration::from_millis(10)))
}

/// Single-shot work returning `"<label> result"` after `delay`.
pub fn value_after(delay: Duration) -> Work<String> {
    Work::single(move |node: Node<String>| async move {
        tokio::time::sleep(delay).await;
        Ok::<_, anyhow::Error>(format!("{} result", node.label()))
    })
}

/// Streaming node producing `"<name> progress 0..2"` then `"<name> completed"`.
pub fn progress_node(name: &str) -> Node<String> {
    Node::named(name, progress_work(3, Duration::from_millis(10)))
}

/// Streaming work producing `steps` progress values and a final `completed`.
pub fn progress_work(steps: usize, delay: Duration) -> Work<String> {
    Work::streaming(move |node: Node<String>| {
        let label = node.label();
        let values: Vec<String> = (0..steps)
            .map(|i| format!("{label} progress {i}"))
            .chain(std::iter::once(format!("{label} completed")))
            .collect();
        futures::stream::iter(values).then(move |value| async move {
            tokio::time::sleep(delay).await;
            Ok::<_, anyhow::Error>(value)
        })
    })
}

/// Streaming work that yields exactly the given values, in order.
pub fn yields(values: &[&str]) -> Work<String> {
    let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    Work::streaming(move |_node: Node<String>| {
        futures::stream::iter(values.clone()).then(|value| async move {
            tokio::task::yield_now().await;
            Ok::<_, anyhow::Error>(value)
        })
    })
}

/// Single-shot work that fails with `message` after `delay`.
pub fn failing(message: &'static str, delay: Duration) -> Work<String> {
    Work::single(move |_node: Node<String>| async move {
        tokio::time::sleep(delay).await;
        Err::<String, _>(anyhow::anyhow!(message))
    })
}

/// Single-shot work that records `start:`/`end:` markers around a sleep.
pub fn tracked(log: EventLog, delay: Duration) -> Work<String> {
    Work::single(move |node: Node<String>| {
        let log = Arc::clone(&log);
        async move {
            let label = node.label();
            log.lock().unwrap().push(format!("start:{label}"));
            tokio::time::sleep(delay).await;
            log.lock().unwrap().push(format!("end:{label}"));
            Ok::<_, anyhow::Error>(format!("{label} result"))
        }
    })
}
