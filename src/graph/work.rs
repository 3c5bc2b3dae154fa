// src/graph/work.rs

//! User work wrapped by a node.
//!
//! A node runs exactly one of two shapes:
//! - [`Work::Single`]: an async function producing one output.
//! - [`Work::Streaming`]: a stream producing zero or more outputs; each one is
//!   forwarded as a chunk and the last one becomes the node's output.
//!
//! Both receive a handle to the owning node as context and report failure by
//! returning an `anyhow::Error`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};

use crate::graph::Node;

type SingleFn<T> = dyn Fn(Node<T>) -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync;
type StreamingFn<T> = dyn Fn(Node<T>) -> BoxStream<'static, anyhow::Result<T>> + Send + Sync;

pub enum Work<T> {
    Single(Arc<SingleFn<T>>),
    Streaming(Arc<StreamingFn<T>>),
}

impl<T: Send + 'static> Work<T> {
    /// Wrap a single-shot async function.
    pub fn single<F, Fut>(f: F) -> Self
    where
        F: Fn(Node<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Work::Single(Arc::new(move |node| f(node).boxed()))
    }

    /// Wrap a function returning a stream of intermediate outputs.
    pub fn streaming<F, S>(f: F) -> Self
    where
        F: Fn(Node<T>) -> S + Send + Sync + 'static,
        S: Stream<Item = anyhow::Result<T>> + Send + 'static,
    {
        Work::Streaming(Arc::new(move |node| f(node).boxed()))
    }
}

impl<T> Work<T> {
    pub fn is_streaming(&self) -> bool {
        matches!(self, Work::Streaming(_))
    }
}

impl<T> Clone for Work<T> {
    fn clone(&self) -> Self {
        match self {
            Work::Single(f) => Work::Single(Arc::clone(f)),
            Work::Streaming(f) => Work::Streaming(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for Work<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Work::Single(_) => f.write_str("Single(..)"),
            Work::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}
