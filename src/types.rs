use std::time::Duration;

use serde::Deserialize;

/// What happens to still-running node tasks when the consumer drops the
/// `yielding()` stream before it is exhausted.
///
/// - `Abort`: stop the execution (default). In-flight node tasks are aborted
///   and stay in `Running`; nodes not yet launched stay `Pending`.
/// - `Detach`: the execution keeps going in the background until every node
///   has settled. Items are discarded, but failures are still recorded in
///   the executor's `errors()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelPolicy {
    Abort,
    Detach,
}

impl Default for CancelPolicy {
    fn default() -> Self {
        CancelPolicy::Abort
    }
}

/// How a streaming node that finishes without producing any value is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyOutputPolicy {
    /// The node completes normally with no output (default).
    Complete,
    /// The node fails with `DagstreamError::EmptyOutput`.
    Fail,
}

impl Default for EmptyOutputPolicy {
    fn default() -> Self {
        EmptyOutputPolicy::Complete
    }
}

/// Engine-wide policies for one `TreeExecutor`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub cancel_on_drop: CancelPolicy,
    pub empty_output: EmptyOutputPolicy,
    /// Applied to every node that has no timeout of its own.
    pub default_timeout: Option<Duration>,
}
