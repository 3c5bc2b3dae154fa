pub mod builders;
pub mod work;

use std::sync::Once;
use dagstream::logging::{LOG_ENV, filter_directives};
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// The filter follows the binary: `DAGSTREAM_LOG`, then `RUST_LOG`, then
/// `info`. Output is captured per test and only shown for failures unless
/// the tests run with `--nocapture`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let directives = filter_directives(
            None,
            std::env::var(LOG_ENV).ok().as_deref(),
            std::env::var("RUST_LOG").ok().as_deref(),
        );
        let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Drain a `yielding()` stream into a vector.
pub async fn collect_items<T>(stream: dagstream::Yielding<T>) -> Vec<dagstream::Item<T>>
where
    T: Clone + Send + 'static,
{
    use futures::StreamExt;
    with_timeout(stream.collect::<Vec<_>>()).await
}
