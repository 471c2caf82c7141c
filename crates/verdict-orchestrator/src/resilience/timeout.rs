//! Deadline enforcement for futures.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// A labelled operation exceeded its time limit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{label} timed out after {}ms", after.as_millis())]
pub struct TimeoutError {
    /// Name of the operation that timed out.
    pub label: String,
    /// The limit that was exceeded.
    pub after: Duration,
}

/// Runs `future` to completion or until `timeout` elapses.
///
/// An absent or zero `timeout` disables the limit and the future's output is returned as is.
/// On expiry the future is dropped, which cancels whatever it was awaiting.
///
/// # Errors
/// Returns a [`TimeoutError`] carrying `label` when the limit is exceeded.
pub async fn with_timeout<F, T>(future: F, timeout: Option<Duration>, label: &str) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    match timeout.filter(|limit| !limit.is_zero()) {
        None => Ok(future.await),
        Some(after) => tokio::time::timeout(after, future)
            .await
            .map_err(|_| TimeoutError { label: label.to_string(), after }),
    }
}
