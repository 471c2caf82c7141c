//! Retry loop with per-attempt timeouts and exponential backoff.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::backoff::{compute_backoff, delay_or_cancel};
use super::timeout::with_timeout;
use crate::error::OrchestrationError;

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Option<Duration>,
    /// Randomize delays by a factor in [0.7, 1.3).
    pub jitter: bool,
    /// Time limit for each attempt.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(400),
            max_delay: Some(Duration::from_millis(5000)),
            jitter: true,
            attempt_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy without a cap, jitter or per-attempt timeout.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts, base_delay, max_delay: None, jitter: false, attempt_timeout: None }
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Enables or disables jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Sets the per-attempt time limit.
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Delay to wait after `attempt` (1-based) failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        compute_backoff(attempt, self.base_delay, self.max_delay, self.jitter)
    }
}

/// The error of one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    /// 1-based attempt number.
    pub attempt: u32,
    /// What went wrong.
    pub error: OrchestrationError,
}

/// Every attempt failed, or the run was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryError {
    /// One entry per invocation of the operation, in order.
    pub attempts: Vec<AttemptFailure>,
    /// The parent cancellation token fired before the attempts ran out.
    pub cancelled: bool,
}

impl RetryError {
    /// The final attempt's error, if any attempt was made.
    pub fn last(&self) -> Option<&OrchestrationError> {
        self.attempts.last().map(|failure| &failure.error)
    }

    /// How many times the operation was invoked.
    pub fn calls(&self) -> u32 {
        self.attempts.len() as u32
    }

    /// Collapses into a single error: `Cancelled` when cancelled, otherwise the final
    /// attempt's error.
    pub fn into_error(mut self) -> OrchestrationError {
        if self.cancelled {
            return OrchestrationError::Cancelled;
        }
        self.attempts
            .pop()
            .map_or_else(|| OrchestrationError::Other("no attempts were made".to_string()), |f| f.error)
    }
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cancelled {
            return write!(f, "{}", OrchestrationError::Cancelled);
        }
        match self.last() {
            Some(error) => write!(f, "{error}"),
            None => f.write_str("no attempts were made"),
        }
    }
}

impl std::error::Error for RetryError {}

impl From<RetryError> for OrchestrationError {
    fn from(err: RetryError) -> Self {
        err.into_error()
    }
}

/// Runs `operation` under `policy` with no cancellation and no retry callback.
///
/// See [`with_retry_notify`].
///
/// # Errors
/// Returns a [`RetryError`] holding every attempt's error when all attempts fail.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, RetryError>
where
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, OrchestrationError>>,
{
    with_retry_notify(policy, &CancellationToken::new(), operation, |_, _| {}).await
}

/// Runs `operation` up to `policy.max_attempts` times until it succeeds.
///
/// Each attempt is bounded by `policy.attempt_timeout` (label `attempt N`) and receives a
/// child of `cancel`; the child is cancelled when its attempt times out. After a failed
/// attempt that is not the last, `on_retry(error, attempt)` is called and the loop waits
/// `policy.backoff(attempt)`. Cancelling `cancel` interrupts both attempts and delays.
///
/// # Arguments
/// * `policy` - Attempt count, backoff and timeout settings
/// * `cancel` - Parent cancellation token
/// * `operation` - Produces one attempt's future
/// * `on_retry` - Called before each retry with the failed attempt's error and number
///
/// # Errors
/// Returns a [`RetryError`] when every attempt failed or the run was cancelled.
pub async fn with_retry_notify<T, F, Fut, N>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
    mut on_retry: N,
) -> Result<T, RetryError>
where
    F: FnMut(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, OrchestrationError>>,
    N: FnMut(&OrchestrationError, u32),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = Vec::new();

    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return Err(RetryError { attempts, cancelled: true });
        }

        let child = cancel.child_token();
        let label = format!("attempt {attempt}");
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(OrchestrationError::Cancelled),
            result = with_timeout(operation(child.clone()), policy.attempt_timeout, &label) => {
                result.unwrap_or_else(|timeout| {
                    child.cancel();
                    Err(timeout.into())
                })
            }
        };

        let error = match outcome {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if cancel.is_cancelled() {
            attempts.push(AttemptFailure { attempt, error: OrchestrationError::Cancelled });
            return Err(RetryError { attempts, cancelled: true });
        }

        if attempt < max_attempts {
            on_retry(&error, attempt);
            let wait = policy.backoff(attempt);
            debug!(attempt = attempt, delay_ms = wait.as_millis() as u64, error = %error, "Retrying after backoff");
            attempts.push(AttemptFailure { attempt, error });
            if !delay_or_cancel(wait, cancel).await {
                return Err(RetryError { attempts, cancelled: true });
            }
        } else {
            attempts.push(AttemptFailure { attempt, error });
        }
    }

    Err(RetryError { attempts, cancelled: false })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use verdict_abstraction::ModelError;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(100))
    }

    fn model_err(msg: &str) -> OrchestrationError {
        OrchestrationError::Model(ModelError::RequestError(msg.to_string()))
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(400));
        assert_eq!(policy.max_delay, Some(Duration::from_millis(5000)));
        assert!(policy.jitter);
        assert_eq!(policy.attempt_timeout, Some(Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_operation_is_called_max_attempts_times() {
        let calls = AtomicU32::new(0);
        let mut retries = Vec::new();

        let err = with_retry_notify(
            &fast_policy(4),
            &CancellationToken::new(),
            |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err::<(), _>(model_err(&format!("failure {n}"))) }
            },
            |_, attempt| retries.push(attempt),
        )
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(retries, vec![1, 2, 3]);
        assert_eq!(err.calls(), 4);
        assert!(!err.cancelled);
        assert_eq!(err.last(), Some(&model_err("failure 4")));
        assert_eq!(err.attempts[0].error, model_err("failure 1"));
        assert_eq!(err.to_string(), "Model error: Request Error: failure 4");
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_between_attempts() {
        let started = tokio::time::Instant::now();
        let policy = fast_policy(3);

        let _ = with_retry(&policy, |_| async { Err::<(), _>(model_err("nope")) }).await;

        // 100ms after attempt 1, 200ms after attempt 2, none after the last.
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures() {
        let calls = AtomicU32::new(0);
        let value = with_retry(&fast_policy(3), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err(model_err("flaky")) } else { Ok("third time") } }
        })
        .await
        .unwrap();

        assert_eq!(value, "third time");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&fast_policy(0), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(model_err("x")) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_attempt_cancels_its_token() {
        let tokens: Arc<std::sync::Mutex<Vec<CancellationToken>>> = Arc::default();
        let policy = fast_policy(2).with_attempt_timeout(Duration::from_secs(1));

        let err = with_retry(&policy, |token| {
            tokens.lock().unwrap().push(token);
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, OrchestrationError>(())
            }
        })
        .await
        .unwrap_err();

        let tokens = tokens.lock().unwrap();
        assert_eq!(tokens.len(), 2);
        assert!(tokens.iter().all(CancellationToken::is_cancelled));
        assert!(matches!(err.last(), Some(OrchestrationError::Timeout(t)) if t.label == "attempt 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_stops_retrying() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_secs(10));

        let (result, ()) = tokio::join!(
            with_retry_notify(
                &policy,
                &cancel,
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(model_err("down")) }
                },
                |_, _| {},
            ),
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                trigger.cancel();
            }
        );

        let err = result.unwrap_err();
        assert!(err.cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.into_error(), OrchestrationError::Cancelled);
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_calls() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = with_retry_notify(
            &fast_policy(3),
            &cancel,
            |_| async { Ok::<_, OrchestrationError>(()) },
            |_, _| {},
        )
        .await
        .unwrap_err();
        assert!(err.cancelled);
        assert_eq!(err.calls(), 0);
    }
}
