//! Task-agnostic resilience primitives.
//!
//! - [`delay`] / [`delay_or_cancel`]: timer-based sleeps
//! - [`compute_backoff`]: exponential backoff with optional jitter
//! - [`with_timeout`]: bound a future by a deadline
//! - [`with_retry`] / [`with_retry_notify`]: repeat a fallible operation under a [`RetryPolicy`]

mod backoff;
mod retry;
mod timeout;

pub use backoff::{compute_backoff, delay, delay_or_cancel};
pub use retry::{AttemptFailure, RetryError, RetryPolicy, with_retry, with_retry_notify};
pub use timeout::{TimeoutError, with_timeout};
