//! Delays and exponential backoff.

use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const NANOS_PER_SEC: u128 = 1_000_000_000;
const JITTER_MIN: f64 = 0.7;
const JITTER_MAX: f64 = 1.3;

/// Suspends the current task for `duration` without blocking other tasks.
pub async fn delay(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Like [`delay`], but returns early when `cancel` fires.
///
/// Returns `true` if the full delay elapsed and `false` if it was cut short.
pub async fn delay_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = delay(duration) => true,
    }
}

/// Computes the wait before the attempt following `attempt` (1-based).
///
/// The raw delay is `base * 2^(attempt - 1)`. With `jitter` it is scaled by a uniform
/// factor in `[0.7, 1.3)`; the result is then clamped to `max`. Attempt 0 is treated as 1.
/// Arithmetic saturates instead of overflowing.
///
/// # Arguments
/// * `attempt` - The attempt that just failed, starting at 1
/// * `base` - Delay after the first attempt
/// * `max` - Optional upper bound
/// * `jitter` - Whether to randomize the delay
pub fn compute_backoff(attempt: u32, base: Duration, max: Option<Duration>, jitter: bool) -> Duration {
    let exponent = attempt.max(1) - 1;
    let raw = base.as_nanos().saturating_mul(2u128.saturating_pow(exponent));

    let scaled = if jitter {
        let factor = rand::thread_rng().gen_range(JITTER_MIN..JITTER_MAX);
        (raw as f64 * factor) as u128
    } else {
        raw
    };

    let clamped = max.map_or(scaled, |max| scaled.min(max.as_nanos()));
    duration_from_nanos(clamped)
}

fn duration_from_nanos(nanos: u128) -> Duration {
    u64::try_from(nanos / NANOS_PER_SEC)
        .map_or(Duration::MAX, |secs| Duration::new(secs, (nanos % NANOS_PER_SEC) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(400);

    #[test]
    fn test_first_attempt_waits_base() {
        assert_eq!(compute_backoff(1, BASE, None, false), BASE);
        assert_eq!(compute_backoff(0, BASE, None, false), BASE);
    }

    #[test]
    fn test_doubles_until_clamped() {
        let max = Some(Duration::from_millis(5000));
        let delays: Vec<u128> = (1..=6).map(|a| compute_backoff(a, BASE, max, false).as_millis()).collect();
        assert_eq!(delays, vec![400, 800, 1600, 3200, 5000, 5000]);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        for attempt in 1..=4 {
            let raw = compute_backoff(attempt, BASE, None, false).as_secs_f64();
            for _ in 0..200 {
                let jittered = compute_backoff(attempt, BASE, None, true).as_secs_f64();
                assert!(jittered >= raw * JITTER_MIN - 1e-6, "{jittered} below bound for attempt {attempt}");
                assert!(jittered <= raw * JITTER_MAX + 1e-6, "{jittered} above bound for attempt {attempt}");
            }
        }
    }

    #[test]
    fn test_jitter_respects_cap() {
        let max = Duration::from_millis(1000);
        for _ in 0..100 {
            assert!(compute_backoff(3, BASE, Some(max), true) <= max);
        }
    }

    #[test]
    fn test_huge_attempt_saturates() {
        assert_eq!(compute_backoff(u32::MAX, BASE, None, false), Duration::MAX);
        assert_eq!(
            compute_backoff(500, BASE, Some(Duration::from_secs(5)), false),
            Duration::from_secs(5)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_or_cancel_returns_early() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let started = tokio::time::Instant::now();

        let (completed, ()) = tokio::join!(delay_or_cancel(Duration::from_secs(10), &cancel), async move {
            delay(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        assert!(!completed);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_elapses() {
        let started = tokio::time::Instant::now();
        assert!(delay_or_cancel(Duration::from_millis(750), &CancellationToken::new()).await);
        assert_eq!(started.elapsed(), Duration::from_millis(750));
    }
}
