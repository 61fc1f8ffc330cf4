//! Timed stage calls with retry and exponential backoff.

use std::future::Future;
use std::time::Duration;

use pmcr_core::{CycleTrace, RetryPolicy, StageError, StageKind, TraceEventKind};
use rand::Rng;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

/// Invoke `operation` under `per_call_timeout`, retrying transient failures
/// according to `policy`.
///
/// A call that exceeds the timeout counts as a transient failure. Every
/// attempt, completion and retry is appended to `events`; the final failure
/// is left for the caller to record.
pub async fn invoke_with_retry<T, F, Fut>(
    stage: StageKind,
    policy: &RetryPolicy,
    per_call_timeout: Duration,
    events: &mut CycleTrace,
    iteration: u32,
    mut operation: F,
) -> Result<T, StageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StageError>>,
{
    let mut attempt: u32 = 1;

    loop {
        events.record(iteration, TraceEventKind::StageStarted { stage, attempt }, None);
        let started = Instant::now();

        let outcome = match timeout(per_call_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(StageError::transient(
                stage,
                format!("timed out after {}ms", per_call_timeout.as_millis()),
            )),
        };
        let elapsed_ms = millis(started.elapsed());

        match outcome {
            Ok(reply) => {
                if attempt > 1 {
                    debug!(%stage, attempt, "Stage call succeeded after retries");
                }
                events.record(
                    iteration,
                    TraceEventKind::StageCompleted { stage, attempt },
                    Some(elapsed_ms),
                );
                return Ok(reply);
            }
            Err(err) if err.transient && attempt <= policy.max_retries => {
                let backoff = with_jitter(policy.backoff_for(attempt));
                warn!(
                    %stage,
                    attempt,
                    backoff_ms = millis(backoff),
                    "Transient stage failure: {}. Retrying",
                    err.cause
                );
                events.record(
                    iteration,
                    TraceEventKind::StageRetrying {
                        stage,
                        attempt,
                        cause: err.cause,
                        backoff_ms: millis(backoff),
                    },
                    Some(elapsed_ms),
                );
                sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => {
                if err.transient {
                    warn!(%stage, attempts = attempt, "Stage failed after retries: {}", err.cause);
                } else {
                    debug!(%stage, "Permanent stage failure, not retrying: {}", err.cause);
                }
                return Err(err);
            }
        }
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Add up to 25% random jitter.
fn with_jitter(backoff: Duration) -> Duration {
    let base = millis(backoff);
    let jitter = rand::thread_rng().gen_range(0..=base / 4);
    Duration::from_millis(base.saturating_add(jitter))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let mut events = CycleTrace::new();

        let result = invoke_with_retry(
            StageKind::Check,
            &RetryPolicy::default(),
            Duration::from_secs(1),
            &mut events,
            0,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(StageError::transient(StageKind::Check, "connection reset"))
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(events.retry_count(), 1);
        assert_eq!(events.calls_to(StageKind::Check), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let mut events = CycleTrace::new();

        let result: Result<(), _> = invoke_with_retry(
            StageKind::Plan,
            &RetryPolicy::new(2, 10, 100),
            Duration::from_secs(1),
            &mut events,
            0,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StageError::transient(StageKind::Plan, "503")) }
            },
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.transient);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(events.retry_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_is_not_retried() {
        let calls = AtomicU32::new(0);
        let mut events = CycleTrace::new();

        let result: Result<(), _> = invoke_with_retry(
            StageKind::Make,
            &RetryPolicy::default(),
            Duration::from_secs(1),
            &mut events,
            0,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StageError::permanent(StageKind::Make, "bad request")) }
            },
        )
        .await;

        assert!(!result.unwrap_err().transient);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(events.retry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_transient() {
        let mut events = CycleTrace::new();

        let result: Result<(), _> = invoke_with_retry(
            StageKind::Reflect,
            &RetryPolicy::none(),
            Duration::from_millis(100),
            &mut events,
            0,
            || async {
                sleep(Duration::from_secs(60)).await;
                Ok(())
            },
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.transient);
        assert!(err.cause.contains("timed out after 100ms"));
    }

    #[test]
    fn test_jitter_bounds() {
        for _ in 0..100 {
            let d = with_jitter(Duration::from_millis(100));
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(125));
        }
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
        assert!(with_jitter(Duration::MAX) >= Duration::from_millis(u64::MAX));
    }
}
