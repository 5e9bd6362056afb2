//! Retry loop: run an async operation until success, a permanent error, or the attempt budget runs out.

use super::policy::{RetryDecision, RetryPolicy};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Returned when the caller's cancellation token fired during an attempt or a backoff sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Per-invocation bookkeeping, discarded when the loop returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryAttemptState {
    /// 1-based index of the attempt in flight (0 before the first).
    pub attempt: u32,
    /// Sum of backoff delays slept so far.
    pub elapsed_delay: Duration,
    /// Display form of the most recent transient failure.
    pub last_error: Option<String>,
}

impl RetryAttemptState {
    /// Stores the display form of a transient failure and returns it for logging.
    pub fn record_failure(&mut self, err: &dyn fmt::Display) -> &str {
        self.last_error.insert(err.to_string())
    }
}

/// Runs `op` until it succeeds or the policy says to stop.
///
/// `op` receives the 1-based attempt number. A failure for which
/// `is_transient` returns false is returned immediately. Transient failures
/// are retried after the policy's backoff delay until `max_attempts` is
/// reached, then the last error is returned. Cancellation is observed while
/// an attempt is in flight and while sleeping; the in-flight attempt is
/// dropped and nothing is retried.
pub async fn run_with_retry<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    is_transient: C,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: From<Cancelled> + fmt::Display,
{
    let mut state = RetryAttemptState::default();
    loop {
        state.attempt += 1;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Cancelled.into()),
            outcome = op(state.attempt) => outcome,
        };
        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let transient = is_transient(&err);
        match policy.decide(state.attempt, transient) {
            RetryDecision::NoRetry => {
                if transient {
                    let attempts = state.attempt;
                    let waited_ms = state.elapsed_delay.as_millis() as u64;
                    let message = state.record_failure(&err);
                    tracing::warn!(
                        attempts,
                        waited_ms,
                        "giving up after transient failures: {}",
                        message
                    );
                }
                return Err(err);
            }
            RetryDecision::RetryAfter(delay) => {
                let attempt = state.attempt;
                let message = state.record_failure(&err);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, retrying: {}",
                    message
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Cancelled.into()),
                    _ = tokio::time::sleep(delay) => {}
                }
                state.elapsed_delay += delay;
            }
        }
    }
}
