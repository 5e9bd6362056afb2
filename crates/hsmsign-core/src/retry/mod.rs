//! Retry and backoff policy.
//!
//! Generic over the operation and its error type: callers plug in a
//! transient/permanent classifier and get a bounded, cancellable retry loop
//! with a deterministic exponential backoff schedule between attempts.

mod classify;
mod policy;
mod run;

pub use classify::{is_server_error, is_transient_status, ResponseStatus};
pub use policy::{ExponentialBackoff, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, Cancelled, RetryAttemptState};
