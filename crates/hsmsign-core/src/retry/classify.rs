//! Transient/permanent classification by response status.

/// Errors that may carry the status code of a remote response.
pub trait ResponseStatus {
    fn response_status(&self) -> Option<u16>;
}

/// Server-side failures (5xx and above) are worth retrying.
pub fn is_server_error(status: u16) -> bool {
    status >= 500
}

/// Classifier for [`run_with_retry`](super::run_with_retry): transient iff the
/// error carries a status code of 500 or more.
pub fn is_transient_status<E: ResponseStatus>(err: &E) -> bool {
    err.response_status().is_some_and(is_server_error)
}
