//! Public error contract of the signing client.

use crate::retry::{Cancelled, ResponseStatus};
use crate::stream::FramingError;
use std::io;
use thiserror::Error;

/// Coarse classification of a [`SignError`], for callers that branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Encoding,
    Framing,
    Io,
    TransientCommunication,
    PermanentCommunication,
    Cancellation,
}

#[derive(Debug, Error)]
pub enum SignError {
    /// Caller input rejected before anything was sent.
    #[error("invalid sign request: {0}")]
    Validation(&'static str),
    /// The request body could not be serialized.
    #[error("failed to encode sign request: {0}")]
    Encoding(#[from] serde_json::Error),
    /// Response ended early or could not be parsed.
    #[error("malformed response from HSM: {0}")]
    Framing(#[source] FramingError),
    /// Connecting, reading or writing the channel failed.
    #[error("HSM connection failed: {0}")]
    Io(#[from] io::Error),
    /// Server-side failure (5xx); eligible for retry.
    #[error("error calling sign: {message} (HTTP {status_code})")]
    TransientCommunication { message: String, status_code: u16 },
    /// Any other non-success status, or a transient failure that outlasted its retries.
    #[error("error calling sign: {message} (HTTP {status_code})")]
    PermanentCommunication { message: String, status_code: u16 },
    #[error("sign request cancelled")]
    Cancelled,
}

impl SignError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SignError::Validation(_) => ErrorKind::Validation,
            SignError::Encoding(_) => ErrorKind::Encoding,
            SignError::Framing(_) => ErrorKind::Framing,
            SignError::Io(_) => ErrorKind::Io,
            SignError::TransientCommunication { .. } => ErrorKind::TransientCommunication,
            SignError::PermanentCommunication { .. } => ErrorKind::PermanentCommunication,
            SignError::Cancelled => ErrorKind::Cancellation,
        }
    }

    /// HTTP status of the response that caused this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SignError::TransientCommunication { status_code, .. }
            | SignError::PermanentCommunication { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Error for a non-2xx response, transient or permanent by status.
    pub(crate) fn from_status(status_code: u16, message: String) -> Self {
        if crate::retry::is_server_error(status_code) {
            SignError::TransientCommunication {
                message,
                status_code,
            }
        } else {
            SignError::PermanentCommunication {
                message,
                status_code,
            }
        }
    }

    /// Final form handed to the caller: a transient failure that survived
    /// every retry becomes permanent.
    pub(crate) fn into_terminal(self) -> Self {
        match self {
            SignError::TransientCommunication {
                message,
                status_code,
            } => SignError::PermanentCommunication {
                message,
                status_code,
            },
            other => other,
        }
    }
}

impl From<FramingError> for SignError {
    fn from(e: FramingError) -> Self {
        match e {
            FramingError::Io(io) => SignError::Io(io),
            other => SignError::Framing(other),
        }
    }
}

impl From<Cancelled> for SignError {
    fn from(_: Cancelled) -> Self {
        SignError::Cancelled
    }
}

impl ResponseStatus for SignError {
    fn response_status(&self) -> Option<u16> {
        self.status_code()
    }
}
