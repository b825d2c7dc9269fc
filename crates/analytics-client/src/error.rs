use reqwest::StatusCode;

use crate::jobs::JobStatus;

/// Client-wide result type.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failure while moving bytes between the client and the backend.
///
/// Never retried by the session client.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("invalid request URL for `{path}`: {reason}")]
    InvalidUrl { path: String, reason: String },

    #[error("invalid header value for `{name}`")]
    InvalidHeader { name: &'static str },

    #[error("transport error: {reason}")]
    Other { reason: String },
}

impl TransportError {
    pub fn other(reason: impl Into<String>) -> Self {
        Self::Other {
            reason: reason.into(),
        }
    }
}

/// Outcome of a failed refresh, shared by every caller that awaited it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct RefreshFailure {
    /// HTTP status returned by the refresh endpoint, if it answered at all.
    pub status: Option<StatusCode>,
    pub reason: String,
}

impl RefreshFailure {
    pub fn new(status: Option<StatusCode>, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend rejected the credential and the client could not recover
    /// (auth endpoint, or the single retry was also rejected).
    #[error("unauthorized request to {path}: {detail}")]
    Unauthorized { path: String, detail: String },

    #[error("session refresh failed: {0}")]
    RefreshFailed(RefreshFailure),

    #[error("request to {path} failed with HTTP {status}: {detail}")]
    Status {
        status: StatusCode,
        path: String,
        detail: String,
    },

    #[error("invalid response body from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl ClientError {
    pub fn status(status: StatusCode, path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Status {
            status,
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Whether this error means the session is no longer authorized.
    ///
    /// A failed refresh is reported as an authorization failure to every
    /// waiting caller.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::RefreshFailed(_))
    }

    /// Whether a caller may reasonably restart the whole operation.
    ///
    /// The client itself never retries these.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(TransportError::Network { source }) => {
                source.is_connect() || source.is_timeout() || source.is_request()
            }
            Self::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Transport(_)
            | Self::Unauthorized { .. }
            | Self::RefreshFailed(_)
            | Self::Decode { .. }
            | Self::Configuration { .. } => false,
        }
    }

    /// HTTP status attached to this error, if the backend answered.
    pub fn http_status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            Self::RefreshFailed(failure) => failure.status,
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised while driving a job to a terminal state.
///
/// A job that ends in `failed` is not an error; it is returned as a normal
/// terminal value.
#[derive(Debug, thiserror::Error)]
pub enum JobError<E> {
    #[error("job polling cancelled")]
    Cancelled,

    #[error("job {job_id} still {status} after {polls} polls")]
    PollLimitExceeded {
        job_id: String,
        status: JobStatus,
        polls: u32,
    },

    #[error("job {job_id} still {status} after {elapsed_ms} ms")]
    DeadlineExceeded {
        job_id: String,
        status: JobStatus,
        elapsed_ms: u64,
    },

    #[error("invalid job state transition: cannot transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error(transparent)]
    Source(E),
}

impl<E> JobError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_failure_is_an_authorization_failure() {
        let err = ClientError::RefreshFailed(RefreshFailure::new(
            Some(StatusCode::UNAUTHORIZED),
            "Invalid/expired refresh",
        ));
        assert!(err.is_authorization_failure());
        assert!(!err.is_retryable());
        assert_eq!(err.http_status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn server_errors_are_retryable_by_callers() {
        let err = ClientError::status(StatusCode::BAD_GATEWAY, "/datasets", "upstream");
        assert!(err.is_retryable());
        assert!(!err.is_authorization_failure());

        let err = ClientError::status(StatusCode::NOT_FOUND, "/datasets/9", "Dataset not found");
        assert!(!err.is_retryable());
    }
}
