use crate::config::ValidationError;
use http::StatusCode;
use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Errors that can occur while relaying a submission.
///
/// None of these reach the caller of `Relay::relay` directly; they are
/// flattened into `RelayStatus::InternalError`.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(#[source] reqwest::Error),

    #[error("view page returned {0}")]
    ViewFetchFailed(StatusCode),

    #[error("failed to read upstream response body: {0}")]
    ResponseBody(#[source] reqwest::Error),

    #[error("failed to read request body: {0}")]
    RequestBody(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("invalid upstream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid token pattern: {0}")]
    InvalidTokenPattern(#[from] regex::Error),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("relay task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
