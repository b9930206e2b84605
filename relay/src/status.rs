use crate::errors::RelayError;
use http::StatusCode;
use std::fmt;

/// How much of an upstream error page is echoed back.
pub const SNIPPET_CHARS: usize = 200;

/// Outcome of one relay attempt, rendered as a single text status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayStatus {
    Ok,
    TokenNotFound,
    UpstreamError { code: u16, snippet: String },
    InternalError(String),
}

impl RelayStatus {
    /// 200 and the form backend's 302 thank-you redirect both mean the response was recorded.
    pub fn classify(status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::OK | StatusCode::FOUND => RelayStatus::Ok,
            _ => RelayStatus::UpstreamError {
                code: status.as_u16(),
                snippet: body.chars().take(SNIPPET_CHARS).collect(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, RelayStatus::Ok)
    }

    /// Metric tag value
    pub fn outcome(&self) -> &'static str {
        match self {
            RelayStatus::Ok => "ok",
            RelayStatus::TokenNotFound => "token_not_found",
            RelayStatus::UpstreamError { .. } => "upstream_error",
            RelayStatus::InternalError(_) => "internal_error",
        }
    }
}

impl From<RelayError> for RelayStatus {
    fn from(err: RelayError) -> Self {
        RelayStatus::InternalError(err.to_string())
    }
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayStatus::Ok => write!(f, "OK"),
            RelayStatus::TokenNotFound => write!(f, "ERR: token not found"),
            RelayStatus::UpstreamError { code, snippet } => write!(f, "ERR: {code} {snippet}"),
            RelayStatus::InternalError(message) => write!(f, "ERR: {message}"),
        }
    }
}
