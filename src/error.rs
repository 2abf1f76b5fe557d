//! Error types for the pipeline client and run controller.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single request against the pipeline API.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Non-2xx response. `detail` is the server-supplied `{"detail": ...}` text.
    #[error("HTTP {status}: {}", detail_or_body(.detail, .body))]
    Status {
        status: StatusCode,
        detail: Option<String>,
        body: String,
    },

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// Message shown to the user: the remote detail if any, otherwise the raw
    /// error text.
    pub fn user_message(&self) -> String {
        match self {
            TransportError::Status {
                detail: Some(detail),
                ..
            } => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::Request(e)
        }
    }
}

fn detail_or_body<'a>(detail: &'a Option<String>, body: &'a str) -> &'a str {
    detail.as_deref().unwrap_or(body)
}

/// Errors surfaced by `RunController` operations.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Terminal status was reached but the results could not be fetched.
    #[error("run finished but results are unavailable: {0}")]
    PartialResult(String),

    #[error("a run is already in progress")]
    AlreadyRunning,

    /// A reset superseded the operation before it completed.
    #[error("run was reset before the request completed")]
    Cancelled,
}
