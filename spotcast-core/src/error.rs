use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way a SpotCast call or the workflow around it can stop.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Configuration(String),

    #[error("Insufficient credits: {available} available, {required} required.\nPurchase at: {purchase_url}")]
    Precondition {
        available: f64,
        required: f64,
        purchase_url: String,
    },

    #[error("Request to {path} failed")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("SpotCast request {path} failed with status {status}: {}", truncate(.body, 200))]
    Http {
        path: String,
        status: StatusCode,
        body: String,
    },

    #[error("Failed to parse response from {path}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Job reported failure: {payload}")]
    JobFailed { payload: serde_json::Value },

    #[error("Timed out waiting for completion after {elapsed:?} (budget {budget:?})")]
    PollTimeout { elapsed: Duration, budget: Duration },

    #[error("Cancelled")]
    Cancelled,

    #[error("Failed to write progress output: {0}")]
    Output(#[from] std::io::Error),
}

impl Error {
    /// Whether a retry of the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport { .. } => true,
            Error::Http { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Configuration(_) => 2,
            Error::Precondition { .. } => 3,
            Error::Transport { .. } => 4,
            Error::Http { .. } | Error::Decode { .. } => 5,
            Error::JobFailed { .. } => 6,
            Error::PollTimeout { .. } => 7,
            Error::Cancelled => 130,
            Error::Output(_) => 1,
        }
    }
}

/// Cut `s` to at most `max` characters without splitting a code point.
pub fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
