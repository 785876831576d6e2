//! HTTP clients for the Intra v2 API and the Slack Web API.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

mod intra;
mod limiter;
mod slack;

pub use intra::{DEFAULT_PAGE_SIZE, IntraClient, IntraCredentials};
pub use limiter::{Cooldown, RateLimiter};
pub use slack::SlackClient;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

/// Errors produced by the SDK HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Slack answered `ok: false`.
    #[error("slack error: {0}")]
    Slack(String),

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Status code of a structured API failure.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A response that reached the caller after throttling and 429 retries.
///
/// Non-2xx statuses are not errors at this level; callers decide whether a
/// failure is fatal to their operation.
#[derive(Debug, Clone)]
pub struct Response {
    pub ok: bool,
    pub status: StatusCode,
    pub body: String,
}

impl Response {
    /// Decode the body regardless of status.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_str(&self.body).map_err(ClientError::Json)
    }

    /// Turn a failed response into [`ClientError::Api`].
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.ok {
            Ok(self)
        } else {
            Err(ClientError::Api {
                status: self.status,
                body: self.body,
            })
        }
    }

    /// Decode a successful response, failing on non-2xx.
    pub fn parse<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        self.error_for_status()?.json()
    }
}
