//! Error taxonomy for calls against the remote API.
//!
//! Every failure a caller can observe is one of these variants. The
//! executor's retry loop is the only place errors are caught; once attempts
//! run out the last error is handed back with its variant intact.

use thiserror::Error;

/// Errors produced by the session client.
#[derive(Debug, Error)]
pub enum Error {
    /// The local call budget was exhausted and the caller could not wait.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The remote answered with a status other than 200.
    #[error("{endpoint}: HTTP {status}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// An expected session artifact was missing after a successful call.
    #[error("Session error: {0}")]
    Session(String),

    /// No HTTP status was obtained (DNS, refused connection, timeout).
    #[error("{endpoint}: transport error: {message}")]
    Transport {
        endpoint: String,
        message: String,
        timeout: bool,
    },

    /// A 200 response body did not match the expected shape.
    #[error("{endpoint}: failed to decode response: {message}")]
    Decode { endpoint: String, message: String },

    /// The request could not be turned into a valid URL or header.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The call's deadline elapsed before it completed.
    #[error("{endpoint}: deadline exceeded")]
    Cancelled { endpoint: String },

    /// A lookup on a decoded model found nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The client configuration is unusable.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn api(endpoint: &str, status: u16) -> Self {
        let message = match status {
            429 => "too many requests".to_string(),
            s if (500..600).contains(&s) => "server error".to_string(),
            s if (400..500).contains(&s) => "client error".to_string(),
            _ => "unexpected status".to_string(),
        };
        Error::Api {
            endpoint: endpoint.to_string(),
            status,
            message,
        }
    }

    /// Whether the executor may re-issue the call after this error.
    ///
    /// Transport errors are reported as retryable here; the executor still
    /// checks the request's idempotency before acting on it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimitExceeded(_) | Error::Api { .. } | Error::Transport { .. }
        )
    }

    /// HTTP status carried by an `Api` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Marks the error as the final one of an exhausted retry loop.
    pub(crate) fn exhausted(self, attempts: u32) -> Self {
        let suffix = format!(" (gave up after {} attempts)", attempts);
        match self {
            Error::Api {
                endpoint,
                status,
                message,
            } => Error::Api {
                endpoint,
                status,
                message: message + &suffix,
            },
            Error::Transport {
                endpoint,
                message,
                timeout,
            } => Error::Transport {
                endpoint,
                message: message + &suffix,
                timeout,
            },
            Error::RateLimitExceeded(msg) => Error::RateLimitExceeded(msg + &suffix),
            other => other,
        }
    }
}
