//! Typed failures at the provider boundary.
//!
//! The HTTP adapter and the connectors return [`ProviderError`] so callers
//! can tell a provider that said "no" (a status code) from one that could
//! not be reached or returned a shape we do not understand. Everything past
//! the adapter boundary uses `anyhow`.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        status: StatusCode,
        url: String,
        body: String,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response shape from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),
}

impl ProviderError {
    /// Whether a retry has a chance of succeeding: rate limits, server
    /// errors and transport failures.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            ProviderError::Transport { .. } => true,
            ProviderError::Decode { .. } | ProviderError::MissingCredential(_) => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
