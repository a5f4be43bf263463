//! Error types for the rooms client.
//!
//! # Design
//! A failed call lands in exactly one of three kinds so callers can match on
//! them exhaustively: the round trip itself failed (`Transport`), the service
//! answered with a status outside the operation's accepted set (`Service`), or
//! a body did not have the expected JSON shape (`Decode`). `Encode` and
//! `ForeignUrl` are only produced while building a request, before anything
//! is sent.

use thiserror::Error;

use crate::types::ServiceError;

/// The request could not be sent or the response could not be read.
#[derive(Debug, Error)]
#[error("transport failure: {source}")]
pub struct TransportError {
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl TransportError {
    pub fn new(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// Errors returned by `RoomClient`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The service rejected the call; inspect `.status` to branch on it.
    #[error("service returned {}: {}", .0.status, .0.message)]
    Service(ServiceError),

    #[error("failed to decode {target} from response with status {status}: {source}")]
    Decode {
        status: u16,
        target: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode request parameters: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),

    /// A page URL from a response points outside the client's base URL.
    #[error("refusing to follow {url}: not under the configured base URL")]
    ForeignUrl { url: String },
}

impl ApiError {
    /// HTTP status of the response, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Service(error) => Some(error.status),
            ApiError::Decode { status, .. } => Some(*status),
            ApiError::Transport(_) | ApiError::Encode(_) | ApiError::ForeignUrl { .. } => None,
        }
    }

    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            ApiError::Service(error) => Some(error),
            _ => None,
        }
    }
}
