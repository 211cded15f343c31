//! The client error taxonomy.

use msnp_types::error::ServerError;
use thiserror::Error;

/// Everything that can go wrong talking to the Messenger service.
#[derive(Debug, Error)]
pub enum Error {
    /// TCP connect/read/write fault. Ends the affected session.
    #[error("transport error")]
    Transport(#[from] std::io::Error),

    /// Malformed or unexpected protocol traffic. Non-terminal unless it
    /// happens during login.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A 3-digit error answering the request.
    #[error("server error {0}")]
    Server(ServerError),

    /// No reply within the deadline. The request is not retried.
    #[error("timed out waiting for a reply")]
    Timeout,

    /// Authentication failed (SSO rejection or `USR` answered with 911).
    /// Never retried.
    #[error("bad credentials")]
    BadCredentials,

    /// The server redirected the login too many times.
    #[error("redirected too many times")]
    Redirected,

    /// The operation was cancelled by `close()`/`logout()` or shutdown.
    #[error("cancelled")]
    Cancelled,

    /// The connection is gone; the component refuses new operations.
    #[error("connection closed")]
    Closed,

    /// A class-A message was answered with `NAK`.
    #[error("message delivery failed")]
    DeliveryFailed,
}

impl Error {
    /// Collapse the auth-failure server code into [`Error::BadCredentials`].
    pub(crate) fn for_login(self) -> Self {
        match self {
            Self::Server(ServerError::AuthenticationFailed) => Self::BadCredentials,
            other => other,
        }
    }
}

/// Shorthand used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
