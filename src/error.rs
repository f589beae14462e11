//! Error types.
//!
//! pylon separates three kinds of failure:
//!
//! - [`HttpError`]: an outcome a handler raises on purpose (`404`, `403`,
//!   …). Dispatch writes its status and message to the client verbatim.
//! - [`StoreError`]: a fault in a store's backing medium. Middleware never
//!   surfaces these to the client: a failing cache reads as a miss, a
//!   failing session lookup as "no session".
//! - [`Error`]: infrastructure faults of the server itself: binding to a
//!   port or accepting a connection.
//!
//! Anything else a handler returns is an unexpected fault and becomes a
//! `500` carrying the error's `Display` text.

use std::net::AddrParseError;

use http::StatusCode;

/// Boxed error accepted from fallible handlers and token verifiers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Infrastructure failure returned by [`Server`](crate::Server) and
/// [`App::start`](crate::App::start).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`")]
    InvalidAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },
}

/// Failure of a store's backing medium.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// An expected, client-facing outcome raised by endpoint logic.
///
/// Return it (or anything that converts into [`BoxError`] and downcasts back
/// to it) from a handler and dispatch answers with `status` and `message`:
///
/// ```rust
/// use pylon::{HttpError, Request, Response};
///
/// async fn get_user(req: Request) -> Result<Response, HttpError> {
///     match req.param("id") {
///         Some("42") => Ok(Response::text("alice")),
///         _ => Err(HttpError::not_found("no such user")),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Status: {}, Message: {message}", .status.as_u16())]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}
