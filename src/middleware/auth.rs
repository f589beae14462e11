//! Bearer-token authentication.
//!
//! Verifying a token (signature, expiry, issuer, key material) is delegated
//! to a [`TokenVerifier`]; this middleware only extracts the token, maps
//! failures to `401`, and attaches the resulting claims to the request.

use std::sync::Arc;

use http::header;
use serde_json::{Map, Value};
use tracing::debug;

use super::{Middleware, Next};
use crate::error::{BoxError, HttpError};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::IntoResponse;

/// Verified token payload.
pub type Claims = Map<String, Value>;

/// Turns a raw bearer token into claims, or rejects it.
pub trait TokenVerifier: Send + Sync + 'static {
    fn verify(&self, token: &str) -> Result<Claims, BoxError>;
}

impl<F> TokenVerifier for F
where
    F: Fn(&str) -> Result<Claims, BoxError> + Send + Sync + 'static,
{
    fn verify(&self, token: &str) -> Result<Claims, BoxError> {
        self(token)
    }
}

/// Requires an `Authorization: Bearer <token>` header that `verifier`
/// accepts. Claims land in [`Request::claims`].
#[derive(Clone)]
pub struct BearerAuth {
    verifier: Arc<dyn TokenVerifier>,
}

impl BearerAuth {
    pub fn new(verifier: impl TokenVerifier) -> Self {
        Self { verifier: Arc::new(verifier) }
    }
}

impl Middleware for BearerAuth {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let auth = req
            .header(header::AUTHORIZATION.as_str())
            .filter(|value| !value.trim().is_empty());
        let Some(auth) = auth else {
            let res = HttpError::unauthorized("Authorization header required").into_response();
            return Box::pin(async move { res });
        };

        let token = auth.strip_prefix("Bearer ").unwrap_or(auth).trim();
        match self.verifier.verify(token) {
            Ok(claims) => {
                req.context_mut().claims = Some(Arc::new(claims));
                Box::pin(next.run(req))
            }
            Err(e) => {
                debug!(path = req.path(), "bearer token rejected: {e}");
                let res = HttpError::unauthorized("Invalid token").into_response();
                Box::pin(async move { res })
            }
        }
    }
}
