//! Handler trait, type erasure, and the error → response mapping.
//!
//! # How endpoints are stored
//!
//! A route table holds endpoints of *different* concrete types, so each one
//! is erased behind `dyn ErasedHandler` and stored as an `Arc`. Middleware
//! layers are erased handlers too, which is what lets [`App`](crate::App)
//! fold any number of them around an endpoint:
//!
//! ```text
//! async fn show(req: Request) -> Result<Response, HttpError>   ← user writes this
//!        ↓ app.handle("GET /x", show)
//! show.into_boxed_handler()                                    ← Handler blanket impl
//!        ↓
//! Arc::new(Endpoint(show))          errors → status + message here
//!        ↓ folded with the middleware chain
//! Arc<Layered { middleware, next }>                            ← one per middleware
//!        ↓ at request time
//! handler.call(req) → BoxFuture<Response>
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;
use tracing::debug;

use crate::error::{BoxError, HttpError};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future that resolves to a [`Response`].
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface shared by endpoints and middleware layers.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid fallible endpoint.
///
/// You never implement this yourself. It is satisfied by any `async fn` (or
/// closure returning a future) with the shape:
///
/// ```text
/// async fn name(req: Request) -> Result<impl IntoResponse, impl Into<BoxError>>
/// ```
///
/// On `Err`, dispatch answers with the error's own status and message when
/// it is an [`HttpError`], and with `500 Internal Server Error` plus the
/// error's text otherwise.
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R, E> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
}

impl<F, Fut, R, E> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(Endpoint(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a typed endpoint into the trait-object world and turns its
/// error into a response.
struct Endpoint<F>(F);

impl<F, Fut, R, E> ErasedHandler for Endpoint<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move {
            match fut.await {
                Ok(res) => res.into_response(),
                Err(err) => error_response(err.into()),
            }
        })
    }
}

/// Maps a handler error to the response the client sees.
pub(crate) fn error_response(err: BoxError) -> Response {
    match err.downcast::<HttpError>() {
        Ok(http_err) => http_err.into_response(),
        Err(other) => {
            debug!(error = %other, "handler failed with an unexpected error");
            HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response()
        }
    }
}

/// A plain closure used as an erased handler (route misses, group forwarding).
pub(crate) struct FnErased<F>(pub(crate) F);

impl<F> ErasedHandler for FnErased<F>
where
    F: Fn(Request) -> BoxFuture,
{
    fn call(&self, req: Request) -> BoxFuture {
        (self.0)(req)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn get(uri: &str) -> Request {
        http::Request::get(uri).body(Bytes::new()).unwrap().into()
    }

    #[derive(Debug, thiserror::Error)]
    #[error("database unreachable")]
    struct DbDown;

    #[tokio::test]
    async fn ok_result_passes_through() {
        let h = (|_req: Request| async { Ok::<_, HttpError>("hi") }).into_boxed_handler();
        let res = h.call(get("/")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), b"hi");
    }

    #[tokio::test]
    async fn http_error_keeps_its_status_and_message() {
        let h = (|_req: Request| async { Err::<Response, _>(HttpError::not_found("no user")) })
            .into_boxed_handler();
        let res = h.call(get("/")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.body().as_ref(), b"no user");
    }

    #[tokio::test]
    async fn other_errors_become_500_with_their_text() {
        let h = (|_req: Request| async { Err::<Response, _>(DbDown) }).into_boxed_handler();
        let res = h.call(get("/")).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body().as_ref(), b"database unreachable");
    }

    #[tokio::test]
    async fn boxed_http_error_is_still_recognised() {
        let h = (|_req: Request| async {
            let err: BoxError = HttpError::bad_request("bad page").into();
            Err::<Response, _>(err)
        })
        .into_boxed_handler();
        let res = h.call(get("/")).await;
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    }
}
