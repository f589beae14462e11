//! Middleware layer.
//!
//! A middleware sees every request before the handler it wraps and every
//! response after it. It may inspect or modify either, or answer on its own
//! without calling [`Next`] at all (a cache hit, a bad CSRF token, a missing
//! bearer token).
//!
//! Built-in middleware:
//! - [`ResponseCache`]: memoises responses by request URI
//! - [`SessionMiddleware`]: resolves the `session_id` cookie to a live session
//! - [`Csrf`]: double-submit token check for unsafe methods
//! - [`BearerAuth`]: rejects requests without a verifiable bearer token
//! - [`RequestLog`]: the always-on outermost request log
//!
//! Write your own by implementing [`Middleware`], or from a closure with
//! [`from_fn`]:
//!
//! ```rust
//! use pylon::middleware::{self, Next};
//! use pylon::{App, Request};
//!
//! let mut app = App::new();
//! app.wrap(middleware::from_fn(|req: Request, next: Next| async move {
//!     let mut res = next.run(req).await;
//!     res.append_header("x-served-by", "pylon");
//!     res
//! }));
//! ```

pub mod auth;
pub mod cache;
pub mod csrf;
pub mod logging;
pub mod session;

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::response::Response;

pub use auth::{BearerAuth, Claims, TokenVerifier};
pub use cache::{CachedResponse, DEFAULT_CACHE_TTL, ResponseCache};
pub use csrf::Csrf;
pub use logging::{RequestLog, RequestLogger, RequestRecord, TracingLogger};
pub use session::SessionMiddleware;

/// A request-handler transformer.
///
/// `call` receives the request and the rest of the chain. Delegate with
/// `next.run(req).await`, or return a response directly to short-circuit.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

/// The remainder of the chain below a middleware.
pub struct Next {
    inner: BoxedHandler,
}

impl Next {
    pub(crate) fn new(inner: BoxedHandler) -> Self {
        Self { inner }
    }

    pub async fn run(self, req: Request) -> Response {
        self.inner.call(req).await
    }
}

/// Middleware built from a closure. See [`from_fn`].
pub struct FromFn<F>(F);

/// Turns `async |req, next| -> Response` into a [`Middleware`].
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FromFn(f)
}

impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin((self.0)(req, next))
    }
}

/// One middleware bound to the handler it wraps.
struct Layered {
    middleware: Arc<dyn Middleware>,
    next: BoxedHandler,
}

impl ErasedHandler for Layered {
    fn call(&self, req: Request) -> BoxFuture {
        self.middleware.call(req, Next::new(Arc::clone(&self.next)))
    }
}

/// Wraps `handler` in `chain`, first element outermost.
///
/// The first middleware therefore sees the request first and the response
/// last.
pub(crate) fn compose(chain: &[Arc<dyn Middleware>], handler: BoxedHandler) -> BoxedHandler {
    chain.iter().rev().fold(handler, |next, middleware| {
        Arc::new(Layered { middleware: Arc::clone(middleware), next })
    })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use parking_lot::Mutex;

    use super::*;
    use crate::error::HttpError;
    use crate::handler::Handler;

    fn tracer(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Middleware> {
        Arc::new(from_fn(move |req: Request, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(format!("{name}:in"));
                let res = next.run(req).await;
                log.lock().push(format!("{name}:out"));
                res
            }
        }))
    }

    #[tokio::test]
    async fn first_in_chain_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let endpoint_log = Arc::clone(&log);
        let endpoint = (move |_req: Request| {
            let log = Arc::clone(&endpoint_log);
            async move {
                log.lock().push("handler".to_owned());
                Ok::<_, HttpError>("done")
            }
        })
        .into_boxed_handler();

        let chain = vec![tracer("a", Arc::clone(&log)), tracer("b", Arc::clone(&log))];
        let composed = compose(&chain, endpoint);
        let req = http::Request::get("/").body(Bytes::new()).unwrap().into();
        composed.call(req).await;

        assert_eq!(*log.lock(), ["a:in", "b:in", "handler", "b:out", "a:out"]);
    }

    #[tokio::test]
    async fn empty_chain_is_the_handler_itself() {
        let endpoint = (|_req: Request| async { Ok::<_, HttpError>("plain") }).into_boxed_handler();
        let composed = compose(&[], endpoint);
        let req = http::Request::get("/").body(Bytes::new()).unwrap().into();
        assert_eq!(composed.call(req).await.body().as_ref(), b"plain");
    }
}
