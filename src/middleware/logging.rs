//! The request log every served [`App`](crate::App) carries.
//!
//! [`App::start`](crate::App::start) always installs [`RequestLog`] as the
//! outermost layer. Where the records go is up to the [`RequestLogger`]
//! given to [`App::with_logger`](crate::App::with_logger); the default,
//! [`TracingLogger`], emits one `tracing` event per request.

use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;

/// One completed request.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub status: StatusCode,
    pub elapsed: Duration,
}

/// Receives a record for every request the app answers.
pub trait RequestLogger: Send + Sync + 'static {
    fn log(&self, record: &RequestRecord);
}

/// Logs through `tracing` at a level chosen by status class: server errors
/// at `ERROR`, client errors at `WARN`, everything else at `INFO`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RequestLogger for TracingLogger {
    fn log(&self, r: &RequestRecord) {
        let query = r.query.as_deref().unwrap_or("");
        let status = r.status.as_u16();
        let elapsed_ms = r.elapsed.as_secs_f64() * 1000.0;

        if r.status.is_server_error() {
            error!(method = %r.method, path = %r.path, query, status, elapsed_ms, "request");
        } else if r.status.is_client_error() {
            warn!(method = %r.method, path = %r.path, query, status, elapsed_ms, "request");
        } else {
            info!(method = %r.method, path = %r.path, query, status, elapsed_ms, "request");
        }
    }
}

/// Times each request and hands the outcome to a [`RequestLogger`].
#[derive(Clone)]
pub struct RequestLog {
    logger: Arc<dyn RequestLogger>,
}

impl RequestLog {
    pub fn new(logger: Arc<dyn RequestLogger>) -> Self {
        Self { logger }
    }
}

impl Middleware for RequestLog {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let logger = Arc::clone(&self.logger);
        let method = req.method().clone();
        let path = req.path().to_owned();
        let query = req.query().map(str::to_owned);
        let start = Instant::now();

        Box::pin(async move {
            let res = next.run(req).await;
            logger.log(&RequestRecord {
                method,
                path,
                query,
                status: res.status_code(),
                elapsed: start.elapsed(),
            });
            res
        })
    }
}
