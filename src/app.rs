//! The application: a middleware chain, a route table, and groups.
//!
//! An [`App`] is configured with `&mut` calls and then consumed by
//! [`App::start`]. Once serving, it can no longer be changed.
//!
//! # Middleware order
//!
//! [`App::wrap`] appends to the chain, and [`App::handle`] captures the
//! chain *as it is at that moment*. The first middleware wrapped is the
//! outermost: it sees the request first and the response last. Middleware
//! wrapped after a route was registered does not apply to that route.
//!
//! # Groups
//!
//! [`App::group`] returns a child app that starts with a copy of the
//! parent's current chain and owns a separate route table. The parent
//! forwards every request under the prefix to the child with the prefix
//! stripped, so a child route `/users` answers `/api/users`, and the bare
//! prefix `/api` is answered by the child's `/` route. The child can
//! keep adding routes and middleware after it is created; the parent's
//! chain is unaffected, and vice versa.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, HttpError};
use crate::handler::{BoxFuture, BoxedHandler, FnErased, Handler};
use crate::middleware::{Middleware, RequestLog, RequestLogger, TracingLogger, compose};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::RouteTable;
use crate::server::Server;

/// Application builder and dispatcher.
///
/// ```rust,no_run
/// use pylon::middleware::{Csrf, ResponseCache};
/// use pylon::{App, HttpError, Request, Response};
///
/// #[tokio::main]
/// async fn main() -> Result<(), pylon::Error> {
///     let mut app = App::new();
///     app.wrap(Csrf::new());
///     app.handle("GET /", home);
///
///     let mut api = app.group("/api");
///     api.wrap(ResponseCache::in_memory());
///     api.handle("GET /users/{id}", user);
///
///     app.start("0.0.0.0:3000").await
/// }
///
/// async fn home(_req: Request) -> Result<Response, HttpError> {
///     Ok(Response::html("<h1>hi</h1>"))
/// }
///
/// async fn user(req: Request) -> Result<Response, HttpError> {
///     let id = req.param("id").ok_or_else(|| HttpError::bad_request("id"))?;
///     Ok(Response::json(format!(r#"{{"id":"{id}"}}"#)))
/// }
/// ```
pub struct App {
    middlewares: Vec<Arc<dyn Middleware>>,
    routes: Arc<RwLock<RouteTable>>,
    logger: Arc<dyn RequestLogger>,
}

impl App {
    /// An app with no middleware, no routes, and the default
    /// [`TracingLogger`].
    pub fn new() -> Self {
        Self::with_logger(TracingLogger)
    }

    /// An app whose request log goes to `logger`.
    pub fn with_logger(logger: impl RequestLogger) -> Self {
        Self {
            middlewares: Vec::new(),
            routes: Arc::new(RwLock::new(RouteTable::default())),
            logger: Arc::new(logger),
        }
    }

    /// Appends `middleware` to the chain for routes and groups registered
    /// from now on.
    pub fn wrap(&mut self, middleware: impl Middleware) -> &mut Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Registers `handler` under `pattern` (`"/path"` or `"METHOD /path"`),
    /// wrapped in the current chain.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is malformed or conflicts with an existing route.
    pub fn handle(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        let endpoint = compose(&self.middlewares, handler.into_boxed_handler());
        self.routes.write().insert(pattern, endpoint);
        self
    }

    /// Creates a child app mounted under `prefix`.
    ///
    /// # Panics
    ///
    /// Panics if `prefix` does not start with `/`, is `/` itself, or
    /// conflicts with an existing route.
    pub fn group(&mut self, prefix: &str) -> App {
        let prefix = prefix.trim_end_matches('/');
        assert!(
            prefix.starts_with('/'),
            "group prefix `{prefix}` must start with `/` and name a path below the root",
        );

        let child = App {
            middlewares: self.middlewares.clone(),
            routes: Arc::new(RwLock::new(RouteTable::default())),
            logger: Arc::clone(&self.logger),
        };

        let forward = forwarder(prefix.to_owned(), Arc::clone(&child.routes));
        let mut routes = self.routes.write();
        routes.insert(prefix, Arc::clone(&forward));
        routes.insert(&format!("{prefix}/"), Arc::clone(&forward));
        routes.insert(&format!("{prefix}/{{*rest}}"), forward);

        child
    }

    /// Answers one request exactly as a served app would, request log
    /// included, without a socket.
    pub async fn oneshot(&self, req: Request) -> Response {
        self.service().call(req).await
    }

    /// Binds `addr` and serves until SIGTERM / Ctrl-C.
    pub async fn start(self, addr: &str) -> Result<(), Error> {
        Server::bind(addr)?.serve(self).await
    }

    /// The route table behind the request log, ready to be shared across
    /// connections.
    pub(crate) fn service(&self) -> BoxedHandler {
        let routes = Arc::clone(&self.routes);
        let root: BoxedHandler = Arc::new(FnErased(move |req| dispatch(&routes, req)));
        let log: Arc<dyn Middleware> = Arc::new(RequestLog::new(Arc::clone(&self.logger)));
        compose(&[log], root)
    }
}

impl Default for App {
    fn default() -> Self { Self::new() }
}

/// Routes `req` through `routes`, answering `404` when nothing matches.
fn dispatch(routes: &RwLock<RouteTable>, mut req: Request) -> BoxFuture {
    let matched = routes.read().lookup(&req.method, &req.path);
    match matched {
        Some((handler, params)) => {
            req.params = params;
            handler.call(req)
        }
        None => Box::pin(async { HttpError::not_found("404 page not found").into_response() }),
    }
}

/// Strips `prefix` and dispatches into a child's route table.
fn forwarder(prefix: String, routes: Arc<RwLock<RouteTable>>) -> BoxedHandler {
    Arc::new(FnErased(move |mut req: Request| {
        req.strip_prefix(&prefix);
        dispatch(&routes, req)
    }))
}
