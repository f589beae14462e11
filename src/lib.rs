//! # pylon
//!
//! A small web toolkit built around one idea: everything between the socket
//! and your endpoint is a [middleware](middleware::Middleware).
//!
//! - **Composition**: [`App::wrap`] appends a middleware, [`App::handle`]
//!   captures the chain as it stands, and [`App::group`] mounts a child app
//!   under a path prefix.
//! - **Expiring stores**: [`Store`] with an in-memory ([`MemoryStore`]) and
//!   an on-disk ([`FileStore`]) variant.
//! - **Response caching**: [`ResponseCache`](middleware::ResponseCache)
//!   memoises responses by request URI.
//! - **Sessions**: [`SessionStore`] plus
//!   [`SessionMiddleware`](middleware::SessionMiddleware) for the
//!   `session_id` cookie.
//! - **CSRF**: [`Csrf`](middleware::Csrf), a double-submit token check.
//! - **Bearer auth**: [`BearerAuth`](middleware::BearerAuth) with a
//!   pluggable verifier.
//!
//! Transport is hyper (HTTP/1.1 and HTTP/2), routing is a `matchit` radix
//! tree, and every request is logged through `tracing`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pylon::middleware::{Csrf, ResponseCache, SessionMiddleware};
//! use pylon::{App, Config, HttpError, Request, Response, SessionStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pylon::Error> {
//!     let config = Config::from_env();
//!     let sessions = Arc::new(SessionStore::from_config(&config));
//!
//!     let mut app = App::new();
//!     app.wrap(SessionMiddleware::new(Arc::clone(&sessions)));
//!     app.wrap(Csrf::new());
//!     app.handle("GET /", index);
//!
//!     let mut api = app.group("/api");
//!     api.wrap(ResponseCache::from_config(&config));
//!     api.handle("GET /users/{id}", user);
//!
//!     app.start(&config.addr).await
//! }
//!
//! async fn index(req: Request) -> Result<Response, HttpError> {
//!     let token = req.csrf_token().unwrap_or_default();
//!     Ok(Response::html(format!(
//!         r#"<form method="post"><input type="hidden" name="csrf_token" value="{token}"></form>"#
//!     )))
//! }
//!
//! async fn user(req: Request) -> Result<Response, HttpError> {
//!     let id = req.param("id").ok_or_else(|| HttpError::bad_request("missing id"))?;
//!     Ok(Response::json(format!(r#"{{"id":"{id}"}}"#)))
//! }
//! ```

mod app;
mod config;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod session;

pub mod middleware;
pub mod store;

pub use app::App;
pub use config::Config;
pub use error::{BoxError, Error, HttpError, StoreError};
pub use handler::Handler;
pub use request::{Context, Request};
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use server::Server;
pub use session::{
    DEFAULT_SESSION_LIFETIME, SESSION_COOKIE, Session, SessionStore, session_cookie,
};
pub use store::{Entry, FileStore, MemoryStore, Store};

pub use http::{Method, StatusCode};
