//! Sessions, CSRF-protected forms, and a cached JSON API.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -c jar -b jar http://localhost:3000/login
//!   curl -c jar -b jar http://localhost:3000/
//!   curl http://localhost:3000/api/users/42      # computed once, then cached
//!   curl -X POST http://localhost:3000/logout    # 403: no CSRF token

use std::sync::Arc;

use pylon::middleware::{Csrf, ResponseCache, SessionMiddleware};
use pylon::{App, Config, HttpError, Request, Response, SessionStore, session_cookie};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), pylon::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    let sessions = Arc::new(SessionStore::from_config(&config));

    let mut app = App::new();
    app.wrap(SessionMiddleware::new(Arc::clone(&sessions)));
    app.wrap(Csrf::new());

    let store = Arc::clone(&sessions);
    app.handle("GET /login", move |_req: Request| {
        let store = Arc::clone(&store);
        async move {
            let session = store.create_session();
            session.insert("user", "alice");
            Ok::<_, HttpError>(
                Response::builder()
                    .header("set-cookie", &session_cookie(&session))
                    .text("logged in"),
            )
        }
    });
    app.handle("GET /", home);

    let store = Arc::clone(&sessions);
    app.handle("POST /logout", move |req: Request| {
        let store = Arc::clone(&store);
        async move {
            let session = req.session().ok_or_else(|| HttpError::unauthorized("not logged in"))?;
            store.delete_session(session.id());
            Ok::<_, HttpError>("bye")
        }
    });

    let mut api = app.group("/api");
    api.wrap(ResponseCache::from_config(&config));
    api.handle("GET /users/{id}", user);

    app.start(&config.addr).await
}

async fn home(req: Request) -> Result<Response, HttpError> {
    let user = req
        .session()
        .and_then(|s| s.get("user"))
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_else(|| "stranger".to_owned());
    let token = req.csrf_token().unwrap_or_default();

    Ok(Response::html(format!(
        r#"<p>hello {user}</p>
<form method="post" action="/logout">
  <input type="hidden" name="csrf_token" value="{token}">
  <button>log out</button>
</form>"#
    )))
}

async fn user(req: Request) -> Result<Response, HttpError> {
    let id = req.param("id").ok_or_else(|| HttpError::bad_request("missing id"))?;
    tracing::info!(id, "computing user");
    Ok(Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#)))
}
