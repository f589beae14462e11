//! Attaches the caller's live session to the request.

use std::sync::Arc;

use tracing::trace;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::session::{SESSION_COOKIE, SessionStore};

/// Resolves the `session_id` cookie against a [`SessionStore`].
///
/// A live session is attached to [`Request::session`]. A missing cookie, an
/// unknown id, or an expired session all leave the slot empty; the request
/// proceeds either way and nothing is cleaned up.
#[derive(Clone)]
pub struct SessionMiddleware {
    store: Arc<SessionStore>,
}

impl SessionMiddleware {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }
}

impl Middleware for SessionMiddleware {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        if let Some(id) = req.cookie(SESSION_COOKIE) {
            match self.store.get_session(&id) {
                Some(session) if !session.is_expired() => {
                    req.context_mut().session = Some(session);
                }
                Some(_) => trace!(session_id = %id, "ignoring expired session"),
                None => trace!(session_id = %id, "unknown session id"),
            }
        }

        Box::pin(next.run(req))
    }
}
