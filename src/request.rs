//! Incoming HTTP request type and its request-scoped context.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use cookie::Cookie;
use http::{HeaderMap, Method, header};
use tracing::debug;
use url::form_urlencoded;

use crate::middleware::auth::Claims;
use crate::session::Session;

/// Values middleware attaches for the handlers further down the chain.
///
/// Every slot is optional. A missing value means the producing middleware
/// is not installed or chose not to attach anything (for example, no live
/// session), never that the request is invalid.
#[derive(Clone, Default)]
pub struct Context {
    /// Live session resolved from the `session_id` cookie.
    pub session: Option<Arc<Session>>,
    /// Double-submit token to embed in forms (safe methods only).
    pub csrf_token: Option<String>,
    /// Claims of a verified bearer token.
    pub claims: Option<Arc<Claims>>,
}

/// An incoming HTTP request with its body fully buffered.
///
/// Build one from an [`http::Request<Bytes>`] when driving an
/// [`App`](crate::App) without a socket:
///
/// ```rust
/// use bytes::Bytes;
/// use pylon::Request;
///
/// let req: Request = http::Request::get("/users?page=2")
///     .body(Bytes::new())
///     .unwrap()
///     .into();
/// assert_eq!(req.request_uri(), "/users?page=2");
/// ```
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) full_path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) remote_addr: Option<SocketAddr>,
    pub(crate) context: Context,
}

impl Request {
    pub fn method(&self) -> &Method { &self.method }
    /// Path as seen by this handler; group prefixes are already stripped.
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    pub fn context(&self) -> &Context { &self.context }
    pub fn context_mut(&mut self) -> &mut Context { &mut self.context }

    pub fn session(&self) -> Option<&Arc<Session>> { self.context.session.as_ref() }
    pub fn csrf_token(&self) -> Option<&str> { self.context.csrf_token.as_deref() }
    pub fn claims(&self) -> Option<&Claims> { self.context.claims.as_deref() }

    /// Path as the client sent it, before any group prefix was stripped.
    pub fn full_path(&self) -> &str { &self.full_path }

    /// Full path plus query string, the identity the response cache keys on.
    /// Group prefix stripping does not change it.
    pub fn request_uri(&self) -> String {
        match self.query.as_deref() {
            Some(q) if !q.is_empty() => format!("{}?{q}", self.full_path),
            _ => self.full_path.clone(),
        }
    }

    /// Header value as text. Case-insensitive; non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Value of the named cookie, searching every `Cookie` header.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|line| Cookie::split_parse(line))
            .filter_map(Result::ok)
            .find(|c| c.name() == name)
            .map(|c| c.value().to_owned())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// First value of a form field.
    ///
    /// The body is searched first when it is `application/x-www-form-urlencoded`
    /// or `multipart/form-data` (file parts are skipped), then the query
    /// string.
    pub async fn form_value(&self, name: &str) -> Option<String> {
        let from_body = match self.form_body() {
            Some(FormBody::UrlEncoded) => find_pair(form_urlencoded::parse(&self.body), name),
            Some(FormBody::Multipart { boundary }) => {
                multipart_field(self.body.clone(), boundary, name).await
            }
            None => None,
        };

        from_body.or_else(|| {
            let query = self.query.as_deref()?;
            find_pair(form_urlencoded::parse(query.as_bytes()), name)
        })
    }

    fn form_body(&self) -> Option<FormBody> {
        let content_type = self.header(header::CONTENT_TYPE.as_str())?;
        let mime = content_type.split(';').next()?.trim();

        if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            Some(FormBody::UrlEncoded)
        } else if mime.eq_ignore_ascii_case("multipart/form-data") {
            multer::parse_boundary(content_type)
                .ok()
                .map(|boundary| FormBody::Multipart { boundary })
        } else {
            None
        }
    }

    /// Drops a group prefix from the path. The remainder always starts with `/`.
    pub(crate) fn strip_prefix(&mut self, prefix: &str) {
        if let Some(rest) = self.path.strip_prefix(prefix) {
            self.path = if rest.starts_with('/') { rest.to_owned() } else { format!("/{rest}") };
        }
    }
}

enum FormBody {
    UrlEncoded,
    Multipart { boundary: String },
}

/// Text of the first non-file part named `name`. A malformed body reads as
/// absent.
async fn multipart_field(body: Bytes, boundary: String, name: &str) -> Option<String> {
    let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(name) && field.file_name().is_none() => {
                return field.text().await.ok();
            }
            Ok(Some(_)) => continue,
            Ok(None) => return None,
            Err(e) => {
                debug!("unreadable multipart body: {e}");
                return None;
            }
        }
    }
}

fn find_pair(pairs: form_urlencoded::Parse<'_>, name: &str) -> Option<String> {
    pairs
        .into_iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            full_path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers: parts.headers,
            body,
            params: HashMap::new(),
            remote_addr: None,
            context: Context::default(),
        }
    }
}
