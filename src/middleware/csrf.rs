//! Double-submit CSRF protection.
//!
//! The token lives in an `HttpOnly` cookie. Pages rendered for safe requests
//! embed it in their forms (read it from [`Request::csrf_token`]); an unsafe
//! request must send it back in the `csrf_token` form field. A cross-site
//! attacker can make the browser send the cookie but cannot read it, so it
//! cannot forge the field.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use cookie::Cookie;
use http::{StatusCode, header};
use rand::RngCore;
use tracing::debug;

use super::{Middleware, Next};
use crate::error::HttpError;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::IntoResponse;

/// Cookie holding the token, and the form field that must echo it.
pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_FIELD: &str = "csrf_token";

/// CSRF middleware. Independent of sessions and authentication.
#[derive(Debug, Clone, Copy, Default)]
pub struct Csrf;

impl Csrf {
    pub fn new() -> Self {
        Self
    }
}

/// 32 random bytes, base64url without padding, so the token needs no
/// escaping in cookies or form bodies.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn token_cookie(token: &str) -> String {
    Cookie::build((CSRF_COOKIE, token))
        .path("/")
        .http_only(true)
        .build()
        .to_string()
}

impl Middleware for Csrf {
    fn call(&self, mut req: Request, next: Next) -> BoxFuture {
        let (token, minted) = match req.cookie(CSRF_COOKIE) {
            Some(token) => (token, false),
            None => (generate_token(), true),
        };

        Box::pin(async move {
            let mut res = if req.method().is_safe() {
                req.context_mut().csrf_token = Some(token.clone());
                next.run(req).await
            } else if req.form_value(CSRF_FIELD).await.as_deref() == Some(token.as_str()) {
                next.run(req).await
            } else {
                debug!(method = %req.method(), path = req.path(), "csrf token mismatch");
                HttpError::new(StatusCode::FORBIDDEN, "Invalid CSRF Token").into_response()
            };

            if minted {
                res.append_header(header::SET_COOKIE.as_str(), token_cookie(&token));
            }
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::handler::{BoxedHandler, Handler};
    use crate::middleware::compose;
    use crate::response::Response;

    fn protected() -> BoxedHandler {
        let endpoint = (|req: Request| async move {
            Ok::<_, HttpError>(Response::text(req.csrf_token().unwrap_or("-").to_owned()))
        })
        .into_boxed_handler();
        let layer: Arc<dyn Middleware> = Arc::new(Csrf::new());
        compose(&[layer], endpoint)
    }

    fn post(cookie: Option<&str>, form: &str) -> Request {
        let mut builder = http::Request::post("/transfer")
            .header("content-type", "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", format!("csrf_token={cookie}"));
        }
        builder.body(Bytes::from(form.to_owned())).unwrap().into()
    }

    fn set_cookie_token(res: &Response) -> Option<String> {
        let raw = res.header("set-cookie")?;
        Cookie::parse(raw.to_owned()).ok().map(|c| c.value().to_owned())
    }

    #[tokio::test]
    async fn get_without_cookie_mints_and_exposes_a_token() {
        let req = http::Request::get("/form").body(Bytes::new()).unwrap().into();
        let res = protected().call(req).await;

        assert_eq!(res.status_code(), StatusCode::OK);
        let minted = set_cookie_token(&res).expect("token cookie");
        assert_eq!(res.body().as_ref(), minted.as_bytes());
        assert!(res.header("set-cookie").unwrap().contains("HttpOnly"));
    }

    #[tokio::test]
    async fn get_with_cookie_reuses_it() {
        let req = http::Request::get("/form")
            .header("cookie", "csrf_token=abc")
            .body(Bytes::new())
            .unwrap()
            .into();
        let res = protected().call(req).await;
        assert_eq!(res.body().as_ref(), b"abc");
        assert!(res.header("set-cookie").is_none());
    }

    #[tokio::test]
    async fn post_with_matching_token_passes() {
        let res = protected().call(post(Some("abc"), "amount=5&csrf_token=abc")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        // Unsafe methods do not expose the token downstream.
        assert_eq!(res.body().as_ref(), b"-");
    }

    #[tokio::test]
    async fn post_with_wrong_or_missing_field_is_forbidden() {
        let res = protected().call(post(Some("abc"), "csrf_token=xyz")).await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(res.body().as_ref(), b"Invalid CSRF Token");

        let res = protected().call(post(Some("abc"), "amount=5")).await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn post_without_cookie_is_forbidden_but_gets_a_token() {
        let res = protected().call(post(None, "csrf_token=guess")).await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert!(set_cookie_token(&res).is_some());
    }

    #[tokio::test]
    async fn multipart_upload_with_matching_token_passes() {
        let body = "--XX\r\n\
            Content-Disposition: form-data; name=\"csrf_token\"\r\n\r\n\
            abc\r\n\
            --XX\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"a.bin\"\r\n\
            Content-Type: application/octet-stream\r\n\r\n\
            \x01\x02\r\n\
            --XX--\r\n";
        let upload = |token_cookie: &str| -> Request {
            http::Request::post("/upload")
                .header("content-type", "multipart/form-data; boundary=XX")
                .header("cookie", format!("csrf_token={token_cookie}"))
                .body(Bytes::from_static(body.as_bytes()))
                .unwrap()
                .into()
        };

        let res = protected().call(upload("abc")).await;
        assert_eq!(res.status_code(), StatusCode::OK);

        let res = protected().call(upload("other")).await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn tokens_are_url_safe_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
