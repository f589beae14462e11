//! Radix-tree route table.
//!
//! One tree per HTTP method plus one for method-less patterns. Lookup is
//! O(path-length): the method's own tree first, then the method-less tree.
//! `HEAD` falls back to `GET` routes.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::BoxedHandler;

#[derive(Default)]
pub(crate) struct RouteTable {
    by_method: HashMap<Method, MatchitRouter<BoxedHandler>>,
    any: MatchitRouter<BoxedHandler>,
}

/// A matched route: the handler plus its captured path parameters.
pub(crate) type Matched = (BoxedHandler, HashMap<String, String>);

impl RouteTable {
    /// Registers `handler` under `pattern`: either `"/path"` (every method)
    /// or `"METHOD /path"`.
    ///
    /// # Panics
    ///
    /// Panics on a malformed pattern or one that conflicts with an existing
    /// route. Route tables are built at startup, so this surfaces mistakes
    /// immediately.
    pub(crate) fn insert(&mut self, pattern: &str, handler: BoxedHandler) {
        let (method, path) = parse_pattern(pattern);
        let tree = match method {
            Some(method) => self.by_method.entry(method).or_default(),
            None => &mut self.any,
        };
        tree.insert(path, handler)
            .unwrap_or_else(|e| panic!("invalid route `{pattern}`: {e}"));
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Option<Matched> {
        let in_tree = |tree: &MatchitRouter<BoxedHandler>| {
            let matched = tree.at(path).ok()?;
            let params: HashMap<String, String> = matched.params.iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            Some((Arc::clone(matched.value), params))
        };

        let own = self.by_method.get(method).and_then(in_tree);
        let head_as_get = || {
            (*method == Method::HEAD)
                .then(|| self.by_method.get(&Method::GET).and_then(in_tree))
                .flatten()
        };
        own.or_else(head_as_get).or_else(|| in_tree(&self.any))
    }
}

fn parse_pattern(pattern: &str) -> (Option<Method>, &str) {
    let pattern = pattern.trim();
    let (method, path) = match pattern.split_once(char::is_whitespace) {
        Some((method, path)) => {
            let method = Method::from_bytes(method.as_bytes())
                .unwrap_or_else(|_| panic!("invalid method in route `{pattern}`"));
            (Some(method), path.trim_start())
        }
        None => (None, pattern),
    };
    assert!(path.starts_with('/'), "route `{pattern}` must start with `/`");
    (method, path)
}
