//! Route storage and matching.
//!
//! Two tiers, chosen the way `router/inbuilt/callbacks.go`'s
//! `OnStart`/`build obtainer` step picks a matcher once at startup: fully
//! static routes (no `:param` or `*catch_all` segments) land in a
//! hash-map keyed by method and path for O(1) lookup; anything with a
//! dynamic segment falls back to a linear scan in registration order,
//! since the number of parameterized routes on a typical service is small
//! enough that a radix tree buys little.

use std::collections::HashMap;

use crate::method::Method;
use crate::router::types::HandlerObject;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    CatchAll(String),
}

struct DynamicRoute<T> {
    method: Method,
    segments: Vec<Segment>,
    handler: HandlerObject<T>,
}

/// The compiled route table for one [`crate::router::Router`].
pub(crate) struct Tree<T> {
    static_routes: HashMap<(Method, String), HandlerObject<T>>,
    dynamic_routes: Vec<DynamicRoute<T>>,
    /// Every distinct path registered, used to build the `Allow` header
    /// for a 405 response (`defaulterrhandlers.go`).
    methods_by_path: HashMap<String, Vec<Method>>,
    /// Method-agnostic prefix fallbacks, longest prefix first
    /// (`router/inbuilt/inbuilt_test.go`'s `TestCatchers`): consulted only
    /// when neither a static nor a dynamic route matches the path at all.
    catchers: Vec<(String, HandlerObject<T>)>,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Tree {
            static_routes: HashMap::new(),
            dynamic_routes: Vec::new(),
            methods_by_path: HashMap::new(),
            catchers: Vec::new(),
        }
    }
}

fn compile(pattern: &str) -> Vec<Segment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if let Some(name) = s.strip_prefix('*') {
                Segment::CatchAll(name.to_string())
            } else if let Some(name) = s.strip_prefix(':') {
                Segment::Param(name.to_string())
            } else {
                Segment::Static(s.to_string())
            }
        })
        .collect()
}

fn is_static(segments: &[Segment]) -> bool {
    segments.iter().all(|s| matches!(s, Segment::Static(_)))
}

impl<T> Tree<T> {
    pub(crate) fn insert(&mut self, method: Method, pattern: &str, handler: HandlerObject<T>) {
        let segments = compile(pattern);
        self.methods_by_path
            .entry(pattern.to_string())
            .or_default()
            .push(method);

        if is_static(&segments) {
            self.static_routes
                .insert((method, pattern.to_string()), handler);
        } else {
            self.dynamic_routes.push(DynamicRoute {
                method,
                segments,
                handler,
            });
        }
    }

    /// Find a handler for `method path`, binding any `:param`/`*catch_all`
    /// segments into `params`. Longest registered catch-all wins when more
    /// than one matches (`§5`: "catch-all longest-prefix fallback").
    pub(crate) fn find(
        &self,
        method: Method,
        path: &str,
        params: &mut HashMap<String, String>,
    ) -> Option<&HandlerObject<T>> {
        if let Some(handler) = self.static_routes.get(&(method, path.to_string())) {
            return Some(handler);
        }

        let request_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut best: Option<(&DynamicRoute<T>, usize)> = None;

        for route in &self.dynamic_routes {
            if route.method != method {
                continue;
            }
            if let Some(matched_len) = match_segments(&route.segments, &request_segments) {
                let better = match best {
                    Some((_, len)) => matched_len > len,
                    None => true,
                };
                if better {
                    best = Some((route, matched_len));
                }
            }
        }

        best.map(|(route, _)| {
            bind_params(&route.segments, &request_segments, params);
            &route.handler
        })
    }

    /// Whether any method at all is registered for `path`, used to
    /// distinguish 404 from 405.
    pub(crate) fn methods_for(&self, path: &str) -> Option<&[Method]> {
        self.methods_by_path.get(path).map(|v| v.as_slice())
    }

    /// Register a method-agnostic fallback for every path under `prefix`.
    /// Kept sorted longest-prefix-first so [`Tree::find_catcher`] can
    /// return on the first match.
    pub(crate) fn add_catcher(&mut self, prefix: String, handler: HandlerObject<T>) {
        self.catchers.push((prefix, handler));
        self.catchers.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// The longest registered catcher whose prefix matches `path`, if any.
    pub(crate) fn find_catcher(&self, path: &str) -> Option<&HandlerObject<T>> {
        self.catchers
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, handler)| handler)
    }
}

/// Returns the number of request segments consumed on a match (used to
/// pick the longest catch-all), or `None` if `segments` doesn't match
/// `request`.
fn match_segments(segments: &[Segment], request: &[&str]) -> Option<usize> {
    let mut ri = 0;
    for seg in segments {
        match seg {
            Segment::Static(s) => {
                if request.get(ri) != Some(&s.as_str()) {
                    return None;
                }
                ri += 1;
            }
            Segment::Param(_) => {
                if ri >= request.len() {
                    return None;
                }
                ri += 1;
            }
            Segment::CatchAll(_) => {
                return Some(request.len());
            }
        }
    }
    if ri == request.len() {
        Some(ri)
    } else {
        None
    }
}

fn bind_params(segments: &[Segment], request: &[&str], params: &mut HashMap<String, String>) {
    let mut ri = 0;
    for seg in segments {
        match seg {
            Segment::Static(_) => ri += 1,
            Segment::Param(name) => {
                if let Some(value) = request.get(ri) {
                    params.insert(name.clone(), value.to_string());
                }
                ri += 1;
            }
            Segment::CatchAll(name) => {
                params.insert(name.clone(), request[ri..].join("/"));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use crate::response::Response;
    use crate::router::types::BoxFuture;
    use std::sync::Arc;

    fn h() -> HandlerObject<()> {
        Arc::new(|_req: &mut Request<()>| -> BoxFuture<'_> {
            Box::pin(async { Response::new() })
        })
    }

    #[test]
    fn static_route_takes_priority_over_dynamic() {
        let mut tree: Tree<()> = Tree::default();
        tree.insert(Method::Get, "/users/me", h());
        tree.insert(Method::Get, "/users/:id", h());
        let mut params = HashMap::new();
        assert!(tree.find(Method::Get, "/users/me", &mut params).is_some());
        assert!(params.is_empty());
    }

    #[test]
    fn dynamic_route_binds_param() {
        let mut tree: Tree<()> = Tree::default();
        tree.insert(Method::Get, "/users/:id", h());
        let mut params = HashMap::new();
        tree.find(Method::Get, "/users/42", &mut params).unwrap();
        assert_eq!(params.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn catch_all_binds_remaining_path() {
        let mut tree: Tree<()> = Tree::default();
        tree.insert(Method::Get, "/static/*rest", h());
        let mut params = HashMap::new();
        tree.find(Method::Get, "/static/css/a.css", &mut params)
            .unwrap();
        assert_eq!(params.get("rest"), Some(&"css/a.css".to_string()));
    }

    #[test]
    fn catcher_matches_longest_registered_prefix() {
        let mut tree: Tree<()> = Tree::default();
        tree.add_catcher("/static".to_string(), h());
        tree.add_catcher("/static/assets".to_string(), h());
        assert!(tree.find_catcher("/static/assets/a.css").is_some());
        assert!(tree.find_catcher("/static/other").is_some());
        assert!(tree.find_catcher("/other").is_none());
    }

    #[test]
    fn wrong_method_is_distinguishable_from_missing_path() {
        let mut tree: Tree<()> = Tree::default();
        tree.insert(Method::Get, "/only-get", h());
        let mut params = HashMap::new();
        assert!(tree.find(Method::Post, "/only-get", &mut params).is_none());
        assert_eq!(tree.methods_for("/only-get"), Some(&[Method::Get][..]));
        assert!(tree.methods_for("/nothing-here").is_none());
    }
}
