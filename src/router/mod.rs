//! Route registration and request dispatch.
//!
//! Grounded in `router/inbuilt/callbacks.go` (`OnStart`, `OnRequest`,
//! `OnError`) and `router/inbuilt/route.go` (`Route`, `RouteError`): a
//! two-phase API where [`RouterBuilder`] accumulates routes, groups, and
//! error handlers, then [`RouterBuilder::build`] compiles everything
//! (middleware chains folded, route table built) into an immutable
//! [`Router`] the connection driver dispatches against.

mod group;
mod tree;
mod trace;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

pub use group::ResourceBuilder;
pub use types::{BoxFuture, Handler, HandlerObject, Middleware, MiddlewareObject};

use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::status::StatusCode;
use types::Chain;

use tree::Tree;

/// A callback run unconditionally on every dispatched request, before
/// path and method resolution (`router/inbuilt/inbuilt_test.go`'s
/// `TestMutators`: registered mutators run whether the request resolves,
/// 404s, or 405s).
pub type MutatorFn<T> = Arc<dyn Fn(&mut Request<T>) + Send + Sync>;

/// Stashed in a request's [`crate::context::Context`] when it arrived via
/// an aliased path, holding the original path that was rewritten
/// (`router/inbuilt/inbuilt_test.go`'s `TestAliases`, checking
/// `req.Env.AliasFrom`).
#[derive(Debug, Clone)]
pub struct AliasFrom(pub String);

/// One target of a [`RouterBuilder::route_error`] registration: either a
/// concrete status, or the `AllErrors` sentinel from `route.go`'s
/// `RouteError` that registers a universal fallback instead of a
/// per-status one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSelector {
    Status(StatusCode),
    AllErrors,
}

impl From<StatusCode> for ErrorSelector {
    fn from(status: StatusCode) -> Self {
        ErrorSelector::Status(status)
    }
}

fn join_path(prefix: &str, pattern: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let pattern = pattern.trim_start_matches('/');
    if prefix.is_empty() {
        format!("/{}", pattern)
    } else if pattern.is_empty() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, pattern)
    }
}

/// Accumulates routes, groups, and error handlers before compiling a
/// [`Router`].
pub struct RouterBuilder<T> {
    entries: Vec<(Method, String, Chain<T>)>,
    aliases: Vec<(Method, String, String)>,
    catchers: Vec<(String, HandlerObject<T>)>,
    mutators: Vec<MutatorFn<T>>,
    err_handlers: HashMap<u16, HandlerObject<T>>,
    all_errors_handler: Option<HandlerObject<T>>,
    prefix_stack: Vec<String>,
    middleware_stack: Vec<MiddlewareObject<T>>,
}

impl<T> std::fmt::Debug for RouterBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterBuilder").finish_non_exhaustive()
    }
}

impl<T> Default for RouterBuilder<T> {
    fn default() -> Self {
        RouterBuilder {
            entries: Vec::new(),
            aliases: Vec::new(),
            catchers: Vec::new(),
            mutators: Vec::new(),
            err_handlers: HashMap::new(),
            all_errors_handler: None,
            prefix_stack: Vec::new(),
            middleware_stack: Vec::new(),
        }
    }
}

impl<T: Send + Sync + 'static> RouterBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_prefix(&self) -> String {
        self.prefix_stack.concat()
    }

    /// Register `handler` for `method` at `pattern`, under any currently
    /// open [`RouterBuilder::group`] prefix and middleware stack.
    pub fn route<H>(&mut self, method: Method, pattern: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler<T> + 'static,
    {
        let full_path = join_path(&self.current_prefix(), &pattern.into());
        let terminal: HandlerObject<T> = Arc::new(handler);
        let chain = Chain::new(terminal, self.middleware_stack.clone());
        self.entries.push((method, full_path, chain));
        self
    }

    /// `route(Method::Get, pattern, handler)`.
    pub fn get<H>(&mut self, pattern: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler<T> + 'static,
    {
        self.route(Method::Get, pattern, handler)
    }

    /// `route(Method::Post, pattern, handler)`.
    pub fn post<H>(&mut self, pattern: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler<T> + 'static,
    {
        self.route(Method::Post, pattern, handler)
    }

    /// `route(Method::Put, pattern, handler)`.
    pub fn put<H>(&mut self, pattern: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler<T> + 'static,
    {
        self.route(Method::Put, pattern, handler)
    }

    /// `route(Method::Delete, pattern, handler)`.
    pub fn delete<H>(&mut self, pattern: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler<T> + 'static,
    {
        self.route(Method::Delete, pattern, handler)
    }

    /// `route(Method::Patch, pattern, handler)`.
    pub fn patch<H>(&mut self, pattern: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler<T> + 'static,
    {
        self.route(Method::Patch, pattern, handler)
    }

    /// `route(Method::Head, pattern, handler)`.
    pub fn head<H>(&mut self, pattern: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler<T> + 'static,
    {
        self.route(Method::Head, pattern, handler)
    }

    /// `route(Method::Options, pattern, handler)`.
    pub fn options<H>(&mut self, pattern: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler<T> + 'static,
    {
        self.route(Method::Options, pattern, handler)
    }

    /// Start a fluent, multi-method registration for one path.
    pub fn resource(&mut self, pattern: impl Into<String>) -> ResourceBuilder<'_, T> {
        ResourceBuilder {
            router: self,
            pattern: pattern.into(),
        }
    }

    /// Register `from` as an alias of whatever is (or will be) registered
    /// at `to` for `method`. Resolved once, at [`RouterBuilder::build`].
    pub fn alias(&mut self, method: Method, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        let from = join_path(&self.current_prefix(), &from.into());
        let to = join_path(&self.current_prefix(), &to.into());
        self.aliases.push((method, from, to));
        self
    }

    /// Register a method-agnostic fallback handler for every path under
    /// `prefix`, under any currently open group prefix. Only consulted
    /// when no exact static or dynamic route matches the request path at
    /// all; the longest registered prefix wins.
    pub fn catch<H>(&mut self, prefix: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler<T> + 'static,
    {
        let full_prefix = join_path(&self.current_prefix(), &prefix.into());
        self.catchers.push((full_prefix, Arc::new(handler)));
        self
    }

    /// Register a callback run on every dispatched request before route
    /// resolution, in registration order.
    pub fn mutator(&mut self, mutator: impl Fn(&mut Request<T>) + Send + Sync + 'static) -> &mut Self {
        self.mutators.push(Arc::new(mutator));
        self
    }

    /// Nest routes under `prefix`, with `middlewares` applied to
    /// everything registered inside `build` in addition to any
    /// middleware from an enclosing group (`§10.5`: outer group
    /// middleware wraps inner group middleware, which wraps the route).
    pub fn group(
        &mut self,
        prefix: &str,
        middlewares: Vec<MiddlewareObject<T>>,
        build: impl FnOnce(&mut Self),
    ) -> &mut Self {
        self.prefix_stack.push(prefix.to_string());
        let added = middlewares.len();
        self.middleware_stack.extend(middlewares);
        build(self);
        let new_len = self.middleware_stack.len() - added;
        self.middleware_stack.truncate(new_len);
        self.prefix_stack.pop();
        self
    }

    /// Register `handler` for every error selector in `kinds`, overriding
    /// the built-in default responses for those statuses
    /// (`router/inbuilt/defaulterrhandlers.go`). [`ErrorSelector::AllErrors`]
    /// registers `handler` as the universal fallback consulted when no more
    /// specific selector matches (`route.go`'s `RouteError`, with `AllErrors`
    /// as the sentinel kind `inbuilt_test.go`'s `TestRouter_RouteError`
    /// registers against).
    pub fn route_error<H>(&mut self, handler: H, kinds: impl IntoIterator<Item = ErrorSelector>) -> &mut Self
    where
        H: Handler<T> + 'static,
    {
        let handler: HandlerObject<T> = Arc::new(handler);
        for kind in kinds {
            match kind {
                ErrorSelector::Status(status) => {
                    self.err_handlers.insert(status.0, handler.clone());
                }
                ErrorSelector::AllErrors => {
                    self.all_errors_handler = Some(handler.clone());
                }
            }
        }
        self
    }

    /// Compile every registered route, alias, and error handler into an
    /// immutable [`Router`] (`OnStart` in the Go source).
    pub fn build(self) -> Router<T> {
        let mut tree = Tree::default();
        let mut by_path_method: HashMap<(Method, String), HandlerObject<T>> = HashMap::new();

        for (method, path, chain) in self.entries {
            let handler = chain.compose();
            by_path_method.insert((method, path.clone()), handler.clone());
            tree.insert(method, &path, handler);
        }

        let mut alias_map: HashMap<(Method, String), String> = HashMap::new();
        for (method, from, to) in self.aliases {
            if by_path_method.contains_key(&(method, to.clone())) {
                alias_map.insert((method, from), to);
            }
        }

        for (prefix, handler) in self.catchers {
            tree.add_catcher(prefix, handler);
        }

        Router {
            tree,
            aliases: alias_map,
            mutators: self.mutators,
            err_handlers: self.err_handlers,
            all_errors_handler: self.all_errors_handler,
        }
    }
}

/// A compiled, immutable route table.
pub struct Router<T> {
    tree: Tree<T>,
    aliases: HashMap<(Method, String), String>,
    mutators: Vec<MutatorFn<T>>,
    err_handlers: HashMap<u16, HandlerObject<T>>,
    all_errors_handler: Option<HandlerObject<T>>,
}

impl<T> std::fmt::Debug for Router<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Router<T> {
    /// Dispatch one request: run mutators, apply an exact alias rewrite,
    /// find a matching route and run it, or synthesize an error response
    /// (`OnRequest`/`processRequest` in the Go source).
    pub async fn dispatch(&self, req: &mut Request<T>) -> Response {
        for mutator in &self.mutators {
            mutator(req);
        }

        let mut params = HashMap::new();
        let method = req.method();
        let original_path = req.path().to_string();

        let path = match self.aliases.get(&(method, original_path.clone())) {
            Some(target) => {
                req.context_mut().insert(AliasFrom(original_path));
                target.clone()
            }
            None => original_path,
        };

        // A HEAD request with no registered HEAD handler falls back to the
        // matching GET handler; the renderer suppresses the body (`§4.F`
        // step 6, `§4.G` step 4).
        let handler = self.tree.find(method, &path, &mut params).cloned().or_else(|| {
            if method == Method::Head {
                self.tree.find(Method::Get, &path, &mut params).cloned()
            } else {
                None
            }
        });

        match handler {
            Some(handler) => {
                *req.params_mut() = params;
                handler.call(req).await
            }
            None => match self.tree.methods_for(&path) {
                Some(_) => self.handle_error(req, crate::error::Error::method_not_allowed()).await,
                None => match self.tree.find_catcher(&path).cloned() {
                    Some(handler) => handler.call(req).await,
                    None => self.handle_error(req, crate::error::Error::not_found()).await,
                },
            },
        }
    }

    /// Run the `OnError` path against an already-built `err`: consult
    /// per-status handlers, then the universal handler, else synthesize a
    /// response from the error's HTTP mapping. Exposed to the connection
    /// driver so parse- and read-time errors (no route was ever matched)
    /// still go through a router's custom error handlers (`§4.H` step 1,
    /// "produce `ConnectionTimeout` via `OnError`").
    pub(crate) async fn handle_error(&self, req: &mut Request<T>, err: crate::error::Error) -> Response {
        use crate::error::Kind;

        if err.kind() == Kind::MethodNotAllowed && req.method() == Method::Trace {
            return trace::trace_response(req);
        }

        if let Some(code) = err.status_code() {
            if let Some(handler) = self.err_handlers.get(&code.0) {
                return handler.call(req).await;
            }
            if code == StatusCode::METHOD_NOT_ALLOWED {
                return self.default_method_not_allowed(req);
            }
        }

        if let Some(handler) = &self.all_errors_handler {
            return handler.call(req).await;
        }

        Response::new().with_error(&err)
    }

    fn default_method_not_allowed(&self, req: &Request<T>) -> Response {
        let allow = self
            .tree
            .methods_for(req.path())
            .map(|methods| {
                methods
                    .iter()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        Response::new()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .header("allow", allow)
            .string("method not allowed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::Headers;
    use crate::query::Query;
    use crate::version::Proto;

    fn ok_handler<T: Send + Sync + 'static>() -> impl Handler<T> {
        |_req: &mut Request<T>| -> BoxFuture<'_> { Box::pin(async { Response::new().string("ok") }) }
    }

    fn req<T>(method: Method, path: &str, io: T) -> Request<T> {
        let addr = "127.0.0.1:0".parse().unwrap();
        Request::new(
            method,
            path.to_string(),
            Query::default(),
            Proto::Http11,
            Headers::new(),
            None,
            false,
            None,
            None,
            addr,
            io,
        )
    }

    #[tokio::test]
    async fn dispatches_to_registered_route() {
        let mut builder: RouterBuilder<()> = RouterBuilder::new();
        builder.route(Method::Get, "/hello", ok_handler());
        let router = builder.build();
        let mut r = req(Method::Get, "/hello", ());
        let resp = router.dispatch(&mut r).await;
        assert_eq!(resp.status_code().0, 200);
    }

    #[tokio::test]
    async fn method_shortcuts_register_the_matching_method() {
        let mut builder: RouterBuilder<()> = RouterBuilder::new();
        builder
            .get("/a", ok_handler())
            .post("/b", ok_handler())
            .put("/c", ok_handler())
            .delete("/d", ok_handler())
            .patch("/e", ok_handler())
            .options("/f", ok_handler());
        let router = builder.build();

        for (method, path) in [
            (Method::Get, "/a"),
            (Method::Post, "/b"),
            (Method::Put, "/c"),
            (Method::Delete, "/d"),
            (Method::Patch, "/e"),
            (Method::Options, "/f"),
        ] {
            let mut r = req(method, path, ());
            let resp = router.dispatch(&mut r).await;
            assert_eq!(resp.status_code().0, 200, "{method:?} {path} should have matched");
        }

        let mut wrong = req(Method::Post, "/a", ());
        assert_eq!(router.dispatch(&mut wrong).await.status_code().0, 405);
    }

    #[tokio::test]
    async fn missing_path_is_404() {
        let builder: RouterBuilder<()> = RouterBuilder::new();
        let router = builder.build();
        let mut r = req(Method::Get, "/nope", ());
        let resp = router.dispatch(&mut r).await;
        assert_eq!(resp.status_code().0, 404);
    }

    #[tokio::test]
    async fn wrong_method_is_405_with_allow_header() {
        let mut builder: RouterBuilder<()> = RouterBuilder::new();
        builder.route(Method::Get, "/only-get", ok_handler());
        let router = builder.build();
        let mut r = req(Method::Post, "/only-get", ());
        let resp = router.dispatch(&mut r).await;
        assert_eq!(resp.status_code().0, 405);
        assert_eq!(resp.headers().get("allow"), Some("GET"));
    }

    #[tokio::test]
    async fn trace_to_unregistered_path_echoes_request() {
        let mut builder: RouterBuilder<()> = RouterBuilder::new();
        builder.route(Method::Get, "/only-get", ok_handler());
        let router = builder.build();
        let mut r = req(Method::Trace, "/only-get", ());
        let resp = router.dispatch(&mut r).await;
        assert_eq!(resp.headers().get("content-type"), Some("message/http"));
    }

    #[tokio::test]
    async fn group_prefixes_paths() {
        let mut builder: RouterBuilder<()> = RouterBuilder::new();
        builder.group("/api", vec![], |api| {
            api.route(Method::Get, "/users", ok_handler());
        });
        let router = builder.build();
        let mut r = req(Method::Get, "/api/users", ());
        let resp = router.dispatch(&mut r).await;
        assert_eq!(resp.status_code().0, 200);
    }

    #[tokio::test]
    async fn alias_points_at_same_handler() {
        let mut builder: RouterBuilder<()> = RouterBuilder::new();
        builder.route(Method::Get, "/real", ok_handler());
        builder.alias(Method::Get, "/fake", "/real");
        let router = builder.build();
        let mut r = req(Method::Get, "/fake", ());
        let resp = router.dispatch(&mut r).await;
        assert_eq!(resp.status_code().0, 200);
        assert_eq!(r.context().get::<AliasFrom>().map(|a| a.0.as_str()), Some("/fake"));
    }

    #[tokio::test]
    async fn canonical_path_has_no_alias_from_stashed() {
        let mut builder: RouterBuilder<()> = RouterBuilder::new();
        builder.route(Method::Get, "/real", ok_handler());
        builder.alias(Method::Get, "/fake", "/real");
        let router = builder.build();
        let mut r = req(Method::Get, "/real", ());
        router.dispatch(&mut r).await;
        assert!(r.context().get::<AliasFrom>().is_none());
    }

    #[tokio::test]
    async fn mutators_run_regardless_of_match_outcome() {
        let mut builder: RouterBuilder<()> = RouterBuilder::new();
        let calls = Arc::new(std::sync::Mutex::new(0));
        let counted = calls.clone();
        builder.mutator(move |_req| {
            *counted.lock().unwrap() += 1;
        });
        builder.route(Method::Get, "/only-get", ok_handler());
        let router = builder.build();

        let mut ok = req(Method::Get, "/only-get", ());
        router.dispatch(&mut ok).await;
        let mut wrong_method = req(Method::Post, "/only-get", ());
        router.dispatch(&mut wrong_method).await;
        let mut missing = req(Method::Get, "/nope", ());
        router.dispatch(&mut missing).await;

        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn catcher_handles_any_method_under_unmatched_prefix() {
        let mut builder: RouterBuilder<()> = RouterBuilder::new();
        builder.catch("/static", ok_handler());
        let router = builder.build();
        let mut r = req(Method::Post, "/static/app.js", ());
        let resp = router.dispatch(&mut r).await;
        assert_eq!(resp.status_code().0, 200);
    }

    #[tokio::test]
    async fn exact_route_wins_over_catcher_at_same_path() {
        let mut builder: RouterBuilder<()> = RouterBuilder::new();
        builder.route(Method::Get, "/hello", |_req: &mut Request<()>| -> BoxFuture<'_> {
            Box::pin(async { Response::new().string("exact") })
        });
        builder.catch("/hello", |_req: &mut Request<()>| -> BoxFuture<'_> {
            Box::pin(async { Response::new().string("caught") })
        });
        let router = builder.build();
        let mut r = req(Method::Get, "/hello", ());
        let resp = router.dispatch(&mut r).await;
        assert_eq!(resp.status_code().0, 200);
    }

    #[tokio::test]
    async fn unregistered_status_falls_back_to_universal_error_handler() {
        let mut builder: RouterBuilder<()> = RouterBuilder::new();
        builder.route_error(
            |_req: &mut Request<()>| -> BoxFuture<'_> {
                Box::pin(async { Response::new().status(StatusCode(599)).string("caught-all") })
            },
            [ErrorSelector::AllErrors],
        );
        let router = builder.build();
        let mut r = req(Method::Get, "/nope", ());
        let resp = router.dispatch(&mut r).await;
        assert_eq!(resp.status_code().0, 599);
    }

    #[tokio::test]
    async fn route_error_registers_one_handler_for_several_statuses() {
        let mut builder: RouterBuilder<()> = RouterBuilder::new();
        builder.route(Method::Get, "/only-get", ok_handler());
        builder.route_error(
            |_req: &mut Request<()>| -> BoxFuture<'_> {
                Box::pin(async { Response::new().status(StatusCode(599)).string("shared") })
            },
            [ErrorSelector::Status(StatusCode::NOT_FOUND), ErrorSelector::Status(StatusCode::METHOD_NOT_ALLOWED)],
        );
        let router = builder.build();

        let mut not_found = req(Method::Get, "/nope", ());
        assert_eq!(router.dispatch(&mut not_found).await.status_code().0, 599);

        let mut wrong_method = req(Method::Post, "/only-get", ());
        assert_eq!(router.dispatch(&mut wrong_method).await.status_code().0, 599);
    }
}
