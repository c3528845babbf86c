//! Handler and middleware trait objects.
//!
//! Grounded in `router/inbuilt/types/types.go` (`HandlerFunc`,
//! `Middleware func(next HandlerFunc, request) Response`), reshaped for
//! async Rust: rather than generic `impl Future` handlers (which would
//! force every router type through a matching generic, HRTB-bound
//! signature), handlers and middleware return an already-boxed future
//! directly, the way hand-rolled async trait objects were written before
//! `async fn` in traits existed.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::Response;

/// A boxed, type-erased future, borrowing from the call that produced it.
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = Response> + Send + 'a>>;

/// A request handler.
///
/// Implemented automatically for any function or closure with the shape
/// `for<'a> Fn(&'a mut Request<T>) -> BoxFuture<'a>`; write a handler as
/// `|req| Box::pin(async move { ... })`.
pub trait Handler<T>: Send + Sync {
    /// Handle one request, producing the response to render.
    fn call<'a>(&'a self, req: &'a mut Request<T>) -> BoxFuture<'a>;
}

impl<T, F> Handler<T> for F
where
    F: for<'a> Fn(&'a mut Request<T>) -> BoxFuture<'a> + Send + Sync,
{
    fn call<'a>(&'a self, req: &'a mut Request<T>) -> BoxFuture<'a> {
        self(req)
    }
}

/// A shared, type-erased handler, as stored in the route table.
pub type HandlerObject<T> = Arc<dyn Handler<T>>;

/// A middleware: given the request and the next handler in the chain,
/// produce a response. A middleware that wants to short-circuit simply
/// does not call `next`.
///
/// Implemented automatically for `for<'a> Fn(&'a mut Request<T>, &'a
/// (dyn Handler<T> + 'a)) -> BoxFuture<'a>`.
pub trait Middleware<T>: Send + Sync {
    /// Run this middleware, optionally delegating to `next`.
    fn call<'a>(&'a self, req: &'a mut Request<T>, next: &'a dyn Handler<T>) -> BoxFuture<'a>;
}

impl<T, F> Middleware<T> for F
where
    F: for<'a> Fn(&'a mut Request<T>, &'a dyn Handler<T>) -> BoxFuture<'a> + Send + Sync,
{
    fn call<'a>(&'a self, req: &'a mut Request<T>, next: &'a dyn Handler<T>) -> BoxFuture<'a> {
        self(req, next)
    }
}

/// A shared, type-erased middleware.
pub type MiddlewareObject<T> = Arc<dyn Middleware<T>>;

/// A handler with its middleware chain already attached, but not yet
/// folded into a single [`Handler`] (`router/inbuilt/types/types.go`'s
/// `HandlerObject{Fun, Middlewares}`, kept apart until
/// [`Chain::compose`] runs once at startup).
pub struct Chain<T> {
    middlewares: Vec<MiddlewareObject<T>>,
    terminal: HandlerObject<T>,
}

impl<T> std::fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

impl<T> Chain<T> {
    pub(crate) fn new(terminal: HandlerObject<T>, middlewares: Vec<MiddlewareObject<T>>) -> Self {
        Chain {
            middlewares,
            terminal,
        }
    }

    /// Fold the middleware chain into a single handler, outer-to-inner:
    /// `middlewares[0]` wraps everything after it, `middlewares[last]`
    /// wraps only the terminal handler.
    pub(crate) fn compose(self) -> HandlerObject<T>
    where
        T: Send + Sync + 'static,
    {
        if self.middlewares.is_empty() {
            return self.terminal;
        }
        Arc::new(Composed {
            middlewares: self.middlewares,
            terminal: self.terminal,
        })
    }
}

struct Composed<T> {
    middlewares: Vec<MiddlewareObject<T>>,
    terminal: HandlerObject<T>,
}

impl<T: Send + Sync + 'static> Handler<T> for Composed<T> {
    fn call<'a>(&'a self, req: &'a mut Request<T>) -> BoxFuture<'a> {
        let continuation = Continuation {
            composed: self,
            index: 0,
        };
        Box::pin(async move {
            let continuation = continuation;
            continuation.call(req).await
        })
    }
}

struct Continuation<'c, T> {
    composed: &'c Composed<T>,
    index: usize,
}

impl<'c, T: Send + Sync + 'static> Handler<T> for Continuation<'c, T> {
    fn call<'a>(&'a self, req: &'a mut Request<T>) -> BoxFuture<'a> {
        if self.index >= self.composed.middlewares.len() {
            return self.composed.terminal.call(req);
        }
        let mw = &self.composed.middlewares[self.index];
        let next = Continuation {
            composed: self.composed,
            index: self.index + 1,
        };
        Box::pin(async move {
            let next = next;
            mw.call(req, &next).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> HandlerObject<()> {
        Arc::new(|_req: &mut Request<()>| -> BoxFuture<'_> {
            Box::pin(async { Response::new().string("terminal") })
        })
    }

    #[tokio::test]
    async fn middleware_chain_runs_outer_to_inner() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        let mw1: MiddlewareObject<()> = Arc::new(
            move |req: &mut Request<()>, next: &dyn Handler<()>| -> BoxFuture<'_> {
                o1.lock().unwrap().push(1);
                next.call(req)
            },
        );
        let mw2: MiddlewareObject<()> = Arc::new(
            move |req: &mut Request<()>, next: &dyn Handler<()>| -> BoxFuture<'_> {
                o2.lock().unwrap().push(2);
                next.call(req)
            },
        );
        let composed = Chain::new(handler(), vec![mw1, mw2]).compose();
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut req = Request::new(
            crate::method::Method::Get,
            "/".into(),
            crate::query::Query::default(),
            crate::version::Proto::Http11,
            crate::headers::Headers::new(),
            None,
            false,
            None,
            None,
            addr,
            (),
        );
        let resp = composed.call(&mut req).await;
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
        let _ = resp;
    }
}
