//! `Resource` registration sugar.
//!
//! Not present in the Go source this crate's core is grounded on (routes
//! there are registered one `Route()` call per method/path pair); pulled
//! in as a supplemented feature because registering a REST-style resource
//! one method at a time is repetitive enough that most Rust router
//! crates in this space offer exactly this builder shape.

use crate::method::Method;
use crate::router::types::Handler;
use crate::router::RouterBuilder;

/// A fluent builder for registering several methods against one path,
/// returned by [`RouterBuilder::resource`].
pub struct ResourceBuilder<'a, T> {
    pub(crate) router: &'a mut RouterBuilder<T>,
    pub(crate) pattern: String,
}

impl<'a, T> std::fmt::Debug for ResourceBuilder<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceBuilder")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

macro_rules! resource_method {
    ($name:ident, $method:expr) => {
        /// Register a handler for this resource's path.
        pub fn $name<H>(self, handler: H) -> Self
        where
            H: Handler<T> + 'static,
            T: Send + Sync + 'static,
        {
            self.router.route($method, self.pattern.clone(), handler);
            self
        }
    };
}

impl<'a, T> ResourceBuilder<'a, T> {
    resource_method!(get, Method::Get);
    resource_method!(post, Method::Post);
    resource_method!(put, Method::Put);
    resource_method!(delete, Method::Delete);
    resource_method!(patch, Method::Patch);
    resource_method!(head, Method::Head);
    resource_method!(options, Method::Options);
}
