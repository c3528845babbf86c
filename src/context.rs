//! The per-request, type-erased value bag (`§3`: "opaque per-request
//! context bag, set by middleware, read by handlers").

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// A small type-keyed map, one instance of a given type per request.
///
/// Middleware commonly insert a value (an authenticated user, a request
/// id) that a downstream handler retrieves by type, without the router
/// needing a named slot for every possible middleware.
#[derive(Default)]
pub struct Context {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Context {
    pub(crate) fn new() -> Self {
        Context {
            values: HashMap::new(),
        }
    }

    /// Insert a value, replacing and returning any previous value of the
    /// same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    /// Borrow the value of type `T`, if one was inserted.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Mutably borrow the value of type `T`, if one was inserted.
    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.values
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut::<T>())
    }

    /// Remove and return the value of type `T`, if one was inserted.
    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.values
            .remove(&TypeId::of::<T>())
            .and_then(|old| old.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("len", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove_roundtrip() {
        let mut ctx = Context::new();
        assert!(ctx.get::<u32>().is_none());
        ctx.insert(7u32);
        assert_eq!(ctx.get::<u32>(), Some(&7));
        assert_eq!(ctx.remove::<u32>(), Some(7));
        assert!(ctx.get::<u32>().is_none());
    }

    #[test]
    fn distinguishes_types() {
        let mut ctx = Context::new();
        ctx.insert(1u32);
        ctx.insert("hello".to_string());
        assert_eq!(ctx.get::<u32>(), Some(&1));
        assert_eq!(ctx.get::<String>(), Some(&"hello".to_string()));
    }
}
