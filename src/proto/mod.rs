//! Wire protocol implementations.
//!
//! Only HTTP/1.x is implemented (`§1`'s non-goals exclude HTTP/2 and
//! HTTP/3), matching `h1`-only of the teacher's `proto/{h1,h2,h3}` split.

pub(crate) mod h1;
