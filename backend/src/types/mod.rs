//! Shared strongly-typed primitives.

pub mod id;

pub use id::*;
