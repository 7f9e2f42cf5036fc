//! Shared validation rules for request payloads.
//!
//! Payloads derive `validator::Validate`; field rules that are not built into
//! the derive live in [`rules`].

pub mod rules;

pub use validator::Validate;
