//! Authentication primitives.
//!
//! - [`jwt`] -- JWT access-token generation and validation.
//!
//! Tokens are issued by the storefront's identity service; this server only
//! validates them. Generation is kept for tests and local tooling.

pub mod jwt;
