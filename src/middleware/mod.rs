//! HTTP middleware components.
//!
//! Middleware run before route handlers; currently only bearer-token
//! authentication, which injects the caller's identity and role into the
//! request.

/// Access token authentication middleware
pub mod auth;
