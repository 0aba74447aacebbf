/// Middleware modules for the API server
///
/// This module contains custom middleware for:
/// - Security headers
/// - Per-IP rate limiting of the public auth endpoints
///
/// Session authentication and the admin gate live in `app.rs` next to the
/// router they protect.

pub mod rate_limit;
pub mod security;
