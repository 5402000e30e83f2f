/// Middleware for the API server
///
/// - `auth`: bearer credential verification
/// - `security`: security response headers

pub mod auth;
pub mod security;
