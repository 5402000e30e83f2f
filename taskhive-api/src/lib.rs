//! # TaskHive API Server Library
//!
//! HTTP layer over the TaskHive core: resolves the actor from the bearer
//! credential, parses request bodies, calls one core operation per request,
//! and maps core errors to status codes.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Authentication and security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
