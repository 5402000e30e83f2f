//! PostgreSQL plumbing
//!
//! - `pool`: connection pool construction and liveness checks
//! - `migrations`: embedded schema migrations
//!
//! Queries themselves live with the models in [`crate::models`].

pub mod migrations;
pub mod pool;
