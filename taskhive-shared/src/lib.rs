//! # TaskHive Shared Library
//!
//! Authorization and membership core for the TaskHive task tracker:
//! identities, organizations with invite codes, memberships, the access
//! policy, and tasks.
//!
//! ## Module Organization
//!
//! - `services`: the operations callers invoke
//! - `store`: the storage trait with Postgres and in-memory backends
//! - `models`: database rows and their queries
//! - `auth`: passwords, credentials, and the access policy
//! - `invite_code`: invite code alphabet and generation
//! - `db`: pool setup and migrations
//! - `error`: error kinds returned by every operation

pub mod auth;
pub mod db;
pub mod error;
pub mod invite_code;
pub mod models;
pub mod services;
pub mod store;

pub use error::{CoreError, CoreResult};

/// Current version of the TaskHive shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
