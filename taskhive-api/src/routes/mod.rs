/// API route handlers, organized by resource
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login, current user
/// - `users`: Profile and dashboard stats
/// - `organizations`: Organizations, invite codes and membership
/// - `tasks`: Task lifecycle

pub mod auth;
pub mod health;
pub mod organizations;
pub mod tasks;
pub mod users;
