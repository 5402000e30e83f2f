//! Authentication and authorization primitives
//!
//! - [`password`]: Argon2id hashing and strength checks
//! - [`jwt`]: HS256 bearer credentials
//! - [`policy`]: the access policy over owner/member/outsider roles

pub mod jwt;
pub mod password;
pub mod policy;
