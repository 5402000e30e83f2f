//! Database models for TaskHive
//!
//! Each model owns its SQL. Query functions are generic over
//! [`sqlx::PgExecutor`] so the Postgres store can run them on the pool or
//! inside a transaction.
//!
//! # Models
//!
//! - `user`: accounts and profiles
//! - `organization`: organizations, invite codes and ownership
//! - `membership`: non-owner participation in organizations
//! - `task`: tasks, their status and assignment

pub mod membership;
pub mod organization;
pub mod task;
pub mod user;

/// Serde helper for patch fields that distinguish "absent" from "null"
///
/// Use with `#[serde(default, deserialize_with = "double_option::deserialize")]`
/// on an `Option<Option<T>>` field: a missing key yields `None`, an explicit
/// `null` yields `Some(None)`.
pub mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::double_option;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option::deserialize")]
        description: Option<Option<String>>,
    }

    #[test]
    fn test_absent_null_and_value_are_distinct() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.description, None);

        let null: Patch = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(null.description, Some(None));

        let value: Patch = serde_json::from_str(r#"{"description": "x"}"#).unwrap();
        assert_eq!(value.description, Some(Some("x".to_string())));
    }
}
