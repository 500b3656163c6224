//! Record store adapter: the single point of entry for all calls to the
//! backing database service.
//!
//! The service is a black box offering CRUD plus list/filter/sort over named
//! collections and password-based session issuance. Everything above this
//! module works against the [`RecordStore`] trait; the HTTP client and the
//! in-memory test double are interchangeable.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::user::User;

pub mod http;
pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no {collection} record matched {target}")]
    NotFound { collection: String, target: String },

    #[error("record store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("record store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed record: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("authentication rejected by record store")]
    AuthRejected,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Options for list queries. Filters are simple equality/boolean expressions
/// over record fields; sort names a single field, `-` prefix for descending.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub filter: Option<String>,
    pub sort: Option<String>,
}

/// A token plus the user it authenticates, as issued by the store's auth
/// endpoints. The core never constructs tokens itself.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub token: String,
    #[serde(alias = "record")]
    pub user: User,
}

/// CRUD and session issuance over named collections.
///
/// Authentication state is immutable per handle: [`RecordStore::with_token`]
/// returns a new handle carrying the caller's token rather than mutating a
/// shared client.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, collection: &str, fields: Value) -> Result<Value, StoreError>;

    /// Fetch one record by id. Fails with `NotFound` if absent.
    async fn get_one(&self, collection: &str, id: &str) -> Result<Value, StoreError>;

    /// Fetch the first record matching `filter`. Fails with `NotFound` if
    /// nothing matches.
    async fn get_first_list_item(&self, collection: &str, filter: &str)
        -> Result<Value, StoreError>;

    async fn get_list(
        &self,
        collection: &str,
        page: u32,
        per_page: u32,
        options: ListOptions,
    ) -> Result<Vec<Value>, StoreError>;

    async fn update(&self, collection: &str, id: &str, fields: Value)
        -> Result<Value, StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    async fn auth_with_password(
        &self,
        identity: &str,
        password: &str,
    ) -> Result<AuthSession, StoreError>;

    /// Validate this handle's token and return the current session.
    async fn auth_refresh(&self) -> Result<AuthSession, StoreError>;

    /// A new handle authenticated as the bearer of `token`.
    fn with_token(&self, token: &str) -> Arc<dyn RecordStore>;
}

/// Decode a raw record into a typed row.
pub fn decode<T: DeserializeOwned>(record: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(record)?)
}

/// Builders for the store's filter expressions. Keeping quoting in one place
/// means no caller ever splices raw values into a filter string.
pub mod filter {
    pub fn eq(field: &str, value: &str) -> String {
        format!("{field} = \"{}\"", value.replace('"', "\\\""))
    }

    pub fn eq_bool(field: &str, value: bool) -> String {
        format!("{field} = {value}")
    }

    pub fn all(terms: &[String]) -> String {
        terms.join(" && ")
    }

    pub fn any(terms: &[String]) -> String {
        terms.join(" || ")
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_eq_quotes_value() {
            assert_eq!(eq("user_id", "abc"), "user_id = \"abc\"");
        }

        #[test]
        fn test_eq_escapes_embedded_quotes() {
            assert_eq!(eq("name", "a\"b"), "name = \"a\\\"b\"");
        }

        #[test]
        fn test_all_joins_with_and() {
            let expr = all(&[eq_bool("published", true), eq("user_id", "u1")]);
            assert_eq!(expr, "published = true && user_id = \"u1\"");
        }

        #[test]
        fn test_any_joins_with_or() {
            let expr = any(&[eq_bool("published", true), eq_bool("shared", true)]);
            assert_eq!(expr, "published = true || shared = true");
        }
    }
}
