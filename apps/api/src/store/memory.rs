//! In-memory record store.
//!
//! Implements the same trait as the HTTP client against process-local maps,
//! including the filter dialect (OR of ANDs over equality terms) and
//! single-field sort. Used by the test suite and for running the API without
//! a record service; records are lost on restart.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::{decode, AuthSession, ListOptions, RecordStore, StoreError};

#[derive(Default)]
struct Inner {
    /// Collection name → records in insertion order.
    collections: HashMap<String, Vec<Value>>,
    /// Issued token → user record id.
    sessions: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<Mutex<Inner>>,
    token: Option<String>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn not_found(collection: &str, target: &str) -> StoreError {
        StoreError::NotFound {
            collection: collection.to_string(),
            target: target.to_string(),
        }
    }
}

fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Evaluates a filter expression against one record. The dialect is the
/// store contract's: equality terms joined by `&&`, alternatives by `||`,
/// no grouping.
fn record_matches(record: &Value, filter: &str) -> bool {
    filter
        .split("||")
        .any(|clause| clause.split("&&").all(|term| term_matches(record, term)))
}

fn term_matches(record: &Value, term: &str) -> bool {
    let Some((field, expected)) = term.split_once('=') else {
        return false;
    };
    let actual = record.get(field.trim());
    let expected = expected.trim();

    if let Some(quoted) = expected
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    {
        let literal = quoted.replace("\\\"", "\"");
        return actual.and_then(Value::as_str) == Some(literal.as_str());
    }
    match expected {
        // An absent boolean field counts as false.
        "true" => actual.and_then(Value::as_bool).unwrap_or(false),
        "false" => !actual.and_then(Value::as_bool).unwrap_or(false),
        other => match other.parse::<f64>() {
            Ok(number) => actual.and_then(Value::as_f64) == Some(number),
            Err(_) => false,
        },
    }
}

fn sort_records(items: &mut [Value], sort: &str) {
    let (field, descending) = match sort.strip_prefix('-') {
        Some(field) => (field, true),
        None => (sort, false),
    };
    items.sort_by(|a, b| {
        let ordering = compare_field(a, b, field);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

fn compare_field(a: &Value, b: &Value, field: &str) -> Ordering {
    match (a.get(field), b.get(field)) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&y.as_f64().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, collection: &str, fields: Value) -> Result<Value, StoreError> {
        let Value::Object(mut record) = fields else {
            return Err(StoreError::Api {
                status: 400,
                message: "record fields must be a JSON object".to_string(),
            });
        };

        let now = Value::String(Utc::now().to_rfc3339());
        record.insert("id".to_string(), Value::String(Uuid::new_v4().simple().to_string()));
        record.insert("created".to_string(), now.clone());
        record.insert("updated".to_string(), now);

        let record = Value::Object(record);
        self.lock()
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn get_one(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        let inner = self.lock();
        inner
            .collections
            .get(collection)
            .and_then(|records| records.iter().find(|r| record_id(r) == Some(id)))
            .cloned()
            .ok_or_else(|| Self::not_found(collection, id))
    }

    async fn get_first_list_item(
        &self,
        collection: &str,
        filter: &str,
    ) -> Result<Value, StoreError> {
        let items = self
            .get_list(
                collection,
                1,
                1,
                ListOptions {
                    filter: Some(filter.to_string()),
                    sort: None,
                },
            )
            .await?;
        items
            .into_iter()
            .next()
            .ok_or_else(|| Self::not_found(collection, filter))
    }

    async fn get_list(
        &self,
        collection: &str,
        page: u32,
        per_page: u32,
        options: ListOptions,
    ) -> Result<Vec<Value>, StoreError> {
        let mut items: Vec<Value> = {
            let inner = self.lock();
            inner
                .collections
                .get(collection)
                .map(|records| {
                    records
                        .iter()
                        .filter(|r| {
                            options
                                .filter
                                .as_deref()
                                .map_or(true, |f| record_matches(r, f))
                        })
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        if let Some(sort) = options.sort.as_deref() {
            sort_records(&mut items, sort);
        }

        let skip = page.saturating_sub(1) as usize * per_page as usize;
        Ok(items.into_iter().skip(skip).take(per_page as usize).collect())
    }

    async fn update(&self, collection: &str, id: &str, fields: Value)
        -> Result<Value, StoreError> {
        let Value::Object(fields) = fields else {
            return Err(StoreError::Api {
                status: 400,
                message: "record fields must be a JSON object".to_string(),
            });
        };

        let mut inner = self.lock();
        let record = inner
            .collections
            .get_mut(collection)
            .and_then(|records| records.iter_mut().find(|r| record_id(r) == Some(id)))
            .ok_or_else(|| Self::not_found(collection, id))?;

        if let Value::Object(existing) = record {
            for (key, value) in fields {
                existing.insert(key, value);
            }
            existing.insert(
                "updated".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }
        Ok(record.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let records = inner
            .collections
            .get_mut(collection)
            .ok_or_else(|| Self::not_found(collection, id))?;
        let before = records.len();
        records.retain(|r| record_id(r) != Some(id));

        if records.len() == before {
            return Err(Self::not_found(collection, id));
        }
        Ok(())
    }

    async fn auth_with_password(
        &self,
        identity: &str,
        password: &str,
    ) -> Result<AuthSession, StoreError> {
        let mut inner = self.lock();
        let user = inner
            .collections
            .get("users")
            .and_then(|users| {
                users.iter().find(|u| {
                    let identity_matches = u.get("email").and_then(Value::as_str)
                        == Some(identity)
                        || u.get("username").and_then(Value::as_str) == Some(identity);
                    identity_matches
                        && u.get("password").and_then(Value::as_str) == Some(password)
                })
            })
            .cloned()
            .ok_or(StoreError::AuthRejected)?;

        let user_id = record_id(&user).unwrap_or_default().to_string();
        let token = Uuid::new_v4().simple().to_string();
        inner.sessions.insert(token.clone(), user_id);

        Ok(AuthSession {
            token,
            user: decode(user)?,
        })
    }

    async fn auth_refresh(&self) -> Result<AuthSession, StoreError> {
        let token = self.token.as_deref().ok_or(StoreError::AuthRejected)?;

        let inner = self.lock();
        let user_id = inner.sessions.get(token).ok_or(StoreError::AuthRejected)?;
        let user = inner
            .collections
            .get("users")
            .and_then(|users| users.iter().find(|u| record_id(u) == Some(user_id)))
            .cloned()
            .ok_or(StoreError::AuthRejected)?;

        Ok(AuthSession {
            token: token.to_string(),
            user: decode(user)?,
        })
    }

    fn with_token(&self, token: &str) -> Arc<dyn RecordStore> {
        Arc::new(Self {
            inner: self.inner.clone(),
            token: Some(token.to_string()),
        })
    }
}
