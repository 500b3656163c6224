//! HTTP client for the record service's REST surface.
//!
//! One request per trait call, no automatic retry: a transient fault is
//! surfaced to the caller as a backing-store failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AuthSession, ListOptions, RecordStore, StoreError};

/// The collection whose records can authenticate.
const AUTH_COLLECTION: &str = "users";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ListPage {
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Record store handle backed by the service's REST API.
///
/// Cheap to clone; `with_token` derives an authenticated handle without
/// touching this one.
#[derive(Clone)]
pub struct HttpRecordStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRecordStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/api/collections/{collection}/records", self.base_url)
    }

    fn record_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{id}", self.collection_url(collection))
    }

    fn auth_url(&self, action: &str) -> String {
        format!(
            "{}/api/collections/{AUTH_COLLECTION}/{action}",
            self.base_url
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(header::AUTHORIZATION, token),
            None => request,
        }
    }
}

/// Maps a response to a decoded body, a `NotFound`, or an API failure.
async fn read_json<T: DeserializeOwned>(
    collection: &str,
    target: &str,
    response: Response,
) -> Result<T, StoreError> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound {
            collection: collection.to_string(),
            target: target.to_string(),
        });
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        return Err(StoreError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.json().await?)
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn create(&self, collection: &str, fields: Value) -> Result<Value, StoreError> {
        let response = self
            .authorize(self.client.post(self.collection_url(collection)))
            .json(&fields)
            .send()
            .await?;
        read_json(collection, "new record", response).await
    }

    async fn get_one(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        let response = self
            .authorize(self.client.get(self.record_url(collection, id)))
            .send()
            .await?;
        read_json(collection, id, response).await
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
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                target: filter.to_string(),
            })
    }

    async fn get_list(
        &self,
        collection: &str,
        page: u32,
        per_page: u32,
        options: ListOptions,
    ) -> Result<Vec<Value>, StoreError> {
        let mut query = vec![
            ("page", page.to_string()),
            ("perPage", per_page.to_string()),
        ];
        if let Some(filter) = options.filter {
            query.push(("filter", filter));
        }
        if let Some(sort) = options.sort {
            query.push(("sort", sort));
        }

        let response = self
            .authorize(self.client.get(self.collection_url(collection)))
            .query(&query)
            .send()
            .await?;
        let page: ListPage = read_json(collection, "list", response).await?;
        Ok(page.items)
    }

    async fn update(&self, collection: &str, id: &str, fields: Value)
        -> Result<Value, StoreError> {
        let response = self
            .authorize(self.client.patch(self.record_url(collection, id)))
            .json(&fields)
            .send()
            .await?;
        read_json(collection, id, response).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let response = self
            .authorize(self.client.delete(self.record_url(collection, id)))
            .send()
            .await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                target: id.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    async fn auth_with_password(
        &self,
        identity: &str,
        password: &str,
    ) -> Result<AuthSession, StoreError> {
        let response = self
            .client
            .post(self.auth_url("auth-with-password"))
            .json(&json!({ "identity": identity, "password": password }))
            .send()
            .await?;
        let status = response.status();

        if matches!(status.as_u16(), 400 | 401 | 403) {
            return Err(StoreError::AuthRejected);
        }
        read_json(AUTH_COLLECTION, identity, response).await
    }

    async fn auth_refresh(&self) -> Result<AuthSession, StoreError> {
        if self.token.is_none() {
            return Err(StoreError::AuthRejected);
        }

        let response = self
            .authorize(self.client.post(self.auth_url("auth-refresh")))
            .send()
            .await?;
        let status = response.status();

        if matches!(status.as_u16(), 400 | 401 | 403 | 404) {
            return Err(StoreError::AuthRejected);
        }
        read_json(AUTH_COLLECTION, "session", response).await
    }

    fn with_token(&self, token: &str) -> Arc<dyn RecordStore> {
        Arc::new(Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let store = HttpRecordStore::new("http://localhost:8090/");
        assert_eq!(
            store.collection_url("resumes"),
            "http://localhost:8090/api/collections/resumes/records"
        );
    }

    #[test]
    fn test_record_url_includes_id() {
        let store = HttpRecordStore::new("http://localhost:8090");
        assert_eq!(
            store.record_url("templates", "t1"),
            "http://localhost:8090/api/collections/templates/records/t1"
        );
    }

    #[test]
    fn test_auth_url_targets_users_collection() {
        let store = HttpRecordStore::new("http://localhost:8090");
        assert_eq!(
            store.auth_url("auth-refresh"),
            "http://localhost:8090/api/collections/users/auth-refresh"
        );
    }
}
