//! Session glue over the record service's auth endpoints.
//!
//! The core never constructs or validates tokens itself: a request's token
//! (HttpOnly session cookie, or a Bearer header for API clients) is handed
//! back to the store for refresh, and the resulting identity stamps new
//! versions. No token, or a token the store rejects, means the operation is
//! unauthenticated and rejected.

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::header, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;

use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;
use crate::store::RecordStore;

pub mod handlers;

/// Name of the HttpOnly cookie carrying the session token.
pub const SESSION_COOKIE: &str = "folio_auth";

/// The authenticated caller, plus a store handle carrying their token.
/// Handlers that require identity extract this; everything else is public.
pub struct CurrentUser {
    pub user: User,
    pub token: String,
    pub store: Arc<dyn RecordStore>,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts).ok_or(AppError::Unauthorized)?;
        let store = state.store.with_token(&token);
        let session = store.auth_refresh().await?;

        Ok(CurrentUser {
            user: session.user,
            token: session.token,
            store,
        })
    }
}

/// A Bearer header wins over the session cookie.
fn token_from_parts(parts: &Parts) -> Option<String> {
    if let Some(header) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        if let Some(token) = header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    CookieJar::from_headers(&parts.headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts_with_header(name: &str, value: &str) -> Parts {
        Request::builder()
            .header(name, value)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn test_bearer_header_is_used() {
        let parts = parts_with_header("authorization", "Bearer tok-1");
        assert_eq!(token_from_parts(&parts), Some("tok-1".to_string()));
    }

    #[test]
    fn test_session_cookie_is_used() {
        let parts = parts_with_header("cookie", "folio_auth=tok-2");
        assert_eq!(token_from_parts(&parts), Some("tok-2".to_string()));
    }

    #[test]
    fn test_bearer_wins_over_cookie() {
        let parts = Request::builder()
            .header("authorization", "Bearer tok-1")
            .header("cookie", "folio_auth=tok-2")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        assert_eq!(token_from_parts(&parts), Some("tok-1".to_string()));
    }

    #[test]
    fn test_no_credentials_yields_none() {
        let parts = Request::builder().body(()).unwrap().into_parts().0;
        assert_eq!(token_from_parts(&parts), None);
    }
}
