use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{CurrentUser, SESSION_COOKIE};
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub identity: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(true)
        .build()
}

/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), AppError> {
    let session = state
        .store
        .auth_with_password(&req.identity, &req.password)
        .await?;

    let jar = jar.add(session_cookie(session.token.clone()));
    Ok((
        jar,
        Json(SessionResponse {
            token: session.token,
            user: session.user,
        }),
    ))
}

/// POST /api/v1/auth/register
/// Creates the user record in the store, then authenticates as them.
pub async fn handle_register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<SessionResponse>), AppError> {
    if req.password != req.password_confirm {
        return Err(AppError::Validation("passwords do not match".to_string()));
    }

    state
        .store
        .create(
            "users",
            json!({
                "username": req.username,
                "email": req.email,
                "email_visibility": true,
                "password": req.password,
                "password_confirm": req.password_confirm,
                "name": req.email,
            }),
        )
        .await?;

    let session = state
        .store
        .auth_with_password(&req.email, &req.password)
        .await?;

    let jar = jar.add(session_cookie(session.token.clone()));
    Ok((
        StatusCode::CREATED,
        jar,
        Json(SessionResponse {
            token: session.token,
            user: session.user,
        }),
    ))
}

/// POST /api/v1/auth/logout
pub async fn handle_logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    let removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    (jar.remove(removal), StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/session
/// Refreshes the caller's token against the store and returns the identity.
pub async fn handle_session(user: CurrentUser) -> Json<SessionResponse> {
    Json(SessionResponse {
        token: user.token,
        user: user.user,
    })
}
