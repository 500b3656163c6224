pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::auth::handlers as auth_handlers;
use crate::resumes::handlers as resume_handlers;
use crate::state::AppState;
use crate::templates::handlers as template_handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session API
        .route("/api/v1/auth/register", post(auth_handlers::handle_register))
        .route("/api/v1/auth/login", post(auth_handlers::handle_login))
        .route("/api/v1/auth/logout", post(auth_handlers::handle_logout))
        .route("/api/v1/auth/session", get(auth_handlers::handle_session))
        // Template API
        .route(
            "/api/v1/templates",
            get(template_handlers::handle_list_templates),
        )
        // Resume API
        .route(
            "/api/v1/resumes",
            get(resume_handlers::handle_list_resumes)
                .post(resume_handlers::handle_create_resume),
        )
        .route(
            "/api/v1/resumes/:id",
            get(resume_handlers::handle_get_resume)
                .put(resume_handlers::handle_save_resume)
                .delete(resume_handlers::handle_delete_resume),
        )
        .route(
            "/api/v1/resumes/:id/duplicate",
            post(resume_handlers::handle_duplicate_resume),
        )
        .route(
            "/api/v1/resumes/:id/versions",
            get(resume_handlers::handle_resume_history),
        )
        .with_state(state)
}
