use axum::{
    extract::Path,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::resume::{Resume, ResumeVersion};
use crate::resumes::{
    self, DuplicateResume, NewResume, ResumeEdit, ResumeEditData,
};

#[derive(Deserialize)]
pub struct CreateResumeRequest {
    pub name: String,
    /// Raw editor output; parsed leniently (invalid JSON becomes `{}`).
    pub content: Option<String>,
    pub template_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SaveResumeRequest {
    pub name: Option<String>,
    pub content: Option<String>,
    pub markup: Option<String>,
    pub expected_current_version_id: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct DuplicateResumeRequest {
    pub name: Option<String>,
    pub content: Option<String>,
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(user: CurrentUser) -> Result<Json<Vec<Resume>>, AppError> {
    let items = resumes::list_resumes(user.store.as_ref(), &user.user.id).await?;
    Ok(Json(items))
}

/// POST /api/v1/resumes
pub async fn handle_create_resume(
    user: CurrentUser,
    Json(req): Json<CreateResumeRequest>,
) -> Result<(StatusCode, Json<Resume>), AppError> {
    let content = match req.content.as_deref() {
        Some(raw) => resumes::parse_content(raw),
        None => json!({}),
    };

    let resume = resumes::create_resume(
        user.store.as_ref(),
        NewResume {
            owner_id: user.user.id,
            name: req.name,
            content,
            template_id: req.template_id,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(resume)))
}

/// GET /api/v1/resumes/:id
/// The editor's triple: name, content snapshot, template markup.
pub async fn handle_get_resume(
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ResumeEditData>, AppError> {
    let data = resumes::fetch_for_edit(user.store.as_ref(), &id).await?;
    Ok(Json(data))
}

/// PUT /api/v1/resumes/:id
pub async fn handle_save_resume(
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<SaveResumeRequest>,
) -> Result<Json<ResumeVersion>, AppError> {
    let version = resumes::save_edit(
        user.store.as_ref(),
        &id,
        ResumeEdit {
            name: req.name,
            content: req.content.as_deref().map(resumes::parse_content),
            markup: req.markup,
            expected_current_version_id: req.expected_current_version_id,
        },
    )
    .await?;
    Ok(Json(version))
}

/// POST /api/v1/resumes/:id/duplicate
pub async fn handle_duplicate_resume(
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<DuplicateResumeRequest>,
) -> Result<(StatusCode, Json<Resume>), AppError> {
    let copy = resumes::duplicate_resume(
        user.store.as_ref(),
        &id,
        DuplicateResume {
            owner_id: user.user.id,
            name: req.name,
            content: req.content.as_deref().map(resumes::parse_content),
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete_resume(
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    resumes::delete_resume(user.store.as_ref(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/resumes/:id/versions
pub async fn handle_resume_history(
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<ResumeVersion>>, AppError> {
    let history = resumes::version_history(user.store.as_ref(), &id).await?;
    Ok(Json(history))
}
