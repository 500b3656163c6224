use axum::Json;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::template::Template;

/// GET /api/v1/templates
/// Published and shared templates for the template picker.
pub async fn handle_list_templates(
    user: CurrentUser,
) -> Result<Json<Vec<Template>>, AppError> {
    let templates = super::list_visible(user.store.as_ref()).await?;
    Ok(Json(templates))
}
