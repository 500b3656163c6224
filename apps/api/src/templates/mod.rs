//! Template orchestration: default-template resolution and the picker
//! listing. Template version chains themselves are managed by `versioning`.

use serde_json::{json, Value};
use tracing::info;

use crate::errors::AppError;
use crate::models::template::Template;
use crate::store::{decode, filter, ListOptions, RecordStore};
use crate::versioning::{self, TEMPLATE_CHAIN};

pub mod handlers;

/// Markup seeded into a user's first template.
pub const PLACEHOLDER_MARKUP: &str = "<div>{{content}}</div>";

const DEFAULT_TEMPLATE_NAME: &str = "Default Template";

/// Resolves the owner's default template, creating one on first use.
///
/// The default is the first published template the user owns. If none
/// exists the chain is seeded whole: template row, version 1 with the
/// placeholder markup, pointer. A failure between those writes leaves a
/// template without a pointer and is surfaced as partial completion.
pub async fn default_for_owner(
    store: &dyn RecordStore,
    owner_id: &str,
) -> Result<Template, AppError> {
    let default_filter = filter::all(&[
        filter::eq_bool("published", true),
        filter::eq("user_id", owner_id),
    ]);
    match store.get_first_list_item("templates", &default_filter).await {
        Ok(record) => return Ok(decode(record)?),
        Err(err) if !err.is_not_found() => return Err(err.into()),
        // No default yet: fall through and seed one.
        Err(_) => {}
    }

    let template: Template = decode(
        store
            .create(
                "templates",
                json!({
                    "name": DEFAULT_TEMPLATE_NAME,
                    "published": true,
                    "shared": false,
                    "user_id": owner_id,
                    "current_version_id": null,
                }),
            )
            .await?,
    )?;

    let version = versioning::start(
        store,
        &TEMPLATE_CHAIN,
        &template.id,
        json!({ "markup": PLACEHOLDER_MARKUP }),
    )
    .await
    .map_err(|err| seed_incomplete(&template.id, err))?;
    let version_id = version
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let template: Template = decode(
        store
            .update(
                "templates",
                &template.id,
                json!({ "current_version_id": version_id }),
            )
            .await
            .map_err(|err| seed_incomplete(&template.id, err.into()))?,
    )?;

    info!("Seeded default template {} for user {owner_id}", template.id);
    Ok(template)
}

fn seed_incomplete(template_id: &str, err: AppError) -> AppError {
    AppError::Incomplete(format!(
        "template {template_id} was created but its first version was not wired up: {err}"
    ))
}

/// Templates visible in the picker: published or shared, first page of 50.
pub async fn list_visible(store: &dyn RecordStore) -> Result<Vec<Template>, AppError> {
    let visible = filter::any(&[
        filter::eq_bool("published", true),
        filter::eq_bool("shared", true),
    ]);
    let items = store
        .get_list(
            "templates",
            1,
            50,
            ListOptions {
                filter: Some(visible),
                sort: None,
            },
        )
        .await?;

    items
        .into_iter()
        .map(|record| Ok(decode(record)?))
        .collect()
}
