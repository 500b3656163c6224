use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::empty_as_none;

/// A markup template. `published` marks the owner's default; `shared` exposes
/// it to other users' template pickers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub shared: bool,
    #[serde(rename = "user_id")]
    pub owner_id: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub current_version_id: Option<String>,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
}

/// One immutable snapshot of a template's markup. The markup itself is an
/// opaque string; rendering is a client concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateVersion {
    pub id: String,
    pub template_id: String,
    pub version: i64,
    pub markup: String,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
}
