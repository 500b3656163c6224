use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::empty_as_none;

/// A resume document. `content` is an opaque structured document; the only
/// field the core interprets is the version pointer.
///
/// Wire names (`user_id`, `created`) are the record service's; the canonical
/// internal names map to them here and nowhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resume {
    pub id: String,
    #[serde(rename = "user_id")]
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub current_version_id: Option<String>,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
}

/// One immutable snapshot in a resume's version chain. Never updated or
/// deleted after creation; the parent's pointer is the only thing that moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeVersion {
    pub id: String,
    pub resume_id: String,
    pub version: i64,
    #[serde(default)]
    pub content: Value,
    /// Binds this snapshot to the exact template markup used to render it.
    pub template_version_id: String,
    #[serde(rename = "user_id")]
    pub owner_id: String,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
}
