use serde::{Deserialize, Serialize};

/// A user record as issued by the record service's auth endpoints.
/// The service owns registration and password storage; this is only the
/// identity the core stamps onto new versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub verified: bool,
}
