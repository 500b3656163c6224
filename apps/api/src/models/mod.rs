pub mod resume;
pub mod template;
pub mod user;

use serde::{Deserialize, Deserializer};

/// The record service encodes an unset relation as either `null` or an empty
/// string depending on the write path. Canonicalize both to `None`.
pub(crate) fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
