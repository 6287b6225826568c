use serde::{Deserialize, Deserializer, de::Error};
use std::time::Duration;

/// Deserializes a human readable duration such as `500ms` or `47s`.
pub(crate) fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(D::Error::custom)
}
