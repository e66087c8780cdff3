//! Task record types shared by the codec, the store, and the gateway.

use serde::{Deserialize, Deserializer, Serialize};

/// One scheduled activity within a day's plan.
///
/// Values of this type live for one request/response cycle plus the
/// broadcast fan-out; the durable state is the task file, never an
/// in-memory list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Wall-clock start time, zero-padded 24-hour `HH:MM`.
    pub time: String,

    /// Free-text label. Non-empty and never contains a line terminator.
    pub name: String,

    /// Optional duration such as `30min` or `1.5hr`.
    ///
    /// The web client sends an empty string for an unset duration, so
    /// deserialization maps `""` to `None`.
    #[serde(default, deserialize_with = "empty_as_none")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    /// Completion flag.
    #[serde(default)]
    pub done: bool,

    /// Display-only marker for the currently active task.
    ///
    /// Transient: sent over the JSON API but never persisted; decode
    /// always yields `false`.
    #[serde(default)]
    pub current: bool,
}

/// Deserializes an optional string, treating the empty string as absent.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
