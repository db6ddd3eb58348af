use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// An event record as the events API serves it.
///
/// `is_recurring_instance` and `original_id` are set when the server has
/// expanded a recurring template into per-day instances for a filtered
/// listing; edits and deletes on such an instance must go through the
/// override endpoint for its date, never the template record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "wire_datetime")]
    pub start: NaiveDateTime,
    #[serde(with = "wire_datetime")]
    pub end: NaiveDateTime,
    #[serde(default)]
    pub recurrence: Option<String>,
    #[serde(default)]
    pub is_recurring_instance: bool,
    #[serde(default)]
    pub original_id: Option<String>,
}

impl Event {
    pub fn start_date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// True when saving or deleting this record must target the override
    /// endpoint for its date instead of the template event.
    pub fn is_override_target(&self) -> bool {
        self.is_recurring_instance && self.original_id.is_some()
    }
}

/// The API speaks `datetime-local` strings. Fields created through a form
/// come without seconds (`2024-03-01T10:00`) while server-expanded
/// instances carry full ISO timestamps, so deserialization accepts both.
pub mod wire_datetime {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    const WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
    const READ_FORMATS: [&str; 3] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(WRITE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        READ_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(&raw, format).ok())
            .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {}", raw)))
    }
}
