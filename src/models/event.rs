use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

use crate::utils::error::AppError;

pub type EventId = i64;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
}

/// Event projected together with the usernames enrolled in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct EventSummary {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub participants: Vec<String>,
}

impl EventSummary {
    pub fn new(event: Event, participants: Vec<String>) -> Self {
        Self {
            id: event.id,
            title: event.title,
            description: event.description,
            date: event.date,
            participants,
        }
    }
}

/// Validated input for a new event row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "deserialize_event_date")]
    pub date: DateTime<Utc>,
}

impl CreateEventRequest {
    /// Checks the required-field contract. Title and description are trimmed.
    pub fn validate(self) -> Result<NewEvent, AppError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AppError::ValidationError("title is required".to_string()));
        }

        let description = self.description.trim();
        if description.is_empty() {
            return Err(AppError::ValidationError(
                "description is required".to_string(),
            ));
        }

        Ok(NewEvent {
            title: title.to_string(),
            description: description.to_string(),
            date: self.date,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCreated {
    pub message: String,
    pub event_id: EventId,
}

/// Accepts an RFC 3339 timestamp, a naive timestamp (read as UTC) or a bare
/// calendar date (midnight UTC).
pub fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn deserialize_event_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_event_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid event date '{}'", raw)))
}
