/**
 * Routes Module
 * API route handlers
 */

pub mod admin;
pub mod announcements;
pub mod auth;
pub mod health;
pub mod sermons;
pub mod subscribers;
pub mod upload;
pub mod worship;
pub mod youtube;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Error response body: `{error, details?}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            error: error.into(),
            details: Some(details),
        }
    }
}

/// Plain message response (delete confirmations, reactivations)
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Coerce a date-like string into a UTC instant. Accepts RFC3339 timestamps
/// and bare `YYYY-MM-DD` dates (interpreted as UTC midnight).
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

/// Per-field validation failures as a JSON object for the `details` field.
pub fn validation_details(errors: &validator::ValidationErrors) -> serde_json::Value {
    serde_json::to_value(errors).unwrap_or_else(|_| serde_json::json!(errors.to_string()))
}

/// Deserializer for nullable patch fields. Combined with `#[serde(default)]`,
/// a missing key stays `None` (leave the column unchanged) while an explicit
/// JSON `null` becomes `Some(None)` (set the column to NULL).
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
