//! Shared utility functions used across multiple modules.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Mint a fresh entity id (UUID v7, time-sortable).
pub fn new_entity_id() -> String {
    Uuid::now_v7().to_string()
}

/// Mint a device identifier of the form `device_<random>`.
pub fn new_device_id() -> String {
    format!("device_{}", Uuid::new_v4().simple())
}

/// Current UTC time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
