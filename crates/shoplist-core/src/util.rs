//! Helpers shared by the models, config and sync layers.

/// Trimmed text, or `None` when it is missing or blank.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Milliseconds since the Unix epoch, the unit of `last_sync_at`.
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
