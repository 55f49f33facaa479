use chrono::{Duration, Local, NaiveDateTime};

/// Wire and storage format for every timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Days between an action and the follow-up it schedules.
pub const FOLLOWUP_INTERVAL_DAYS: i64 = 7;

/// Current local time in [`TIMESTAMP_FORMAT`].
pub fn now_local_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).ok()
}

/// Re-render a parseable timestamp in [`TIMESTAMP_FORMAT`], zero-padded.
///
/// Example: "2024-1-5 9:0:0" → "2024-01-05 09:00:00"
pub fn canonical_timestamp(value: &str) -> Option<String> {
    parse_timestamp(value).map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

/// Follow-up deadline for an action recorded at `timestamp`.
///
/// Example: "2024-01-01 09:30:00" → "2024-01-08 09:30:00"
pub fn followup_after(timestamp: &str) -> Option<String> {
    parse_timestamp(timestamp)?
        .checked_add_signed(Duration::days(FOLLOWUP_INTERVAL_DAYS))
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

/// True for plain SQL identifiers: ASCII letter or underscore, then letters,
/// digits or underscores.
///
/// Example: "next_followup_datetime" → true, "leads; DROP" → false
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
