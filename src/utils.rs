/// Utility functions for formatting timestamps and raw chunks
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Local UTC offset, falling back to UTC when it cannot be determined
///
/// The offset lookup fails on some platforms once several threads are
/// running, which is normal under the tokio runtime.
fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// Current time in the local offset
pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(local_offset())
}

/// Format a timestamp for display
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format.
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(&format).unwrap_or_else(|_| dt.to_string())
}

/// Format a wall-clock time as HH:MM:SS
pub fn format_clock_time(dt: &OffsetDateTime) -> String {
    let format = format_description!("[hour]:[minute]:[second]");
    dt.format(&format).unwrap_or_else(|_| dt.to_string())
}

/// Render Unix epoch seconds as a local date-time string
///
/// Returns None for timestamps outside the representable range.
pub fn format_epoch_local(seconds: i64) -> Option<String> {
    let dt = OffsetDateTime::from_unix_timestamp(seconds).ok()?;
    Some(format_datetime(&dt.to_offset(local_offset())))
}

/// Make control characters in a raw chunk visible for logging
pub fn escape_chunk(chunk: &str) -> String {
    chunk.replace('\n', "\\n").replace('\r', "\\r")
}

/// Map raw transport bytes to text one-to-one
///
/// The protocol is ASCII; mapping each byte to the char with the same code
/// point keeps multi-byte garbage from corrupting neighbouring packets even
/// when a chunk boundary splits it.
pub fn bytes_to_chunk(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
