use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::error::{ReplayError, Result};

/// Parses an ISO-8601 instant. RFC 3339 offsets are normalised to UTC and
/// offset-less values are read as UTC.
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(naive.and_utc());
        }
    }

    Err(ReplayError::Parse(format!(
        "expected an ISO-8601 timestamp, got {input:?}"
    )))
}

/// RFC 3339 UTC with a `Z` suffix and microsecond digits, widened to
/// nanoseconds only when the instant carries them.
pub fn format_instant(ts: DateTime<Utc>) -> String {
    let precision = if ts.timestamp_subsec_nanos() % 1_000 == 0 {
        SecondsFormat::Micros
    } else {
        SecondsFormat::Nanos
    };
    ts.to_rfc3339_opts(precision, true)
}

/// Moves `original` so that its offset from `reference` is kept relative to
/// `anchor`. Returns `None` when the result falls outside chrono's range.
pub fn shift(
    original: DateTime<Utc>,
    anchor: DateTime<Utc>,
    reference: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let offset = original.signed_duration_since(reference);
    anchor.checked_add_signed(offset)
}

/// Accepts an ISO-8601 instant, `now`, or a humantime duration meaning that
/// long ago (`5m`, `2h 30m`).
pub fn parse_time_or_relative(input: &str) -> Result<DateTime<Utc>> {
    if input.eq_ignore_ascii_case("now") {
        return Ok(Utc::now());
    }

    if let Ok(ts) = parse_instant(input) {
        return Ok(ts);
    }

    if let Ok(duration) = humantime::parse_duration(input) {
        return Ok(Utc::now()
            - chrono::Duration::from_std(duration).map_err(|e| {
                ReplayError::Parse(format!("failed to parse duration to chrono: {e}"))
            })?);
    }

    Err(ReplayError::Parse(format!(
        "expected ISO-8601 time, `now`, or duration, got {input}"
    )))
}
