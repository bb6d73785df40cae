//! Published-date decomposition.
//!
//! Splits an ISO-ish date string into a `(year, month, day)` triple for
//! the filterable metadata fields. Parsing failure is not an error: the
//! triple silently degrades to `(None, None, None)` so an article with a
//! malformed or missing date is still ingested, just without date fields.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

/// Decompose a date string into `(year, month, day)`.
///
/// A trailing literal `Z` is normalized to an explicit `+00:00` offset
/// before parsing. Accepts RFC3339 date-times, naive date-times
/// (`2023-06-15T00:00:00`), and bare dates (`2023-06-15`). Any input
/// that matches none of these yields `(None, None, None)`.
pub fn decompose_date(raw: &str) -> (Option<i32>, Option<u32>, Option<u32>) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return (None, None, None);
    }

    let normalized = if let Some(stripped) = trimmed.strip_suffix('Z') {
        format!("{}+00:00", stripped)
    } else {
        trimmed.to_string()
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return (Some(dt.year()), Some(dt.month()), Some(dt.day()));
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S") {
        return (Some(dt.year()), Some(dt.month()), Some(dt.day()));
    }

    if let Ok(d) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        return (Some(d.year()), Some(d.month()), Some(d.day()));
    }

    (None, None, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_z_matches_explicit_offset() {
        let with_z = decompose_date("2023-06-15T00:00:00Z");
        let explicit = decompose_date("2023-06-15T00:00:00+00:00");
        assert_eq!(with_z, explicit);
        assert_eq!(with_z, (Some(2023), Some(6), Some(15)));
    }

    #[test]
    fn bare_date_parses() {
        assert_eq!(decompose_date("2024-01-02"), (Some(2024), Some(1), Some(2)));
    }

    #[test]
    fn naive_datetime_parses() {
        assert_eq!(
            decompose_date("2025-12-31T23:59:59"),
            (Some(2025), Some(12), Some(31))
        );
    }

    #[test]
    fn nonzero_offset_uses_local_calendar_date() {
        // The stored triple reflects the date as written, offset included.
        assert_eq!(
            decompose_date("2023-06-15T23:30:00+05:30"),
            (Some(2023), Some(6), Some(15))
        );
    }

    #[test]
    fn garbage_yields_null_triple() {
        for raw in ["not-a-date", "2023-13-40", "15/06/2023", "June 15, 2023"] {
            assert_eq!(decompose_date(raw), (None, None, None), "input: {}", raw);
        }
    }

    #[test]
    fn empty_and_whitespace_yield_null_triple() {
        assert_eq!(decompose_date(""), (None, None, None));
        assert_eq!(decompose_date("   "), (None, None, None));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(
            decompose_date("  2023-06-15T00:00:00Z\n"),
            (Some(2023), Some(6), Some(15))
        );
    }
}
