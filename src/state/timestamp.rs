//! Wall-clock timestamps expressed in the competition's reference timezone.
//!
//! Problem windows and scheduled deliveries are stored without an offset: the
//! whole process agrees on a single fixed offset (see [`crate::config::AppConfig`])
//! and every comparison happens on local wall-clock values.

use time::{
    Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

use super::ContestError;

/// Canonical storage format, also the primary input format.
const DATE_TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[month]-[day]-[year] [hour]:[minute]:[second]");
const DATE_TIME_SHORT_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[month]-[day]-[year] [hour]:[minute]");
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[month]-[day]-[year]");
const DISPLAY_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[month]/[day]/[year], [hour]:[minute]");
const DISPLAY_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[month]/[day]/[year]");

/// Parse a user or document supplied timestamp.
///
/// Accepts `MM-DD-YYYY HH:MM:SS`, `MM-DD-YYYY HH:MM`, `MM-DD-YYYY` (midnight)
/// and RFC 3339 (converted into the reference `offset`, fractional seconds
/// dropped).
pub fn parse_timestamp(input: &str, offset: UtcOffset) -> Result<PrimitiveDateTime, ContestError> {
    let input = input.trim();

    if let Ok(value) = PrimitiveDateTime::parse(input, DATE_TIME_FORMAT) {
        return Ok(value);
    }
    if let Ok(value) = PrimitiveDateTime::parse(input, DATE_TIME_SHORT_FORMAT) {
        return Ok(value);
    }
    if let Ok(date) = Date::parse(input, DATE_FORMAT) {
        return Ok(PrimitiveDateTime::new(date, Time::MIDNIGHT));
    }
    if let Ok(value) = OffsetDateTime::parse(input, &Rfc3339) {
        // Stored timestamps carry whole seconds only.
        let local = value
            .to_offset(offset)
            .replace_nanosecond(0)
            .map_err(|err| ContestError::InvalidFormat(err.to_string()))?;
        return Ok(PrimitiveDateTime::new(local.date(), local.time()));
    }

    Err(ContestError::InvalidFormat(format!(
        "Invalid time `{input}`. Use the format \"MM-DD-YYYY HH:MM:SS\"."
    )))
}

/// Render a timestamp in the canonical storage format.
pub fn format_timestamp(value: PrimitiveDateTime) -> String {
    value
        .format(DATE_TIME_FORMAT)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Render a timestamp for announcements (`MM/DD/YYYY, HH:MM`).
pub fn display_timestamp(value: PrimitiveDateTime) -> String {
    value
        .format(DISPLAY_FORMAT)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Render only the date part (`MM/DD/YYYY`).
pub fn display_date(value: PrimitiveDateTime) -> String {
    value
        .format(DISPLAY_DATE_FORMAT)
        .unwrap_or_else(|_| "invalid-date".into())
}

#[cfg(test)]
mod tests {
    use time::macros::{datetime, offset};

    use super::*;

    #[test]
    fn parses_all_supported_layouts() {
        let utc = offset!(UTC);
        assert_eq!(
            parse_timestamp("03-14-2025 09:26:53", utc).unwrap(),
            datetime!(2025-03-14 09:26:53)
        );
        assert_eq!(
            parse_timestamp("03-14-2025 09:26", utc).unwrap(),
            datetime!(2025-03-14 09:26)
        );
        assert_eq!(
            parse_timestamp("03-14-2025", utc).unwrap(),
            datetime!(2025-03-14 00:00)
        );
    }

    #[test]
    fn rfc3339_is_shifted_into_reference_offset() {
        let parsed = parse_timestamp("2025-03-14T12:00:00Z", offset!(-5)).unwrap();
        assert_eq!(parsed, datetime!(2025-03-14 07:00));
    }

    #[test]
    fn rfc3339_fractional_seconds_are_truncated() {
        let parsed = parse_timestamp("2025-03-14T12:00:00.750Z", offset!(UTC)).unwrap();
        assert_eq!(parsed, datetime!(2025-03-14 12:00:00));
        assert_eq!(parse_timestamp(&format_timestamp(parsed), offset!(UTC)).unwrap(), parsed);
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_timestamp("tomorrow-ish", offset!(UTC)).unwrap_err();
        assert!(matches!(err, ContestError::InvalidFormat(_)));
    }

    #[test]
    fn canonical_format_round_trips() {
        let value = datetime!(2024-12-01 23:05:09);
        let text = format_timestamp(value);
        assert_eq!(text, "12-01-2024 23:05:09");
        assert_eq!(parse_timestamp(&text, offset!(UTC)).unwrap(), value);
        assert_eq!(display_timestamp(value), "12/01/2024, 23:05");
        assert_eq!(display_date(value), "12/01/2024");
    }
}
