use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::config::BucketWidth;

/// Naive date-time layouts accepted after RFC 3339 fails.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Date-only layouts, anchored to midnight UTC.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m-%d-%Y", "%Y/%m/%d", "%b %d, %Y", "%B %d, %Y"];

/// Parse a timestamp from the layouts the upstream APIs emit.
///
/// Accepts RFC 3339 (`2024-01-05T10:00:00.000Z`), naive date-times (assumed
/// UTC), and date-only strings (anchored at midnight UTC). Surrounding
/// whitespace is ignored. Returns `None` when nothing matches.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    parse_date(value).map(start_of_day)
}

/// Parse a date-only string (`YYYY-MM-DD`, `MM-DD-YYYY`, `YYYY/MM/DD`, `Oct 15, 2024`).
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Midnight UTC at the start of `date`.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Last representable instant of `date` in UTC (inclusive day end).
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(last))
}

/// Truncate a timestamp to the first day of its calendar bucket.
pub fn bucket_start(ts: DateTime<Utc>, width: BucketWidth) -> NaiveDate {
    let date = ts.date_naive();
    match width {
        BucketWidth::Day => date,
        BucketWidth::Month => date.with_day(1).unwrap_or(date),
    }
}

/// Format a bucket start the way the dashboards label it (`2024-01-05` / `2024-01`).
pub fn format_bucket(start: NaiveDate, width: BucketWidth) -> String {
    match width {
        BucketWidth::Day => start.format("%Y-%m-%d").to_string(),
        BucketWidth::Month => start.format("%Y-%m").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_timestamp_layouts() {
        assert_eq!(
            parse_timestamp("2024-01-05T10:30:00.000Z"),
            Utc.with_ymd_and_hms(2024, 1, 5, 10, 30, 0).single()
        );
        assert_eq!(
            parse_timestamp("2024-01-05T10:30:00+02:00"),
            Utc.with_ymd_and_hms(2024, 1, 5, 8, 30, 0).single()
        );
        assert_eq!(
            parse_timestamp("2024-01-05 10:30:00"),
            Utc.with_ymd_and_hms(2024, 1, 5, 10, 30, 0).single()
        );
        assert_eq!(
            parse_timestamp(" 2024-01-05 "),
            Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).single()
        );
        assert_eq!(
            parse_timestamp("01-05-2024"),
            Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).single()
        );
        assert_eq!(
            parse_timestamp("Oct 15, 2024"),
            Utc.with_ymd_and_hms(2024, 10, 15, 0, 0, 0).single()
        );
    }

    #[test]
    fn rejects_unparseable_timestamps() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("not-a-date"), None);
        assert_eq!(parse_timestamp("2024-13-01"), None);
        assert_eq!(parse_timestamp("2024-02-30"), None);
    }

    #[test]
    fn buckets_truncate_to_day_or_month() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 20, 17, 45, 0).unwrap();
        assert_eq!(
            bucket_start(ts, BucketWidth::Day),
            NaiveDate::from_ymd_opt(2024, 1, 20).unwrap()
        );
        assert_eq!(
            bucket_start(ts, BucketWidth::Month),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert_eq!(
            format_bucket(bucket_start(ts, BucketWidth::Month), BucketWidth::Month),
            "2024-01"
        );
    }

    #[test]
    fn day_bounds_cover_the_whole_day() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(start_of_day(date).hour(), 0);
        let end = end_of_day(date);
        assert_eq!(end.date_naive(), date);
        assert_eq!((end.hour(), end.minute(), end.second()), (23, 59, 59));
    }
}
