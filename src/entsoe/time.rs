use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Map an ISO 8601 resolution tag to its step duration.
///
/// The mapping is total: unrecognized tags fall back to 15 minutes, which is
/// the dominant market time unit in the feed.
pub fn resolution_step(tag: &str) -> Duration {
    match tag {
        "PT60M" | "P1H" => Duration::hours(1),
        "PT30M" => Duration::minutes(30),
        "PT1M" => Duration::minutes(1),
        _ => Duration::minutes(15),
    }
}

/// Compute the absolute timestamp of a point from its period start, the
/// period resolution tag and the point's 1-based position.
///
/// Positions of 0 or below yield timestamps before the interval start; the
/// feed never produces them, but they must not panic.
pub fn point_timestamp(start: DateTime<Utc>, resolution: &str, position: i64) -> DateTime<Utc> {
    start + resolution_step(resolution) * (position as i32 - 1)
}

/// Parse a period interval start in the feed's `YYYY-MM-DDTHH:MMZ` format.
///
/// The format is strict; anything else is a schema error handled by the
/// caller (skip the period).
pub fn parse_interval_start(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Format an instant in the API's compact period format (`YYYYMMDDHHMM`).
pub fn compact_period(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%d%H%M").to_string()
}

/// UTC midnight of a calendar date.
pub fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is always valid"))
}

/// Whether a UTC instant falls on the given civil date in the given zone.
pub fn falls_on_local_date(ts: DateTime<Utc>, tz: Tz, date: NaiveDate) -> bool {
    ts.with_timezone(&tz).date_naive() == date
}

/// Convert a local wall-clock hour on a civil date to the UTC instant it
/// starts at.
///
/// Ambiguous hours (clocks falling back) resolve to the earliest instant;
/// nonexistent hours (clocks springing forward) shift forward one hour.
pub fn local_hour_to_utc(date: NaiveDate, hour: u32, tz: Tz) -> Option<DateTime<Utc>> {
    use chrono::offset::LocalResult::*;

    let naive = date.and_hms_opt(hour, 0, 0)?;
    match tz.from_local_datetime(&naive) {
        Single(dt) | Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
        None => match tz.from_local_datetime(&(naive + Duration::hours(1))) {
            Single(dt) | Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
            None => Option::None,
        },
    }
}

/// UTC instant of local midnight on a civil date, earliest instant on DST
/// ambiguity.
pub fn local_midnight_utc(date: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    local_hour_to_utc(date, 0, tz)
}
