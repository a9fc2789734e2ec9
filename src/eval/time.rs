//! Time arithmetic shared by `search`, `bucket`/`bin`, `transaction`, and the
//! `eval` function library's date functions.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, Timelike};

use crate::error::Error;

/// A parsed `<N><unit>` duration (`5m`, `-24h`, `2w`), unit in {s,m,h,d,w}.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub amount: i64,
    pub unit: Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
}

impl Unit {
    fn seconds(self) -> i64 {
        match self {
            Unit::Second => 1,
            Unit::Minute => 60,
            Unit::Hour => 3600,
            Unit::Day => 86_400,
            Unit::Week => 604_800,
        }
    }
}

impl Span {
    pub fn to_duration(self) -> Duration {
        Duration::seconds(self.amount * self.unit.seconds())
    }
}

/// Parses `[+-]?<digits><unit>`, e.g. `"5m"`, `"-24h"`, `"+2w"`.
pub fn parse_span(text: &str) -> Result<Span, Error> {
    let text = text.trim();
    let (sign, rest) = match text.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, text.strip_prefix('+').unwrap_or(text)),
    };

    let split_at = rest.find(|c: char| !c.is_ascii_digit());
    let Some(split_at) = split_at else {
        return Err(Error::semantic(format!("span `{text}` is missing a unit")));
    };
    let (digits, unit_str) = rest.split_at(split_at);
    if digits.is_empty() {
        return Err(Error::semantic(format!("span `{text}` is missing a magnitude")));
    }
    let amount: i64 = digits
        .parse()
        .map_err(|_| Error::semantic(format!("invalid span magnitude `{digits}`")))?;

    let unit = match unit_str {
        "s" | "sec" | "secs" | "second" | "seconds" => Unit::Second,
        "m" | "min" | "mins" | "minute" | "minutes" => Unit::Minute,
        "h" | "hr" | "hrs" | "hour" | "hours" => Unit::Hour,
        "d" | "day" | "days" => Unit::Day,
        "w" | "wk" | "wks" | "week" | "weeks" => Unit::Week,
        other => return Err(Error::semantic(format!("unknown time unit `{other}`"))),
    };

    Ok(Span { amount: sign * amount, unit })
}

/// A resolved `latest=` value: a negative relative time is a lower bound
/// ("within the last N units"), while an absolute or positive-relative time
/// is the usual upper bound (§4.5, §9 open question — preserved rather than
/// "corrected" to a single-sided reading).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Lower(NaiveDateTime),
    Upper(NaiveDateTime),
}

/// `earliest=` is always a lower bound.
pub fn resolve_earliest(text: &str, anchor: NaiveDateTime) -> Result<NaiveDateTime, Error> {
    parse_relative_or_absolute(text, anchor)
}

/// `latest=`: a negative relative time (`-5m`) is a lower bound meaning
/// "within the last 5 minutes"; `now`, a positive relative time, or an
/// absolute timestamp is an upper bound.
pub fn resolve_latest(text: &str, anchor: NaiveDateTime) -> Result<Bound, Error> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("now") {
        return Ok(Bound::Upper(anchor));
    }
    if let Some(rest) = trimmed.strip_prefix('-') {
        let span = parse_span(rest)?;
        return Ok(Bound::Lower(anchor - span.to_duration()));
    }
    if trimmed.starts_with('+') {
        let span = parse_span(trimmed)?;
        return Ok(Bound::Upper(anchor + span.to_duration()));
    }
    let dt = parse_absolute(trimmed).ok_or_else(|| Error::semantic(format!("unparseable time value `{text}`")))?;
    Ok(Bound::Upper(dt))
}

/// Resolves a relative or absolute time value for `search`'s `latest=`/
/// `earliest=` and for general date parsing. `now`/`""` resolve to `anchor`.
pub fn parse_relative_or_absolute(text: &str, anchor: NaiveDateTime) -> Result<NaiveDateTime, Error> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("now") {
        return Ok(anchor);
    }
    if trimmed.starts_with('+') || trimmed.starts_with('-') {
        let span = parse_span(trimmed)?;
        return Ok(anchor + span.to_duration());
    }
    parse_absolute(trimmed).ok_or_else(|| Error::semantic(format!("unparseable time value `{text}`")))
}

/// `YYYY-MM-DD[ HH:MM[:SS]]`, also accepting `/`-separated dates.
pub fn parse_absolute(text: &str) -> Option<NaiveDateTime> {
    let normalized = text.trim().replace('/', "-");
    const FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%d"];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn from_epoch_secs(secs: i64, fallback: NaiveDateTime) -> NaiveDateTime {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc()).unwrap_or(fallback)
}

/// Floors `dt` to the boundary implied by `span`, used by `bucket`/`bin`.
pub fn floor_to_span(dt: NaiveDateTime, span: Span) -> NaiveDateTime {
    match span.unit {
        Unit::Second => {
            let secs = dt.and_utc().timestamp();
            let step = span.amount.max(1);
            let floored = secs - secs.rem_euclid(step);
            from_epoch_secs(floored, dt)
        }
        Unit::Minute => {
            let total_minutes = dt.and_utc().timestamp() / 60;
            let step = span.amount.max(1);
            let floored = (total_minutes - total_minutes.rem_euclid(step)) * 60;
            from_epoch_secs(floored, dt)
        }
        Unit::Hour => {
            let total_hours = dt.and_utc().timestamp() / 3600;
            let step = span.amount.max(1);
            let floored = (total_hours - total_hours.rem_euclid(step)) * 3600;
            from_epoch_secs(floored, dt)
        }
        Unit::Day => {
            let days = dt.num_days_from_ce();
            let step = span.amount.max(1) as i32;
            let floored_days = days - days.rem_euclid(step);
            NaiveDate::from_num_days_from_ce_opt(floored_days)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or(dt)
        }
        Unit::Week => {
            let days = dt.num_days_from_ce();
            let step = 7 * span.amount.max(1) as i32;
            let floored_days = days - days.rem_euclid(step);
            NaiveDate::from_num_days_from_ce_opt(floored_days)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or(dt)
        }
    }
}

pub fn year(dt: NaiveDateTime) -> i64 {
    dt.year() as i64
}
pub fn month(dt: NaiveDateTime) -> i64 {
    dt.month() as i64
}
pub fn day(dt: NaiveDateTime) -> i64 {
    dt.day() as i64
}
pub fn hour(dt: NaiveDateTime) -> i64 {
    dt.hour() as i64
}
pub fn minute(dt: NaiveDateTime) -> i64 {
    dt.minute() as i64
}
pub fn second(dt: NaiveDateTime) -> i64 {
    dt.second() as i64
}
pub fn dayofweek(dt: NaiveDateTime) -> i64 {
    dt.weekday().num_days_from_sunday() as i64
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn parses_span_units() {
        assert_eq!(parse_span("5m").unwrap(), Span { amount: 5, unit: Unit::Minute });
        assert_eq!(parse_span("-24h").unwrap(), Span { amount: -24, unit: Unit::Hour });
        assert_eq!(parse_span("2w").unwrap(), Span { amount: 2, unit: Unit::Week });
    }

    #[rstest]
    #[case::seconds("30s", 30, Unit::Second)]
    #[case::minutes_abbrev("15min", 15, Unit::Minute)]
    #[case::hours_full_word("3hours", 3, Unit::Hour)]
    #[case::days("7days", 7, Unit::Day)]
    #[case::weeks_abbrev("1wk", 1, Unit::Week)]
    #[case::explicit_positive("+10m", 10, Unit::Minute)]
    fn parses_every_accepted_unit_spelling(#[case] text: &str, #[case] amount: i64, #[case] unit: Unit) {
        assert_eq!(parse_span(text).unwrap(), Span { amount, unit });
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_span("5x").is_err());
    }

    #[test]
    fn negative_latest_resolves_to_a_lower_bound() {
        let anchor = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let bound = resolve_latest("-5m", anchor).unwrap();
        assert_eq!(bound, Bound::Lower(anchor - Duration::minutes(5)));
    }

    #[test]
    fn latest_now_resolves_to_an_upper_bound_at_anchor() {
        let anchor = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        assert_eq!(resolve_latest("now", anchor).unwrap(), Bound::Upper(anchor));
    }

    #[test]
    fn absolute_latest_resolves_to_an_upper_bound() {
        let anchor = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let expected = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(resolve_latest("2023-12-31", anchor).unwrap(), Bound::Upper(expected));
    }

    #[test]
    fn floors_to_five_minute_boundary() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(10, 7, 30).unwrap();
        let floored = floor_to_span(dt, Span { amount: 5, unit: Unit::Minute });
        assert_eq!(floored, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(10, 5, 0).unwrap());
    }

    #[test]
    fn bucket_is_idempotent() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(10, 7, 30).unwrap();
        let span = Span { amount: 5, unit: Unit::Minute };
        let once = floor_to_span(dt, span);
        let twice = floor_to_span(once, span);
        assert_eq!(once, twice);
    }
}
