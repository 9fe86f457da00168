//! Relative date tokens (`$today`, `$previousWeek`, `$3HoursBefore`, ...).
//!
//! Intervals are computed in the request timezone and emitted as UTC
//! instants, so a "day" starts at local midnight.

use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::types::{Condition, Scalar, Timezone};

/// Formats an instant the way dates are stored: RFC 3339, UTC, second precision.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// The UTC instant of local midnight of `date`, or `None` when it falls
/// outside the representable range.
pub(crate) fn day_start(date: NaiveDate, tz: &Timezone) -> Option<DateTime<Utc>> {
    let local = date.and_time(NaiveTime::MIN);
    let offset = Duration::seconds(i64::from(tz.offset().local_minus_utc()));
    let utc = local.checked_sub_signed(offset)?;
    Some(Utc.from_utc_datetime(&utc))
}

/// Resolves relative date tokens against a fixed clock.
#[derive(Debug, Clone, Copy)]
pub struct DateIntervalParser {
    now: DateTime<Utc>,
    tz: Timezone,
}

impl DateIntervalParser {
    /// Creates a parser for the given clock and timezone.
    pub fn new(now: DateTime<Utc>, tz: Timezone) -> Self {
        Self { now, tz }
    }

    /// Returns true if `value` looks like a relative date token.
    pub fn is_interval(value: &str) -> bool {
        value.starts_with('$') && !matches!(value, "$present" | "$blank")
    }

    /// Translates a token into a condition, or `None` if it is not recognized.
    pub fn parse(&self, value: &str) -> Option<Condition> {
        let today = self.now.with_timezone(&self.tz.offset()).date_naive();

        match value {
            "$today" => self.days(today, today.checked_add_days(Days::new(1))?),
            "$yesterday" => self.days(today.checked_sub_days(Days::new(1))?, today),
            "$previousWeek" => {
                let monday = week_start(today)?;
                self.days(monday.checked_sub_days(Days::new(7))?, monday)
            }
            "$previousMonth" => {
                let first = month_start(today)?;
                self.days(first.checked_sub_months(Months::new(1))?, first)
            }
            "$previousQuarter" => {
                let first = quarter_start(today)?;
                self.days(first.checked_sub_months(Months::new(3))?, first)
            }
            "$previousYear" => {
                let first = year_start(today)?;
                self.days(first.checked_sub_months(Months::new(12))?, first)
            }
            "$weekToDate" => self.to_date(week_start(today)?),
            "$monthToDate" => self.to_date(month_start(today)?),
            "$quarterToDate" => self.to_date(quarter_start(today)?),
            "$yearToDate" => self.to_date(year_start(today)?),
            "$past" => Some(Condition::Lt(instant(self.now))),
            "$future" => Some(Condition::Gt(instant(self.now))),
            _ => {
                if let Some(n) = numbered(value, "$previous", "Days") {
                    let start = today.checked_sub_days(Days::new(n))?;
                    return self.days(start, today);
                }
                if let Some(n) = numbered(value, "$", "HoursBefore") {
                    let hours = Duration::try_hours(i64::try_from(n).ok()?)?;
                    return Some(Condition::Lt(instant(self.now.checked_sub_signed(hours)?)));
                }
                None
            }
        }
    }

    fn days(&self, start: NaiveDate, end: NaiveDate) -> Option<Condition> {
        Some(Condition::Within {
            start: instant(day_start(start, &self.tz)?),
            end: instant(day_start(end, &self.tz)?),
        })
    }

    fn to_date(&self, start: NaiveDate) -> Option<Condition> {
        Some(Condition::Within {
            start: instant(day_start(start, &self.tz)?),
            end: instant(self.now),
        })
    }
}

fn instant(at: DateTime<Utc>) -> Scalar {
    Scalar::Text(format_instant(at))
}

fn numbered(value: &str, prefix: &str, suffix: &str) -> Option<u64> {
    let digits = value.strip_prefix(prefix)?.strip_suffix(suffix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn week_start(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
}

fn month_start(date: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
}

fn quarter_start(date: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), (date.month0() / 3) * 3 + 1, 1)
}

fn year_start(date: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), 1, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Thursday 2024-05-16 14:30:00 UTC
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 16, 14, 30, 0).unwrap()
    }

    fn within(start: &str, end: &str) -> Option<Condition> {
        Some(Condition::Within {
            start: Scalar::text(start),
            end: Scalar::text(end),
        })
    }

    #[test]
    fn test_today_and_yesterday() {
        let parser = DateIntervalParser::new(now(), Timezone::utc());
        assert_eq!(
            parser.parse("$today"),
            within("2024-05-16T00:00:00Z", "2024-05-17T00:00:00Z")
        );
        assert_eq!(
            parser.parse("$yesterday"),
            within("2024-05-15T00:00:00Z", "2024-05-16T00:00:00Z")
        );
    }

    #[test]
    fn test_today_in_other_timezone() {
        let parser = DateIntervalParser::new(now(), Timezone::parse("+02:00").unwrap());
        assert_eq!(
            parser.parse("$today"),
            within("2024-05-15T22:00:00Z", "2024-05-16T22:00:00Z")
        );
    }

    #[test]
    fn test_previous_periods() {
        let parser = DateIntervalParser::new(now(), Timezone::utc());
        assert_eq!(
            parser.parse("$previousWeek"),
            within("2024-05-06T00:00:00Z", "2024-05-13T00:00:00Z")
        );
        assert_eq!(
            parser.parse("$previousMonth"),
            within("2024-04-01T00:00:00Z", "2024-05-01T00:00:00Z")
        );
        assert_eq!(
            parser.parse("$previousQuarter"),
            within("2024-01-01T00:00:00Z", "2024-04-01T00:00:00Z")
        );
        assert_eq!(
            parser.parse("$previousYear"),
            within("2023-01-01T00:00:00Z", "2024-01-01T00:00:00Z")
        );
        assert_eq!(
            parser.parse("$previous7Days"),
            within("2024-05-09T00:00:00Z", "2024-05-16T00:00:00Z")
        );
    }

    #[test]
    fn test_to_date_periods() {
        let parser = DateIntervalParser::new(now(), Timezone::utc());
        assert_eq!(
            parser.parse("$weekToDate"),
            within("2024-05-13T00:00:00Z", "2024-05-16T14:30:00Z")
        );
        assert_eq!(
            parser.parse("$quarterToDate"),
            within("2024-04-01T00:00:00Z", "2024-05-16T14:30:00Z")
        );
    }

    #[test]
    fn test_open_ended_tokens() {
        let parser = DateIntervalParser::new(now(), Timezone::utc());
        assert_eq!(
            parser.parse("$past"),
            Some(Condition::Lt(Scalar::text("2024-05-16T14:30:00Z")))
        );
        assert_eq!(
            parser.parse("$3HoursBefore"),
            Some(Condition::Lt(Scalar::text("2024-05-16T11:30:00Z")))
        );
    }

    #[test]
    fn test_day_start_out_of_range() {
        let tz = Timezone::parse("+01:00").unwrap();
        assert_eq!(day_start(NaiveDate::MIN, &tz), None);
        assert!(day_start(NaiveDate::MIN, &Timezone::parse("-01:00").unwrap()).is_some());
    }

    #[test]
    fn test_unknown_tokens() {
        let parser = DateIntervalParser::new(now(), Timezone::utc());
        assert_eq!(parser.parse("$previousDays"), None);
        assert_eq!(parser.parse("$previous-1Days"), None);
        assert_eq!(parser.parse("$tomorrow"), None);
        assert!(!DateIntervalParser::is_interval("$present"));
        assert!(DateIntervalParser::is_interval("$today"));
    }
}
