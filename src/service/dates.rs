//! Local-time formatting and the small natural-language date grammar used
//! by SMS messages.

use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday,
};
use regex::Regex;
use thiserror::Error as ThisError;

static BY_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bby\s+(\d{1,2})(?::(\d{2}))?\s*(am|pm)?").expect("valid deadline regex")
});
static DAYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*days?\b").expect("valid days regex"));
static WEEKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*weeks?\b").expect("valid weeks regex"));

/// Longest restriction or extension accepted, in days.
pub const MAX_DURATION_DAYS: i64 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
#[error("duration is longer than {MAX_DURATION_DAYS} days")]
pub struct DurationOutOfRange;

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("sunday", Weekday::Sun),
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
];

pub fn local(at: DateTime<Utc>, offset: FixedOffset) -> DateTime<FixedOffset> {
    at.with_timezone(&offset)
}

/// `Nov 21 7:00 PM`
pub fn month_day_time(at: DateTime<Utc>, offset: FixedOffset) -> String {
    local(at, offset).format("%b %-d %-I:%M %p").to_string()
}

/// `Nov 21`
pub fn month_day(at: DateTime<Utc>, offset: FixedOffset) -> String {
    local(at, offset).format("%b %-d").to_string()
}

/// `7:00 PM`
pub fn clock(at: DateTime<Utc>, offset: FixedOffset) -> String {
    local(at, offset).format("%-I:%M %p").to_string()
}

/// `Today 7:00 PM`, `Tomorrow 9:00 AM` or `Fri, Nov 21, 5:00 PM`.
pub fn due_label(at: DateTime<Utc>, now: DateTime<Utc>, offset: FixedOffset) -> String {
    let day = local(at, offset).date_naive();
    let today = local(now, offset).date_naive();
    if day == today {
        format!("Today {}", clock(at, offset))
    } else if Some(day) == today.succ_opt() {
        format!("Tomorrow {}", clock(at, offset))
    } else {
        local(at, offset).format("%a, %b %-d, %-I:%M %p").to_string()
    }
}

/// Local wall-clock time on `date` as UTC.
fn at_local(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn hm(h: u32, m: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(h, m, 0)
}

/// Next occurrence of `day` strictly after `from`.
fn next_weekday(from: NaiveDate, day: Weekday) -> NaiveDate {
    let current = from.weekday().num_days_from_sunday() as i64;
    let target = day.num_days_from_sunday() as i64;
    let mut ahead = target - current;
    if ahead <= 0 {
        ahead += 7;
    }
    from + Duration::days(ahead)
}

fn mentioned_weekday(lower: &str) -> Option<Weekday> {
    WEEKDAYS
        .iter()
        .find(|(name, _)| lower.contains(name))
        .map(|(_, d)| *d)
}

/// Deadline phrases in a commitment text:
/// `by 7pm` / `by 7:30` (tomorrow once passed), `tonight`/`today` 8 PM,
/// `tomorrow morning` 9 AM, `tomorrow` 5 PM, a weekday's next occurrence 5 PM.
pub fn parse_deadline(
    message: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Option<DateTime<Utc>> {
    let lower = message.to_lowercase();
    let today = local(now, offset).date_naive();

    if let Some(caps) = BY_TIME.captures(&lower) {
        let hours: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minutes: u32 = caps
            .get(2)
            .map(|m| m.as_str().parse())
            .transpose()
            .ok()?
            .unwrap_or(0);
        let pm = caps.get(3).is_some_and(|m| m.as_str() == "pm");
        let hour = match (pm, hours) {
            (true, h) if h < 12 => h + 12,
            (false, 12) => 0,
            (_, h) => h,
        };
        let deadline = at_local(today, hm(hour, minutes)?, offset)?;
        return Some(if deadline <= now {
            deadline + Duration::days(1)
        } else {
            deadline
        });
    }

    if lower.contains("tonight") || lower.contains("today") {
        return at_local(today, hm(20, 0)?, offset);
    }
    if lower.contains("tomorrow morning") {
        return at_local(today.succ_opt()?, hm(9, 0)?, offset);
    }
    if lower.contains("tomorrow") {
        return at_local(today.succ_opt()?, hm(17, 0)?, offset);
    }
    if let Some(day) = mentioned_weekday(&lower) {
        return at_local(next_weekday(today, day), hm(17, 0)?, offset);
    }
    None
}

/// End of an `until ...` phrase: a weekday's next occurrence at 8 PM,
/// `tomorrow` at 8 PM, or an RFC 3339 / `YYYY-MM-DD` date.
pub fn parse_until(text: &str, now: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let lower = text.trim().to_lowercase();
    let today = local(now, offset).date_naive();
    if let Some(day) = mentioned_weekday(&lower) {
        return at_local(next_weekday(today, day), hm(20, 0)?, offset);
    }
    if lower.contains("tomorrow") {
        return at_local(today.succ_opt()?, hm(20, 0)?, offset);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text.trim()) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| at_local(d, hm(20, 0)?, offset))
}

/// Whole days from `now` until `end`, rounded up.
pub fn days_until(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (end - now).num_seconds();
    (secs + 86_399).div_euclid(86_400)
}

/// `at` moved by `days`, or `None` past the calendar's range.
pub fn add_days(at: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(days).and_then(|d| at.checked_add_signed(d))
}

/// `3 days`, `2 weeks`, `a week`, `a month`, `until Friday`. Counts above
/// [`MAX_DURATION_DAYS`] are an error rather than a duration.
pub fn parse_duration_days(
    message: &str,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Option<i64>, DurationOutOfRange> {
    let lower = message.to_lowercase();
    let count = |re: &Regex| -> Result<Option<i64>, DurationOutOfRange> {
        re.captures(&lower)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().parse::<i64>().map_err(|_| DurationOutOfRange))
            .transpose()
    };
    let days = if let Some(d) = count(&DAYS)? {
        Some(d)
    } else if lower.contains("week") {
        let weeks = count(&WEEKS)?.unwrap_or(1);
        Some(weeks.checked_mul(7).ok_or(DurationOutOfRange)?)
    } else if lower.contains("month") {
        Some(30)
    } else {
        lower
            .split_once("until ")
            .and_then(|(_, rest)| parse_until(rest, now, offset))
            .map(|end| days_until(end, now).max(1))
    };
    match days {
        Some(d) if d > MAX_DURATION_DAYS => Err(DurationOutOfRange),
        other => Ok(other),
    }
}

/// `HH:MM` on a 24-hour clock.
pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    // Wednesday
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 19, 15, 0, 0).unwrap()
    }

    fn ymdhm(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn by_time_today_or_tomorrow() {
        assert_eq!(parse_deadline("by 7pm", now(), utc()), Some(ymdhm(2025, 11, 19, 19, 0)));
        assert_eq!(parse_deadline("by 7:30 pm", now(), utc()), Some(ymdhm(2025, 11, 19, 19, 30)));
        // 9 (am) already passed
        assert_eq!(parse_deadline("by 9", now(), utc()), Some(ymdhm(2025, 11, 20, 9, 0)));
        assert_eq!(parse_deadline("by 12am", now(), utc()), Some(ymdhm(2025, 11, 20, 0, 0)));
        assert_eq!(parse_deadline("by 25pm", now(), utc()), None);
    }

    #[test]
    fn relative_words() {
        assert_eq!(parse_deadline("clean room tonight", now(), utc()), Some(ymdhm(2025, 11, 19, 20, 0)));
        assert_eq!(
            parse_deadline("tomorrow morning", now(), utc()),
            Some(ymdhm(2025, 11, 20, 9, 0))
        );
        assert_eq!(parse_deadline("tomorrow", now(), utc()), Some(ymdhm(2025, 11, 20, 17, 0)));
        assert_eq!(parse_deadline("Friday", now(), utc()), Some(ymdhm(2025, 11, 21, 17, 0)));
        // same weekday rolls a full week
        assert_eq!(parse_deadline("wednesday", now(), utc()), Some(ymdhm(2025, 11, 26, 17, 0)));
        assert_eq!(parse_deadline("sometime", now(), utc()), None);
    }

    #[test]
    fn deadline_respects_offset() {
        let est = FixedOffset::west_opt(5 * 3600).unwrap();
        // 15:00Z is 10:00 local; 7pm local is 00:00Z next day
        assert_eq!(parse_deadline("by 7pm", now(), est), Some(ymdhm(2025, 11, 20, 0, 0)));
    }

    #[test]
    fn durations() {
        let days = |m: &str| parse_duration_days(m, now(), utc());
        assert_eq!(days("No iPad 3 days Kid A"), Ok(Some(3)));
        assert_eq!(days("no tv 1 day"), Ok(Some(1)));
        assert_eq!(days("2 weeks"), Ok(Some(14)));
        assert_eq!(days("for a week"), Ok(Some(7)));
        assert_eq!(days("a month"), Ok(Some(30)));
        // Friday 20:00 is 2 days 5 hours away
        assert_eq!(days("no tv until friday"), Ok(Some(3)));
        assert_eq!(days("no tv"), Ok(None));
    }

    #[test]
    fn oversized_durations_are_rejected() {
        let days = |m: &str| parse_duration_days(m, now(), utc());
        assert_eq!(days("No iPad 9999999999 days Kid A"), Err(DurationOutOfRange));
        assert_eq!(days("no tv 99999999999999999999 days"), Err(DurationOutOfRange));
        assert_eq!(days("no tv 2000000000000000000 weeks"), Err(DurationOutOfRange));
        assert_eq!(days("no tv until 9999-01-01"), Err(DurationOutOfRange));
        assert_eq!(days("no tv 3650 days"), Ok(Some(3650)));
    }

    #[test]
    fn add_days_is_checked() {
        assert_eq!(add_days(now(), 2), Some(ymdhm(2025, 11, 21, 15, 0)));
        assert_eq!(add_days(now(), i64::MAX), None);
        assert_eq!(add_days(now(), 1_000_000_000), None);
    }

    #[test]
    fn formatting() {
        let at = ymdhm(2025, 11, 21, 19, 5);
        assert_eq!(month_day_time(at, utc()), "Nov 21 7:05 PM");
        assert_eq!(month_day(at, utc()), "Nov 21");
        assert_eq!(due_label(ymdhm(2025, 11, 19, 19, 0), now(), utc()), "Today 7:00 PM");
        assert_eq!(due_label(ymdhm(2025, 11, 20, 9, 0), now(), utc()), "Tomorrow 9:00 AM");
        assert_eq!(due_label(at, now(), utc()), "Fri, Nov 21, 7:05 PM");
    }

    #[test]
    fn hhmm() {
        assert_eq!(parse_hhmm("22:00"), NaiveTime::from_hms_opt(22, 0, 0));
        assert!(parse_hhmm("25:00").is_none());
        assert!(parse_hhmm("10pm").is_none());
    }
}
