use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};

use crate::db::models::PartnerSettings;
use crate::service::dates::{local, parse_hhmm};

/// Configured quiet window, when both ends parse.
fn window(settings: Option<&PartnerSettings>) -> Option<(NaiveTime, NaiveTime)> {
    let s = settings?;
    let start = parse_hhmm(s.quiet_hours_start.as_deref()?)?;
    let end = parse_hhmm(s.quiet_hours_end.as_deref()?)?;
    Some((start, end))
}

/// `start < end` is a same-day window `[start, end)`; otherwise it wraps
/// past midnight.
pub fn is_quiet_at(start: NaiveTime, end: NaiveTime, at: NaiveTime) -> bool {
    if start < end {
        at >= start && at < end
    } else {
        at >= start || at < end
    }
}

pub fn in_quiet_hours(
    settings: Option<&PartnerSettings>,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> bool {
    window(settings).is_some_and(|(start, end)| is_quiet_at(start, end, local(now, offset).time()))
}

/// `now`, or the end of the current quiet window.
pub fn next_available_send_time(
    settings: Option<&PartnerSettings>,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> DateTime<Utc> {
    let Some((start, end)) = window(settings) else {
        return now;
    };
    let now_local = local(now, offset);
    if !is_quiet_at(start, end, now_local.time()) {
        return now;
    }
    let today_end = offset
        .from_local_datetime(&now_local.date_naive().and_time(end))
        .single()
        .map(|dt| dt.with_timezone(&Utc));
    match today_end {
        Some(t) if t > now => t,
        Some(t) => t + Duration::days(1),
        None => now,
    }
}

/// `22:00`, `07:00` → `10:00 PM - 7:00 AM`.
pub fn format_quiet_hours(start: &str, end: &str) -> String {
    let fmt = |s: &str| {
        parse_hhmm(s)
            .map(|t| t.format("%-I:%M %p").to_string())
            .unwrap_or_else(|| s.to_string())
    };
    format!("{} - {}", fmt(start), fmt(end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn settings(start: &str, end: &str) -> PartnerSettings {
        let now = Utc::now();
        PartnerSettings {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            partner_phone: None,
            partner_name: None,
            notify_consequences: true,
            notify_commitments: true,
            notify_reminders: true,
            require_both_parents: false,
            quiet_hours_start: Some(start.into()),
            quiet_hours_end: Some(end.into()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn same_day_window() {
        assert!(is_quiet_at(t(13, 0), t(15, 0), t(13, 0)));
        assert!(is_quiet_at(t(13, 0), t(15, 0), t(14, 59)));
        assert!(!is_quiet_at(t(13, 0), t(15, 0), t(15, 0)));
    }

    #[test]
    fn window_across_midnight() {
        assert!(is_quiet_at(t(22, 0), t(7, 0), t(23, 30)));
        assert!(is_quiet_at(t(22, 0), t(7, 0), t(6, 59)));
        assert!(!is_quiet_at(t(22, 0), t(7, 0), t(7, 0)));
        assert!(!is_quiet_at(t(22, 0), t(7, 0), t(12, 0)));
    }

    #[test]
    fn next_send_time_waits_for_window_end() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let s = settings("22:00", "07:00");
        let late = Utc.with_ymd_and_hms(2025, 3, 1, 23, 0, 0).unwrap();
        assert_eq!(
            next_available_send_time(Some(&s), late, utc),
            Utc.with_ymd_and_hms(2025, 3, 2, 7, 0, 0).unwrap()
        );
        let early = Utc.with_ymd_and_hms(2025, 3, 2, 5, 0, 0).unwrap();
        assert_eq!(
            next_available_send_time(Some(&s), early, utc),
            Utc.with_ymd_and_hms(2025, 3, 2, 7, 0, 0).unwrap()
        );
        let noon = Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap();
        assert_eq!(next_available_send_time(Some(&s), noon, utc), noon);
        assert!(!in_quiet_hours(None, late, utc));
        assert!(in_quiet_hours(Some(&s), late, utc));
    }

    #[test]
    fn formats_twelve_hour_range() {
        assert_eq!(format_quiet_hours("22:00", "07:00"), "10:00 PM - 7:00 AM");
    }
}
