//! Scheduled scans behind `/api/cron/*`. Each run reports what it did; a
//! failed notification is logged and the scan moves on.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use governor::DefaultKeyedRateLimiter;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::twilio::{TwilioClient, format_phone_number};
use crate::api::weather::WeatherClient;
use crate::db::Database;
use crate::db::models::{ConsequenceStatus, NotificationType, PartnerSettings, Recipient};
use crate::error::StashError;
use crate::service::dates::local;
use crate::service::lifecycle;
use crate::service::notify::{Notifier, templates};
use crate::service::quiet_hours::in_quiet_hours;
use crate::service::stats::{month_key, month_start, refresh_month};

/// Lead time for reminders and grace period before a commitment is missed.
const REMINDER_WINDOW_MINUTES: i64 = 30;
const BIRTHDAY_LEADS: [i64; 3] = [7, 1, 0];

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ReminderReport {
    pub reminders_sent: usize,
    pub verifications_sent: usize,
    pub marked_missed: usize,
    pub skipped_quiet_hours: usize,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ExpiryReport {
    pub expired: usize,
    pub notified: usize,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct WarningReport {
    pub warned: usize,
    pub skipped: usize,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct BirthdayReport {
    pub checked: usize,
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: u64,
    /// Phone numbers still tracked by the inbound rate limiter.
    pub rate_limited_numbers: usize,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ReliabilityReport {
    pub children: usize,
    pub updated: usize,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct WeeklyReport {
    pub sent: usize,
    pub skipped_quiet_hours: usize,
    pub no_activity: usize,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct WeatherRefreshReport {
    pub refreshed: usize,
    pub failed: usize,
}

/// Days from `today` to the next anniversary of `birthday`. Feb 29 falls on
/// Feb 28 in common years.
pub fn days_until_birthday(birthday: NaiveDate, today: NaiveDate) -> i64 {
    let on = |year: i32| {
        NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day())
            .or_else(|| NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day() - 1))
    };
    let this_year = on(today.year()).filter(|d| *d >= today);
    match this_year.or_else(|| on(today.year() + 1)) {
        Some(next) => (next - today).num_days(),
        None => i64::MAX,
    }
}

pub fn birthday_message(r: &Recipient, days: i64, date: NaiveDate, app_url: &str) -> String {
    match days {
        0 => format!("🎉 Today is {}'s birthday! Don't forget to give your gift.", r.name),
        1 => format!(
            "🎂 {}'s birthday is tomorrow! Make sure the gift is wrapped.\n\n{app_url}/recipients/{}",
            r.name, r.id
        ),
        d => format!(
            "🎁 {}'s birthday is in {d} days ({})! Time to pick a gift.\n\n{app_url}/recipients/{}",
            r.name,
            date.format("%b %-d"),
            r.id
        ),
    }
}

/// Everything the scans need, borrowed from the app state.
pub struct Workflows<'a> {
    pub db: &'a Database,
    pub notifier: &'a Notifier,
    pub twilio: &'a TwilioClient,
    pub weather: &'a WeatherClient,
    pub weather_ttl: Duration,
    pub app_url: &'a str,
    pub sms_limiter: &'a DefaultKeyedRateLimiter<String>,
}

impl Workflows<'_> {
    async fn quiet_for(&self, owner: Uuid, now: DateTime<Utc>) -> Result<bool, StashError> {
        let settings: Option<PartnerSettings> = self.db.users().settings(owner).await?;
        Ok(in_quiet_hours(settings.as_ref(), now, self.notifier.offset()))
    }

    /// Advance reminders, verification requests and missed marking.
    pub async fn commitment_reminders(&self, now: DateTime<Utc>) -> Result<ReminderReport, StashError> {
        let window = Duration::minutes(REMINDER_WINDOW_MINUTES);
        let store = self.db.accountability();
        let mut report = ReminderReport::default();

        for c in store.due_for_reminder(now, window).await? {
            if self.quiet_for(c.owner_id, now).await? {
                report.skipped_quiet_hours += 1;
                continue;
            }
            match self.notifier.commitment_reminder(&c, now).await {
                Ok(_) => {
                    store.mark_reminded(c.id, now).await?;
                    report.reminders_sent += 1;
                }
                Err(e) => warn!(commitment = %c.id, error = %e, "reminder failed"),
            }
        }

        for c in store.due_for_verification(now, window).await? {
            if self.quiet_for(c.owner_id, now).await? {
                report.skipped_quiet_hours += 1;
                continue;
            }
            match self.notifier.verification_request(&c).await {
                Ok(_) => report.verifications_sent += 1,
                Err(e) => warn!(commitment = %c.id, error = %e, "verification request failed"),
            }
        }

        for mut c in store.overdue(now, window).await? {
            lifecycle::miss_commitment(&mut c.commitment, None);
            store.save_commitment(&c.commitment).await?;
            report.marked_missed += 1;
            let stats = refresh_month(&store, c.child_id, month_start(c.created_at)).await?;
            if self.quiet_for(c.owner_id, now).await? {
                report.skipped_quiet_hours += 1;
                continue;
            }
            if let Err(e) = self.notifier.commitment_missed(&c, &stats).await {
                warn!(commitment = %c.id, error = %e, "missed notification failed");
            }
        }

        info!(?report, "commitment reminders run");
        Ok(report)
    }

    pub async fn expire_consequences(&self, now: DateTime<Utc>) -> Result<ExpiryReport, StashError> {
        let store = self.db.accountability();
        let mut report = ExpiryReport::default();
        for mut q in store.expired_active(now).await? {
            q.consequence.status = ConsequenceStatus::Expired;
            store.save_consequence(&q.consequence).await?;
            report.expired += 1;
            match self.notifier.consequence_expired(&q).await {
                Ok(n) if n > 0 => report.notified += 1,
                Ok(_) => {}
                Err(e) => warn!(consequence = %q.id, error = %e, "expiry notification failed"),
            }
        }
        info!(?report, "consequence expiry run");
        Ok(report)
    }

    /// Heads-up for restrictions ending in one to two hours.
    pub async fn consequence_warnings(&self, now: DateTime<Utc>) -> Result<WarningReport, StashError> {
        let store = self.db.accountability();
        let notifications = self.db.notifications();
        let mut report = WarningReport::default();
        let expiring = store
            .expiring_between(now + Duration::hours(1), now + Duration::hours(2))
            .await?;
        for q in expiring {
            let recently_warned = notifications
                .sent_since(q.id, NotificationType::ConsequenceExpiring, now - Duration::hours(2))
                .await?;
            if recently_warned || self.quiet_for(q.owner_id, now).await? {
                report.skipped += 1;
                continue;
            }
            match self.notifier.consequence_expiring(&q, now).await {
                Ok(_) => report.warned += 1,
                Err(e) => warn!(consequence = %q.id, error = %e, "expiry warning failed"),
            }
        }
        info!(?report, "consequence warnings run");
        Ok(report)
    }

    pub async fn birthday_reminders(&self, now: DateTime<Utc>) -> Result<BirthdayReport, StashError> {
        let today = local(now, self.notifier.offset()).date_naive();
        let mut report = BirthdayReport::default();
        for (recipient, phone) in self.db.recipients().with_birthdays().await? {
            report.checked += 1;
            let Some(birthday) = recipient.birthday else {
                continue;
            };
            let days = days_until_birthday(birthday, today);
            if !BIRTHDAY_LEADS.contains(&days) {
                continue;
            }
            let date = today + Duration::days(days);
            let body = birthday_message(&recipient, days, date, self.app_url);
            let result = self.twilio.send_sms(&format_phone_number(&phone), &body).await;
            if result.success {
                report.sent += 1;
            } else {
                report.failed += 1;
                warn!(recipient = %recipient.id, error = ?result.error, "birthday reminder failed");
            }
        }
        info!(?report, "birthday reminders run");
        Ok(report)
    }

    pub async fn cleanup_sms_context(&self, now: DateTime<Utc>) -> Result<CleanupReport, StashError> {
        let deleted = self.db.sms().cleanup_expired(now).await?;
        // numbers whose quota has fully refilled carry no state worth keeping
        self.sms_limiter.retain_recent();
        self.sms_limiter.shrink_to_fit();
        let rate_limited_numbers = self.sms_limiter.len();
        info!(deleted, rate_limited_numbers, "expired sms contexts removed");
        Ok(CleanupReport {
            deleted,
            rate_limited_numbers,
        })
    }

    /// Recount the current month for every child.
    pub async fn calculate_reliability(&self, now: DateTime<Utc>) -> Result<ReliabilityReport, StashError> {
        let store = self.db.accountability();
        let children = store.all_children().await?;
        let month = month_start(now);
        let mut report = ReliabilityReport {
            children: children.len(),
            updated: 0,
        };
        for child in &children {
            refresh_month(&store, child.id, month).await?;
            report.updated += 1;
        }
        info!(?report, month = %month_key(month), "reliability recalculated");
        Ok(report)
    }

    /// Month-to-date reliability for each family using partner settings,
    /// sent to both parents. Families with no commitments this month are
    /// skipped.
    pub async fn weekly_report(&self, now: DateTime<Utc>) -> Result<WeeklyReport, StashError> {
        let store = self.db.accountability();
        let month = month_start(now);
        let mut report = WeeklyReport::default();
        for settings in self.db.users().all_settings().await? {
            if in_quiet_hours(Some(&settings), now, self.notifier.offset()) {
                report.skipped_quiet_hours += 1;
                continue;
            }
            let mut rows = Vec::new();
            for child in store.children(settings.user_id).await? {
                let stats = refresh_month(&store, child.id, month).await?;
                if stats.total_commitments > 0 {
                    rows.push((child, stats));
                }
            }
            if rows.is_empty() {
                report.no_activity += 1;
                continue;
            }
            let body = templates::weekly_report(&rows);
            match self.notifier.family_broadcast(&settings, &body).await {
                Ok(n) if n > 0 => report.sent += 1,
                Ok(_) => warn!(user_id = %settings.user_id, "weekly report reached no phone"),
                Err(e) => warn!(user_id = %settings.user_id, error = %e, "weekly report failed"),
            }
        }
        info!(?report, month = %month_key(month), "weekly report run");
        Ok(report)
    }

    pub async fn refresh_weather(&self, now: DateTime<Utc>) -> Result<WeatherRefreshReport, StashError> {
        let store = self.db.weather();
        let mut report = WeatherRefreshReport::default();
        for row in store.all().await? {
            match self.weather.forecast(&row.location).await {
                Ok(data) => {
                    store.put(row.user_id, &row.location, &data, now, self.weather_ttl).await?;
                    report.refreshed += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(user_id = %row.user_id, location = %row.location, error = %e, "weather refresh failed");
                }
            }
        }
        info!(?report, "weather refresh run");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn birthday_distance() {
        assert_eq!(days_until_birthday(d(2015, 11, 26), d(2025, 11, 19)), 7);
        assert_eq!(days_until_birthday(d(2015, 11, 19), d(2025, 11, 19)), 0);
        // already passed this year
        assert_eq!(days_until_birthday(d(2015, 1, 1), d(2025, 12, 31)), 1);
        // leap day in a common year
        assert_eq!(days_until_birthday(d(2016, 2, 29), d(2025, 2, 27)), 1);
    }
}
