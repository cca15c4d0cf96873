//! Partner and parent notifications over SMS, logged to
//! `partner_notifications`.

pub mod templates;

use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::twilio::{TwilioClient, format_phone_number, last_ten_digits};
use crate::db::Database;
use crate::db::models::{
    CommitmentStats, CommitmentView, ConsequenceView, NotificationStatus, NotificationType,
    PartnerSettings, ReferenceType,
};
use crate::db::notifications::NotificationRecord;
use crate::error::StashError;

/// Who receives a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    /// The partner phone only.
    Partner,
    /// The partner, falling back to the user's own phone.
    Verifier,
    /// Partner and user.
    BothParents,
}

/// Whether the user's toggles allow `kind`. No settings row allows all.
fn allowed(settings: Option<&PartnerSettings>, kind: NotificationType) -> bool {
    let Some(s) = settings else {
        return true;
    };
    match kind {
        NotificationType::ConsequenceCreated
        | NotificationType::ConsequenceConfirmed
        | NotificationType::ConsequenceExpired => s.notify_consequences,
        NotificationType::ConsequenceExpiring
        | NotificationType::CommitmentReminder
        | NotificationType::VerificationNeeded => s.notify_reminders,
        NotificationType::CommitmentCreated
        | NotificationType::CommitmentMissed
        | NotificationType::CommitmentCompleted => s.notify_commitments,
    }
}

struct Outgoing<'a> {
    user_id: Uuid,
    kind: NotificationType,
    audience: Audience,
    reference_id: Uuid,
    reference_type: ReferenceType,
    child_name: &'a str,
    body: String,
}

/// Sends and records notifications for one deployment.
#[derive(Clone)]
pub struct Notifier {
    db: Database,
    twilio: TwilioClient,
    offset: FixedOffset,
}

impl Notifier {
    pub fn new(db: Database, twilio: TwilioClient, offset: FixedOffset) -> Self {
        Self { db, twilio, offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    async fn recipients(
        &self,
        user_id: Uuid,
        audience: Audience,
        settings: Option<&PartnerSettings>,
    ) -> Result<Vec<String>, StashError> {
        let partner = settings
            .and_then(|s| s.partner_phone.as_deref())
            .filter(|p| !p.trim().is_empty())
            .map(format_phone_number);
        let own = || async {
            Ok::<_, StashError>(
                self.db
                    .users()
                    .get(user_id)
                    .await?
                    .and_then(|u| u.phone_number)
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| format_phone_number(&p)),
            )
        };
        let mut phones: Vec<String> = match audience {
            Audience::Partner => partner.into_iter().collect(),
            Audience::Verifier => match partner {
                Some(p) => vec![p],
                None => own().await?.into_iter().collect(),
            },
            Audience::BothParents => partner.into_iter().chain(own().await?).collect(),
        };
        let mut seen = std::collections::HashSet::new();
        phones.retain(|p| seen.insert(last_ten_digits(p)));
        Ok(phones)
    }

    /// Send to the audience and log one row per phone. Returns how many
    /// sends succeeded.
    async fn deliver(&self, out: Outgoing<'_>) -> Result<usize, StashError> {
        let settings = self.db.users().settings(out.user_id).await?;
        if !allowed(settings.as_ref(), out.kind) {
            debug!(user_id = %out.user_id, kind = %out.kind, "notification disabled by settings");
            return Ok(0);
        }
        let phones = self.recipients(out.user_id, out.audience, settings.as_ref()).await?;
        if phones.is_empty() {
            warn!(user_id = %out.user_id, kind = %out.kind, "no phone configured, notification skipped");
            return Ok(0);
        }
        let partner_name = settings.as_ref().and_then(|s| s.partner_name.as_deref());
        let results = self.twilio.send_bulk(&phones, &out.body).await;

        let mut sent = 0;
        for (phone, result) in phones.iter().zip(&results) {
            let status = if result.success {
                sent += 1;
                NotificationStatus::Sent
            } else {
                NotificationStatus::Failed
            };
            self.db
                .notifications()
                .record(NotificationRecord {
                    user_id: Some(out.user_id),
                    notification_type: out.kind,
                    reference_id: out.reference_id,
                    reference_type: out.reference_type,
                    partner_phone: phone,
                    partner_name,
                    status,
                    message_text: &out.body,
                    child_name: Some(out.child_name),
                })
                .await?;
        }
        info!(kind = %out.kind, reference = %out.reference_id, sent, total = phones.len(), "notification delivered");
        Ok(sent)
    }

    /// Send `body` to both parents without a notification record. Returns
    /// how many sends succeeded.
    pub async fn family_broadcast(
        &self,
        settings: &PartnerSettings,
        body: &str,
    ) -> Result<usize, StashError> {
        let phones = self
            .recipients(settings.user_id, Audience::BothParents, Some(settings))
            .await?;
        if phones.is_empty() {
            return Ok(0);
        }
        let results = self.twilio.send_bulk(&phones, body).await;
        Ok(results.iter().filter(|r| r.success).count())
    }

    fn consequence<'a>(
        q: &'a ConsequenceView,
        kind: NotificationType,
        audience: Audience,
        body: String,
    ) -> Outgoing<'a> {
        Outgoing {
            user_id: q.owner_id,
            kind,
            audience,
            reference_id: q.id,
            reference_type: ReferenceType::Consequence,
            child_name: &q.child_name,
            body,
        }
    }

    fn commitment<'a>(
        c: &'a CommitmentView,
        kind: NotificationType,
        audience: Audience,
        body: String,
    ) -> Outgoing<'a> {
        Outgoing {
            user_id: c.owner_id,
            kind,
            audience,
            reference_id: c.id,
            reference_type: ReferenceType::Commitment,
            child_name: &c.child_name,
            body,
        }
    }

    pub async fn consequence_created(
        &self,
        q: &ConsequenceView,
        setter: &str,
    ) -> Result<usize, StashError> {
        let body = templates::consequence_created(q, setter, self.offset);
        self.deliver(Self::consequence(q, NotificationType::ConsequenceCreated, Audience::Partner, body))
            .await
    }

    pub async fn consequence_confirmed(
        &self,
        q: &ConsequenceView,
        confirmed_by: &str,
    ) -> Result<usize, StashError> {
        let body = templates::consequence_confirmed(q, confirmed_by, self.offset);
        self.deliver(Self::consequence(
            q,
            NotificationType::ConsequenceConfirmed,
            Audience::BothParents,
            body,
        ))
        .await
    }

    pub async fn consequence_expiring(
        &self,
        q: &ConsequenceView,
        now: DateTime<Utc>,
    ) -> Result<usize, StashError> {
        let body = templates::consequence_expiring(q, now, self.offset);
        self.deliver(Self::consequence(
            q,
            NotificationType::ConsequenceExpiring,
            Audience::BothParents,
            body,
        ))
        .await
    }

    pub async fn consequence_expired(&self, q: &ConsequenceView) -> Result<usize, StashError> {
        let body = templates::consequence_expired(q);
        self.deliver(Self::consequence(
            q,
            NotificationType::ConsequenceExpired,
            Audience::BothParents,
            body,
        ))
        .await
    }

    pub async fn commitment_created(
        &self,
        c: &CommitmentView,
        by_child: bool,
    ) -> Result<usize, StashError> {
        let body = templates::commitment_created(c, by_child, self.offset);
        self.deliver(Self::commitment(
            c,
            NotificationType::CommitmentCreated,
            Audience::BothParents,
            body,
        ))
        .await
    }

    pub async fn commitment_reminder(
        &self,
        c: &CommitmentView,
        now: DateTime<Utc>,
    ) -> Result<usize, StashError> {
        let body = templates::commitment_reminder(c, now, self.offset);
        self.deliver(Self::commitment(
            c,
            NotificationType::CommitmentReminder,
            Audience::BothParents,
            body,
        ))
        .await
    }

    pub async fn verification_request(&self, c: &CommitmentView) -> Result<usize, StashError> {
        let body = templates::commitment_verification(c);
        self.deliver(Self::commitment(
            c,
            NotificationType::VerificationNeeded,
            Audience::Verifier,
            body,
        ))
        .await
    }

    pub async fn commitment_missed(
        &self,
        c: &CommitmentView,
        stats: &CommitmentStats,
    ) -> Result<usize, StashError> {
        let body = templates::commitment_missed(c, stats);
        self.deliver(Self::commitment(
            c,
            NotificationType::CommitmentMissed,
            Audience::BothParents,
            body,
        ))
        .await
    }

    pub async fn commitment_completed(
        &self,
        c: &CommitmentView,
        on_time: bool,
        stats: &CommitmentStats,
    ) -> Result<usize, StashError> {
        let body = templates::commitment_completed(c, on_time, stats);
        self.deliver(Self::commitment(
            c,
            NotificationType::CommitmentCompleted,
            Audience::BothParents,
            body,
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(consequences: bool, commitments: bool, reminders: bool) -> PartnerSettings {
        let now = Utc::now();
        PartnerSettings {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            partner_phone: Some("+15550001111".into()),
            partner_name: None,
            notify_consequences: consequences,
            notify_commitments: commitments,
            notify_reminders: reminders,
            require_both_parents: false,
            quiet_hours_start: None,
            quiet_hours_end: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn toggles_gate_their_kinds() {
        assert!(allowed(None, NotificationType::CommitmentMissed));

        let no_reminders = settings(true, true, false);
        assert!(!allowed(Some(&no_reminders), NotificationType::CommitmentReminder));
        assert!(!allowed(Some(&no_reminders), NotificationType::ConsequenceExpiring));
        assert!(allowed(Some(&no_reminders), NotificationType::ConsequenceCreated));

        let no_consequences = settings(false, true, true);
        assert!(!allowed(Some(&no_consequences), NotificationType::ConsequenceExpired));
        assert!(allowed(Some(&no_consequences), NotificationType::CommitmentCreated));
    }
}
