use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type, types::Json};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use crate::types::sms::SmsContextData;
use crate::types::weather::WeatherData;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, EnumString, Display, Default)]
#[sqlx(type_name = "gift_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GiftStatus {
    #[default]
    Idea,
    Considering,
    Purchased,
    Wrapped,
    Given,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, EnumString, Display, Default)]
#[sqlx(type_name = "gift_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GiftSource {
    #[default]
    Manual,
    Sms,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, EnumString, Display, Default)]
#[sqlx(type_name = "restriction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RestrictionType {
    Device,
    Activity,
    Privilege,
    Location,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, EnumString, Display, Default)]
#[sqlx(type_name = "consequence_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConsequenceStatus {
    #[default]
    Active,
    Expired,
    Lifted,
    Extended,
    PendingConfirmation,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, EnumString, Display, Default)]
#[sqlx(type_name = "commitment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommitmentStatus {
    #[default]
    Active,
    Completed,
    Missed,
    Extended,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, EnumString, Display, Default)]
#[sqlx(type_name = "commitment_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommitmentCategory {
    Homework,
    Chores,
    Responsibilities,
    Behavior,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, EnumString, Display, Default)]
#[sqlx(type_name = "severity", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Minor,
    #[default]
    Medium,
    Major,
}

impl Severity {
    /// Severity implied by a restriction length.
    pub fn from_duration(days: Option<i64>) -> Self {
        match days {
            Some(d) if d >= 7 => Severity::Major,
            Some(d) if d <= 2 => Severity::Minor,
            _ => Severity::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationType {
    ConsequenceCreated,
    ConsequenceConfirmed,
    ConsequenceExpiring,
    ConsequenceExpired,
    CommitmentCreated,
    CommitmentReminder,
    VerificationNeeded,
    CommitmentMissed,
    CommitmentCompleted,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[sqlx(type_name = "reference_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReferenceType {
    Consequence,
    Commitment,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, EnumString, Display, Default)]
#[sqlx(type_name = "notification_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationStatus {
    #[default]
    Sent,
    Failed,
    Confirmed,
    Dismissed,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[sqlx(type_name = "sms_direction", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SmsDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub sms_onboarded: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name used when a message is signed on this user's behalf.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or("Parent")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub relationship: String,
    pub nickname: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub age_range: Option<String>,
    pub gender: Option<String>,
    pub interests: Option<Json<Vec<String>>>,
    pub gift_preferences: Option<String>,
    pub restrictions: Option<Json<Vec<String>>>,
    pub max_budget: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Gift {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub store: Option<String>,
    pub brand: Option<String>,
    pub current_price: Option<f64>,
    pub original_price: Option<f64>,
    pub status: GiftStatus,
    pub priority: Option<String>,
    pub occasion: Option<String>,
    pub notes: Option<String>,
    pub source: GiftSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One gift ↔ recipient link with the recipient's display name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GiftRecipientLink {
    #[serde(skip)]
    pub gift_id: Uuid,
    pub recipient_id: Uuid,
    pub recipient_name: String,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GiftWithRecipients {
    #[serde(flatten)]
    pub gift: Gift,
    pub recipients: Vec<GiftRecipientLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Child {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub age: Option<i64>,
    pub avatar_color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Commitment {
    pub id: Uuid,
    pub child_id: Uuid,
    pub commitment_text: String,
    pub due_date: DateTime<Utc>,
    pub status: CommitmentStatus,
    pub category: CommitmentCategory,
    pub committed_by: Uuid,
    pub verified_by: Option<Uuid>,
    pub requested_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub reminded_at: Option<DateTime<Utc>>,
    pub extension_requested_at: Option<DateTime<Utc>>,
    pub completed_on_time: Option<bool>,
    pub related_consequence_id: Option<Uuid>,
    pub extension_reason: Option<String>,
    pub notes: Option<String>,
}

/// Commitment joined with its child's name and owning user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommitmentView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub commitment: Commitment,
    pub child_name: String,
    #[serde(skip)]
    pub owner_id: Uuid,
}

impl std::ops::Deref for CommitmentView {
    type Target = Commitment;
    fn deref(&self) -> &Self::Target {
        &self.commitment
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Consequence {
    pub id: Uuid,
    pub child_id: Uuid,
    pub restriction_type: RestrictionType,
    pub restriction_item: String,
    pub reason: String,
    pub duration_days: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: ConsequenceStatus,
    pub severity: Severity,
    pub created_by: Uuid,
    pub confirmed_by: Option<Uuid>,
    pub lifted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub lifted_at: Option<DateTime<Utc>>,
    pub related_commitment_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Consequence joined with its child's name and owning user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ConsequenceView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub consequence: Consequence,
    pub child_name: String,
    #[serde(skip)]
    pub owner_id: Uuid,
}

impl std::ops::Deref for ConsequenceView {
    type Target = Consequence;
    fn deref(&self) -> &Self::Target {
        &self.consequence
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CommitmentStats {
    pub id: Uuid,
    pub child_id: Uuid,
    /// First day of the month, `YYYY-MM-01`.
    pub month: String,
    pub total_commitments: i64,
    pub completed_on_time: i64,
    pub completed_late: i64,
    pub missed: i64,
    pub reliability_score: Option<f64>,
    pub homework_count: i64,
    pub chores_count: i64,
    pub other_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PartnerSettings {
    pub id: Uuid,
    pub user_id: Uuid,
    pub partner_phone: Option<String>,
    pub partner_name: Option<String>,
    pub notify_consequences: bool,
    pub notify_commitments: bool,
    pub notify_reminders: bool,
    pub require_both_parents: bool,
    pub quiet_hours_start: Option<String>,
    pub quiet_hours_end: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PartnerNotification {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub notification_type: NotificationType,
    pub reference_id: Uuid,
    pub reference_type: ReferenceType,
    pub partner_phone: String,
    pub partner_name: Option<String>,
    pub status: NotificationStatus,
    pub message_text: String,
    pub response_text: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub child_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SmsContext {
    pub id: Uuid,
    pub phone_number: String,
    pub user_id: Option<Uuid>,
    pub last_message: Option<String>,
    pub last_intent: Option<String>,
    pub pending_clarification: Option<String>,
    pub context_data: Option<Json<SmsContextData>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SmsContext {
    pub fn data(&self) -> SmsContextData {
        self.context_data
            .as_ref()
            .map(|j| j.0.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SmsMessage {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub phone_number: String,
    pub direction: SmsDirection,
    pub body: String,
    pub message_sid: Option<String>,
    pub intent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct WeatherCache {
    pub id: Uuid,
    pub user_id: Uuid,
    pub location: String,
    pub data: Json<WeatherData>,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn severity_follows_duration() {
        assert_eq!(Severity::from_duration(Some(1)), Severity::Minor);
        assert_eq!(Severity::from_duration(Some(2)), Severity::Minor);
        assert_eq!(Severity::from_duration(Some(3)), Severity::Medium);
        assert_eq!(Severity::from_duration(Some(7)), Severity::Major);
        assert_eq!(Severity::from_duration(None), Severity::Medium);
    }

    #[test]
    fn enums_use_snake_case_text() {
        assert_eq!(ConsequenceStatus::PendingConfirmation.to_string(), "pending_confirmation");
        assert_eq!(GiftStatus::from_str("considering").ok(), Some(GiftStatus::Considering));
        assert!(GiftStatus::from_str("lost").is_err());
    }
}
