use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::{max_len, required};
use crate::db::models::{
    Child, Commitment, CommitmentCategory, CommitmentStats, CommitmentStatus, CommitmentView,
    Consequence, ConsequenceStatus, ConsequenceView, RestrictionType, Severity,
};
use crate::error::StashError;
use crate::middleware::auth::AuthUser;
use crate::router::StashState;
use crate::service::dates::{MAX_DURATION_DAYS, add_days};
use crate::service::lifecycle;
use crate::service::stats::{month_start, parse_month, refresh_month};

// ---- children ----

#[derive(Debug, Deserialize)]
pub struct ChildInput {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub avatar_color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<Uuid>,
}

pub async fn list_children(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Child>>, StashError> {
    Ok(Json(state.db.accountability().children(user.id).await?))
}

pub async fn create_child(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Json(input): Json<ChildInput>,
) -> Result<(StatusCode, Json<Value>), StashError> {
    let name = required(input.name.as_deref(), "name")?;
    max_len(Some(&name), 100, "name")?;
    let child = state
        .db
        .accountability()
        .create_child(user.id, &name, input.age, input.avatar_color.as_deref())
        .await?;
    info!(user_id = %user.id, child = %child.id, "child added");
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "child": child }))))
}

pub async fn delete_child(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Query(query): Query<IdQuery>,
) -> Result<Json<Value>, StashError> {
    let id = query.id.ok_or_else(|| StashError::bad_request("id is required"))?;
    if !state.db.accountability().delete_child(user.id, id).await? {
        return Err(StashError::NotFound("Child"));
    }
    Ok(Json(json!({ "success": true })))
}

// ---- commitments ----

#[derive(Debug, Deserialize)]
pub struct CommitmentFilter {
    pub child_id: Option<Uuid>,
    pub status: Option<CommitmentStatus>,
}

#[derive(Debug, Deserialize)]
pub struct NewCommitment {
    pub child_id: Option<Uuid>,
    pub commitment_text: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: CommitmentCategory,
    #[serde(default)]
    pub status: CommitmentStatus,
    pub related_consequence_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommitmentPatch {
    pub status: Option<CommitmentStatus>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_on_time: Option<bool>,
    pub due_date: Option<DateTime<Utc>>,
    pub extension_reason: Option<String>,
    pub notes: Option<String>,
}

pub async fn list_commitments(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Query(filter): Query<CommitmentFilter>,
) -> Result<Json<Vec<CommitmentView>>, StashError> {
    let rows = state
        .db
        .accountability()
        .commitments(user.id, filter.child_id, filter.status)
        .await?;
    Ok(Json(rows))
}

pub async fn create_commitment(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Json(input): Json<NewCommitment>,
) -> Result<(StatusCode, Json<Value>), StashError> {
    let child_id = input
        .child_id
        .ok_or_else(|| StashError::bad_request("child_id is required"))?;
    let text = required(input.commitment_text.as_deref(), "commitment_text")?;
    let due_date = input
        .due_date
        .ok_or_else(|| StashError::bad_request("due_date is required"))?;

    let store = state.db.accountability();
    let child = store
        .child(user.id, child_id)
        .await?
        .ok_or(StashError::NotFound("Child"))?;
    let now = Utc::now();
    let commitment = Commitment {
        id: Uuid::new_v4(),
        child_id: child.id,
        commitment_text: text,
        due_date,
        status: input.status,
        category: input.category,
        committed_by: user.id,
        verified_by: None,
        requested_by: Some(user.id),
        created_at: now,
        completed_at: None,
        reminded_at: None,
        extension_requested_at: None,
        completed_on_time: None,
        related_consequence_id: input.related_consequence_id,
        extension_reason: None,
        notes: input.notes,
    };
    store.insert_commitment(&commitment).await?;
    info!(user_id = %user.id, child = %child.name, commitment = %commitment.id, "commitment created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "commitment": commitment })),
    ))
}

pub async fn update_commitment(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<CommitmentPatch>,
) -> Result<Json<Value>, StashError> {
    let store = state.db.accountability();
    let mut view = store
        .commitment(user.id, id)
        .await?
        .ok_or(StashError::NotFound("Commitment"))?;
    let now = Utc::now();
    let c = &mut view.commitment;

    match patch.status {
        Some(CommitmentStatus::Completed) => {
            let at = patch.completed_at.unwrap_or(now);
            lifecycle::complete_commitment(c, at, patch.completed_on_time, Some(user.id));
        }
        Some(CommitmentStatus::Missed) => lifecycle::miss_commitment(c, Some(user.id)),
        Some(CommitmentStatus::Extended) => {
            let due = patch
                .due_date
                .ok_or_else(|| StashError::bad_request("due_date is required to extend"))?;
            lifecycle::extend_commitment(c, due, now, patch.extension_reason);
        }
        Some(status) => {
            c.status = status;
            if let Some(due) = patch.due_date {
                c.due_date = due;
            }
        }
        None => {
            if let Some(due) = patch.due_date {
                c.due_date = due;
            }
        }
    }
    if patch.notes.is_some() {
        c.notes = patch.notes;
    }
    store.save_commitment(c).await?;

    let resolved = matches!(c.status, CommitmentStatus::Completed | CommitmentStatus::Missed);
    if resolved {
        refresh_month(&store, c.child_id, month_start(c.created_at)).await?;
    }
    info!(commitment = %id, status = %c.status, "commitment updated");
    Ok(Json(json!({ "success": true, "commitment": view })))
}

// ---- consequences ----

#[derive(Debug, Deserialize)]
pub struct ConsequenceFilter {
    pub child_id: Option<Uuid>,
    pub status: Option<ConsequenceStatus>,
}

#[derive(Debug, Deserialize)]
pub struct NewConsequence {
    pub child_id: Option<Uuid>,
    #[serde(default)]
    pub restriction_type: RestrictionType,
    pub restriction_item: Option<String>,
    pub reason: Option<String>,
    pub duration_days: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub severity: Option<Severity>,
    #[serde(default)]
    pub status: ConsequenceStatus,
    pub related_commitment_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConsequencePatch {
    pub status: Option<ConsequenceStatus>,
    pub extend_days: Option<i64>,
    pub notes: Option<String>,
}

pub async fn list_consequences(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Query(filter): Query<ConsequenceFilter>,
) -> Result<Json<Vec<ConsequenceView>>, StashError> {
    let rows = state
        .db
        .accountability()
        .consequences(user.id, filter.child_id, filter.status)
        .await?;
    Ok(Json(rows))
}

pub async fn create_consequence(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Json(input): Json<NewConsequence>,
) -> Result<(StatusCode, Json<Value>), StashError> {
    let child_id = input
        .child_id
        .ok_or_else(|| StashError::bad_request("child_id is required"))?;
    let item = required(input.restriction_item.as_deref(), "restriction_item")?;
    let reason = required(input.reason.as_deref(), "reason")?;
    if input
        .duration_days
        .is_some_and(|d| !(0..=MAX_DURATION_DAYS).contains(&d))
    {
        return Err(StashError::bad_request(format!(
            "duration_days must be between 0 and {MAX_DURATION_DAYS}"
        )));
    }

    let store = state.db.accountability();
    let child = store
        .child(user.id, child_id)
        .await?
        .ok_or(StashError::NotFound("Child"))?;
    let now = Utc::now();
    let expires_at = match (input.expires_at, input.duration_days) {
        (Some(at), _) => Some(at),
        (None, Some(d)) => Some(
            add_days(now, d).ok_or_else(|| StashError::bad_request("duration_days is out of range"))?,
        ),
        (None, None) => None,
    };
    let consequence = Consequence {
        id: Uuid::new_v4(),
        child_id: child.id,
        restriction_type: input.restriction_type,
        restriction_item: item,
        reason,
        duration_days: input.duration_days,
        expires_at,
        status: input.status,
        severity: input
            .severity
            .unwrap_or_else(|| Severity::from_duration(input.duration_days)),
        created_by: user.id,
        confirmed_by: None,
        lifted_by: None,
        created_at: now,
        confirmed_at: None,
        lifted_at: None,
        related_commitment_id: input.related_commitment_id,
        notes: input.notes,
    };
    store.insert_consequence(&consequence).await?;
    info!(user_id = %user.id, child = %child.name, consequence = %consequence.id, "consequence created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "consequence": consequence })),
    ))
}

pub async fn update_consequence(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<ConsequencePatch>,
) -> Result<Json<Value>, StashError> {
    let store = state.db.accountability();
    let mut view = store
        .consequence(user.id, id)
        .await?
        .ok_or(StashError::NotFound("Consequence"))?;
    let now = Utc::now();
    let q = &mut view.consequence;

    match patch.status {
        Some(ConsequenceStatus::Lifted) => lifecycle::lift_consequence(q, user.id, now),
        Some(ConsequenceStatus::Active) if q.status == ConsequenceStatus::PendingConfirmation => {
            lifecycle::confirm_consequence(q, user.id, now)
        }
        Some(ConsequenceStatus::Extended) => {
            let days = patch
                .extend_days
                .filter(|d| *d > 0)
                .ok_or_else(|| StashError::bad_request("extend_days is required to extend"))?;
            lifecycle::extend_consequence(q, days, now).map_err(|e| StashError::bad_request(e.to_string()))?;
        }
        Some(status) => q.status = status,
        None => {}
    }
    if patch.notes.is_some() {
        q.notes = patch.notes;
    }
    store.save_consequence(q).await?;
    info!(consequence = %id, status = %q.status, "consequence updated");
    Ok(Json(json!({ "success": true, "consequence": view })))
}

// ---- dashboard & stats ----

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub children: Vec<Child>,
    pub commitments: Vec<CommitmentView>,
    pub consequences: Vec<ConsequenceView>,
    pub stats: Vec<CommitmentStats>,
}

pub async fn dashboard(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Dashboard>, StashError> {
    let store = state.db.accountability();
    let children = store.children(user.id).await?;
    let commitments = store
        .commitments(user.id, None, Some(CommitmentStatus::Active))
        .await?;
    let consequences = store
        .consequences(user.id, None, Some(ConsequenceStatus::Active))
        .await?;
    let month = month_start(Utc::now());
    let mut stats = Vec::with_capacity(children.len());
    for child in &children {
        stats.push(refresh_month(&store, child.id, month).await?);
    }
    Ok(Json(Dashboard {
        children,
        commitments,
        consequences,
        stats,
    }))
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: Option<String>,
}

pub async fn child_stats(
    State(state): State<StashState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<CommitmentStats>, StashError> {
    let store = state.db.accountability();
    if store.child(user.id, id).await?.is_none() {
        return Err(StashError::NotFound("Child"));
    }
    let month = match query.month.as_deref() {
        Some(m) => parse_month(m).ok_or_else(|| StashError::bad_request("month must be YYYY-MM"))?,
        None => month_start(Utc::now()),
    };
    Ok(Json(refresh_month(&store, id, month).await?))
}
