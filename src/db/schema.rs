//! SQL DDL for the GiftStash store (SQLite).
//!
//! Ids are UUIDs stored as 16-byte BLOBs, timestamps are RFC3339 TEXT written
//! by the application, enums are snake_case TEXT. Ownership scoping relies on
//! `user_id` columns and the cascading foreign keys below.
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BLOB PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    full_name TEXT NULL,
    phone_number TEXT NULL,
    api_key TEXT NOT NULL UNIQUE,
    sms_onboarded INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_phone ON users(phone_number);

CREATE TABLE IF NOT EXISTS recipients (
    id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    relationship TEXT NOT NULL,
    nickname TEXT NULL,
    birthday TEXT NULL, -- YYYY-MM-DD
    age_range TEXT NULL,
    gender TEXT NULL,
    interests TEXT NULL, -- JSON array
    gift_preferences TEXT NULL,
    restrictions TEXT NULL, -- JSON array
    max_budget REAL NULL,
    notes TEXT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_recipients_user ON recipients(user_id);

CREATE TABLE IF NOT EXISTS gifts (
    id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT NULL,
    category TEXT NULL,
    url TEXT NULL,
    image_url TEXT NULL,
    store TEXT NULL,
    brand TEXT NULL,
    current_price REAL NULL,
    original_price REAL NULL,
    status TEXT NOT NULL DEFAULT 'idea',
    priority TEXT NULL,
    occasion TEXT NULL,
    notes TEXT NULL,
    source TEXT NOT NULL DEFAULT 'manual',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_gifts_user ON gifts(user_id);

CREATE TABLE IF NOT EXISTS gift_recipients (
    id BLOB PRIMARY KEY,
    gift_id BLOB NOT NULL REFERENCES gifts(id) ON DELETE CASCADE,
    recipient_id BLOB NOT NULL REFERENCES recipients(id) ON DELETE CASCADE,
    status TEXT NULL,
    notes TEXT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(gift_id, recipient_id)
);

CREATE TABLE IF NOT EXISTS children (
    id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    age INTEGER NULL,
    avatar_color TEXT NOT NULL DEFAULT '#6366f1',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_children_user ON children(user_id);

CREATE TABLE IF NOT EXISTS commitments (
    id BLOB PRIMARY KEY,
    child_id BLOB NOT NULL REFERENCES children(id) ON DELETE CASCADE,
    commitment_text TEXT NOT NULL,
    due_date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    category TEXT NOT NULL DEFAULT 'other',
    committed_by BLOB NOT NULL,
    verified_by BLOB NULL,
    requested_by BLOB NULL,
    created_at TEXT NOT NULL,
    completed_at TEXT NULL,
    reminded_at TEXT NULL,
    extension_requested_at TEXT NULL,
    completed_on_time INTEGER NULL,
    related_consequence_id BLOB NULL,
    extension_reason TEXT NULL,
    notes TEXT NULL
);

CREATE INDEX IF NOT EXISTS idx_commitments_child ON commitments(child_id);
CREATE INDEX IF NOT EXISTS idx_commitments_status ON commitments(status);

CREATE TABLE IF NOT EXISTS consequences (
    id BLOB PRIMARY KEY,
    child_id BLOB NOT NULL REFERENCES children(id) ON DELETE CASCADE,
    restriction_type TEXT NOT NULL DEFAULT 'other',
    restriction_item TEXT NOT NULL,
    reason TEXT NOT NULL,
    duration_days INTEGER NULL,
    expires_at TEXT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    severity TEXT NOT NULL DEFAULT 'medium',
    created_by BLOB NOT NULL,
    confirmed_by BLOB NULL,
    lifted_by BLOB NULL,
    created_at TEXT NOT NULL,
    confirmed_at TEXT NULL,
    lifted_at TEXT NULL,
    related_commitment_id BLOB NULL,
    notes TEXT NULL
);

CREATE INDEX IF NOT EXISTS idx_consequences_child ON consequences(child_id);
CREATE INDEX IF NOT EXISTS idx_consequences_status ON consequences(status);

CREATE TABLE IF NOT EXISTS commitment_stats (
    id BLOB PRIMARY KEY,
    child_id BLOB NOT NULL REFERENCES children(id) ON DELETE CASCADE,
    month TEXT NOT NULL, -- YYYY-MM-01
    total_commitments INTEGER NOT NULL DEFAULT 0,
    completed_on_time INTEGER NOT NULL DEFAULT 0,
    completed_late INTEGER NOT NULL DEFAULT 0,
    missed INTEGER NOT NULL DEFAULT 0,
    reliability_score REAL NULL,
    homework_count INTEGER NOT NULL DEFAULT 0,
    chores_count INTEGER NOT NULL DEFAULT 0,
    other_count INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    UNIQUE(child_id, month)
);

CREATE TABLE IF NOT EXISTS partner_settings (
    id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    partner_phone TEXT NULL,
    partner_name TEXT NULL,
    notify_consequences INTEGER NOT NULL DEFAULT 1,
    notify_commitments INTEGER NOT NULL DEFAULT 1,
    notify_reminders INTEGER NOT NULL DEFAULT 1,
    require_both_parents INTEGER NOT NULL DEFAULT 0,
    quiet_hours_start TEXT NULL, -- HH:MM
    quiet_hours_end TEXT NULL, -- HH:MM
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS partner_notifications (
    id BLOB PRIMARY KEY,
    user_id BLOB NULL,
    notification_type TEXT NOT NULL,
    reference_id BLOB NOT NULL,
    reference_type TEXT NOT NULL,
    partner_phone TEXT NOT NULL,
    partner_name TEXT NULL,
    status TEXT NOT NULL DEFAULT 'sent',
    message_text TEXT NOT NULL,
    response_text TEXT NULL,
    sent_at TEXT NOT NULL,
    responded_at TEXT NULL,
    child_name TEXT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_partner_notifications_ref ON partner_notifications(reference_id);

CREATE TABLE IF NOT EXISTS sms_context (
    id BLOB PRIMARY KEY,
    phone_number TEXT NOT NULL UNIQUE,
    user_id BLOB NULL,
    last_message TEXT NULL,
    last_intent TEXT NULL,
    pending_clarification TEXT NULL,
    context_data TEXT NULL, -- JSON object
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sms_messages (
    id BLOB PRIMARY KEY,
    user_id BLOB NULL,
    phone_number TEXT NOT NULL,
    direction TEXT NOT NULL, -- inbound / outbound
    body TEXT NOT NULL,
    message_sid TEXT NULL,
    intent TEXT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sms_messages_phone ON sms_messages(phone_number);

CREATE TABLE IF NOT EXISTS weather_cache (
    id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    location TEXT NOT NULL,
    data TEXT NOT NULL, -- JSON forecast
    fetched_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);
"#;
