//! SQL schema for the Nudge SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id      TEXT PRIMARY KEY,
    credential_ref  TEXT NOT NULL,
    destination     TEXT NOT NULL,
    active          INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

-- Activities are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS activities (
    activity_id     TEXT PRIMARY KEY,
    subject_id      TEXT NOT NULL REFERENCES subjects(subject_id),
    course_code     TEXT NOT NULL,
    activity_type   TEXT NOT NULL,
    title           TEXT NOT NULL,
    start_at        TEXT,              -- RFC 3339 UTC or NULL
    due_at          TEXT NOT NULL,     -- RFC 3339 UTC
    link            TEXT NOT NULL,
    identity        TEXT NOT NULL,     -- hex SHA-256 content digest
    created_at      TEXT NOT NULL,
    UNIQUE (identity)
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id   TEXT PRIMARY KEY,
    activity_id       TEXT NOT NULL REFERENCES activities(activity_id),
    subject_id        TEXT NOT NULL REFERENCES subjects(subject_id),
    notification_type TEXT NOT NULL,   -- 'start' | 'reminder'
    scheduled_for     TEXT NOT NULL,
    status            TEXT NOT NULL DEFAULT 'pending',
    sent_at           TEXT,
    error             TEXT,
    attempts          INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL,
    UNIQUE (activity_id, notification_type)
);

CREATE INDEX IF NOT EXISTS activities_subject_due_idx ON activities(subject_id, due_at);
CREATE INDEX IF NOT EXISTS notifications_due_idx      ON notifications(status, scheduled_for);
CREATE INDEX IF NOT EXISTS notifications_subject_idx  ON notifications(subject_id);

PRAGMA user_version = 1;
";
