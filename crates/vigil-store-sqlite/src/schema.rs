//! SQL schema for the Vigil SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Last protocol sequence handed out per tenant and year.
CREATE TABLE IF NOT EXISTS protocol_counters (
    tenant_id TEXT    NOT NULL,
    year      INTEGER NOT NULL,
    last_seq  INTEGER NOT NULL,
    PRIMARY KEY (tenant_id, year)
);

CREATE TABLE IF NOT EXISTS occurrences (
    occurrence_id      TEXT PRIMARY KEY,
    tenant_id          TEXT NOT NULL,
    protocol           TEXT NOT NULL,
    kind               TEXT NOT NULL,
    subtype            TEXT NOT NULL,
    description        TEXT NOT NULL,
    location           TEXT,
    immediate_action   TEXT,
    occurred_at        TEXT,
    reported_by        TEXT NOT NULL,
    status             TEXT NOT NULL,
    triage             TEXT,            -- written once, never changed
    outcomes           TEXT NOT NULL DEFAULT '[]',
    handoff_doctor     TEXT,            -- JSON DoctorContact
    handoff_token_hash TEXT UNIQUE,     -- NULL once answered
    handoff_issued_at  TEXT,
    handoff_expires_at TEXT,
    doctor_review      TEXT,            -- JSON DoctorReview
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    triaged_at         TEXT,
    outcome_at         TEXT,
    closed_at          TEXT,
    UNIQUE (tenant_id, protocol)
);

-- At most one per occurrence.
CREATE TABLE IF NOT EXISTS external_notifications (
    occurrence_id TEXT PRIMARY KEY REFERENCES occurrences(occurrence_id),
    agency        TEXT NOT NULL,
    notified_on   TEXT NOT NULL,
    responsible   TEXT NOT NULL,
    attachment_id TEXT,
    recorded_at   TEXT NOT NULL
);

-- Rows are never deleted; status only moves forward.
CREATE TABLE IF NOT EXISTS corrective_actions (
    capa_id           TEXT PRIMARY KEY,
    occurrence_id     TEXT NOT NULL REFERENCES occurrences(occurrence_id),
    tenant_id         TEXT NOT NULL,
    root_cause        TEXT NOT NULL,
    action            TEXT NOT NULL,
    responsible       TEXT NOT NULL,
    deadline          TEXT NOT NULL,   -- YYYY-MM-DD
    status            TEXT NOT NULL,
    evidence          TEXT,
    verification_note TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS attachments (
    attachment_id TEXT PRIMARY KEY,
    occurrence_id TEXT NOT NULL REFERENCES occurrences(occurrence_id),
    tenant_id     TEXT NOT NULL,
    file_name     TEXT NOT NULL,
    mime_type     TEXT NOT NULL,
    size_bytes    INTEGER NOT NULL,
    storage_path  TEXT NOT NULL,
    content_hash  TEXT NOT NULL,
    uploaded_by   TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

-- Strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS status_history (
    change_id     TEXT PRIMARY KEY,
    occurrence_id TEXT NOT NULL REFERENCES occurrences(occurrence_id),
    from_status   TEXT,
    to_status     TEXT NOT NULL,
    actor         TEXT NOT NULL,
    reason        TEXT,
    recorded_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS occurrences_tenant_idx  ON occurrences(tenant_id, created_at);
CREATE INDEX IF NOT EXISTS occurrences_status_idx  ON occurrences(tenant_id, status);
CREATE INDEX IF NOT EXISTS capa_occurrence_idx     ON corrective_actions(occurrence_id);
CREATE INDEX IF NOT EXISTS attachment_occurrence_idx ON attachments(occurrence_id);
CREATE INDEX IF NOT EXISTS history_occurrence_idx  ON status_history(occurrence_id);

PRAGMA user_version = 1;
";
