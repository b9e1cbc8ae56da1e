//! SQL schema for the Haven SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! the `PRAGMA user_version` number.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per SOS trigger. Status only ever moves forward; terminal rows
-- ('resolved', 'canceled') are immutable.
CREATE TABLE IF NOT EXISTS incidents (
    incident_id     TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL,
    family_group_id TEXT NOT NULL,
    status          TEXT NOT NULL,   -- 'active'|'acknowledged'|'resolved'|'canceled'
    priority        TEXT NOT NULL DEFAULT 'critical',
    address         TEXT,            -- reverse-geocoded, optional
    metadata        TEXT NOT NULL DEFAULT 'null',  -- free-form JSON
    created_at      TEXT NOT NULL    -- ISO 8601 UTC
);

-- Append-only location trail scoped to an incident.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS incident_locations (
    sample_id   TEXT PRIMARY KEY,
    incident_id TEXT NOT NULL REFERENCES incidents(incident_id),
    latitude    REAL NOT NULL,
    longitude   REAL NOT NULL,
    accuracy_m  REAL NOT NULL,
    created_at  TEXT NOT NULL
);

-- Append-only family acknowledgements. Deliberately no UNIQUE on
-- (incident_id, user_id): duplicate acknowledgements are permitted by the
-- data layer and suppressed by callers.
CREATE TABLE IF NOT EXISTS incident_acknowledgements (
    ack_id          TEXT PRIMARY KEY,
    incident_id     TEXT NOT NULL REFERENCES incidents(incident_id),
    user_id         TEXT NOT NULL,
    message         TEXT,
    acknowledged_at TEXT NOT NULL
);

-- Exactly one row per user; overwritten on every position sample.
CREATE TABLE IF NOT EXISTS live_locations (
    user_id         TEXT PRIMARY KEY,
    family_group_id TEXT,
    latitude        REAL NOT NULL,
    longitude       REAL NOT NULL,
    accuracy_m      REAL NOT NULL,
    heading         REAL,
    speed           REAL,
    battery_pct     REAL,
    status          TEXT NOT NULL,   -- 'online'|'idle'|'offline'
    last_seen       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS places (
    place_id        TEXT PRIMARY KEY,
    family_group_id TEXT NOT NULL,
    name            TEXT NOT NULL,
    latitude        REAL NOT NULL CHECK (latitude  BETWEEN -90  AND 90),
    longitude       REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
    radius_m        REAL NOT NULL CHECK (radius_m  BETWEEN 50   AND 1000),
    created_by      TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sla_policies (
    policy_id                    TEXT PRIMARY KEY,
    name                         TEXT NOT NULL,
    channel                      TEXT,              -- NULL = no channel filter
    priority                     INTEGER,           -- NULL = no priority filter
    first_response_minutes       INTEGER NOT NULL,
    resolution_minutes           INTEGER NOT NULL,
    escalation_enabled           INTEGER NOT NULL DEFAULT 0,
    escalation_threshold_minutes INTEGER NOT NULL DEFAULT 0,
    escalation_target            TEXT,
    business_hours_only          INTEGER NOT NULL DEFAULT 0,
    active                       INTEGER NOT NULL DEFAULT 1,
    created_at                   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tracked_interactions (
    interaction_id    TEXT PRIMARY KEY,
    channel           TEXT NOT NULL,
    priority          INTEGER NOT NULL,
    subject           TEXT,
    status            TEXT NOT NULL,   -- 'open'|'pending'|'escalated'|'resolved'|'closed'
    assigned_to       TEXT,
    first_response_at TEXT,
    response_due_at   TEXT,
    created_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sla_breaches (
    breach_id      TEXT PRIMARY KEY,
    interaction_id TEXT NOT NULL REFERENCES tracked_interactions(interaction_id),
    policy_id      TEXT NOT NULL REFERENCES sla_policies(policy_id),
    kind           TEXT NOT NULL,   -- 'first_response'|'resolution'
    target_minutes INTEGER NOT NULL,
    actual_minutes INTEGER NOT NULL,
    breached_at    TEXT NOT NULL,
    resolved_at    TEXT
);

-- Backstop for the idempotent breach insert: at most one unresolved breach
-- per (interaction, kind) even under racing writers.
CREATE UNIQUE INDEX IF NOT EXISTS sla_breaches_open_idx
    ON sla_breaches(interaction_id, kind) WHERE resolved_at IS NULL;

CREATE INDEX IF NOT EXISTS incidents_family_idx ON incidents(family_group_id);
CREATE INDEX IF NOT EXISTS incidents_status_idx ON incidents(status);
CREATE INDEX IF NOT EXISTS locations_incident_idx
    ON incident_locations(incident_id, created_at);
CREATE INDEX IF NOT EXISTS acks_incident_idx
    ON incident_acknowledgements(incident_id);
CREATE INDEX IF NOT EXISTS live_family_idx ON live_locations(family_group_id);
CREATE INDEX IF NOT EXISTS places_family_idx ON places(family_group_id);
CREATE INDEX IF NOT EXISTS interactions_status_idx
    ON tracked_interactions(status);
CREATE INDEX IF NOT EXISTS interactions_created_idx
    ON tracked_interactions(created_at);
CREATE INDEX IF NOT EXISTS breaches_interaction_idx
    ON sla_breaches(interaction_id);

PRAGMA user_version = 1;
";
