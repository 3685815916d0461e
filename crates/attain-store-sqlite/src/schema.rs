//! SQL schema for the Attain SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS outcomes (
    outcome_id  TEXT PRIMARY KEY,
    tier        TEXT NOT NULL,   -- 'clo' | 'plo' | 'peo'
    scope_id    TEXT NOT NULL,   -- course offering (clo) or program (plo/peo)
    code        TEXT NOT NULL,
    description TEXT NOT NULL,
    created_at  TEXT NOT NULL,   -- ISO 8601 UTC; server-assigned
    UNIQUE (scope_id, tier, code)
);

-- The hierarchy is an edge list keyed by (child, parent); traversal in
-- either direction and cascade deletes are index lookups.
CREATE TABLE IF NOT EXISTS mapping_edges (
    child_id   TEXT NOT NULL REFERENCES outcomes(outcome_id),
    parent_id  TEXT NOT NULL REFERENCES outcomes(outcome_id),
    weight     TEXT NOT NULL DEFAULT '1',
    created_at TEXT NOT NULL,
    PRIMARY KEY (child_id, parent_id)
);

CREATE TABLE IF NOT EXISTS assessment_items (
    item_id     TEXT PRIMARY KEY,
    offering_id TEXT NOT NULL,
    name        TEXT NOT NULL,
    total_marks TEXT NOT NULL,   -- decimal, strictly positive
    created_at  TEXT NOT NULL
);

-- Only ever written through the atomic replace-set operation, which checks
-- the per-item conservation invariant before committing.
CREATE TABLE IF NOT EXISTS allocations (
    item_id TEXT NOT NULL REFERENCES assessment_items(item_id),
    clo_id  TEXT NOT NULL REFERENCES outcomes(outcome_id),
    marks   TEXT NOT NULL,
    PRIMARY KEY (item_id, clo_id)
);

CREATE TABLE IF NOT EXISTS score_records (
    student_id  TEXT NOT NULL,
    item_id     TEXT NOT NULL REFERENCES assessment_items(item_id),
    obtained    TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    PRIMARY KEY (student_id, item_id)
);

CREATE TABLE IF NOT EXISTS threshold_overrides (
    outcome_id TEXT PRIMARY KEY REFERENCES outcomes(outcome_id),
    excellent  TEXT NOT NULL,
    high       TEXT NOT NULL,
    medium     TEXT NOT NULL,
    low        TEXT NOT NULL
);

-- Derived results; history is retained, keyed by computation time.
-- No foreign key: rows outlive their outcome for audit purposes.
CREATE TABLE IF NOT EXISTS attainment_results (
    subject_kind      TEXT NOT NULL,   -- 'student' | 'cohort'
    subject_id        TEXT NOT NULL,
    outcome_id        TEXT NOT NULL,
    attainment        TEXT,            -- decimal percentage; NULL = undefined
    level             TEXT NOT NULL,
    items_counted     INTEGER NOT NULL,
    students_counted  INTEGER NOT NULL,
    children_measured INTEGER NOT NULL,
    children_total    INTEGER NOT NULL,
    computed_at       TEXT NOT NULL,
    PRIMARY KEY (subject_kind, subject_id, outcome_id, computed_at)
);

-- Append-only audit log of administrative corrections.
CREATE TABLE IF NOT EXISTS attainment_overrides (
    override_id  TEXT PRIMARY KEY,
    subject_kind TEXT NOT NULL,
    subject_id   TEXT NOT NULL,
    outcome_id   TEXT NOT NULL,
    previous     TEXT,               -- computed value at override time
    value        TEXT NOT NULL,
    reason       TEXT NOT NULL,
    recorded_at  TEXT NOT NULL
);

-- Single-row revision counter; bumped by every structural mutation so an
-- in-flight recompute can detect staleness before publishing.
CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
INSERT OR IGNORE INTO meta (key, value) VALUES ('revision', 0);

CREATE INDEX IF NOT EXISTS edges_parent_idx   ON mapping_edges(parent_id);
CREATE INDEX IF NOT EXISTS outcomes_scope_idx ON outcomes(scope_id, tier);
CREATE INDEX IF NOT EXISTS alloc_clo_idx      ON allocations(clo_id);
CREATE INDEX IF NOT EXISTS scores_item_idx    ON score_records(item_id);
CREATE INDEX IF NOT EXISTS results_subject_idx
    ON attainment_results(subject_kind, subject_id, outcome_id);

PRAGMA user_version = 1;
";
