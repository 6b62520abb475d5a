//! SQL schema for the citation capture SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS citation_targets (
    content               TEXT PRIMARY KEY,
    content_type          TEXT NOT NULL,   -- 'doi' | 'pid' | 'url'
    raw_cited_metadata    BLOB,            -- TEXT when it decodes as UTF-8
    parsed_cited_metadata TEXT NOT NULL DEFAULT '{}',
    status                TEXT NOT NULL,   -- 'REGISTERED' | 'DISCARDED' | 'DELETED'
    registered_at         TEXT,            -- first time status became REGISTERED
    created               TEXT NOT NULL,   -- ISO 8601 UTC; server-assigned
    updated               TEXT NOT NULL
);

-- One row per (citing, content). Rows are never deleted; status carries it.
CREATE TABLE IF NOT EXISTS citations (
    citing    TEXT NOT NULL,
    content   TEXT NOT NULL REFERENCES citation_targets(content),
    cited     TEXT NOT NULL,
    resolved  INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,            -- event time, microseconds since epoch
    status    TEXT NOT NULL,
    created   TEXT NOT NULL,
    updated   TEXT NOT NULL,
    CONSTRAINT citing_content_unique UNIQUE (citing, content)
);

-- Raw audit log. Append-only.
CREATE TABLE IF NOT EXISTS events (
    event_id    TEXT PRIMARY KEY,
    data        TEXT NOT NULL,
    received_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS citations_content_idx ON citations(content, status);
CREATE INDEX IF NOT EXISTS citation_targets_bibcode_idx
    ON citation_targets(json_extract(parsed_cited_metadata, '$.bibcode'));
CREATE INDEX IF NOT EXISTS citation_targets_status_idx ON citation_targets(status);

PRAGMA user_version = 1;
";
