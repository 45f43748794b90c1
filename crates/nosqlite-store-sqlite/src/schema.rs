//! Bootstrap DDL for the NoSqlite store.
//!
//! Only the fixed part of the schema lives here. Generated columns and their
//! indexes are added at runtime as fields are promoted.

/// Table holding one row per ingested document.
pub const DATA_TABLE: &str = "data";

/// Full bootstrap DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per promoted field. Rows are upserted, never deleted.
CREATE TABLE IF NOT EXISTS mappings (
    field    TEXT PRIMARY KEY,
    jsType   TEXT NOT NULL,     -- 'bigint' | 'number' | 'string' | 'boolean'
    sqlType  TEXT NOT NULL,     -- 'INTEGER' | 'REAL' | 'TEXT'
    indexed  INTEGER NOT NULL DEFAULT 0
);

-- Documents are append-only. Every promoted field is a virtual column
-- computed from _source.
CREATE TABLE IF NOT EXISTS data (
    _source  TEXT NOT NULL CHECK (json_valid(_source))
);

PRAGMA user_version = 1;
";
