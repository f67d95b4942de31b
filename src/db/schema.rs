//! SQL DDL for all diary tables.
//!
//! Defines the `diaries`, `photos`, `albums`, `diary_albums`, `diary_log`, and
//! `schema_meta` tables. All DDL uses `IF NOT EXISTS` for idempotent
//! initialization.

use rusqlite::Connection;

/// All schema DDL statements for the diary engine's core tables.
const SCHEMA_SQL: &str = r#"
-- Diary entries; deleted_at marks the trash
CREATE TABLE IF NOT EXISTS diaries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL DEFAULT '',
    mood TEXT,
    favorite INTEGER NOT NULL DEFAULT 0 CHECK(favorite IN (0, 1)),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_diaries_owner ON diaries(owner_id);
CREATE INDEX IF NOT EXISTS idx_diaries_deleted ON diaries(deleted_at);

-- Photo assets; diary_id IS NULL means temporary
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    captured_at TEXT,
    latitude REAL,
    longitude REAL,
    country TEXT,
    admin1 TEXT,
    locality TEXT,
    sequence INTEGER CHECK(sequence IS NULL OR sequence >= 1),
    diary_id INTEGER REFERENCES diaries(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    UNIQUE(diary_id, sequence)
);

CREATE INDEX IF NOT EXISTS idx_photos_owner ON photos(owner_id);
CREATE INDEX IF NOT EXISTS idx_photos_diary ON photos(diary_id);

-- Location albums, unique by name per owner
CREATE TABLE IF NOT EXISTS albums (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    cover_url TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(owner_id, name)
);

-- Diary/album membership, maintained by the reconciler
CREATE TABLE IF NOT EXISTS diary_albums (
    diary_id INTEGER NOT NULL REFERENCES diaries(id) ON DELETE CASCADE,
    album_id INTEGER NOT NULL REFERENCES albums(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    PRIMARY KEY (diary_id, album_id)
);

CREATE INDEX IF NOT EXISTS idx_diary_albums_album ON diary_albums(album_id);

-- Audit log
CREATE TABLE IF NOT EXISTS diary_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL CHECK(operation IN ('upload','finalize','discard','delete_photo','create','soft_delete','restore','purge','link','unlink','locate')),
    entity_id INTEGER NOT NULL,
    details TEXT,
    created_at TEXT NOT NULL
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
