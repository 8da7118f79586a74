//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Level tree, materials, photos
    r#"
    CREATE TABLE IF NOT EXISTS levels (
        id                        INTEGER PRIMARY KEY,
        parent_id                 INTEGER REFERENCES levels(id) ON DELETE CASCADE,
        name                      TEXT NOT NULL,
        description               TEXT,
        status                    TEXT NOT NULL DEFAULT 'active',
        start_date                TEXT,
        end_date                  TEXT,
        completed_at              TEXT,
        created_at                TEXT NOT NULL,
        updated_at                TEXT NOT NULL,
        hidden                    INTEGER NOT NULL DEFAULT 0,
        sort_order                INTEGER NOT NULL DEFAULT 0,
        cover_image               TEXT,
        construction_manager_id   INTEGER,
        site_director_id          INTEGER
    );

    CREATE TABLE IF NOT EXISTS materials (
        id               INTEGER PRIMARY KEY,
        level_id         INTEGER NOT NULL REFERENCES levels(id) ON DELETE CASCADE,
        name             TEXT NOT NULL,
        description      TEXT,
        quantity         REAL NOT NULL DEFAULT 0,
        unit             TEXT,
        created_at       TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS photos (
        id               INTEGER PRIMARY KEY,
        level_id         INTEGER NOT NULL REFERENCES levels(id) ON DELETE CASCADE,
        photo_url        TEXT NOT NULL,
        observations     TEXT,
        kind             TEXT NOT NULL DEFAULT 'progress',
        created_at       TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_levels_parent ON levels(parent_id, sort_order, id);
    CREATE INDEX IF NOT EXISTS idx_materials_level ON materials(level_id);
    CREATE INDEX IF NOT EXISTS idx_photos_level ON photos(level_id, kind, created_at);
    "#,
    // Version 2: completion lookups by status
    r#"
    CREATE INDEX IF NOT EXISTS idx_levels_status ON levels(status) WHERE status = 'completed';
    "#,
];

/// Bring the schema up to [`SCHEMA_VERSION`].
///
/// Each pending step runs in its own transaction together with the
/// `user_version` bump, so a failed step leaves the previous version intact.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let from = get_schema_version(conn)?;
    if from >= SCHEMA_VERSION {
        tracing::debug!(version = from, "Schema up to date");
        return Ok(());
    }

    for (version, sql) in (1..).zip(MIGRATIONS.iter()).skip(from.max(0) as usize) {
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        tracing::info!(version, "Applied schema migration");
    }

    tracing::info!(from, to = SCHEMA_VERSION, "Schema migrated");
    Ok(())
}

/// Schema version recorded in `PRAGMA user_version` (0 for a new file)
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
