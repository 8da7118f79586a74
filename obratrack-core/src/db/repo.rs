//! Database repository layer
//!
//! Provides query and insert operations for levels, materials and photos.

use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// A level together with its distance from the subtree root.
#[derive(Debug, Clone)]
pub struct SubtreeRow {
    pub level: Level,
    /// 0 for the root itself
    pub depth: u32,
}

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

/// Format a timestamp the way every table stores it.
///
/// Fixed-width millisecond RFC 3339 with a `Z` suffix, so text comparison in
/// SQL matches chronological order.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn get_ts(row: &Row, col: &str) -> rusqlite::Result<DateTime<Utc>> {
    let idx = row.as_ref().column_index(col)?;
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_ts_opt(row: &Row, col: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let idx = row.as_ref().column_index(col)?;
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn get_date_opt(row: &Row, col: &str) -> rusqlite::Result<Option<NaiveDate>> {
    let idx = row.as_ref().column_index(col)?;
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// `?, ?, ?` for an `IN (...)` list of `n` values.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Row counts written by [`Database::import_bundle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub levels: usize,
    pub materials: usize,
    pub photos: usize,
}

fn write_level(conn: &Connection, level: &Level) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO levels (
            id, parent_id, name, description, status, start_date, end_date,
            completed_at, created_at, updated_at, hidden, sort_order,
            cover_image, construction_manager_id, site_director_id
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
        params![
            level.id,
            level.parent_id,
            level.name,
            level.description,
            level.status.as_str(),
            level.start_date.map(|d| d.format("%Y-%m-%d").to_string()),
            level.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
            level.completed_at.map(format_ts),
            format_ts(level.created_at),
            format_ts(level.updated_at),
            level.hidden,
            level.order,
            level.cover_image,
            level.construction_manager_id,
            level.site_director_id,
        ],
    )?;
    Ok(())
}

fn write_material(conn: &Connection, material: &Material) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO materials (id, level_id, name, description, quantity, unit, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            material.id,
            material.level_id,
            material.name,
            material.description,
            material.quantity,
            material.unit,
            format_ts(material.created_at),
        ],
    )?;
    Ok(())
}

fn write_photo(conn: &Connection, photo: &Photo) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO photos (id, level_id, photo_url, observations, kind, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            photo.id,
            photo.level_id,
            photo.photo_url,
            photo.observations,
            photo.kind.as_str(),
            format_ts(photo.created_at),
        ],
    )?;
    Ok(())
}

/// Order levels so every parent precedes its children.
///
/// Fails with [`Error::UnresolvedParents`] when some parent is neither in
/// `levels` nor stored (missing, or part of a parent cycle).
fn parents_first<'a>(conn: &Connection, levels: &'a [Level]) -> Result<Vec<&'a Level>> {
    let in_bundle: HashSet<i64> = levels.iter().map(|l| l.id).collect();
    let mut known: HashSet<i64> = HashSet::new();
    for parent_id in levels.iter().filter_map(|l| l.parent_id) {
        if in_bundle.contains(&parent_id) || known.contains(&parent_id) {
            continue;
        }
        let stored = conn
            .query_row("SELECT 1 FROM levels WHERE id = ?", [parent_id], |_| Ok(()))
            .optional()?
            .is_some();
        if stored {
            known.insert(parent_id);
        }
    }

    let mut ordered = Vec::with_capacity(levels.len());
    let mut pending: Vec<&Level> = levels.iter().collect();
    while !pending.is_empty() {
        let (ready, rest): (Vec<&Level>, Vec<&Level>) = pending
            .into_iter()
            .partition(|l| l.parent_id.map_or(true, |p| known.contains(&p)));

        if ready.is_empty() {
            return Err(Error::UnresolvedParents(rest.iter().map(|l| l.id).collect()));
        }

        known.extend(ready.iter().map(|l| l.id));
        ordered.extend(ready);
        pending = rest;
    }
    Ok(ordered)
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let mut conn = self.connection();
        super::schema::run_migrations(&mut conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        // Poisoning only means another caller panicked mid-query.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ============================================
    // Level operations
    // ============================================

    /// Insert a level with a caller-assigned id
    pub fn insert_level(&self, level: &Level) -> Result<()> {
        let conn = self.connection();
        write_level(&conn, level)
    }

    /// Change a level's status at time `at`.
    ///
    /// Entering `completed` stamps `completed_at` (kept if it was already
    /// completed); any other status clears it. `updated_at` always moves to `at`.
    pub fn set_level_status(&self, id: i64, status: &LevelStatus, at: DateTime<Utc>) -> Result<()> {
        let conn = self.connection();
        let changed = conn.execute(
            r#"
            UPDATE levels SET
                completed_at = CASE
                    WHEN ?2 = 'completed'
                        THEN COALESCE(CASE WHEN status = 'completed' THEN completed_at END, ?3)
                    ELSE NULL
                END,
                status = ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
            params![id, status.as_str(), format_ts(at)],
        )?;

        if changed == 0 {
            return Err(Error::LevelNotFound(id));
        }
        tracing::debug!(level_id = id, status = %status, "Level status updated");
        Ok(())
    }

    /// Get a level by ID
    pub fn get_level(&self, id: i64) -> Result<Option<Level>> {
        let conn = self.connection();
        conn.query_row("SELECT * FROM levels WHERE id = ?", [id], |row| {
            Self::row_to_level(row)
        })
        .optional()
        .map_err(Error::from)
    }

    /// Direct children of a level, in display order
    pub fn list_children(&self, parent_id: i64) -> Result<Vec<Level>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            "SELECT * FROM levels WHERE parent_id = ? ORDER BY sort_order, id",
        )?;
        let rows = stmt
            .query_map([parent_id], Self::row_to_level)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Load a level and all of its descendants in one query.
    ///
    /// Rows are returned breadth-first (by depth, then sibling order). The walk
    /// stops at `max_depth`, so a cycle in `parent_id` cannot loop forever; a
    /// node reached twice through a cycle appears once per depth.
    pub fn load_subtree(&self, root_id: i64, max_depth: u32) -> Result<Vec<SubtreeRow>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            r#"
            WITH RECURSIVE subtree(id, depth) AS (
                SELECT id, 0 FROM levels WHERE id = ?1
                UNION ALL
                SELECT l.id, s.depth + 1
                FROM levels l
                JOIN subtree s ON l.parent_id = s.id
                WHERE s.depth < ?2
            )
            SELECT l.*, s.depth AS depth
            FROM subtree s
            JOIN levels l ON l.id = s.id
            ORDER BY s.depth, l.sort_order, l.id
            "#,
        )?;

        let rows = stmt
            .query_map(params![root_id, max_depth], |row| {
                Ok(SubtreeRow {
                    level: Self::row_to_level(row)?,
                    depth: row.get("depth")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn row_to_level(row: &Row) -> rusqlite::Result<Level> {
        let status: String = row.get("status")?;

        Ok(Level {
            id: row.get("id")?,
            parent_id: row.get("parent_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            status: LevelStatus::from(status.as_str()),
            start_date: get_date_opt(row, "start_date")?,
            end_date: get_date_opt(row, "end_date")?,
            completed_at: get_ts_opt(row, "completed_at")?,
            created_at: get_ts(row, "created_at")?,
            updated_at: get_ts(row, "updated_at")?,
            hidden: row.get("hidden")?,
            order: row.get("sort_order")?,
            cover_image: row.get("cover_image")?,
            construction_manager_id: row.get("construction_manager_id")?,
            site_director_id: row.get("site_director_id")?,
        })
    }

    // ============================================
    // Material operations
    // ============================================

    /// Insert a material entry
    pub fn insert_material(&self, material: &Material) -> Result<()> {
        let conn = self.connection();
        write_material(&conn, material)
    }

    /// Materials attached to any of the given levels, ordered by id
    pub fn list_materials(&self, level_ids: &[i64]) -> Result<Vec<Material>> {
        if level_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.connection();
        let sql = format!(
            "SELECT * FROM materials WHERE level_id IN ({}) ORDER BY id",
            placeholders(level_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(level_ids.iter()), |row| {
                Ok(Material {
                    id: row.get("id")?,
                    level_id: row.get("level_id")?,
                    name: row.get("name")?,
                    description: row.get("description")?,
                    quantity: row.get("quantity")?,
                    unit: row.get("unit")?,
                    created_at: get_ts(row, "created_at")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ============================================
    // Photo operations
    // ============================================

    /// Insert a photo record
    pub fn insert_photo(&self, photo: &Photo) -> Result<()> {
        let conn = self.connection();
        write_photo(&conn, photo)
    }

    // ============================================
    // Bulk import
    // ============================================

    /// Insert a snapshot of levels, materials and photos atomically.
    ///
    /// Levels may come in any order; each is written after its parent. A
    /// parent may also be a level already stored. Nothing is written unless
    /// every row goes in.
    pub fn import_bundle(
        &self,
        levels: &[Level],
        materials: &[Material],
        photos: &[Photo],
    ) -> Result<ImportSummary> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;

        let ordered = parents_first(&tx, levels)?;
        for level in &ordered {
            write_level(&tx, level)?;
        }
        for material in materials {
            write_material(&tx, material)?;
        }
        for photo in photos {
            write_photo(&tx, photo)?;
        }

        tx.commit()?;

        let summary = ImportSummary {
            levels: ordered.len(),
            materials: materials.len(),
            photos: photos.len(),
        };
        tracing::info!(
            levels = summary.levels,
            materials = summary.materials,
            photos = summary.photos,
            "Bundle imported"
        );
        Ok(summary)
    }

    /// Photos of one kind on the given levels with `start <= created_at < end`,
    /// newest first
    pub fn list_photos(
        &self,
        level_ids: &[i64],
        kind: &PhotoKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Photo>> {
        if level_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.connection();
        let sql = format!(
            r#"
            SELECT * FROM photos
            WHERE level_id IN ({})
              AND kind = ?
              AND created_at >= ?
              AND created_at < ?
            ORDER BY created_at DESC, id
            "#,
            placeholders(level_ids.len())
        );

        let mut values: Vec<rusqlite::types::Value> = level_ids
            .iter()
            .map(|id| rusqlite::types::Value::Integer(*id))
            .collect();
        values.push(kind.as_str().to_string().into());
        values.push(format_ts(start).into());
        values.push(format_ts(end).into());

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                let kind: String = row.get("kind")?;
                Ok(Photo {
                    id: row.get("id")?,
                    level_id: row.get("level_id")?,
                    photo_url: row.get("photo_url")?,
                    observations: row.get("observations")?,
                    kind: PhotoKind::from(kind.as_str()),
                    created_at: get_ts(row, "created_at")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn create_test_level(id: i64, parent_id: Option<i64>, order: i64) -> Level {
        Level {
            id,
            parent_id,
            name: format!("Level {}", id),
            description: None,
            status: LevelStatus::Active,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: None,
            completed_at: None,
            created_at: ts(2024, 1, 1),
            updated_at: ts(2024, 1, 1),
            hidden: false,
            order,
            cover_image: None,
            construction_manager_id: None,
            site_director_id: None,
        }
    }

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    #[test]
    fn test_level_crud() {
        let db = test_db();
        let mut obra = create_test_level(1, None, 0);
        obra.cover_image = Some("cover.jpg".to_string());
        obra.site_director_id = Some(9);
        db.insert_level(&obra).unwrap();

        let retrieved = db.get_level(1).unwrap().unwrap();
        assert_eq!(retrieved.name, "Level 1");
        assert_eq!(retrieved.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(retrieved.cover_image.as_deref(), Some("cover.jpg"));
        assert_eq!(retrieved.site_director_id, Some(9));
        assert_eq!(retrieved.created_at, obra.created_at);

        assert!(db.get_level(99).unwrap().is_none());
    }

    #[test]
    fn test_children_sorted_by_order_then_id() {
        let db = test_db();
        db.insert_level(&create_test_level(1, None, 0)).unwrap();
        db.insert_level(&create_test_level(5, Some(1), 1)).unwrap();
        db.insert_level(&create_test_level(3, Some(1), 1)).unwrap();
        db.insert_level(&create_test_level(4, Some(1), 0)).unwrap();

        let ids: Vec<i64> = db.list_children(1).unwrap().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![4, 3, 5]);
    }

    #[test]
    fn test_set_level_status_stamps_completion() {
        let db = test_db();
        db.insert_level(&create_test_level(1, None, 0)).unwrap();

        db.set_level_status(1, &LevelStatus::Completed, ts(2024, 6, 15))
            .unwrap();
        let level = db.get_level(1).unwrap().unwrap();
        assert_eq!(level.status, LevelStatus::Completed);
        assert_eq!(level.completed_at, Some(ts(2024, 6, 15)));

        // Re-saving as completed keeps the original completion time
        db.set_level_status(1, &LevelStatus::Completed, ts(2024, 6, 20))
            .unwrap();
        let level = db.get_level(1).unwrap().unwrap();
        assert_eq!(level.completed_at, Some(ts(2024, 6, 15)));
        assert_eq!(level.updated_at, ts(2024, 6, 20));

        db.set_level_status(1, &LevelStatus::from("paused"), ts(2024, 6, 21))
            .unwrap();
        let level = db.get_level(1).unwrap().unwrap();
        assert_eq!(level.status.as_str(), "paused");
        assert!(level.completed_at.is_none());

        assert!(matches!(
            db.set_level_status(77, &LevelStatus::Active, ts(2024, 6, 21)),
            Err(Error::LevelNotFound(77))
        ));
    }

    #[test]
    fn test_load_subtree_depths_and_cap() {
        let db = test_db();
        db.insert_level(&create_test_level(1, None, 0)).unwrap();
        db.insert_level(&create_test_level(2, Some(1), 0)).unwrap();
        db.insert_level(&create_test_level(3, Some(2), 0)).unwrap();
        db.insert_level(&create_test_level(4, Some(3), 0)).unwrap();
        // Unrelated obra
        db.insert_level(&create_test_level(10, None, 0)).unwrap();
        db.insert_level(&create_test_level(11, Some(10), 0)).unwrap();

        let rows = db.load_subtree(1, 20).unwrap();
        let pairs: Vec<(i64, u32)> = rows.iter().map(|r| (r.level.id, r.depth)).collect();
        assert_eq!(pairs, vec![(1, 0), (2, 1), (3, 2), (4, 3)]);

        let capped = db.load_subtree(1, 2).unwrap();
        assert_eq!(capped.len(), 3);

        assert!(db.load_subtree(404, 20).unwrap().is_empty());
    }

    #[test]
    fn test_materials_by_level() {
        let db = test_db();
        db.insert_level(&create_test_level(1, None, 0)).unwrap();
        db.insert_level(&create_test_level(2, Some(1), 0)).unwrap();
        db.insert_level(&create_test_level(3, Some(1), 1)).unwrap();

        for (id, level_id) in [(1, 2), (2, 3), (3, 1)] {
            db.insert_material(&Material {
                id,
                level_id,
                name: format!("Material {}", id),
                description: None,
                quantity: 2.5,
                unit: Some("m3".to_string()),
                created_at: ts(2024, 2, 1),
            })
            .unwrap();
        }

        let materials = db.list_materials(&[2, 3]).unwrap();
        let ids: Vec<i64> = materials.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(materials[0].unit.as_deref(), Some("m3"));

        assert!(db.list_materials(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_photos_filtered_by_kind_and_window() {
        let db = test_db();
        db.insert_level(&create_test_level(1, None, 0)).unwrap();

        let photos = [
            (1, PhotoKind::Issue, ts(2024, 6, 1)),
            (2, PhotoKind::Issue, ts(2024, 6, 30)),
            (3, PhotoKind::Progress, ts(2024, 6, 10)),
            (4, PhotoKind::Issue, ts(2024, 7, 1)),
        ];
        for (id, kind, created_at) in photos {
            db.insert_photo(&Photo {
                id,
                level_id: 1,
                photo_url: format!("https://cdn.example.com/{}.jpg", id),
                observations: Some("crack".to_string()),
                kind,
                created_at,
            })
            .unwrap();
        }

        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let found = db.list_photos(&[1], &PhotoKind::Issue, start, end).unwrap();
        let ids: Vec<i64> = found.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_import_bundle_orders_parents_first() {
        let db = test_db();
        db.insert_level(&create_test_level(1, None, 0)).unwrap();

        // Child listed before its parent; level 2 hangs off a stored obra
        let levels = vec![
            create_test_level(3, Some(2), 0),
            create_test_level(2, Some(1), 0),
        ];
        let material = Material {
            id: 1,
            level_id: 3,
            name: "Rebar".to_string(),
            description: None,
            quantity: 12.0,
            unit: Some("t".to_string()),
            created_at: ts(2024, 2, 1),
        };

        let summary = db.import_bundle(&levels, &[material], &[]).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                levels: 2,
                materials: 1,
                photos: 0
            }
        );
        assert_eq!(db.get_level(3).unwrap().unwrap().parent_id, Some(2));
        assert_eq!(db.list_materials(&[3]).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_import_writes_nothing() {
        let db = test_db();
        let levels = vec![create_test_level(1, None, 0), create_test_level(2, Some(1), 0)];
        let orphan_material = Material {
            id: 1,
            level_id: 999,
            name: "Sand".to_string(),
            description: None,
            quantity: 1.0,
            unit: None,
            created_at: ts(2024, 2, 1),
        };

        let err = db.import_bundle(&levels, &[orphan_material], &[]).unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert!(db.get_level(1).unwrap().is_none());
        assert!(db.get_level(2).unwrap().is_none());
    }

    #[test]
    fn test_import_rejects_unresolved_parents() {
        let db = test_db();
        // 5 and 6 point at each other; 7 points at a missing level
        let levels = vec![
            create_test_level(1, None, 0),
            create_test_level(5, Some(6), 0),
            create_test_level(6, Some(5), 0),
            create_test_level(7, Some(99), 0),
        ];

        let err = db.import_bundle(&levels, &[], &[]).unwrap_err();
        match err {
            Error::UnresolvedParents(mut ids) => {
                ids.sort();
                assert_eq!(ids, vec![5, 6, 7]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(db.get_level(1).unwrap().is_none());
    }

    #[test]
    fn test_format_ts_is_fixed_width() {
        let a = format_ts(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(a, "2024-06-01T00:00:00.000Z");
        let b = format_ts(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 1).unwrap());
        assert!(a < b);
    }
}
