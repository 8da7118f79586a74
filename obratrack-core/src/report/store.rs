//! Read access the report engine needs from the level store.

use chrono::{DateTime, Utc};

use crate::db::{Database, SubtreeRow};
use crate::error::Result;
use crate::types::{Material, Photo, PhotoKind};

/// Queries the report engine runs against the level store.
///
/// [`Database`] is the production implementation; anything else (a remote
/// store, a fixture) only has to answer these three queries.
pub trait LevelStore {
    /// A level and its descendants down to `max_depth`, breadth-first with depth.
    /// Empty when the root does not exist.
    fn load_subtree(&self, root_id: i64, max_depth: u32) -> Result<Vec<SubtreeRow>>;

    /// Materials attached to any of `level_ids`
    fn materials_for(&self, level_ids: &[i64]) -> Result<Vec<Material>>;

    /// Issue photos on `level_ids` created in `[start, end)`
    fn issue_photos_for(
        &self,
        level_ids: &[i64],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Photo>>;
}

impl LevelStore for Database {
    fn load_subtree(&self, root_id: i64, max_depth: u32) -> Result<Vec<SubtreeRow>> {
        Database::load_subtree(self, root_id, max_depth)
    }

    fn materials_for(&self, level_ids: &[i64]) -> Result<Vec<Material>> {
        self.list_materials(level_ids)
    }

    fn issue_photos_for(
        &self,
        level_ids: &[i64],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Photo>> {
        self.list_photos(level_ids, &PhotoKind::Issue, start, end)
    }
}
