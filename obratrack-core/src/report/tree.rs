//! In-memory level tree for one obra.
//!
//! The tree is materialized from a single bulk subtree query and then walked
//! in memory: leaf classification, per-node progress and the nested progress
//! structure all come from the same snapshot.

use std::collections::{HashMap, HashSet};

use super::payload::ProgressNode;
use super::store::LevelStore;
use crate::db::SubtreeRow;
use crate::error::{Error, Result};
use crate::types::Level;

/// Depth of the nested progress structure (building → floor → task).
pub const PROGRESS_DEPTH: u32 = 3;

/// Materialized descendant set of a root level.
#[derive(Debug)]
pub struct LevelTree {
    root_id: i64,
    /// Shallowest occurrence first
    nodes: Vec<Level>,
    depths: Vec<u32>,
    index: HashMap<i64, usize>,
    /// Child positions per node, in sibling order
    children: HashMap<i64, Vec<usize>>,
    /// Ids referenced as `parent_id` by some node of the set
    parents: HashSet<i64>,
    truncated: bool,
}

impl LevelTree {
    /// Load the subtree under `root_id` from the store.
    ///
    /// Fetches one level past `max_depth` so truncation can be reported; those
    /// extra rows never enter the tree.
    pub fn materialize<S: LevelStore + ?Sized>(
        store: &S,
        root_id: i64,
        max_depth: u32,
    ) -> Result<Self> {
        let rows = store.load_subtree(root_id, max_depth.saturating_add(1))?;
        let tree = Self::from_rows(root_id, rows, max_depth);
        if tree.root().is_none() {
            return Err(Error::LevelNotFound(root_id));
        }

        tracing::debug!(
            root_id,
            nodes = tree.len(),
            truncated = tree.truncated,
            "Level tree materialized"
        );
        Ok(tree)
    }

    /// Build the tree from depth-annotated rows (ordered by depth).
    ///
    /// Rows past `max_depth` mark the tree truncated only when they bring an
    /// id not already in the set.
    pub fn from_rows(root_id: i64, rows: Vec<SubtreeRow>, max_depth: u32) -> Self {
        let mut nodes = Vec::with_capacity(rows.len());
        let mut depths = Vec::with_capacity(rows.len());
        let mut index = HashMap::with_capacity(rows.len());
        let mut truncated = false;

        for row in rows {
            if row.depth > max_depth {
                // A revisit through a parent cycle is not a cut-off level
                if !index.contains_key(&row.level.id) {
                    truncated = true;
                }
                continue;
            }
            if index.contains_key(&row.level.id) {
                continue;
            }
            index.insert(row.level.id, nodes.len());
            depths.push(row.depth);
            nodes.push(row.level);
        }

        let parents: HashSet<i64> = nodes.iter().filter_map(|level| level.parent_id).collect();

        // Only edges that go exactly one level down; this keeps the index
        // acyclic even when the stored parent links are not.
        let mut children: HashMap<i64, Vec<usize>> = HashMap::new();
        for (pos, level) in nodes.iter().enumerate() {
            let Some(parent_id) = level.parent_id else {
                continue;
            };
            if let Some(&parent_pos) = index.get(&parent_id) {
                if depths[pos] == depths[parent_pos] + 1 {
                    children.entry(parent_id).or_default().push(pos);
                }
            }
        }
        for siblings in children.values_mut() {
            siblings.sort_by_key(|&pos| (nodes[pos].order, nodes[pos].id));
        }

        Self {
            root_id,
            nodes,
            depths,
            index,
            children,
            parents,
            truncated,
        }
    }

    pub fn root(&self) -> Option<&Level> {
        self.get(self.root_id)
    }

    pub fn root_id(&self) -> i64 {
        self.root_id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether levels below the depth cap were left out.
    ///
    /// When set, a node at the cap whose children were cut off is classified
    /// as a leaf.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn get(&self, id: i64) -> Option<&Level> {
        self.index.get(&id).map(|&pos| &self.nodes[pos])
    }

    /// Distance from the root (root = 0)
    pub fn depth_of(&self, id: i64) -> Option<u32> {
        self.index.get(&id).map(|&pos| self.depths[pos])
    }

    /// Direct children of `id` ordered by `order`, then `id`
    pub fn children(&self, id: i64) -> impl Iterator<Item = &Level> {
        self.children
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&pos| &self.nodes[pos])
    }

    /// A node is a leaf when no node of this set names it as parent.
    pub fn is_leaf(&self, id: i64) -> bool {
        self.index.contains_key(&id) && !self.parents.contains(&id)
    }

    pub fn leaves(&self) -> impl Iterator<Item = &Level> {
        self.nodes.iter().filter(|level| self.is_leaf(level.id))
    }

    /// Leaves that count as tasks: everything below the obra's direct children.
    ///
    /// Direct children of the obra are groupings even when empty.
    pub fn tasks(&self) -> Vec<&Level> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(pos, level)| self.depths[*pos] >= 2 && self.is_leaf(level.id))
            .map(|(_, level)| level)
            .collect()
    }

    /// Leaf descendants of `id`, excluding `id` itself.
    pub fn leaf_descendants(&self, id: i64) -> Vec<&Level> {
        let mut leaves = Vec::new();
        let mut stack: Vec<usize> = self.children.get(&id).cloned().unwrap_or_default();

        while let Some(pos) = stack.pop() {
            let level = &self.nodes[pos];
            if self.is_leaf(level.id) {
                leaves.push(level);
            }
            if let Some(kids) = self.children.get(&level.id) {
                stack.extend(kids.iter().copied());
            }
        }
        leaves
    }

    /// Rounded share of completed leaf descendants, 0-100.
    ///
    /// A node without leaf descendants reports 0.
    pub fn progress_percent(&self, id: i64) -> u8 {
        let leaves = self.leaf_descendants(id);
        if leaves.is_empty() {
            return 0;
        }
        let completed = leaves.iter().filter(|l| l.status.is_completed()).count();
        (100.0 * completed as f64 / leaves.len() as f64).round() as u8
    }

    /// Nested progress for the root's children, `max_level` levels deep.
    ///
    /// Deeper nodes are not expanded but still count toward their ancestors.
    pub fn progress(&self, max_level: u32) -> Vec<ProgressNode> {
        self.progress_level(self.root_id, 1, max_level)
    }

    fn progress_level(&self, parent_id: i64, level: u32, max_level: u32) -> Vec<ProgressNode> {
        if level > max_level {
            return Vec::new();
        }
        self.children(parent_id)
            .map(|child| ProgressNode {
                id: child.id,
                name: child.name.clone(),
                progress_percent: self.progress_percent(child.id),
                status: child.status.clone(),
                level,
                children: self.progress_level(child.id, level + 1, max_level),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LevelStatus;
    use chrono::{TimeZone, Utc};

    fn level(id: i64, parent_id: Option<i64>, order: i64, status: LevelStatus) -> Level {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        Level {
            id,
            parent_id,
            name: format!("L{}", id),
            description: None,
            status,
            start_date: None,
            end_date: None,
            completed_at: None,
            created_at: ts,
            updated_at: ts,
            hidden: false,
            order,
            cover_image: None,
            construction_manager_id: None,
            site_director_id: None,
        }
    }

    fn row(id: i64, parent_id: Option<i64>, depth: u32) -> SubtreeRow {
        row_with(id, parent_id, depth, 0, LevelStatus::Active)
    }

    fn row_with(
        id: i64,
        parent_id: Option<i64>,
        depth: u32,
        order: i64,
        status: LevelStatus,
    ) -> SubtreeRow {
        SubtreeRow {
            level: level(id, parent_id, order, status),
            depth,
        }
    }

    /// obra(1) → A(2, order 0) → {4 completed, 5 active}; obra → B(3, order 1)
    fn scenario_tree() -> LevelTree {
        LevelTree::from_rows(
            1,
            vec![
                row(1, None, 0),
                row_with(2, Some(1), 1, 0, LevelStatus::Active),
                row_with(3, Some(1), 1, 1, LevelStatus::Active),
                row_with(4, Some(2), 2, 0, LevelStatus::Completed),
                row_with(5, Some(2), 2, 1, LevelStatus::Active),
            ],
            20,
        )
    }

    #[test]
    fn test_leaf_classification() {
        let tree = scenario_tree();
        assert_eq!(tree.root().map(|l| l.id), Some(1));
        assert_eq!(tree.len(), 5);
        assert!(!tree.is_leaf(1));
        assert!(!tree.is_leaf(2));
        assert!(tree.is_leaf(3));
        assert!(tree.is_leaf(4));
        assert!(tree.is_leaf(5));
        assert!(!tree.is_leaf(99));

        let mut leaves: Vec<i64> = tree.leaves().map(|l| l.id).collect();
        leaves.sort();
        assert_eq!(leaves, vec![3, 4, 5]);
    }

    #[test]
    fn test_tasks_skip_obra_children() {
        let tree = scenario_tree();
        let ids: Vec<i64> = tree.tasks().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[test]
    fn test_progress_percent() {
        let tree = scenario_tree();
        assert_eq!(tree.progress_percent(2), 50);
        // No leaf descendants
        assert_eq!(tree.progress_percent(3), 0);
        assert_eq!(tree.progress_percent(4), 0);
        assert_eq!(tree.progress_percent(1), 33);
    }

    #[test]
    fn test_progress_percent_extremes() {
        let rows = vec![
            row(1, None, 0),
            row(2, Some(1), 1),
            row_with(3, Some(2), 2, 0, LevelStatus::Completed),
            row_with(4, Some(2), 2, 1, LevelStatus::Completed),
            row(5, Some(1), 1),
            row_with(6, Some(5), 2, 0, LevelStatus::Active),
            row_with(7, Some(5), 2, 1, LevelStatus::from("blocked")),
        ];
        let tree = LevelTree::from_rows(1, rows, 20);
        assert_eq!(tree.progress_percent(2), 100);
        assert_eq!(tree.progress_percent(5), 0);
    }

    #[test]
    fn test_progress_rounds_to_nearest() {
        // 1 of 8 = 12.5% -> 13, 2 of 3 = 66.7% -> 67
        let mut rows = vec![row(1, None, 0), row(2, Some(1), 1), row(3, Some(1), 1)];
        rows.push(row_with(10, Some(2), 2, 0, LevelStatus::Completed));
        for id in 11..18 {
            rows.push(row(id, Some(2), 2));
        }
        rows.push(row_with(20, Some(3), 2, 0, LevelStatus::Completed));
        rows.push(row_with(21, Some(3), 2, 1, LevelStatus::Completed));
        rows.push(row(22, Some(3), 2));

        let tree = LevelTree::from_rows(1, rows, 20);
        assert_eq!(tree.progress_percent(2), 13);
        assert_eq!(tree.progress_percent(3), 67);
    }

    #[test]
    fn test_progress_structure_and_ordering() {
        let tree = scenario_tree();
        let progress = tree.progress(PROGRESS_DEPTH);

        assert_eq!(progress.len(), 2);
        assert_eq!(progress[0].id, 2);
        assert_eq!(progress[0].progress_percent, 50);
        assert_eq!(progress[0].level, 1);
        assert_eq!(progress[1].id, 3);
        assert_eq!(progress[1].progress_percent, 0);
        assert!(progress[1].children.is_empty());

        let tasks: Vec<(i64, u32)> = progress[0]
            .children
            .iter()
            .map(|c| (c.id, c.level))
            .collect();
        assert_eq!(tasks, vec![(4, 2), (5, 2)]);
    }

    #[test]
    fn test_siblings_ordered_by_order_then_id() {
        let rows = vec![
            row(1, None, 0),
            row_with(9, Some(1), 1, 2, LevelStatus::Active),
            row_with(8, Some(1), 1, 1, LevelStatus::Active),
            row_with(7, Some(1), 1, 1, LevelStatus::Active),
        ];
        let tree = LevelTree::from_rows(1, rows, 20);
        let ids: Vec<i64> = tree.children(1).map(|l| l.id).collect();
        assert_eq!(ids, vec![7, 8, 9]);
    }

    #[test]
    fn test_progress_stops_at_third_level_but_counts_deeper_leaves() {
        // 1 → 2 → 3 → 4 → 5 (completed), 4 → 6 (active)
        let rows = vec![
            row(1, None, 0),
            row(2, Some(1), 1),
            row(3, Some(2), 2),
            row(4, Some(3), 3),
            row_with(5, Some(4), 4, 0, LevelStatus::Completed),
            row(6, Some(4), 4),
        ];
        let tree = LevelTree::from_rows(1, rows, 20);
        let progress = tree.progress(PROGRESS_DEPTH);

        let level3 = &progress[0].children[0].children[0];
        assert_eq!(level3.id, 4);
        assert_eq!(level3.level, 3);
        assert!(level3.children.is_empty());
        assert_eq!(level3.progress_percent, 50);
        assert_eq!(progress[0].progress_percent, 50);
    }

    #[test]
    fn test_depth_cap_turns_cut_parent_into_leaf() {
        // Chain 0..=21 below root 100: node at depth 21 is cut off.
        let mut rows = vec![row(100, None, 0)];
        for depth in 1..=21u32 {
            let id = 100 + depth as i64;
            rows.push(row(id, Some(id - 1), depth));
        }

        let tree = LevelTree::from_rows(100, rows, 20);
        assert!(tree.is_truncated());
        assert!(tree.get(121).is_none());
        assert_eq!(tree.len(), 21);
        // Depth-20 node lost its only child and now counts as a leaf task
        assert!(tree.is_leaf(120));
        let tasks: Vec<i64> = tree.tasks().iter().map(|l| l.id).collect();
        assert_eq!(tasks, vec![120]);
    }

    #[test]
    fn test_duplicates_and_cycles_are_ignored() {
        // 1 → 2 → 3 and 3 claims 1's slot again through a cycle
        let root = level(1, Some(3), 0, LevelStatus::Active);
        let rows = vec![
            SubtreeRow { level: root.clone(), depth: 0 },
            row(2, Some(1), 1),
            row(3, Some(2), 2),
            SubtreeRow { level: root, depth: 3 },
            row(2, Some(1), 4),
        ];
        let tree = LevelTree::from_rows(1, rows, 20);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.depth_of(1), Some(0));
        assert!(tree.children(3).next().is_none());
        assert_eq!(tree.leaf_descendants(1).len(), 0);
        assert!(!tree.is_leaf(3));
    }

    #[test]
    fn test_cycle_past_cap_is_not_truncation() {
        // Root 1 sits in a cycle 1 → 2 → 3 → 1; the walk revisits 1 and 2
        let root = level(1, Some(3), 0, LevelStatus::Active);
        let rows = vec![
            SubtreeRow { level: root.clone(), depth: 0 },
            row(2, Some(1), 1),
            row(3, Some(2), 2),
            SubtreeRow { level: root, depth: 3 },
        ];
        let tree = LevelTree::from_rows(1, rows, 2);
        assert!(!tree.is_truncated());
        assert_eq!(tree.len(), 3);

        // A new id past the cap still counts as truncation
        let rows = vec![
            row(1, None, 0),
            row(2, Some(1), 1),
            row(3, Some(2), 2),
            row(4, Some(3), 3),
        ];
        assert!(LevelTree::from_rows(1, rows, 2).is_truncated());
    }
}
