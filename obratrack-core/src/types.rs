//! Core domain types for obratrack
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Obra** | A construction project; the root of one Level tree |
//! | **Level** | Any node of the tree (obra, building, floor, task), linked by `parent_id` |
//! | **Task** | A leaf Level below one of the obra's direct children; the unit of completion |
//! | **Material** | Material entry attached to a Level |
//! | **Photo** | Site photo attached to a Level; `issue` photos document problems |

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================
// Level
// ============================================

/// Lifecycle status of a Level.
///
/// The store keeps status as free text. `active` and `completed` are the
/// recognized values; anything else is preserved verbatim and counts as
/// not completed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum LevelStatus {
    #[default]
    Active,
    Completed,
    Other(String),
}

impl LevelStatus {
    pub fn as_str(&self) -> &str {
        match self {
            LevelStatus::Active => "active",
            LevelStatus::Completed => "completed",
            LevelStatus::Other(s) => s,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, LevelStatus::Completed)
    }
}

impl From<&str> for LevelStatus {
    fn from(s: &str) -> Self {
        match s {
            "active" => LevelStatus::Active,
            "completed" => LevelStatus::Completed,
            other => LevelStatus::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for LevelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LevelStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LevelStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(LevelStatus::from(s.as_str()))
    }
}

/// A node of the project hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub id: i64,
    /// `None` for an obra
    pub parent_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: LevelStatus,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Set when the status transitions to `completed`
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub hidden: bool,
    /// Sibling sort key
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub construction_manager_id: Option<i64>,
    #[serde(default)]
    pub site_director_id: Option<i64>,
}

impl Level {
    /// When this level was completed.
    ///
    /// Legacy rows have no `completed_at`; their last update stands in.
    pub fn effective_completed_at(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.updated_at)
    }

    pub fn is_obra(&self) -> bool {
        self.parent_id.is_none()
    }
}

// ============================================
// Materials and photos
// ============================================

/// Material entry attached to a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: i64,
    pub level_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What a photo documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum PhotoKind {
    Issue,
    #[default]
    Progress,
    Other(String),
}

impl PhotoKind {
    pub fn as_str(&self) -> &str {
        match self {
            PhotoKind::Issue => "issue",
            PhotoKind::Progress => "progress",
            PhotoKind::Other(s) => s,
        }
    }
}

impl From<&str> for PhotoKind {
    fn from(s: &str) -> Self {
        match s {
            "issue" => PhotoKind::Issue,
            "progress" => PhotoKind::Progress,
            other => PhotoKind::Other(other.to_string()),
        }
    }
}

impl Serialize for PhotoKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PhotoKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(PhotoKind::from(s.as_str()))
    }
}

/// Site photo attached to a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: i64,
    pub level_id: i64,
    pub photo_url: String,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: PhotoKind,
    pub created_at: DateTime<Utc>,
}
