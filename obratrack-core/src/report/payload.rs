//! Report payload.
//!
//! Field names are the JSON contract the frontend reads; everything is
//! serialized in camelCase.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::stats::MonthlyStats;
use crate::types::{Level, LevelStatus, Material, Photo};

/// Full progress report for one obra.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObraReport {
    pub obra: ObraSummary,
    pub monthly_stats: MonthlyStats,
    pub kpis: Kpis,
    pub progress: Vec<ProgressNode>,
    pub materials: Vec<Material>,
    pub issue_photos: Vec<IssuePhoto>,
    pub completed_tasks: Vec<CompletedTask>,
}

/// Obra metadata shown in the report header.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObraSummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: LevelStatus,
    pub cover_image: Option<String>,
    pub construction_manager_id: Option<i64>,
    pub site_director_id: Option<i64>,
}

impl From<&Level> for ObraSummary {
    fn from(level: &Level) -> Self {
        Self {
            id: level.id,
            name: level.name.clone(),
            description: level.description.clone(),
            start_date: level.start_date,
            end_date: level.end_date,
            status: level.status.clone(),
            cover_image: level.cover_image.clone(),
            construction_manager_id: level.construction_manager_id,
            site_director_id: level.site_director_id,
        }
    }
}

/// Obra-wide task totals, independent of the report's date range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
}

impl Kpis {
    pub fn from_tasks(tasks: &[&Level]) -> Self {
        let completed = tasks.iter().filter(|t| t.status.is_completed()).count();
        Self {
            total_tasks: tasks.len(),
            completed_tasks: completed,
            pending_tasks: tasks.len() - completed,
        }
    }
}

/// One node of the nested progress structure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressNode {
    pub id: i64,
    pub name: String,
    pub progress_percent: u8,
    pub status: LevelStatus,
    /// 1 for the obra's direct children
    pub level: u32,
    pub children: Vec<ProgressNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePhoto {
    pub id: i64,
    pub level_id: i64,
    pub photo_url: String,
    pub observations: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Photo> for IssuePhoto {
    fn from(photo: Photo) -> Self {
        Self {
            id: photo.id,
            level_id: photo.level_id,
            photo_url: photo.photo_url,
            observations: photo.observations,
            created_at: photo.created_at,
        }
    }
}

/// A task completed inside the report's date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTask {
    pub id: i64,
    pub name: String,
    pub status: LevelStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Level> for CompletedTask {
    fn from(level: &Level) -> Self {
        Self {
            id: level.id,
            name: level.name.clone(),
            status: level.status.clone(),
            completed_at: level.completed_at,
            updated_at: level.updated_at,
        }
    }
}
