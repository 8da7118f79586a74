//! Report assembly: one obra, one date range, one payload.

use chrono::NaiveDate;

use super::payload::{CompletedTask, IssuePhoto, Kpis, ObraReport, ObraSummary};
use super::range::ReportRange;
use super::stats::MonthlyStats;
use super::store::LevelStore;
use super::tree::{LevelTree, PROGRESS_DEPTH};
use crate::config::ReportConfig;
use crate::error::{Error, Result};
use crate::types::Level;

/// Build the report for `obra_id`.
///
/// KPIs, progress and monthly statistics cover the whole tree regardless of
/// `range`; issue photos and the completed-task list are limited to it.
/// `today` anchors the monthly statistics. Any failure aborts the whole report.
pub fn generate_report<S: LevelStore + ?Sized>(
    store: &S,
    obra_id: i64,
    range: &ReportRange,
    today: NaiveDate,
    config: &ReportConfig,
) -> Result<ObraReport> {
    let tree = LevelTree::materialize(store, obra_id, config.max_depth)?;
    let obra = tree.root().ok_or(Error::LevelNotFound(obra_id))?;

    if tree.is_truncated() {
        tracing::warn!(
            obra_id,
            max_depth = config.max_depth,
            "Level tree deeper than the depth cap; deeper levels are excluded from the report"
        );
    }

    let tasks = tree.tasks();
    let kpis = Kpis::from_tasks(&tasks);
    let progress = tree.progress(PROGRESS_DEPTH);

    let child_ids: Vec<i64> = tree.children(obra_id).map(|level| level.id).collect();
    let materials = store.materials_for(&child_ids)?;

    let mut photo_level_ids = Vec::with_capacity(child_ids.len() + 1);
    photo_level_ids.push(obra_id);
    photo_level_ids.extend(&child_ids);
    let issue_photos: Vec<IssuePhoto> = store
        .issue_photos_for(&photo_level_ids, range.start(), range.end_exclusive())?
        .into_iter()
        .map(IssuePhoto::from)
        .collect();

    let completed: Vec<&Level> = tasks
        .iter()
        .copied()
        .filter(|task| task.status.is_completed())
        .collect();

    let monthly_stats = MonthlyStats::compute(
        completed
            .iter()
            .map(|task| task.effective_completed_at().date_naive()),
        today,
    );

    let mut in_range: Vec<&Level> = completed
        .into_iter()
        .filter(|task| range.contains(task.effective_completed_at()))
        .collect();
    in_range.sort_by(|a, b| {
        b.effective_completed_at()
            .cmp(&a.effective_completed_at())
            .then(a.id.cmp(&b.id))
    });
    let completed_tasks: Vec<CompletedTask> =
        in_range.into_iter().map(CompletedTask::from).collect();

    tracing::info!(
        obra_id,
        nodes = tree.len(),
        total_tasks = kpis.total_tasks,
        completed_tasks = kpis.completed_tasks,
        issue_photos = issue_photos.len(),
        "Report generated"
    );

    Ok(ObraReport {
        obra: ObraSummary::from(obra),
        monthly_stats,
        kpis,
        progress,
        materials,
        issue_photos,
        completed_tasks,
    })
}
