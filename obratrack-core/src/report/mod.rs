//! Obra progress reports
//!
//! Computes the single report shape the frontend shows for an obra:
//! - Task KPIs over the whole level tree
//! - Nested progress (three levels below the obra), leaf-based percentages
//! - Materials and date-filtered issue photos
//! - Tasks completed in the requested date range
//! - Completion counts for last month, this month and this week
//!
//! Each request materializes its own snapshot of the tree with one subtree
//! query; nothing is cached between requests.
//!
//! See [`tree`] for the tree walk and [`stats`] for the calendar windows.

pub mod assembler;
pub mod payload;
pub mod range;
pub mod stats;
pub mod store;
pub mod tree;

pub use assembler::generate_report;
pub use payload::{CompletedTask, IssuePhoto, Kpis, ObraReport, ObraSummary, ProgressNode};
pub use range::ReportRange;
pub use stats::{DateWindow, MonthlyStats};
pub use store::LevelStore;
pub use tree::{LevelTree, PROGRESS_DEPTH};

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};

use crate::config::ReportConfig;
use crate::error::{Error, Result};

/// Report generation bound to one store.
///
/// Built once at startup and shared by reference; requests do not share any
/// mutable state.
pub struct ReportService<S> {
    store: Arc<S>,
    config: ReportConfig,
}

impl<S: LevelStore> ReportService<S> {
    pub fn new(store: Arc<S>, config: ReportConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Generate a report with statistics anchored to the current UTC date.
    pub fn generate(&self, obra_id: i64, range: &ReportRange) -> Result<ObraReport> {
        self.generate_on(obra_id, range, Utc::now().date_naive())
    }

    /// Generate a report as if today were `today`.
    pub fn generate_on(
        &self,
        obra_id: i64,
        range: &ReportRange,
        today: NaiveDate,
    ) -> Result<ObraReport> {
        generate_report(self.store.as_ref(), obra_id, range, today, &self.config).map_err(|e| {
            log_failure(obra_id, &e);
            e
        })
    }
}

impl<S: LevelStore + Send + Sync + 'static> ReportService<S> {
    /// Generate a report on the blocking pool, bounded by `config.timeout_ms`.
    ///
    /// `today` anchors the monthly stats; `None` means the current UTC date.
    /// On timeout the caller gets [`Error::Timeout`]; the query already
    /// running on the blocking thread finishes in the background and its
    /// result is dropped.
    pub async fn generate_with_timeout(
        &self,
        obra_id: i64,
        range: &ReportRange,
        today: Option<NaiveDate>,
    ) -> Result<ObraReport> {
        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        let range = *range;
        let today = today.unwrap_or_else(|| Utc::now().date_naive());
        let timeout_ms = self.config.timeout_ms;

        let task = tokio::task::spawn_blocking(move || {
            generate_report(store.as_ref(), obra_id, &range, today, &config)
        });

        let result = match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) if join_error.is_panic() => {
                std::panic::resume_unwind(join_error.into_panic())
            }
            // Cancelled only when the runtime shuts down mid-request
            Ok(Err(_)) | Err(_) => Err(Error::Timeout { timeout_ms }),
        };

        result.map_err(|e| {
            log_failure(obra_id, &e);
            e
        })
    }
}

fn log_failure(obra_id: i64, error: &Error) {
    if error.is_client_error() {
        tracing::warn!(obra_id, error = %error, "Report request rejected");
    } else {
        tracing::error!(obra_id, error = %error, "Report generation failed");
    }
}
