//! Aggregated results of one processing run

use super::processing_result::{LibraryAction, ProcessingResult, ProcessingStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session-level counters, mutated only through [`SessionSummary::add_result`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub user_cancelled: usize,
    pub requires_review: usize,
    pub added: usize,
    pub existed: usize,
    pub files_imported: usize,
    /// Sum of per-item processing times
    pub total_processing_seconds: f64,
    /// Elapsed time of the whole run, set by the orchestrator
    pub wall_clock_seconds: f64,
    pub results: Vec<ProcessingResult>,
}

impl SessionSummary {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            total_processed: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
            user_cancelled: 0,
            requires_review: 0,
            added: 0,
            existed: 0,
            files_imported: 0,
            total_processing_seconds: 0.0,
            wall_clock_seconds: 0.0,
            results: Vec::new(),
        }
    }

    pub fn add_result(&mut self, result: ProcessingResult) {
        self.total_processed += 1;
        self.total_processing_seconds += result.elapsed_seconds;

        match result.status {
            ProcessingStatus::Success => self.successful += 1,
            ProcessingStatus::Failed => self.failed += 1,
            ProcessingStatus::Skipped => self.skipped += 1,
            ProcessingStatus::UserCancelled => self.user_cancelled += 1,
            ProcessingStatus::RequiresReview => self.requires_review += 1,
        }

        match result.library_action {
            Some(LibraryAction::Added) => self.added += 1,
            Some(LibraryAction::Exists) => self.existed += 1,
            _ => {}
        }

        self.files_imported += result.files_imported_count();
        self.results.push(result);
    }

    /// Percentage of successful items (0 when nothing was processed)
    pub fn success_rate(&self) -> f64 {
        if self.total_processed == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total_processed as f64 * 100.0
    }

    pub fn average_processing_time(&self) -> f64 {
        if self.total_processed == 0 {
            return 0.0;
        }
        self.total_processing_seconds / self.total_processed as f64
    }
}

impl Default for SessionSummary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImportOutcome;
    use std::path::PathBuf;

    #[test]
    fn test_empty_summary_rates_are_zero() {
        let summary = SessionSummary::new();
        assert_eq!(summary.success_rate(), 0.0);
        assert_eq!(summary.average_processing_time(), 0.0);
    }

    #[test]
    fn test_counters_follow_results() {
        let mut summary = SessionSummary::new();

        let mut ok = ProcessingResult::new("/in/a");
        ok.status = ProcessingStatus::Success;
        ok.library_action = Some(LibraryAction::Added);
        ok.elapsed_seconds = 2.0;
        ok.imports = vec![
            ImportOutcome::imported(PathBuf::from("/in/a/a.mkv"), None, "radarr_api"),
            ImportOutcome::failed(PathBuf::from("/in/a/b.mkv"), "rejected"),
        ];
        summary.add_result(ok);

        let mut existed = ProcessingResult::new("/in/b");
        existed.status = ProcessingStatus::RequiresReview;
        existed.library_action = Some(LibraryAction::Exists);
        existed.elapsed_seconds = 4.0;
        summary.add_result(existed);

        summary.add_result(ProcessingResult::failed("/in/c", "boom"));
        summary.add_result(ProcessingResult::cancelled("/in/d"));

        assert_eq!(summary.total_processed, 4);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.requires_review, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.user_cancelled, 1);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.existed, 1);
        assert_eq!(summary.files_imported, 1);
        assert_eq!(summary.success_rate(), 25.0);
        assert_eq!(summary.average_processing_time(), 1.5);
        assert_eq!(summary.results.len(), 4);
    }
}
