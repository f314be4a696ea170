//! Per-item processing results

use super::resolution::ResolutionRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Processing status of one work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Success,
    Failed,
    Skipped,
    UserCancelled,
    /// Resolved, but the library step needs a human look
    RequiresReview,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Success => "success",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::Skipped => "skipped",
            ProcessingStatus::UserCancelled => "user_cancelled",
            ProcessingStatus::RequiresReview => "requires_review",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of library integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LibraryAction {
    Added,
    Exists,
    Skipped,
    Failed,
}

impl LibraryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryAction::Added => "ADDED",
            LibraryAction::Exists => "EXISTS",
            LibraryAction::Skipped => "SKIPPED",
            LibraryAction::Failed => "FAILED",
        }
    }
}

impl fmt::Display for LibraryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Import result for one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub source_path: PathBuf,
    pub imported: bool,
    pub target_path: Option<PathBuf>,
    pub error: Option<String>,
    pub method: Option<String>,
}

impl ImportOutcome {
    pub fn imported(source_path: PathBuf, target_path: Option<PathBuf>, method: &str) -> Self {
        Self {
            source_path,
            imported: true,
            target_path,
            error: None,
            method: Some(method.to_string()),
        }
    }

    pub fn failed(source_path: PathBuf, error: impl Into<String>) -> Self {
        Self {
            source_path,
            imported: false,
            target_path: None,
            error: Some(error.into()),
            method: None,
        }
    }
}

/// Result of processing one work item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub source_path: PathBuf,
    pub status: ProcessingStatus,
    pub resolution: Option<ResolutionRecord>,
    pub library_action: Option<LibraryAction>,
    pub imports: Vec<ImportOutcome>,
    pub error_message: Option<String>,
    pub elapsed_seconds: f64,
    pub tmdb_url: Option<String>,
    pub library_url: Option<String>,
}

impl ProcessingResult {
    /// Fresh result; status starts as FAILED until the pipeline says otherwise
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            status: ProcessingStatus::Failed,
            resolution: None,
            library_action: None,
            imports: Vec::new(),
            error_message: None,
            elapsed_seconds: 0.0,
            tmdb_url: None,
            library_url: None,
        }
    }

    pub fn failed(source_path: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        let mut result = Self::new(source_path);
        result.error_message = Some(error.into());
        result
    }

    pub fn skipped(source_path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        let mut result = Self::new(source_path);
        result.status = ProcessingStatus::Skipped;
        result.error_message = Some(reason.into());
        result
    }

    pub fn cancelled(source_path: impl Into<PathBuf>) -> Self {
        let mut result = Self::new(source_path);
        result.status = ProcessingStatus::UserCancelled;
        result.error_message = Some("Cancelled by user".to_string());
        result
    }

    pub fn files_imported_count(&self) -> usize {
        self.imports.iter().filter(|i| i.imported).count()
    }
}
