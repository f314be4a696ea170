//! Data models for the resolution pipeline
//!
//! All entities live for one run only; nothing here is persisted.

pub mod candidate;
pub mod catalog;
pub mod extraction;
pub mod file_info;
pub mod processing_result;
pub mod resolution;
pub mod session_summary;

pub use candidate::{Candidate, ExpectedTitle, ScoreBreakdown};
pub use catalog::CatalogEntry;
pub use extraction::{SelectorVerdict, TitleExtraction};
pub use file_info::{FileContext, FileDescriptor, FileInfo, ScanResult};
pub use processing_result::{ImportOutcome, LibraryAction, ProcessingResult, ProcessingStatus};
pub use resolution::{ResolutionRecord, SelectionOutcome, SelectionState, StateTransition};
pub use session_summary::SessionSummary;
