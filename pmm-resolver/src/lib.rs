//! pmm-resolver library interface
//!
//! Maps local movie files to catalog (TMDb) entries and registers them with
//! a library manager (Radarr). The pipeline per work item is
//! scan → normalize → semantic extraction or selection → candidate search
//! and scoring → selection → library integration → import.

pub mod candidate_search;
pub mod config;
pub mod error;
pub mod interaction;
pub mod library_integration;
pub mod logging;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod scoring;
pub mod selection;
pub mod services;

pub use crate::error::{Error, Result};
pub use candidate_search::CandidateSearchCoordinator;
pub use interaction::{ManualChoice, NonInteractive, TerminalInteraction, UserInteraction};
pub use library_integration::{IntegrationOutcome, LibraryIntegrationCoordinator};
pub use normalizer::{FilenameNormalizer, NormalizedQuery};
pub use orchestrator::{BatchOrchestrator, ProcessOptions};
pub use scoring::ScoringEngine;
pub use selection::{ResolutionError, SelectionResolver};
