//! External collaborators of the resolution pipeline
//!
//! Each client sits behind a trait so the pipeline can be driven by fakes:
//! - [`MetadataCatalog`]: TMDb search and details
//! - [`LibraryManager`]: Radarr lookup, add and import
//! - [`SemanticResolver`]: LLM title extraction and candidate selection
//!
//! The file scanner is synchronous and has no trait.

pub mod catalog_client;
pub mod file_scanner;
pub mod library_client;
pub mod semantic_client;

pub use catalog_client::{CatalogError, MetadataCatalog, TmdbClient};
pub use file_scanner::{FileScanner, ScanError};
pub use library_client::{
    title_slug, ImportCandidate, ImportDecision, LibraryError, LibraryManager, LibraryMovie, RadarrClient,
    SystemStatus,
};
pub use semantic_client::{LlmClient, SemanticError, SemanticResolver};
