//! Error types for pmm-resolver
//!
//! Each collaborator and component owns its error enum; [`Error`] gathers
//! them for setup code that touches several at once.

use crate::selection::ResolutionError;
use crate::services::{CatalogError, LibraryError, ScanError, SemanticError};
use thiserror::Error;

/// Result type for pmm-resolver setup and run operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading or validation (fatal)
    #[error(transparent)]
    Config(#[from] pmm_common::Error),

    #[error("Metadata catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Library manager: {0}")]
    Library(#[from] LibraryError),

    #[error("Semantic resolver: {0}")]
    Semantic(#[from] SemanticError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl Error {
    /// Whether the process should stop with a configuration failure
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_collaborator() {
        let err: Error = CatalogError::InvalidApiKey.into();
        assert_eq!(err.to_string(), "Metadata catalog: Invalid TMDb API key");

        let err: Error = pmm_common::Error::Config("bad weights".to_string()).into();
        assert!(err.is_config());
        assert_eq!(err.to_string(), "Configuration error: bad weights");
    }
}
