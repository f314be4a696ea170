//! Library integration
//!
//! Makes sure a resolved movie exists in the library manager and, when
//! asked, imports the work item's files into it.
//!
//! `resolve` never fails: transport errors end in [`LibraryAction::Failed`].
//! The lookup and the add for one catalog id run under a per-id lock, so
//! two items resolving to the same movie add it once and the second one
//! observes [`LibraryAction::Exists`].

use crate::interaction::UserInteraction;
use crate::models::{CatalogEntry, ImportOutcome, LibraryAction};
use crate::services::{ImportCandidate, LibraryError, LibraryManager, LibraryMovie};
use pmm_common::config::{ImportMode, RadarrProfileConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Import method recorded on successful imports
pub const IMPORT_METHOD: &str = "radarr_api";

const NO_IMPORT_CANDIDATES: &str = "no valid import candidates found";

/// Terminal state of [`LibraryIntegrationCoordinator::resolve`]
#[derive(Debug, Clone)]
pub struct IntegrationOutcome {
    pub action: LibraryAction,
    /// Library record when the movie is (now) in the library
    pub movie: Option<LibraryMovie>,
}

impl IntegrationOutcome {
    fn failed() -> Self {
        Self {
            action: LibraryAction::Failed,
            movie: None,
        }
    }
}

pub struct LibraryIntegrationCoordinator {
    library: Arc<dyn LibraryManager>,
    interaction: Arc<dyn UserInteraction>,
    profile: RadarrProfileConfig,
    auto_add_to_library: bool,
    id_locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl LibraryIntegrationCoordinator {
    pub fn new(
        library: Arc<dyn LibraryManager>,
        interaction: Arc<dyn UserInteraction>,
        profile: RadarrProfileConfig,
        auto_add_to_library: bool,
    ) -> Self {
        Self {
            library,
            interaction,
            profile,
            auto_add_to_library,
            id_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn library(&self) -> &Arc<dyn LibraryManager> {
        &self.library
    }

    async fn lock_for(&self, external_id: u64) -> Arc<Mutex<()>> {
        self.id_locks.lock().await.entry(external_id).or_default().clone()
    }

    /// Give back a per-id lock, dropping its entry when no one else holds it
    async fn release_lock(&self, external_id: u64, lock: Arc<Mutex<()>>) {
        let mut locks = self.id_locks.lock().await;
        drop(lock);
        if locks.get(&external_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&external_id);
        }
    }

    /// Ensure `entry` is in the library
    ///
    /// Adds without asking when `auto_add`, the configured auto-add flag or
    /// a non-interactive run allows it; otherwise the user confirms.
    pub async fn resolve(&self, entry: &CatalogEntry, auto_add: bool) -> IntegrationOutcome {
        if entry.external_id == 0 {
            tracing::error!(title = %entry.title, "Cannot integrate movie without a TMDb id");
            return IntegrationOutcome::failed();
        }

        let lock = self.lock_for(entry.external_id).await;
        let outcome = {
            let _guard = lock.lock().await;
            self.lookup_or_add(entry, auto_add).await
        };
        self.release_lock(entry.external_id, lock).await;
        outcome
    }

    async fn lookup_or_add(&self, entry: &CatalogEntry, auto_add: bool) -> IntegrationOutcome {
        match self.library.find_by_external_id(entry.external_id).await {
            Ok(Some(movie)) => {
                tracing::info!(tmdb_id = entry.external_id, library_id = movie.id, "Movie already in library");
                return IntegrationOutcome {
                    action: LibraryAction::Exists,
                    movie: Some(movie),
                };
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(tmdb_id = entry.external_id, error = %e, "Library lookup failed");
                return IntegrationOutcome::failed();
            }
        }

        let should_add = auto_add || self.auto_add_to_library || !self.interaction.is_interactive() || {
            let question = format!("Add '{}' to the library?", entry.display_title());
            self.interaction.confirm(&question).await == Some(true)
        };

        if !should_add {
            tracing::info!(tmdb_id = entry.external_id, "Library add skipped");
            return IntegrationOutcome {
                action: LibraryAction::Skipped,
                movie: None,
            };
        }

        match self.library.add(entry, Some(&self.profile)).await {
            Ok(movie) => {
                tracing::info!(
                    tmdb_id = entry.external_id,
                    library_id = movie.id,
                    title = %entry.display_title(),
                    "Movie added to library"
                );
                IntegrationOutcome {
                    action: LibraryAction::Added,
                    movie: Some(movie),
                }
            }
            Err(e) => {
                tracing::error!(tmdb_id = entry.external_id, error = %e, "Failed to add movie to library");
                IntegrationOutcome::failed()
            }
        }
    }

    /// Import `paths` into `movie`, one outcome per path in input order
    pub async fn import_files(&self, movie: &LibraryMovie, paths: &[PathBuf], mode: ImportMode) -> Vec<ImportOutcome> {
        if paths.is_empty() {
            return Vec::new();
        }

        let outcomes = match self.run_import(movie, paths, mode).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::error!(library_id = movie.id, error = %e, "Import request failed");
                let message = format!("Failed to import movie files via library manager API: {}", e);
                return paths
                    .iter()
                    .map(|path| ImportOutcome::failed(path.clone(), message.clone()))
                    .collect();
            }
        };

        let imported = outcomes.iter().filter(|o| o.imported).count();
        tracing::info!(
            library_id = movie.id,
            imported,
            failed = outcomes.len() - imported,
            mode = mode.as_str(),
            "Import finished"
        );

        outcomes
    }

    async fn run_import(
        &self,
        movie: &LibraryMovie,
        paths: &[PathBuf],
        mode: ImportMode,
    ) -> Result<Vec<ImportOutcome>, LibraryError> {
        let candidates = self.library.get_import_candidates(paths, movie).await?;
        if candidates.is_empty() {
            return Ok(paths
                .iter()
                .map(|path| ImportOutcome::failed(path.clone(), NO_IMPORT_CANDIDATES))
                .collect());
        }

        let decisions = self.library.execute_import(&candidates, mode).await?;

        if let Err(e) = self.library.refresh_movie(movie).await {
            tracing::warn!(library_id = movie.id, error = %e, "Movie refresh request failed");
        }

        Ok(paths
            .iter()
            .map(|path| {
                if !has_candidate(&candidates, path) {
                    return ImportOutcome::failed(path.clone(), NO_IMPORT_CANDIDATES);
                }
                match decisions.iter().find(|d| &d.path == path) {
                    Some(decision) if decision.approved => {
                        ImportOutcome::imported(path.clone(), decision.target_path.clone(), IMPORT_METHOD)
                    }
                    Some(decision) => ImportOutcome::failed(path.clone(), decision.rejections.join("; ")),
                    None => ImportOutcome::failed(path.clone(), NO_IMPORT_CANDIDATES),
                }
            })
            .collect())
    }
}

fn has_candidate(candidates: &[ImportCandidate], path: &Path) -> bool {
    candidates.iter().any(|c| c.path.as_path() == path)
}
