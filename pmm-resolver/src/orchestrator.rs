//! Batch orchestration
//!
//! Drives work items through scan → resolve → library integration → import
//! and folds the per-item results into a [`SessionSummary`].
//!
//! Items run concurrently through `buffer_unordered`; the consuming loop is
//! the only writer of the summary. A failing item never stops the batch.

use crate::candidate_search::CandidateSearchCoordinator;
use crate::error::Result;
use crate::interaction::UserInteraction;
use crate::library_integration::LibraryIntegrationCoordinator;
use crate::models::{
    FileContext, LibraryAction, ProcessingResult, ProcessingStatus, ScanResult, SelectionOutcome, SessionSummary,
    TitleExtraction,
};
use crate::normalizer::FilenameNormalizer;
use crate::scoring::ScoringEngine;
use crate::selection::{ResolutionError, SelectionResolver};
use crate::services::{
    FileScanner, LibraryManager, LlmClient, MetadataCatalog, RadarrClient, SemanticResolver, TmdbClient,
};
use futures::stream::{self, StreamExt};
use pmm_common::config::{self, AppConfig, ImportMode, SelectionStrategy};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// More videos than this in one directory always means several movies
const MAX_MULTI_PART_FILES: usize = 3;

/// Minimum name similarity for files to count as parts of one movie
const PART_NAME_SIMILARITY: f64 = 0.8;

const PART_MARKERS: [&str; 6] = ["cd1", "cd2", "part1", "part2", "disc1", "disc2"];

/// Per-run processing switches
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Free-text guidance passed to the semantic resolver
    pub guidance: String,
    pub dry_run: bool,
    pub auto_add: bool,
    pub auto_import: bool,
}

impl ProcessOptions {
    /// Options seeded from configuration
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            guidance: config.prompts.default.clone(),
            dry_run: config.app.dry_run,
            auto_add: config.matching.auto_add_to_library,
            auto_import: config.matching.auto_import,
        }
    }
}

/// One unit of resolution: a movie directory, a single file, or one file
/// split out of a flat directory
#[derive(Debug, Clone)]
struct WorkItem {
    source_path: PathBuf,
    scan: ScanResult,
    context: FileContext,
}

/// Outcome of preparing one input path
enum Prepared {
    Items(Vec<WorkItem>),
    Done(ProcessingResult),
}

/// Title extraction obtained ahead of item processing
type PrefetchedExtraction = Option<std::result::Result<TitleExtraction, String>>;

pub struct BatchOrchestrator {
    config: AppConfig,
    scanner: FileScanner,
    normalizer: FilenameNormalizer,
    selection: SelectionResolver,
    integration: LibraryIntegrationCoordinator,
    interaction: Arc<dyn UserInteraction>,
    cancel_token: CancellationToken,
}

impl BatchOrchestrator {
    pub fn new(
        config: AppConfig,
        catalog: Arc<dyn MetadataCatalog>,
        library: Arc<dyn LibraryManager>,
        semantic: Arc<dyn SemanticResolver>,
        interaction: Arc<dyn UserInteraction>,
    ) -> Self {
        let scoring = ScoringEngine::new(config.matching.scoring, config.matching.year_tolerance);
        let search = CandidateSearchCoordinator::new(catalog, scoring);
        let selection = SelectionResolver::new(
            search,
            semantic,
            interaction.clone(),
            config.matching.max_search_results,
        );
        let integration = LibraryIntegrationCoordinator::new(
            library,
            interaction.clone(),
            config.radarr.default_profile.clone(),
            config.matching.auto_add_to_library,
        );

        Self {
            scanner: FileScanner::new(&config.files),
            normalizer: FilenameNormalizer::new(),
            selection,
            integration,
            interaction,
            cancel_token: CancellationToken::new(),
            config,
        }
    }

    /// Wire up the HTTP clients described by `config`
    pub fn from_config(config: AppConfig, interaction: Arc<dyn UserInteraction>) -> Result<Self> {
        let catalog = Arc::new(TmdbClient::new(&config.tmdb)?);
        let library = Arc::new(RadarrClient::new(&config.radarr)?);
        let semantic = Arc::new(LlmClient::new(&config.llm)?);
        Ok(Self::new(config, catalog, library, semantic, interaction))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Token that stops new items from starting once cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Concurrent items; prompts are answered one at a time
    fn workers(&self) -> usize {
        if self.interaction.is_interactive() {
            1
        } else {
            self.config.app.parallel_workers.max(1)
        }
    }

    /// Problems that would make processing pointless
    pub async fn validate_prerequisites(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !config::is_configured(&self.config.llm.api_key) {
            errors.push("LLM API key not configured".to_string());
        }
        if !config::is_configured(&self.config.tmdb.api_key) {
            errors.push("TMDb API key not configured".to_string());
        }
        if self.config.radarr.enabled {
            if !config::is_configured(&self.config.radarr.api_key) {
                errors.push("Radarr API key not configured".to_string());
            } else if let Err(e) = self.integration.library().system_status().await {
                errors.push(format!("Radarr service is not available: {}", e));
            }
        }

        errors
    }

    /// Process one input path
    ///
    /// A flat directory holding several movies is processed as a batch and
    /// reported as one result.
    pub async fn process_single(&self, path: &Path, options: &ProcessOptions) -> ProcessingResult {
        let started = Instant::now();

        let mut items = match self.prepare(path).await {
            Prepared::Done(mut result) => {
                result.elapsed_seconds = started.elapsed().as_secs_f64();
                return result;
            }
            Prepared::Items(items) => items,
        };

        if items.len() == 1 {
            let item = items.remove(0);
            return self.process_item(item, None, options).await;
        }

        tracing::info!(
            path = %path.display(),
            movies = items.len(),
            "Flat directory with several movies, processing as batch"
        );

        let mut summary = SessionSummary::new();
        self.run_items(items, options, &mut summary).await;

        let mut result = ProcessingResult::new(path);
        result.status = if summary.successful > 0 {
            ProcessingStatus::Success
        } else {
            ProcessingStatus::Failed
        };
        result.error_message = Some(format!(
            "Batch processed {} movies: {} successful, {} failed",
            summary.total_processed, summary.successful, summary.failed
        ));
        result.elapsed_seconds = started.elapsed().as_secs_f64();
        result
    }

    /// Process every input path, adding one result per work item to `summary`
    pub async fn process_batch(&self, paths: &[PathBuf], options: &ProcessOptions, summary: &mut SessionSummary) {
        let started = Instant::now();
        tracing::info!(session_id = %summary.session_id, inputs = paths.len(), "Starting batch processing");

        let mut items = Vec::new();
        for path in paths {
            match self.prepare(path).await {
                Prepared::Items(prepared) => items.extend(prepared),
                Prepared::Done(result) => summary.add_result(result),
            }
        }

        self.run_items(items, options, summary).await;
        summary.wall_clock_seconds = started.elapsed().as_secs_f64();

        tracing::info!(
            session_id = %summary.session_id,
            total = summary.total_processed,
            successful = summary.successful,
            failed = summary.failed,
            skipped = summary.skipped,
            "Batch processing completed"
        );
    }

    /// Scan `path` and turn it into work items
    async fn prepare(&self, path: &Path) -> Prepared {
        let scan = match self.scanner.scan_blocking(path.to_path_buf()).await {
            Ok(scan) => scan,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Scan failed");
                return Prepared::Done(ProcessingResult::failed(path, e.to_string()));
            }
        };

        if scan.video_files.is_empty() {
            return Prepared::Done(ProcessingResult::skipped(path, "No video files found"));
        }

        if is_single_movie_directory(&scan) {
            let context = FileContext::from_scan(&scan, &self.normalizer);
            return Prepared::Items(vec![WorkItem {
                source_path: path.to_path_buf(),
                scan,
                context,
            }]);
        }

        Prepared::Items(
            scan.video_files
                .iter()
                .map(|video| {
                    let single = scan.for_single_video(video);
                    let context = FileContext::from_scan(&single, &self.normalizer);
                    WorkItem {
                        source_path: video.path.clone(),
                        scan: single,
                        context,
                    }
                })
                .collect(),
        )
    }

    async fn run_items(&self, items: Vec<WorkItem>, options: &ProcessOptions, summary: &mut SessionSummary) {
        if items.is_empty() {
            return;
        }

        let prefetched = self.prefetch_extractions(&items, &options.guidance).await;
        let total = items.len();

        let mut results = stream::iter(items.into_iter().zip(prefetched))
            .map(|(item, extraction)| self.process_item(item, extraction, options))
            .buffer_unordered(self.workers());

        while let Some(result) = results.next().await {
            tracing::debug!(
                path = %result.source_path.display(),
                status = %result.status,
                progress = format!("{}/{}", summary.total_processed + 1, total),
                "Item finished"
            );
            summary.add_result(result);
        }
    }

    /// Batched title extraction, one semantic call per chunk
    ///
    /// Returns one slot per item; `None` means the item makes its own call.
    async fn prefetch_extractions(&self, items: &[WorkItem], guidance: &str) -> Vec<PrefetchedExtraction> {
        let batch_size = self.config.app.batch_size;
        if self.config.matching.selection_strategy != SelectionStrategy::Extraction || batch_size <= 1 {
            return vec![None; items.len()];
        }

        let mut slots = Vec::with_capacity(items.len());
        for chunk in items.chunks(batch_size) {
            if chunk.len() == 1 || self.cancel_token.is_cancelled() {
                slots.extend(std::iter::repeat_with(|| None).take(chunk.len()));
                continue;
            }

            let contexts: Vec<FileContext> = chunk.iter().map(|item| item.context.clone()).collect();
            match self.selection.semantic().extract_batch(&contexts, guidance).await {
                Ok(extractions) if extractions.len() == chunk.len() => {
                    slots.extend(extractions.into_iter().map(|e| Some(Ok(e))));
                }
                Ok(extractions) => {
                    tracing::error!(
                        expected = chunk.len(),
                        received = extractions.len(),
                        "Batch extraction returned the wrong number of items"
                    );
                    let message = format!("expected {} extractions, got {}", chunk.len(), extractions.len());
                    slots.extend(std::iter::repeat_with(|| Some(Err(message.clone()))).take(chunk.len()));
                }
                Err(e) => {
                    tracing::error!(items = chunk.len(), error = %e, "Batch extraction failed");
                    let message = e.to_string();
                    slots.extend(std::iter::repeat_with(|| Some(Err(message.clone()))).take(chunk.len()));
                }
            }
        }
        slots
    }

    async fn process_item(
        &self,
        item: WorkItem,
        extraction: PrefetchedExtraction,
        options: &ProcessOptions,
    ) -> ProcessingResult {
        if self.cancel_token.is_cancelled() {
            return ProcessingResult::cancelled(&item.source_path);
        }

        let started = Instant::now();
        tracing::info!(path = %item.source_path.display(), "Processing movie");

        let mut result = match self.resolve_item(&item, extraction, options).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(path = %item.source_path.display(), error = %e, "Failed to process item");
                ProcessingResult::failed(&item.source_path, e.to_string())
            }
        };

        result.elapsed_seconds = started.elapsed().as_secs_f64();
        result
    }

    async fn resolve_item(
        &self,
        item: &WorkItem,
        extraction: PrefetchedExtraction,
        options: &ProcessOptions,
    ) -> std::result::Result<ProcessingResult, ResolutionError> {
        let threshold = self.config.matching.confidence_threshold;

        let outcome = match self.config.matching.selection_strategy {
            SelectionStrategy::Extraction => {
                let extraction = match extraction {
                    Some(prefetched) => prefetched.map_err(ResolutionError::BatchExtraction)?,
                    None => {
                        self.selection
                            .semantic()
                            .extract_title_info(&item.context, &options.guidance)
                            .await?
                    }
                };
                self.selection
                    .resolve_from_extraction(&item.context, extraction, threshold)
                    .await?
            }
            SelectionStrategy::Direct => {
                let name = item
                    .scan
                    .main_video_file()
                    .map(|f| f.name.as_str())
                    .unwrap_or(item.context.root_name.as_str());
                let query = self.normalizer.normalize(name);
                self.selection
                    .resolve_by_selection(&item.context, &query, &options.guidance, threshold)
                    .await?
            }
        };

        let mut record = match outcome {
            SelectionOutcome::Resolved(record) => *record,
            SelectionOutcome::Abandoned { .. } => {
                return Ok(ProcessingResult::skipped(&item.source_path, "No candidate selected"));
            }
            SelectionOutcome::Cancelled => {
                return Ok(ProcessingResult::cancelled(&item.source_path));
            }
        };

        let mut result = ProcessingResult::new(&item.source_path);
        result.tmdb_url = Some(record.chosen_entry.catalog_url());

        if self.config.radarr.enabled {
            let external_id = record.chosen_entry.external_id;
            if let Some(details) = self.selection.search().catalog().get_details(external_id).await? {
                record.chosen_entry = details;
            }

            if !options.dry_run {
                let integration = self.integration.resolve(&record.chosen_entry, options.auto_add).await;
                result.library_action = Some(integration.action);

                if let Some(movie) = integration.movie {
                    result.library_url = Some(format!(
                        "{}/movie/{}",
                        self.config.radarr.url.trim_end_matches('/'),
                        movie.tmdb_id
                    ));

                    if options.auto_import {
                        let import = &self.config.radarr.import;
                        result.imports = self
                            .integration
                            .import_files(&movie, &item.scan.video_paths(), import.mode)
                            .await;

                        let all_moved = import.mode == ImportMode::Move
                            && !result.imports.is_empty()
                            && result.imports.iter().all(|i| i.imported);
                        if import.delete_empty_folders && all_moved {
                            prune_empty_folder(&item.source_path).await;
                        }
                    }
                }
            }
        }

        let needs_review = result.library_action == Some(LibraryAction::Failed)
            || result.imports.iter().any(|i| !i.imported);
        result.status = if needs_review {
            ProcessingStatus::RequiresReview
        } else {
            ProcessingStatus::Success
        };

        tracing::info!(
            path = %item.source_path.display(),
            title = %record.chosen_entry.display_title(),
            tmdb_id = record.chosen_entry.external_id,
            status = %result.status,
            "Processed movie"
        );

        result.resolution = Some(record);
        Ok(result)
    }
}

/// Remove an item's source folder once a move import has emptied it
///
/// Single files and folders that still hold anything are left alone.
async fn prune_empty_folder(dir: &Path) {
    if !dir.is_dir() {
        return;
    }
    match tokio::fs::remove_dir(dir).await {
        Ok(()) => tracing::info!(path = %dir.display(), "Removed empty source folder"),
        Err(e) => tracing::debug!(path = %dir.display(), error = %e, "Source folder kept"),
    }
}

fn strip_part_markers(name: &str) -> String {
    PART_MARKERS
        .iter()
        .fold(name.to_lowercase(), |acc, marker| acc.replace(marker, ""))
}

/// Whether the videos of a scan belong to one movie (possibly multi-part)
pub fn is_single_movie_directory(scan: &ScanResult) -> bool {
    let videos = &scan.video_files;
    if videos.len() <= 1 {
        return true;
    }
    if videos.len() > MAX_MULTI_PART_FILES {
        return false;
    }
    let Some(main) = scan.main_video_file() else {
        return true;
    };

    let base = strip_part_markers(&main.name);
    videos
        .iter()
        .all(|file| strsim::normalized_levenshtein(&base, &strip_part_markers(&file.name)) > PART_NAME_SIMILARITY)
}
