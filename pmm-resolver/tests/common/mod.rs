//! Shared fixtures for pipeline and client integration tests
//!
//! In-memory fakes for the three collaborators, a movie-folder builder and
//! a one-call HTTP server helper for the wire-level tests.

#![allow(dead_code)]

use async_trait::async_trait;
use pmm_common::config::{AppConfig, ImportMode, RadarrProfileConfig};
use pmm_resolver::models::{Candidate, CatalogEntry, FileContext, SelectorVerdict, TitleExtraction};
use pmm_resolver::{ManualChoice, UserInteraction};
use pmm_resolver::services::{
    CatalogError, ImportCandidate, ImportDecision, LibraryError, LibraryManager, LibraryMovie, MetadataCatalog,
    SemanticError, SemanticResolver, SystemStatus,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Serve `app` on an ephemeral local port and return its base URL
pub async fn spawn(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Catalog entry with the popularity and language the fakes share
pub fn movie(id: u64, title: &str, year: i32) -> CatalogEntry {
    let mut entry = CatalogEntry::new(id, title);
    entry.year = Some(year);
    entry.popularity = Some(60.0);
    entry.original_language = Some("en".to_string());
    entry
}

/// Configuration for pipeline runs against the fakes
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.llm.api_key = "llm-test-key".to_string();
    config.tmdb.api_key = "tmdb-test-key".to_string();
    config.radarr.api_key = "radarr-test-key".to_string();
    config.radarr.enabled = true;
    config.files.min_file_size_mb = 0;
    config.app.batch_size = 1;
    config.app.parallel_workers = 3;
    config
}

/// Create `<root>/<folder>/<file>` with a little content
pub fn movie_folder(root: &Path, folder: &str, file: &str) -> PathBuf {
    let dir = root.join(folder);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(file), b"not really a movie").unwrap();
    dir
}

/// Create `<root>/<file>` with a little content
pub fn loose_file(root: &Path, file: &str) -> PathBuf {
    let path = root.join(file);
    std::fs::write(&path, b"not really a movie").unwrap();
    path
}

/// Catalog answering from a title → entries table (case-insensitive)
///
/// Searching for "Broken" fails with a transport error.
#[derive(Default)]
pub struct FakeCatalog {
    table: HashMap<String, Vec<CatalogEntry>>,
    pub searches: AtomicUsize,
}

impl FakeCatalog {
    pub fn with(entries: Vec<CatalogEntry>) -> Self {
        let mut table: HashMap<String, Vec<CatalogEntry>> = HashMap::new();
        for entry in entries {
            table.entry(entry.title.to_lowercase()).or_default().push(entry);
        }
        Self {
            table,
            searches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MetadataCatalog for FakeCatalog {
    async fn search_by_title(&self, title: &str, _year: Option<i32>) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if title.eq_ignore_ascii_case("broken") {
            return Err(CatalogError::NetworkError("connection reset by peer".to_string()));
        }
        Ok(self.table.get(&title.to_lowercase()).cloned().unwrap_or_default())
    }

    async fn get_details(&self, external_id: u64) -> Result<Option<CatalogEntry>, CatalogError> {
        Ok(self
            .table
            .values()
            .flatten()
            .find(|e| e.external_id == external_id)
            .cloned())
    }
}

/// Semantic resolver that echoes the main file's cleaned name
///
/// A file cleaned to "Garbled" fails; `short_batches` drops the last item
/// of every batch reply.
#[derive(Default)]
pub struct FakeSemantic {
    pub short_batches: bool,
    pub single_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
}

impl FakeSemantic {
    fn extract(context: &FileContext) -> Result<TitleExtraction, SemanticError> {
        let main = context
            .main_file()
            .ok_or_else(|| SemanticError::MalformedResponse("no files".to_string()))?;
        if main.clean_name == "Garbled" {
            return Err(SemanticError::MalformedResponse("unparseable reply".to_string()));
        }
        Ok(TitleExtraction {
            canonical_title: main.clean_name.clone(),
            year: main.extracted_year,
            aka_titles: Vec::new(),
            language_hints: vec!["en".to_string()],
            confidence: 0.95,
            rationale: "Title taken from the file name".to_string(),
            director: None,
            genre_hints: Vec::new(),
            edition_notes: None,
        })
    }
}

#[async_trait]
impl SemanticResolver for FakeSemantic {
    async fn extract_title_info(
        &self,
        context: &FileContext,
        _guidance: &str,
    ) -> Result<TitleExtraction, SemanticError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        Self::extract(context)
    }

    async fn extract_batch(
        &self,
        contexts: &[FileContext],
        _guidance: &str,
    ) -> Result<Vec<TitleExtraction>, SemanticError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let mut extractions = contexts.iter().map(Self::extract).collect::<Result<Vec<_>, _>>()?;
        if self.short_batches {
            extractions.pop();
        }
        Ok(extractions)
    }

    async fn select_from_candidates(
        &self,
        candidates: &[Candidate],
        _context: &FileContext,
        _guidance: &str,
    ) -> Result<SelectorVerdict, SemanticError> {
        Ok(SelectorVerdict {
            index: (!candidates.is_empty()).then_some(0),
            confidence: 0.9,
            rationale: "First candidate".to_string(),
        })
    }
}

/// In-memory library manager
///
/// Every requested path is an import candidate; files listed in
/// `rejections` are rejected with the given reasons. Move imports delete
/// the approved source files.
#[derive(Default)]
pub struct FakeLibrary {
    pub movies: Mutex<Vec<LibraryMovie>>,
    pub adds: AtomicUsize,
    pub refreshes: AtomicUsize,
    next_id: AtomicI64,
    pub rejections: HashMap<String, Vec<String>>,
    pub status_down: AtomicBool,
}

impl FakeLibrary {
    pub fn rejecting(file_name: &str, reasons: &[&str]) -> Self {
        let mut library = Self::default();
        library
            .rejections
            .insert(file_name.to_string(), reasons.iter().map(|r| r.to_string()).collect());
        library
    }

    pub fn add_count(&self) -> usize {
        self.adds.load(Ordering::SeqCst)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}

#[async_trait]
impl LibraryManager for FakeLibrary {
    async fn find_by_external_id(&self, external_id: u64) -> Result<Option<LibraryMovie>, LibraryError> {
        Ok(self
            .movies
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.tmdb_id == external_id)
            .cloned())
    }

    async fn add(
        &self,
        entry: &CatalogEntry,
        _profile: Option<&RadarrProfileConfig>,
    ) -> Result<LibraryMovie, LibraryError> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        let movie = LibraryMovie {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            title: entry.title.clone(),
            tmdb_id: entry.external_id,
            year: entry.year,
            path: None,
            has_file: false,
            monitored: true,
        };
        self.movies.lock().unwrap().push(movie.clone());
        Ok(movie)
    }

    async fn get_import_candidates(
        &self,
        paths: &[PathBuf],
        movie: &LibraryMovie,
    ) -> Result<Vec<ImportCandidate>, LibraryError> {
        Ok(paths
            .iter()
            .map(|path| ImportCandidate {
                path: path.clone(),
                movie_id: movie.id,
                quality: serde_json::json!({}),
                languages: serde_json::json!([]),
            })
            .collect())
    }

    async fn execute_import(
        &self,
        candidates: &[ImportCandidate],
        mode: ImportMode,
    ) -> Result<Vec<ImportDecision>, LibraryError> {
        // A move takes the approved files out of the source folder
        if mode == ImportMode::Move {
            for candidate in candidates {
                if !self.rejections.contains_key(&file_name_of(&candidate.path)) {
                    let _ = std::fs::remove_file(&candidate.path);
                }
            }
        }
        Ok(candidates
            .iter()
            .map(|c| match self.rejections.get(&file_name_of(&c.path)) {
                Some(reasons) => ImportDecision {
                    path: c.path.clone(),
                    approved: false,
                    rejections: reasons.clone(),
                    target_path: None,
                },
                None => ImportDecision {
                    path: c.path.clone(),
                    approved: true,
                    rejections: Vec::new(),
                    target_path: Some(PathBuf::from("/movies").join(file_name_of(&c.path))),
                },
            })
            .collect())
    }

    async fn refresh_movie(&self, _movie: &LibraryMovie) -> Result<(), LibraryError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn system_status(&self) -> Result<SystemStatus, LibraryError> {
        if self.status_down.load(Ordering::SeqCst) {
            return Err(LibraryError::NetworkError("connection refused".to_string()));
        }
        Ok(SystemStatus {
            app_name: Some("Radarr".to_string()),
            version: "5.2.6".to_string(),
            start_time: None,
        })
    }
}

/// Interactive answers without a terminal
///
/// Items whose name starts with `cancel_prefix` are cancelled at the
/// selection prompt; every other item takes the first candidate and every
/// confirmation is answered yes.
pub struct ScriptedInteraction {
    pub cancel_prefix: String,
    pub prompts: AtomicUsize,
}

impl ScriptedInteraction {
    pub fn cancelling(prefix: &str) -> Self {
        Self {
            cancel_prefix: prefix.to_string(),
            prompts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl UserInteraction for ScriptedInteraction {
    fn is_interactive(&self) -> bool {
        true
    }

    async fn choose(&self, item: &str, candidates: &[Candidate]) -> ManualChoice {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        if item.starts_with(&self.cancel_prefix) {
            ManualChoice::Cancelled
        } else if candidates.is_empty() {
            ManualChoice::Skip
        } else {
            ManualChoice::Choice(0)
        }
    }

    async fn confirm(&self, _question: &str) -> Option<bool> {
        Some(true)
    }
}
