//! Library manager client (Radarr v3)

use crate::models::CatalogEntry;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use pmm_common::config::{ImportMode, RadarrConfig, RadarrProfileConfig};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";

/// Library manager client errors
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid Radarr API key")]
    InvalidApiKey,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Movie record held by the library manager
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryMovie {
    pub id: i64,
    pub title: String,
    pub tmdb_id: u64,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub has_file: bool,
    #[serde(default)]
    pub monitored: bool,
}

/// File the library manager is willing to import
#[derive(Debug, Clone, PartialEq)]
pub struct ImportCandidate {
    pub path: PathBuf,
    pub movie_id: i64,
    /// Passed back to the manager untouched
    pub quality: Value,
    pub languages: Value,
}

/// Outcome of an executed import for one file
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecision {
    pub path: PathBuf,
    pub approved: bool,
    /// Rejection reasons in the order the manager returned them
    pub rejections: Vec<String>,
    pub target_path: Option<PathBuf>,
}

/// Library manager status
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemStatus {
    pub app_name: Option<String>,
    pub version: String,
    pub start_time: Option<String>,
}

/// Mutating access to the media library manager
#[async_trait]
pub trait LibraryManager: Send + Sync {
    /// Library movie for a catalog (TMDb) id, if present
    async fn find_by_external_id(&self, external_id: u64) -> Result<Option<LibraryMovie>, LibraryError>;

    /// Add a movie; `None` uses the configured default profile
    async fn add(
        &self,
        entry: &CatalogEntry,
        profile: Option<&RadarrProfileConfig>,
    ) -> Result<LibraryMovie, LibraryError>;

    /// Phase one of an import: candidates for `paths`, scoped to `movie`
    async fn get_import_candidates(
        &self,
        paths: &[PathBuf],
        movie: &LibraryMovie,
    ) -> Result<Vec<ImportCandidate>, LibraryError>;

    /// Phase two: submit candidates, one decision per candidate
    async fn execute_import(
        &self,
        candidates: &[ImportCandidate],
        mode: ImportMode,
    ) -> Result<Vec<ImportDecision>, LibraryError>;

    /// Ask the manager to rescan a movie's folder
    async fn refresh_movie(&self, movie: &LibraryMovie) -> Result<(), LibraryError>;

    async fn system_status(&self) -> Result<SystemStatus, LibraryError>;
}

#[derive(Debug, Deserialize)]
struct RawCandidate {
    path: PathBuf,
    #[serde(default)]
    movie: Option<RawMovieRef>,
    #[serde(default)]
    quality: Value,
    #[serde(default)]
    languages: Value,
}

#[derive(Debug, Deserialize)]
struct RawMovieRef {
    id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDecision {
    path: PathBuf,
    #[serde(default)]
    import_decision: Option<RawImportDecision>,
    #[serde(default)]
    movie_file: Option<RawMovieFile>,
}

#[derive(Debug, Default, Deserialize)]
struct RawImportDecision {
    #[serde(default)]
    approved: bool,
    #[serde(default)]
    rejections: Vec<RawRejection>,
}

#[derive(Debug, Deserialize)]
struct RawRejection {
    reason: String,
}

#[derive(Debug, Deserialize)]
struct RawMovieFile {
    path: PathBuf,
}

impl From<RawDecision> for ImportDecision {
    fn from(raw: RawDecision) -> Self {
        let decision = raw.import_decision.unwrap_or_default();
        ImportDecision {
            path: raw.path,
            approved: decision.approved,
            rejections: decision.rejections.into_iter().map(|r| r.reason).collect(),
            target_path: raw.movie_file.map(|f| f.path),
        }
    }
}

/// Radarr v3 API client
pub struct RadarrClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    default_profile: RadarrProfileConfig,
}

impl RadarrClient {
    pub fn new(config: &RadarrConfig) -> Result<Self, LibraryError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("pmm/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| LibraryError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            default_profile: config.default_profile.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v3{}", self.base_url, path)
    }

    /// Map non-success statuses to errors and decode the body
    async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, LibraryError> {
        let status = response.status();

        if status == 401 {
            return Err(LibraryError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LibraryError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| LibraryError::ParseError(e.to_string()))
    }

    fn add_body(&self, entry: &CatalogEntry, profile: &RadarrProfileConfig) -> Value {
        let mut body = json!({
            "title": entry.title,
            "originalTitle": entry.original_title.as_deref().unwrap_or(&entry.title),
            "year": entry.year,
            "tmdbId": entry.external_id,
            "titleSlug": title_slug(&entry.title, entry.year),
            "overview": entry.overview.as_deref().unwrap_or_default(),
            "runtime": entry.runtime.unwrap_or(0),
            "genres": entry.genres,
            "rootFolderPath": profile.root_folder_path,
            "qualityProfileId": profile.quality_profile_id,
            "minimumAvailability": profile.minimum_availability,
            "tags": profile.tags,
            "monitored": true,
            "addOptions": {"searchForMovie": false, "monitor": "movieOnly"},
        });

        if let Some(imdb_id) = &entry.imdb_id {
            body["imdbId"] = json!(imdb_id);
        }

        let images: Vec<Value> = [("poster", &entry.poster_path), ("fanart", &entry.backdrop_path)]
            .into_iter()
            .filter_map(|(cover_type, path)| {
                path.as_ref()
                    .map(|p| json!({"coverType": cover_type, "url": format!("{}{}", TMDB_IMAGE_BASE, p)}))
            })
            .collect();
        if !images.is_empty() {
            body["images"] = Value::Array(images);
        }

        body
    }
}

#[async_trait]
impl LibraryManager for RadarrClient {
    async fn find_by_external_id(&self, external_id: u64) -> Result<Option<LibraryMovie>, LibraryError> {
        tracing::debug!(tmdb_id = external_id, "Looking up movie in Radarr");

        let response = self
            .http_client
            .get(self.url("/movie"))
            .header("X-Api-Key", &self.api_key)
            .query(&[("tmdbId", external_id)])
            .send()
            .await
            .map_err(|e| LibraryError::NetworkError(e.to_string()))?;

        let movies: Vec<LibraryMovie> = Self::read_json(response).await?;
        Ok(movies.into_iter().find(|m| m.tmdb_id == external_id))
    }

    async fn add(
        &self,
        entry: &CatalogEntry,
        profile: Option<&RadarrProfileConfig>,
    ) -> Result<LibraryMovie, LibraryError> {
        let profile = profile.unwrap_or(&self.default_profile);
        let body = self.add_body(entry, profile);

        let response = self
            .http_client
            .post(self.url("/movie"))
            .header("X-Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LibraryError::NetworkError(e.to_string()))?;

        let movie: LibraryMovie = Self::read_json(response).await?;
        tracing::info!(tmdb_id = entry.external_id, radarr_id = movie.id, title = %entry.display_title(), "Added movie to Radarr");
        Ok(movie)
    }

    async fn get_import_candidates(
        &self,
        paths: &[PathBuf],
        movie: &LibraryMovie,
    ) -> Result<Vec<ImportCandidate>, LibraryError> {
        // Radarr scans folders, so ask once per parent folder and keep the requested files
        let folders: BTreeSet<&Path> = paths.iter().filter_map(|p| p.parent()).collect();
        let mut candidates = Vec::new();

        for folder in folders {
            let response = self
                .http_client
                .get(self.url("/manualimport"))
                .header("X-Api-Key", &self.api_key)
                .query(&[
                    ("folder", folder.to_string_lossy().to_string()),
                    ("movieId", movie.id.to_string()),
                    ("filterExistingFiles", "false".to_string()),
                ])
                .send()
                .await
                .map_err(|e| LibraryError::NetworkError(e.to_string()))?;

            let raw: Vec<RawCandidate> = Self::read_json(response).await?;
            candidates.extend(raw.into_iter().filter(|c| paths.contains(&c.path)).map(|c| ImportCandidate {
                path: c.path,
                movie_id: c.movie.map(|m| m.id).unwrap_or(movie.id),
                quality: c.quality,
                languages: c.languages,
            }));
        }

        tracing::debug!(radarr_id = movie.id, candidates = candidates.len(), "Fetched import candidates");
        Ok(candidates)
    }

    async fn execute_import(
        &self,
        candidates: &[ImportCandidate],
        mode: ImportMode,
    ) -> Result<Vec<ImportDecision>, LibraryError> {
        let body: Vec<Value> = candidates
            .iter()
            .map(|c| {
                json!({
                    "path": c.path,
                    "movieId": c.movie_id,
                    "quality": c.quality,
                    "languages": c.languages,
                    "importMode": radarr_import_mode(mode),
                })
            })
            .collect();

        let response = self
            .http_client
            .post(self.url("/manualimport"))
            .header("X-Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LibraryError::NetworkError(e.to_string()))?;

        let raw: Vec<RawDecision> = Self::read_json(response).await?;
        Ok(raw.into_iter().map(ImportDecision::from).collect())
    }

    async fn refresh_movie(&self, movie: &LibraryMovie) -> Result<(), LibraryError> {
        let response = self
            .http_client
            .post(self.url("/command"))
            .header("X-Api-Key", &self.api_key)
            .json(&json!({"name": "RefreshMovie", "movieIds": [movie.id]}))
            .send()
            .await
            .map_err(|e| LibraryError::NetworkError(e.to_string()))?;

        let _: Value = Self::read_json(response).await?;
        Ok(())
    }

    async fn system_status(&self) -> Result<SystemStatus, LibraryError> {
        let response = self
            .http_client
            .get(self.url("/system/status"))
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| LibraryError::NetworkError(e.to_string()))?;

        Self::read_json(response).await
    }
}

/// Radarr moves or copies; copies become hardlinks where the filesystem allows
fn radarr_import_mode(mode: ImportMode) -> &'static str {
    match mode {
        ImportMode::Move => "move",
        ImportMode::Copy | ImportMode::Hardlink => "copy",
    }
}

static SLUG_DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static SLUG_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static SLUG_HYPHENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

/// URL slug Radarr expects for a new movie ("the-matrix-1999")
pub fn title_slug(title: &str, year: Option<i32>) -> String {
    let lower = title.to_lowercase();
    let slug = SLUG_DISALLOWED.replace_all(&lower, "");
    let slug = SLUG_SPACES.replace_all(slug.trim(), "-");
    let slug = SLUG_HYPHENS.replace_all(&slug, "-");
    let slug = slug.trim_matches('-');

    match year {
        Some(year) => format!("{}-{}", slug, year),
        None => slug.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_slug() {
        assert_eq!(title_slug("The Matrix", Some(1999)), "the-matrix-1999");
        assert_eq!(title_slug("Spider-Man: No Way Home", Some(2021)), "spider-man-no-way-home-2021");
        assert_eq!(title_slug("  -Heat- ", None), "heat");
        assert_eq!(title_slug("Léon", Some(1994)), "léon-1994");
    }

    #[test]
    fn test_import_modes() {
        assert_eq!(radarr_import_mode(ImportMode::Move), "move");
        assert_eq!(radarr_import_mode(ImportMode::Copy), "copy");
        assert_eq!(radarr_import_mode(ImportMode::Hardlink), "copy");
    }

    #[test]
    fn test_decision_keeps_rejection_order() {
        let raw: RawDecision = serde_json::from_value(json!({
            "path": "/in/movie.mkv",
            "importDecision": {
                "approved": false,
                "rejections": [{"reason": "Not an upgrade"}, {"reason": "Sample"}]
            },
            "movieFile": null
        }))
        .unwrap();

        let decision = ImportDecision::from(raw);
        assert!(!decision.approved);
        assert_eq!(decision.rejections, vec!["Not an upgrade", "Sample"]);
        assert_eq!(decision.target_path, None);
    }

    #[test]
    fn test_add_body_fields() {
        let client = RadarrClient::new(&RadarrConfig::default()).unwrap();
        let mut entry = CatalogEntry::new(603, "The Matrix");
        entry.year = Some(1999);
        entry.imdb_id = Some("tt0133093".to_string());
        entry.poster_path = Some("/poster.jpg".to_string());

        let body = client.add_body(&entry, &RadarrProfileConfig::default());
        assert_eq!(body["tmdbId"], 603);
        assert_eq!(body["titleSlug"], "the-matrix-1999");
        assert_eq!(body["originalTitle"], "The Matrix");
        assert_eq!(body["imdbId"], "tt0133093");
        assert_eq!(body["addOptions"]["searchForMovie"], false);
        assert_eq!(body["addOptions"]["monitor"], "movieOnly");
        assert_eq!(body["images"][0]["coverType"], "poster");
        assert_eq!(body["images"][0]["url"], "https://image.tmdb.org/t/p/original/poster.jpg");
        assert_eq!(body["images"].as_array().unwrap().len(), 1);
    }
}
