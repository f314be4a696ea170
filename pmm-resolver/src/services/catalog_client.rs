//! Metadata catalog client (TMDb v3)
//!
//! Every request waits on a token-bucket rate limiter sized from
//! `[tmdb] requests_per_second` / `burst` before it is sent.

use crate::models::CatalogEntry;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use governor::{Quota, RateLimiter};
use pmm_common::config::TmdbConfig;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("pmm/", env!("CARGO_PKG_VERSION"));

/// Catalog client errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid TMDb API key")]
    InvalidApiKey,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Read access to the metadata catalog
#[async_trait]
pub trait MetadataCatalog: Send + Sync {
    /// Search movies by title, optionally filtered to a release year
    async fn search_by_title(&self, title: &str, year: Option<i32>) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// Full details for one movie; `None` when the id is unknown
    async fn get_details(&self, external_id: u64) -> Result<Option<CatalogEntry>, CatalogError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<TmdbMovie>,
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    name: String,
}

/// Movie record as returned by both search and details endpoints
#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: u64,
    #[serde(default)]
    title: String,
    original_title: Option<String>,
    original_language: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    popularity: Option<f64>,
    imdb_id: Option<String>,
    runtime: Option<u32>,
    #[serde(default)]
    genres: Vec<TmdbGenre>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    vote_average: Option<f64>,
    vote_count: Option<u64>,
}

impl From<TmdbMovie> for CatalogEntry {
    fn from(movie: TmdbMovie) -> Self {
        // Search results carry "" for unreleased titles
        let release_date = movie
            .release_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        CatalogEntry {
            external_id: movie.id,
            title: movie.title,
            original_title: movie.original_title,
            year: release_date.map(|d| d.year()),
            overview: movie.overview,
            popularity: movie.popularity,
            original_language: movie.original_language,
            imdb_id: movie.imdb_id.filter(|id| !id.is_empty()),
            release_date,
            runtime: movie.runtime,
            genres: movie.genres.into_iter().map(|g| g.name).collect(),
            poster_path: movie.poster_path,
            backdrop_path: movie.backdrop_path,
            vote_average: movie.vote_average,
            vote_count: movie.vote_count,
        }
    }
}

/// TMDb API client
pub struct TmdbClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    language: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| CatalogError::NetworkError(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(per_second);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst));

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            language: config.language.clone(),
            rate_limiter,
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Option<reqwest::Response>, CatalogError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Querying TMDb API");

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("language", self.language.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| CatalogError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 404 {
            return Ok(None);
        }

        if status == 401 {
            return Err(CatalogError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::ApiError(status.as_u16(), error_text));
        }

        Ok(Some(response))
    }
}

#[async_trait]
impl MetadataCatalog for TmdbClient {
    async fn search_by_title(&self, title: &str, year: Option<i32>) -> Result<Vec<CatalogEntry>, CatalogError> {
        let mut query = vec![("query", title.to_string()), ("include_adult", "false".to_string())];
        if let Some(year) = year {
            query.push(("year", year.to_string()));
        }

        let Some(response) = self.get("/search/movie", &query).await? else {
            return Ok(Vec::new());
        };

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;

        tracing::debug!(query = %title, year = ?year, results = body.results.len(), "TMDb search complete");

        Ok(body.results.into_iter().map(CatalogEntry::from).collect())
    }

    async fn get_details(&self, external_id: u64) -> Result<Option<CatalogEntry>, CatalogError> {
        let Some(response) = self.get(&format!("/movie/{}", external_id), &[]).await? else {
            tracing::debug!(tmdb_id = external_id, "TMDb movie not found");
            return Ok(None);
        };

        let movie: TmdbMovie = response
            .json()
            .await
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;

        Ok(Some(movie.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_conversion() {
        let movie: TmdbMovie = serde_json::from_value(serde_json::json!({
            "id": 603,
            "title": "The Matrix",
            "original_title": "The Matrix",
            "original_language": "en",
            "release_date": "1999-03-30",
            "popularity": 83.2,
            "imdb_id": "tt0133093",
            "runtime": 136,
            "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}],
            "vote_count": 25000
        }))
        .unwrap();

        let entry = CatalogEntry::from(movie);
        assert_eq!(entry.external_id, 603);
        assert_eq!(entry.year, Some(1999));
        assert_eq!(entry.genres, vec!["Action", "Science Fiction"]);
        assert_eq!(entry.runtime, Some(136));
        assert_eq!(entry.imdb_id.as_deref(), Some("tt0133093"));
    }

    #[test]
    fn test_empty_release_date_has_no_year() {
        let movie: TmdbMovie =
            serde_json::from_value(serde_json::json!({"id": 1, "title": "Untitled", "release_date": ""})).unwrap();
        let entry = CatalogEntry::from(movie);
        assert_eq!(entry.year, None);
        assert_eq!(entry.release_date, None);
    }
}
