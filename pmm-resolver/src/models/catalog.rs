//! Metadata catalog entry

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A title record from the metadata catalog, keyed by its external id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Catalog (TMDb) identifier, the idempotency key for library operations
    pub external_id: u64,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub overview: Option<String>,
    pub popularity: Option<f64>,
    /// ISO 639-1 code of the original language
    pub original_language: Option<String>,
    pub imdb_id: Option<String>,
    pub release_date: Option<NaiveDate>,
    /// Runtime in minutes
    pub runtime: Option<u32>,
    pub genres: Vec<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<u64>,
}

impl CatalogEntry {
    /// Minimal entry, mostly useful for building fixtures
    pub fn new(external_id: u64, title: impl Into<String>) -> Self {
        Self {
            external_id,
            title: title.into(),
            original_title: None,
            year: None,
            overview: None,
            popularity: None,
            original_language: None,
            imdb_id: None,
            release_date: None,
            runtime: None,
            genres: Vec::new(),
            poster_path: None,
            backdrop_path: None,
            vote_average: None,
            vote_count: None,
        }
    }

    /// "Title (Year)" or "Title (Unknown)"
    pub fn display_title(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({})", self.title, year),
            None => format!("{} (Unknown)", self.title),
        }
    }

    /// Public catalog page
    pub fn catalog_url(&self) -> String {
        format!("https://www.themoviedb.org/movie/{}", self.external_id)
    }
}
