//! Semantic resolver responses

use serde::{Deserialize, Serialize};

/// Title information extracted from file context by the semantic resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleExtraction {
    pub canonical_title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub aka_titles: Vec<String>,
    #[serde(default)]
    pub language_hints: Vec<String>,
    /// Resolver confidence in [0, 1]
    pub confidence: f64,
    pub rationale: String,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub genre_hints: Vec<String>,
    #[serde(default)]
    pub edition_notes: Option<String>,
}

/// Direct pick among candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorVerdict {
    /// Zero-based candidate index, `None` when nothing fits
    #[serde(default)]
    pub index: Option<usize>,
    pub confidence: f64,
    #[serde(default)]
    pub rationale: String,
}
