//! Weighted candidate scoring
//!
//! Composite score = Σ weight × component, each component in [0, 1]:
//!
//! | component        | value                                                  |
//! |------------------|--------------------------------------------------------|
//! | title similarity | best normalized Levenshtein over titles × catalog names |
//! | year proximity   | `1 - |Δ| / max(tolerance, 1)` inside tolerance, else 0  |
//! | popularity       | `min(popularity / 100, 1)`                              |
//! | language match   | 1 on hint match, 0.5 on mismatch, 0 without hints       |

use crate::models::{CatalogEntry, ExpectedTitle, ScoreBreakdown};
use once_cell::sync::Lazy;
use pmm_common::config::ScoringWeights;
use regex::Regex;

const LEADING_ARTICLES: &[&str] = &["the ", "a ", "an "];

/// Year score when only the catalog year is known
const UNKNOWN_YEAR_SCORE: f64 = 0.5;

/// Language score when hints exist but do not match
const LANGUAGE_MISMATCH_SCORE: f64 = 0.5;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Scores catalog entries against an expected title
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    weights: ScoringWeights,
    year_tolerance: u32,
}

impl ScoringEngine {
    pub fn new(weights: ScoringWeights, year_tolerance: u32) -> Self {
        Self {
            weights,
            year_tolerance,
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Composite match score in [0, 1]
    pub fn score(&self, entry: &CatalogEntry, expected: &ExpectedTitle) -> f64 {
        self.score_with_breakdown(entry, expected).0
    }

    /// Composite score together with its per-component contributions
    pub fn score_with_breakdown(
        &self,
        entry: &CatalogEntry,
        expected: &ExpectedTitle,
    ) -> (f64, ScoreBreakdown) {
        let title_similarity = self.title_score(entry, expected);
        let year_proximity = self.year_score(entry.year, expected.year);
        let popularity = popularity_score(entry.popularity);
        let language_match = language_score(entry.original_language.as_deref(), &expected.language_hints);

        let w = &self.weights;
        let breakdown = ScoreBreakdown {
            title_similarity,
            year_proximity,
            popularity,
            language_match,
            weighted_title: w.title_similarity * title_similarity,
            weighted_year: w.year_proximity * year_proximity,
            weighted_popularity: w.popularity * popularity,
            weighted_language: w.language_match * language_match,
        };

        let total = breakdown.weighted_total().clamp(0.0, 1.0);
        (total, breakdown)
    }

    fn title_score(&self, entry: &CatalogEntry, expected: &ExpectedTitle) -> f64 {
        let catalog_titles = std::iter::once(entry.title.as_str()).chain(entry.original_title.as_deref());

        catalog_titles
            .flat_map(|catalog| {
                expected
                    .titles
                    .iter()
                    .map(move |wanted| title_similarity(wanted, catalog))
            })
            .fold(0.0, f64::max)
    }

    fn year_score(&self, catalog_year: Option<i32>, expected_year: Option<i32>) -> f64 {
        match (catalog_year, expected_year) {
            (Some(catalog), Some(expected)) => {
                let diff = (catalog - expected).unsigned_abs();
                if diff > self.year_tolerance {
                    0.0
                } else {
                    1.0 - diff as f64 / self.year_tolerance.max(1) as f64
                }
            }
            (Some(_), None) => UNKNOWN_YEAR_SCORE,
            _ => 0.0,
        }
    }
}

fn popularity_score(popularity: Option<f64>) -> f64 {
    popularity.map(|p| (p / 100.0).clamp(0.0, 1.0)).unwrap_or(0.0)
}

fn language_score(original_language: Option<&str>, hints: &[String]) -> f64 {
    if hints.is_empty() {
        return 0.0;
    }
    match original_language {
        Some(lang) if hints.iter().any(|h| h.eq_ignore_ascii_case(lang)) => 1.0,
        _ => LANGUAGE_MISMATCH_SCORE,
    }
}

/// Lower-case, drop one leading article, punctuation to spaces
pub fn normalize_title(title: &str) -> String {
    let mut lower = title.trim().to_lowercase();
    if let Some(article) = LEADING_ARTICLES.iter().find(|a| lower.starts_with(*a)) {
        lower = lower[article.len()..].to_string();
    }
    let spaced = NON_WORD.replace_all(&lower, " ");
    WHITESPACE.replace_all(spaced.trim(), " ").to_string()
}

/// Normalized Levenshtein similarity of two titles (0 when either is blank)
pub fn title_similarity(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&normalize_title(a), &normalize_title(b))
}
