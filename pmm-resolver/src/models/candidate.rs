//! Scored catalog candidates

use super::catalog::CatalogEntry;
use super::extraction::TitleExtraction;
use serde::{Deserialize, Serialize};

/// What a candidate is compared against
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedTitle {
    /// Primary title first, alternates after it; no duplicates
    pub titles: Vec<String>,
    pub year: Option<i32>,
    pub language_hints: Vec<String>,
}

impl ExpectedTitle {
    pub fn new(title: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            titles: vec![title.into()],
            year,
            language_hints: Vec::new(),
        }
    }

    /// Add alternate titles, skipping blanks and duplicates
    pub fn with_alternates<I, S>(mut self, alternates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for title in alternates {
            let title = title.into();
            if !title.trim().is_empty() && !self.titles.contains(&title) {
                self.titles.push(title);
            }
        }
        self
    }

    pub fn with_language_hints(mut self, hints: Vec<String>) -> Self {
        self.language_hints = hints;
        self
    }

    /// Title used for the first catalog query
    pub fn primary(&self) -> &str {
        self.titles.first().map(String::as_str).unwrap_or("")
    }

    /// Titles queried when the primary search comes up short
    pub fn alternates(&self) -> &[String] {
        self.titles.get(1..).unwrap_or(&[])
    }
}

impl From<&TitleExtraction> for ExpectedTitle {
    fn from(extraction: &TitleExtraction) -> Self {
        ExpectedTitle::new(extraction.canonical_title.clone(), extraction.year)
            .with_alternates(extraction.aka_titles.iter().cloned())
            .with_language_hints(extraction.language_hints.clone())
    }
}

/// Per-component scores, each in [0, 1], with their weighted contributions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub title_similarity: f64,
    pub year_proximity: f64,
    pub popularity: f64,
    pub language_match: f64,
    pub weighted_title: f64,
    pub weighted_year: f64,
    pub weighted_popularity: f64,
    pub weighted_language: f64,
}

impl ScoreBreakdown {
    /// Sum of weighted components before clamping
    pub fn weighted_total(&self) -> f64 {
        self.weighted_title + self.weighted_year + self.weighted_popularity + self.weighted_language
    }

    /// Create a human-readable summary of the scoring
    pub fn summary(&self) -> String {
        format!(
            "title:{:.0}%→{:.2}, year:{:.0}%→{:.2}, popularity:{:.0}%→{:.2}, language:{:.0}%→{:.2}",
            self.title_similarity * 100.0,
            self.weighted_title,
            self.year_proximity * 100.0,
            self.weighted_year,
            self.popularity * 100.0,
            self.weighted_popularity,
            self.language_match * 100.0,
            self.weighted_language,
        )
    }
}

/// A catalog entry paired with its match score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub entry: CatalogEntry,
    /// Composite score in [0, 1]
    pub match_score: f64,
    pub breakdown: ScoreBreakdown,
    /// Query that found this candidate
    pub search_query: String,
}

/// Stable sort by match score, best first (ties keep discovery order)
pub fn sort_by_score(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u64, score: f64) -> Candidate {
        Candidate {
            entry: CatalogEntry::new(id, format!("Movie {}", id)),
            match_score: score,
            breakdown: ScoreBreakdown::default(),
            search_query: "q".to_string(),
        }
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let mut list = vec![candidate(1, 0.5), candidate(2, 0.9), candidate(3, 0.5), candidate(4, 0.9)];
        sort_by_score(&mut list);
        let ids: Vec<u64> = list.iter().map(|c| c.entry.external_id).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_expected_title_dedupes_alternates() {
        let expected = ExpectedTitle::new("Amelie", Some(2001))
            .with_alternates(vec!["Le Fabuleux Destin d'Amélie Poulain", "Amelie", " "]);
        assert_eq!(expected.primary(), "Amelie");
        assert_eq!(expected.alternates().len(), 1);
    }

    #[test]
    fn test_expected_title_empty_has_no_alternates() {
        let expected = ExpectedTitle::default();
        assert_eq!(expected.primary(), "");
        assert!(expected.alternates().is_empty());
    }

    #[test]
    fn test_breakdown_summary_format() {
        let breakdown = ScoreBreakdown {
            title_similarity: 0.8,
            weighted_title: 0.32,
            ..Default::default()
        };
        assert!(breakdown.summary().starts_with("title:80%→0.32"));
    }
}
