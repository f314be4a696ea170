//! Candidate retrieval
//!
//! Queries the catalog for the primary title first and falls back to the
//! alternate titles only while the list is short of `max_results`.

use crate::models::{candidate, Candidate, CatalogEntry, ExpectedTitle};
use crate::scoring::ScoringEngine;
use crate::services::{CatalogError, MetadataCatalog};
use std::collections::HashSet;
use std::sync::Arc;

pub struct CandidateSearchCoordinator {
    catalog: Arc<dyn MetadataCatalog>,
    scoring: ScoringEngine,
}

impl CandidateSearchCoordinator {
    pub fn new(catalog: Arc<dyn MetadataCatalog>, scoring: ScoringEngine) -> Self {
        Self { catalog, scoring }
    }

    pub fn catalog(&self) -> &Arc<dyn MetadataCatalog> {
        &self.catalog
    }

    /// Scored, de-duplicated candidates, best first, at most `max_results`
    ///
    /// No results is an empty vector; only transport failures are errors.
    pub async fn find_candidates(
        &self,
        expected: &ExpectedTitle,
        max_results: usize,
    ) -> Result<Vec<Candidate>, CatalogError> {
        let mut candidates = Vec::new();
        let mut seen = HashSet::new();

        let primary = expected.primary();
        if !primary.trim().is_empty() {
            let results = self.catalog.search_by_title(primary, expected.year).await?;
            self.collect(results, primary, expected, &mut seen, &mut candidates, None);
        }

        for alternate in expected.alternates() {
            if candidates.len() >= max_results {
                break;
            }
            let results = self.catalog.search_by_title(alternate, expected.year).await?;
            self.collect(results, alternate, expected, &mut seen, &mut candidates, Some(max_results));
        }

        candidate::sort_by_score(&mut candidates);
        candidates.truncate(max_results);

        tracing::info!(
            query = %primary,
            year = ?expected.year,
            candidates = candidates.len(),
            "Found movie candidates"
        );

        Ok(candidates)
    }

    /// Score new entries into `candidates`, stopping at `limit` when given
    fn collect(
        &self,
        results: Vec<CatalogEntry>,
        query: &str,
        expected: &ExpectedTitle,
        seen: &mut HashSet<u64>,
        candidates: &mut Vec<Candidate>,
        limit: Option<usize>,
    ) {
        for entry in results {
            if limit.is_some_and(|limit| candidates.len() >= limit) {
                break;
            }
            if !seen.insert(entry.external_id) {
                continue;
            }
            let (match_score, breakdown) = self.scoring.score_with_breakdown(&entry, expected);
            candidates.push(Candidate {
                entry,
                match_score,
                breakdown,
                search_query: query.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pmm_common::config::ScoringWeights;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Catalog answering from a fixed title → results table
    struct TableCatalog {
        table: HashMap<String, Vec<CatalogEntry>>,
        queries: Mutex<Vec<String>>,
    }

    impl TableCatalog {
        fn new(rows: Vec<(&str, Vec<CatalogEntry>)>) -> Self {
            Self {
                table: rows.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MetadataCatalog for TableCatalog {
        async fn search_by_title(&self, title: &str, _year: Option<i32>) -> Result<Vec<CatalogEntry>, CatalogError> {
            self.queries.lock().unwrap().push(title.to_string());
            Ok(self.table.get(title).cloned().unwrap_or_default())
        }

        async fn get_details(&self, _external_id: u64) -> Result<Option<CatalogEntry>, CatalogError> {
            Ok(None)
        }
    }

    fn movie(id: u64, title: &str, year: i32) -> CatalogEntry {
        let mut entry = CatalogEntry::new(id, title);
        entry.year = Some(year);
        entry
    }

    fn coordinator(catalog: Arc<TableCatalog>) -> CandidateSearchCoordinator {
        CandidateSearchCoordinator::new(catalog, ScoringEngine::new(ScoringWeights::default(), 1))
    }

    #[tokio::test]
    async fn test_alternates_fill_and_dedupe() {
        let catalog = Arc::new(TableCatalog::new(vec![
            ("Amelie", vec![movie(194, "Amélie", 2001)]),
            (
                "Le Fabuleux Destin d'Amélie Poulain",
                vec![movie(194, "Amélie", 2001), movie(9999, "Amélie Poulain Story", 2003)],
            ),
        ]));
        let expected = ExpectedTitle::new("Amelie", Some(2001))
            .with_alternates(vec!["Le Fabuleux Destin d'Amélie Poulain"]);

        let candidates = coordinator(catalog.clone()).find_candidates(&expected, 10).await.unwrap();

        let ids: Vec<u64> = candidates.iter().map(|c| c.entry.external_id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&194) && ids.contains(&9999));
        assert_eq!(catalog.queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_alternates_skipped_when_full() {
        let catalog = Arc::new(TableCatalog::new(vec![(
            "Heat",
            vec![movie(949, "Heat", 1995), movie(1, "Heat Wave", 1990)],
        )]));
        let expected = ExpectedTitle::new("Heat", Some(1995)).with_alternates(vec!["Heat (1995)"]);

        let candidates = coordinator(catalog.clone()).find_candidates(&expected, 2).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].entry.external_id, 949);
        assert_eq!(*catalog.queries.lock().unwrap(), vec!["Heat".to_string()]);
    }

    #[tokio::test]
    async fn test_no_results_is_empty() {
        let catalog = Arc::new(TableCatalog::new(vec![]));
        let candidates = coordinator(catalog)
            .find_candidates(&ExpectedTitle::new("Nothing", None), 10)
            .await
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_truncates_to_max_results() {
        let many = (1..=8).map(|i| movie(i, &format!("Alien {}", i), 1979)).collect();
        let catalog = Arc::new(TableCatalog::new(vec![("Alien", many)]));

        let candidates = coordinator(catalog)
            .find_candidates(&ExpectedTitle::new("Alien", Some(1979)), 3)
            .await
            .unwrap();
        assert_eq!(candidates.len(), 3);
        assert!(candidates.windows(2).all(|w| w[0].match_score >= w[1].match_score));
    }
}
