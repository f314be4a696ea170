//! Candidate selection
//!
//! Turns a work item into a [`SelectionOutcome`]. Two flows share the same
//! state machine and manual fallback:
//!
//! - extraction: the semantic resolver names the title, the catalog is
//!   searched for it and the resolver confidence is combined with the top
//!   candidate's score;
//! - direct selection: the catalog is searched for the normalized filename
//!   and the semantic resolver picks among the candidates.
//!
//! When the confidence gate is not met the choice falls to
//! [`UserInteraction::choose`].

use crate::candidate_search::CandidateSearchCoordinator;
use crate::interaction::{ManualChoice, UserInteraction};
use crate::models::{
    Candidate, ExpectedTitle, FileContext, ResolutionRecord, SelectionOutcome, SelectionState, StateTransition,
    TitleExtraction,
};
use crate::normalizer::NormalizedQuery;
use crate::services::{CatalogError, SemanticError, SemanticResolver};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

/// Weight of the semantic resolver confidence in the combined confidence
pub const LLM_CONFIDENCE_WEIGHT: f64 = 0.6;
/// Weight of the top candidate's match score in the combined confidence
pub const MATCH_SCORE_WEIGHT: f64 = 0.4;

/// Item-level resolution failures
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("No title could be determined")]
    EmptyTitle,

    #[error("No candidates found for '{0}'")]
    NoCandidates(String),

    #[error("Title resolution failed: {0}")]
    Selector(#[from] SemanticError),

    #[error("Catalog search failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Batch title extraction failed: {0}")]
    BatchExtraction(String),

    #[error("Invalid selection state transition {from:?} -> {to:?}")]
    InvalidTransition { from: SelectionState, to: SelectionState },
}

/// Combined confidence for the extraction flow
pub fn combined_confidence(llm_confidence: f64, top_score: f64) -> f64 {
    LLM_CONFIDENCE_WEIGHT * llm_confidence + MATCH_SCORE_WEIGHT * top_score
}

/// Whether the extraction flow may pick the top candidate on its own
pub fn should_auto_select(llm_confidence: f64, top_score: f64, threshold: f64) -> bool {
    combined_confidence(llm_confidence, top_score) >= threshold && top_score >= threshold
}

/// State machine bookkeeping for one selection
struct SelectionTracker {
    state: SelectionState,
    transitions: Vec<StateTransition>,
}

impl SelectionTracker {
    fn new() -> Self {
        Self {
            state: SelectionState::Searched,
            transitions: Vec::new(),
        }
    }

    fn advance(&mut self, next: SelectionState) -> Result<(), ResolutionError> {
        if !self.state.can_transition_to(next) {
            return Err(ResolutionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.transitions.push(StateTransition {
            old_state: self.state,
            new_state: next,
            transitioned_at: Utc::now(),
        });
        self.state = next;
        Ok(())
    }
}

/// Automatic pick that passed the confidence gate
struct AutoPick {
    index: usize,
    confidence: f64,
    rationale: String,
}

pub struct SelectionResolver {
    search: CandidateSearchCoordinator,
    semantic: Arc<dyn SemanticResolver>,
    interaction: Arc<dyn UserInteraction>,
    max_results: usize,
}

impl SelectionResolver {
    pub fn new(
        search: CandidateSearchCoordinator,
        semantic: Arc<dyn SemanticResolver>,
        interaction: Arc<dyn UserInteraction>,
        max_results: usize,
    ) -> Self {
        Self {
            search,
            semantic,
            interaction,
            max_results,
        }
    }

    pub fn search(&self) -> &CandidateSearchCoordinator {
        &self.search
    }

    pub fn semantic(&self) -> &Arc<dyn SemanticResolver> {
        &self.semantic
    }

    /// Resolve an item whose title was already extracted
    pub async fn resolve_from_extraction(
        &self,
        context: &FileContext,
        extraction: TitleExtraction,
        threshold: f64,
    ) -> Result<SelectionOutcome, ResolutionError> {
        if extraction.canonical_title.trim().is_empty() {
            return Err(ResolutionError::EmptyTitle);
        }

        let expected = ExpectedTitle::from(&extraction);
        let candidates = self.search.find_candidates(&expected, self.max_results).await?;
        let Some(top) = candidates.first() else {
            return Err(ResolutionError::NoCandidates(extraction.canonical_title));
        };

        let combined = combined_confidence(extraction.confidence, top.match_score);
        tracing::debug!(
            item = %context.root_name,
            llm_confidence = extraction.confidence,
            top_score = top.match_score,
            combined,
            "Extraction confidence"
        );

        let auto = should_auto_select(extraction.confidence, top.match_score, threshold).then(|| AutoPick {
            index: 0,
            confidence: combined,
            rationale: extraction.rationale.clone(),
        });

        self.conclude(context, candidates, auto, Some(extraction)).await
    }

    /// Search the normalized filename and let the semantic resolver pick
    pub async fn resolve_by_selection(
        &self,
        context: &FileContext,
        query: &NormalizedQuery,
        guidance: &str,
        threshold: f64,
    ) -> Result<SelectionOutcome, ResolutionError> {
        if query.cleaned_title.trim().is_empty() {
            return Err(ResolutionError::EmptyTitle);
        }

        let expected = ExpectedTitle::from(query);
        let candidates = self.search.find_candidates(&expected, self.max_results).await?;
        if candidates.is_empty() {
            return Err(ResolutionError::NoCandidates(query.cleaned_title.clone()));
        }

        let verdict = self.semantic.select_from_candidates(&candidates, context, guidance).await?;
        if let Some(index) = verdict.index.filter(|&i| i >= candidates.len()) {
            return Err(SemanticError::MalformedResponse(format!(
                "selected candidate {} of {}",
                index + 1,
                candidates.len()
            ))
            .into());
        }

        let auto = verdict
            .index
            .filter(|_| verdict.confidence >= threshold)
            .map(|index| AutoPick {
                index,
                confidence: verdict.confidence,
                rationale: verdict.rationale.clone(),
            });

        self.conclude(context, candidates, auto, None).await
    }

    /// Drive the state machine from SEARCHED to a terminal state
    async fn conclude(
        &self,
        context: &FileContext,
        candidates: Vec<Candidate>,
        auto: Option<AutoPick>,
        extraction: Option<TitleExtraction>,
    ) -> Result<SelectionOutcome, ResolutionError> {
        let mut tracker = SelectionTracker::new();

        if let Some(pick) = auto {
            tracker.advance(SelectionState::AutoSelected)?;
            tracker.advance(SelectionState::Resolved)?;
            let chosen_entry = candidates[pick.index].entry.clone();

            tracing::info!(
                item = %context.root_name,
                tmdb_id = chosen_entry.external_id,
                title = %chosen_entry.display_title(),
                confidence = pick.confidence,
                "Auto-selected movie"
            );

            return Ok(SelectionOutcome::Resolved(Box::new(ResolutionRecord {
                chosen_entry,
                confidence: pick.confidence,
                candidates_considered: candidates,
                selected_automatically: true,
                user_confirmed: false,
                rationale: pick.rationale,
                extraction,
                transitions: tracker.transitions,
            })));
        }

        tracker.advance(SelectionState::AwaitingManualChoice)?;

        match self.interaction.choose(&context.root_name, &candidates).await {
            ManualChoice::Choice(index) if index < candidates.len() => {
                tracker.advance(SelectionState::Resolved)?;
                let chosen_entry = candidates[index].entry.clone();
                let rationale = if self.interaction.is_interactive() {
                    "Selected manually".to_string()
                } else {
                    "Best scoring candidate (non-interactive)".to_string()
                };

                tracing::info!(
                    item = %context.root_name,
                    tmdb_id = chosen_entry.external_id,
                    title = %chosen_entry.display_title(),
                    "Movie selected"
                );

                Ok(SelectionOutcome::Resolved(Box::new(ResolutionRecord {
                    chosen_entry,
                    confidence: 1.0,
                    candidates_considered: candidates,
                    selected_automatically: false,
                    user_confirmed: true,
                    rationale,
                    extraction,
                    transitions: tracker.transitions,
                })))
            }
            ManualChoice::Choice(_) | ManualChoice::Skip => {
                tracker.advance(SelectionState::Abandoned)?;
                tracing::info!(item = %context.root_name, "Selection skipped");
                Ok(SelectionOutcome::Abandoned { candidates })
            }
            ManualChoice::Cancelled => {
                tracing::info!(item = %context.root_name, "Selection cancelled");
                Ok(SelectionOutcome::Cancelled)
            }
        }
    }
}
