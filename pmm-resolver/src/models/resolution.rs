//! Selection state machine and resolution records
//!
//! SEARCHED → {AUTO_SELECTED | AWAITING_MANUAL_CHOICE} → RESOLVED | ABANDONED

use super::candidate::Candidate;
use super::catalog::CatalogEntry;
use super::extraction::TitleExtraction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Selection workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionState {
    /// Candidates retrieved and scored
    Searched,
    /// Confidence gate passed
    AutoSelected,
    /// Waiting on a human (or the non-interactive default)
    AwaitingManualChoice,
    /// A candidate was chosen
    Resolved,
    /// User skipped or cancelled
    Abandoned,
}

impl SelectionState {
    /// Whether `next` may follow `self`
    pub fn can_transition_to(self, next: SelectionState) -> bool {
        use SelectionState::*;
        matches!(
            (self, next),
            (Searched, AutoSelected)
                | (Searched, AwaitingManualChoice)
                | (AutoSelected, Resolved)
                | (AwaitingManualChoice, Resolved)
                | (AwaitingManualChoice, Abandoned)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SelectionState::Resolved | SelectionState::Abandoned)
    }
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub old_state: SelectionState,
    pub new_state: SelectionState,
    pub transitioned_at: DateTime<Utc>,
}

/// Final answer for one work item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub chosen_entry: CatalogEntry,
    /// Confidence in [0, 1]; 1.0 for a human-confirmed pick
    pub confidence: f64,
    pub candidates_considered: Vec<Candidate>,
    pub selected_automatically: bool,
    pub user_confirmed: bool,
    pub rationale: String,
    /// Extraction that drove the search (extraction flow only)
    pub extraction: Option<TitleExtraction>,
    pub transitions: Vec<StateTransition>,
}

/// Non-error outcomes of selection
#[derive(Debug, Clone)]
pub enum SelectionOutcome {
    Resolved(Box<ResolutionRecord>),
    /// User skipped every candidate
    Abandoned { candidates: Vec<Candidate> },
    /// User interrupted the prompt
    Cancelled,
}

impl SelectionOutcome {
    pub fn record(&self) -> Option<&ResolutionRecord> {
        match self {
            SelectionOutcome::Resolved(record) => Some(record),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SelectionState::*;

    #[test]
    fn test_allowed_transitions() {
        assert!(Searched.can_transition_to(AutoSelected));
        assert!(Searched.can_transition_to(AwaitingManualChoice));
        assert!(AutoSelected.can_transition_to(Resolved));
        assert!(AwaitingManualChoice.can_transition_to(Resolved));
        assert!(AwaitingManualChoice.can_transition_to(Abandoned));
    }

    #[test]
    fn test_forbidden_transitions() {
        assert!(!Searched.can_transition_to(Resolved));
        assert!(!AutoSelected.can_transition_to(Abandoned));
        assert!(!Resolved.can_transition_to(Searched));
        assert!(!Abandoned.can_transition_to(Resolved));
        assert!(Resolved.is_terminal() && Abandoned.is_terminal());
    }
}
