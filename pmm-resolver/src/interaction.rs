//! User interaction for manual candidate selection and confirmations
//!
//! [`TerminalInteraction`] reads from the terminal with rustyline on the
//! blocking pool. [`NonInteractive`] answers every question without input
//! and is used for batch runs.

use crate::models::Candidate;
use async_trait::async_trait;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::Mutex;

/// Invalid answers tolerated before a prompt gives up
pub const MAX_INVALID_INPUTS: usize = 5;

/// Answer to a manual selection prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualChoice {
    /// Zero-based candidate index
    Choice(usize),
    /// None of the candidates fits
    Skip,
    /// User interrupted the prompt (Ctrl-C / Ctrl-D)
    Cancelled,
}

#[async_trait]
pub trait UserInteraction: Send + Sync {
    /// Whether a human is answering
    fn is_interactive(&self) -> bool;

    /// Let the user pick one of `candidates` for `item`
    async fn choose(&self, item: &str, candidates: &[Candidate]) -> ManualChoice;

    /// Yes/no question; `None` when no answer could be obtained
    async fn confirm(&self, question: &str) -> Option<bool>;
}

/// Answers without a human: first candidate, no confirmations
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive;

#[async_trait]
impl UserInteraction for NonInteractive {
    fn is_interactive(&self) -> bool {
        false
    }

    async fn choose(&self, _item: &str, candidates: &[Candidate]) -> ManualChoice {
        if candidates.is_empty() {
            ManualChoice::Skip
        } else {
            ManualChoice::Choice(0)
        }
    }

    async fn confirm(&self, _question: &str) -> Option<bool> {
        None
    }
}

/// Prompts on the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalInteraction {
    // One prompt on screen at a time
    prompt_lock: Mutex<()>,
}

impl TerminalInteraction {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserInteraction for TerminalInteraction {
    fn is_interactive(&self) -> bool {
        true
    }

    async fn choose(&self, item: &str, candidates: &[Candidate]) -> ManualChoice {
        if candidates.is_empty() {
            return ManualChoice::Skip;
        }

        let _guard = self.prompt_lock.lock().await;
        let listing = format_candidates(item, candidates);
        let count = candidates.len();

        let outcome = tokio::task::spawn_blocking(move || {
            println!("{}", listing);
            let mut editor = match DefaultEditor::new() {
                Ok(editor) => editor,
                Err(e) => {
                    tracing::warn!(error = %e, "Terminal unavailable, using first candidate");
                    return ManualChoice::Choice(0);
                }
            };
            let prompt = format!("Select movie (1-{}, Enter = 1, s = skip): ", count);
            choice_loop(|| editor.readline(&prompt), count)
        })
        .await;

        outcome.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Selection prompt failed, using first candidate");
            ManualChoice::Choice(0)
        })
    }

    async fn confirm(&self, question: &str) -> Option<bool> {
        let _guard = self.prompt_lock.lock().await;
        let prompt = format!("{} [y/N]: ", question);

        tokio::task::spawn_blocking(move || {
            let mut editor = DefaultEditor::new().ok()?;
            confirm_loop(|| editor.readline(&prompt))
        })
        .await
        .ok()
        .flatten()
    }
}

/// Candidate listing shown above the selection prompt
pub fn format_candidates(item: &str, candidates: &[Candidate]) -> String {
    let mut lines = vec![String::new(), format!("Multiple matches for: {}", item)];
    for (i, candidate) in candidates.iter().enumerate() {
        lines.push(format!(
            "  {}. {} [tmdb:{}] score {:.2}",
            i + 1,
            candidate.entry.display_title(),
            candidate.entry.external_id,
            candidate.match_score
        ));
        lines.push(format!("     {}", candidate.breakdown.summary()));
        if let Some(overview) = candidate.entry.overview.as_deref().filter(|o| !o.is_empty()) {
            let preview: String = overview.chars().take(100).collect();
            lines.push(format!("     {}", preview));
        }
    }
    lines.join("\n")
}

/// Interpret one answer; `None` means the input was not understood
pub fn parse_choice(input: &str, count: usize) -> Option<ManualChoice> {
    let input = input.trim();
    if input.is_empty() {
        return Some(ManualChoice::Choice(0));
    }
    if input.eq_ignore_ascii_case("s") {
        return Some(ManualChoice::Skip);
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(ManualChoice::Choice(n - 1)),
        _ => None,
    }
}

/// Bounded selection loop over any line source
pub fn choice_loop<F>(mut read_line: F, count: usize) -> ManualChoice
where
    F: FnMut() -> Result<String, ReadlineError>,
{
    for _ in 0..MAX_INVALID_INPUTS {
        match read_line() {
            Ok(line) => match parse_choice(&line, count) {
                Some(choice) => return choice,
                None => println!("Please enter a number between 1 and {}, or 's' to skip", count),
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return ManualChoice::Cancelled,
            Err(e) => {
                tracing::warn!(error = %e, "Terminal error, using first candidate");
                return ManualChoice::Choice(0);
            }
        }
    }

    println!("Too many invalid inputs, skipping");
    ManualChoice::Skip
}

/// Bounded yes/no loop over any line source; empty input means no
pub fn confirm_loop<F>(mut read_line: F) -> Option<bool>
where
    F: FnMut() -> Result<String, ReadlineError>,
{
    for _ in 0..MAX_INVALID_INPUTS {
        let line = read_line().ok()?;
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return Some(true),
            "" | "n" | "no" => return Some(false),
            _ => println!("Please answer 'y' or 'n'"),
        }
    }
    None
}
