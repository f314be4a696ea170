//! Semantic resolver backed by an LLM
//!
//! One HTTP client serves both providers; only the request shape and the
//! location of the reply text differ. Every reply must contain a JSON value
//! matching the requested schema, anything else is a malformed response.

use crate::models::{Candidate, FileContext, SelectorVerdict, TitleExtraction};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use pmm_common::config::{LlmConfig, LlmProvider};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Overview text shown per candidate in selection prompts
const OVERVIEW_PREVIEW_CHARS: usize = 200;

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
static JSON_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a movie identification expert. Analyze the provided file information and extract canonical movie details.

IMPORTANT: You must respond with valid JSON in exactly this format:
{
    "canonical_title": "string",
    "year": integer_or_null,
    "aka_titles": ["string_array"],
    "language_hints": ["string_array"],
    "confidence": float_between_0_and_1,
    "rationale": "string",
    "director": "string_or_null",
    "genre_hints": ["string_array"],
    "edition_notes": "string_or_null"
}

Rules:
- canonical_title: The most widely recognized English title
- year: Release year (prefer theatrical release)
- aka_titles: Alternative titles, translated titles, or regional variations
- language_hints: ISO 639-1 language codes (en, es, fr, etc.)
- confidence: Your confidence in the identification (0.0-1.0)
- rationale: Brief explanation of your reasoning
- director: Director name if clearly identifiable
- genre_hints: Likely genres based on title/context
- edition_notes: Special edition info (Director's Cut, Extended, etc.)

Focus on accuracy over speed. If uncertain, lower the confidence score."#;

const BATCH_SYSTEM_ADDENDUM: &str = "\n\nYou will be given several numbered items. Respond with a JSON array \
containing exactly one object in the format above per item, in the same order as the items.";

const SELECTION_SYSTEM_PROMPT: &str = r#"You are a movie identification expert. Pick the catalog entry that matches the provided files.

IMPORTANT: You must respond with valid JSON in exactly this format:
{
    "selected": candidate_number_or_null,
    "confidence": float_between_0_and_1,
    "rationale": "string"
}

Rules:
- selected: The number of the matching candidate, or null if none matches
- confidence: Your confidence in the choice (0.0-1.0)
- rationale: Brief explanation of your reasoning"#;

/// Semantic resolver errors
#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),
}

/// Title identification capability
///
/// Two call shapes: extraction (file context → title facts, searched
/// afterwards) and direct selection (file context + candidates → pick).
#[async_trait]
pub trait SemanticResolver: Send + Sync {
    async fn extract_title_info(&self, context: &FileContext, guidance: &str)
        -> Result<TitleExtraction, SemanticError>;

    /// One request for several items; the reply is in item order
    async fn extract_batch(
        &self,
        contexts: &[FileContext],
        guidance: &str,
    ) -> Result<Vec<TitleExtraction>, SemanticError>;

    async fn select_from_candidates(
        &self,
        candidates: &[Candidate],
        context: &FileContext,
        guidance: &str,
    ) -> Result<SelectorVerdict, SemanticError>;
}

/// HTTP client for OpenAI chat completions or Anthropic messages
pub struct LlmClient {
    http_client: reqwest::Client,
    provider: LlmProvider,
    model: String,
    api_key: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, SemanticError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| SemanticError::NetworkError(e.to_string()))?;

        let default_base = match config.provider {
            LlmProvider::OpenAi => OPENAI_BASE_URL,
            LlmProvider::Anthropic => ANTHROPIC_BASE_URL,
        };

        Ok(Self {
            http_client,
            provider: config.provider,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(default_base)
                .trim_end_matches('/')
                .to_string(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Send one system + user exchange and return the reply text
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String, SemanticError> {
        let request = match self.provider {
            LlmProvider::OpenAi => self
                .http_client
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&json!({
                    "model": self.model,
                    "messages": [
                        {"role": "system", "content": system},
                        {"role": "user", "content": user},
                    ],
                    "max_tokens": max_tokens,
                    "temperature": self.temperature,
                })),
            LlmProvider::Anthropic => self
                .http_client
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&json!({
                    "model": self.model,
                    "max_tokens": max_tokens,
                    "temperature": self.temperature,
                    "system": system,
                    "messages": [{"role": "user", "content": user}],
                })),
        };

        tracing::debug!(provider = self.provider.as_str(), model = %self.model, "Sending LLM request");

        let response = request
            .send()
            .await
            .map_err(|e| SemanticError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SemanticError::ApiError(status.as_u16(), error_text));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SemanticError::MalformedResponse(e.to_string()))?;

        reply_text(self.provider, &body)
            .ok_or_else(|| SemanticError::MalformedResponse("response carries no text content".to_string()))
    }
}

#[async_trait]
impl SemanticResolver for LlmClient {
    async fn extract_title_info(
        &self,
        context: &FileContext,
        guidance: &str,
    ) -> Result<TitleExtraction, SemanticError> {
        let user = extraction_prompt(context, guidance);
        let reply = self.complete(EXTRACTION_SYSTEM_PROMPT, &user, self.max_tokens).await?;
        let extraction = parse_extraction(&reply)?;

        tracing::info!(
            title = %extraction.canonical_title,
            year = ?extraction.year,
            confidence = extraction.confidence,
            "LLM extracted title"
        );
        Ok(extraction)
    }

    async fn extract_batch(
        &self,
        contexts: &[FileContext],
        guidance: &str,
    ) -> Result<Vec<TitleExtraction>, SemanticError> {
        if contexts.is_empty() {
            return Ok(Vec::new());
        }

        let system = format!("{}{}", EXTRACTION_SYSTEM_PROMPT, BATCH_SYSTEM_ADDENDUM);
        let user = batch_prompt(contexts, guidance);
        let max_tokens = self.max_tokens.saturating_mul(contexts.len() as u32);
        let reply = self.complete(&system, &user, max_tokens).await?;

        let extractions = parse_batch(&reply)?;
        tracing::info!(requested = contexts.len(), received = extractions.len(), "LLM batch extraction complete");
        Ok(extractions)
    }

    async fn select_from_candidates(
        &self,
        candidates: &[Candidate],
        context: &FileContext,
        guidance: &str,
    ) -> Result<SelectorVerdict, SemanticError> {
        let user = selection_prompt(candidates, context, guidance);
        let reply = self.complete(SELECTION_SYSTEM_PROMPT, &user, self.max_tokens).await?;
        let verdict = parse_verdict(&reply)?;

        tracing::info!(index = ?verdict.index, confidence = verdict.confidence, "LLM selected candidate");
        Ok(verdict)
    }
}

fn reply_text(provider: LlmProvider, body: &Value) -> Option<String> {
    match provider {
        LlmProvider::OpenAi => body["choices"][0]["message"]["content"].as_str().map(str::to_string),
        LlmProvider::Anthropic => body["content"]
            .as_array()?
            .iter()
            .find(|block| block["type"] == "text")
            .and_then(|block| block["text"].as_str())
            .map(str::to_string),
    }
}

fn push_guidance(parts: &mut Vec<String>, guidance: &str) {
    if !guidance.trim().is_empty() {
        parts.push(format!("User guidance: {}", guidance.trim()));
        parts.push(String::new());
    }
}

fn push_files(parts: &mut Vec<String>, context: &FileContext) {
    for file in &context.files {
        let mut line = format!("- {}", file.name);
        if file.is_main {
            line.push_str(" (main file)");
        }
        line.push_str(&format!(" [{}MB]", file.size_mb));
        if file.directory != file.name {
            line.push_str(&format!(" in folder: {}", file.directory));
        }
        if let Some(year) = file.extracted_year {
            line.push_str(&format!(" (extracted year: {})", year));
        }
        if !file.language_hints.is_empty() {
            line.push_str(&format!(" (languages: {})", file.language_hints.join(", ")));
        }
        if let Some(edition) = &file.edition {
            line.push_str(&format!(" (edition: {})", edition));
        }
        parts.push(line);
    }
}

/// User message for a single extraction
pub fn extraction_prompt(context: &FileContext, guidance: &str) -> String {
    let mut parts = Vec::new();
    push_guidance(&mut parts, guidance);
    parts.push("Files to analyze:".to_string());
    push_files(&mut parts, context);
    parts.push(String::new());
    parts.push("Please identify this movie and respond with the required JSON format.".to_string());
    parts.join("\n")
}

/// User message for a batch extraction, items numbered from 1
pub fn batch_prompt(contexts: &[FileContext], guidance: &str) -> String {
    let mut parts = Vec::new();
    push_guidance(&mut parts, guidance);
    for (i, context) in contexts.iter().enumerate() {
        parts.push(format!("Item {} ({}):", i + 1, context.root_name));
        parts.push("Files to analyze:".to_string());
        push_files(&mut parts, context);
        parts.push(String::new());
    }
    parts.push(format!(
        "Please identify each of the {} movies and respond with a JSON array in item order.",
        contexts.len()
    ));
    parts.join("\n")
}

/// User message for direct selection, candidates numbered from 1
pub fn selection_prompt(candidates: &[Candidate], context: &FileContext, guidance: &str) -> String {
    let mut parts = Vec::new();
    push_guidance(&mut parts, guidance);
    parts.push("Files to analyze:".to_string());
    push_files(&mut parts, context);
    parts.push(String::new());
    parts.push("Candidates:".to_string());

    for (i, candidate) in candidates.iter().enumerate() {
        let entry = &candidate.entry;
        let mut line = format!("{}. {} [tmdb:{}]", i + 1, entry.display_title(), entry.external_id);
        if let Some(original) = entry.original_title.as_deref().filter(|o| *o != entry.title) {
            line.push_str(&format!(" (original title: {})", original));
        }
        if let Some(lang) = &entry.original_language {
            line.push_str(&format!(" (language: {})", lang));
        }
        if let Some(overview) = entry.overview.as_deref().filter(|o| !o.is_empty()) {
            let preview: String = overview.chars().take(OVERVIEW_PREVIEW_CHARS).collect();
            line.push_str(&format!(" - {}", preview));
        }
        parts.push(line);
    }

    parts.push(String::new());
    parts.push("Please pick the matching candidate and respond with the required JSON format.".to_string());
    parts.join("\n")
}

fn validate_confidence(confidence: f64) -> Result<(), SemanticError> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(SemanticError::MalformedResponse(format!(
            "confidence {} outside [0, 1]",
            confidence
        )));
    }
    Ok(())
}

/// Parse the first JSON object of a reply as a title extraction
pub fn parse_extraction(reply: &str) -> Result<TitleExtraction, SemanticError> {
    let json_text = JSON_OBJECT.find(reply).map(|m| m.as_str()).unwrap_or(reply);
    let extraction: TitleExtraction = serde_json::from_str(json_text)
        .map_err(|e| SemanticError::MalformedResponse(format!("Failed to parse LLM response: {}", e)))?;
    validate_confidence(extraction.confidence)?;
    Ok(extraction)
}

/// Parse the first JSON array of a reply as batch extractions
pub fn parse_batch(reply: &str) -> Result<Vec<TitleExtraction>, SemanticError> {
    let json_text = JSON_ARRAY.find(reply).map(|m| m.as_str()).unwrap_or(reply);
    let extractions: Vec<TitleExtraction> = serde_json::from_str(json_text)
        .map_err(|e| SemanticError::MalformedResponse(format!("Failed to parse LLM batch response: {}", e)))?;
    for extraction in &extractions {
        validate_confidence(extraction.confidence)?;
    }
    Ok(extractions)
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    selected: Option<usize>,
    confidence: f64,
    rationale: String,
}

/// Parse a selection reply; the 1-based pick becomes a 0-based index
pub fn parse_verdict(reply: &str) -> Result<SelectorVerdict, SemanticError> {
    let json_text = JSON_OBJECT.find(reply).map(|m| m.as_str()).unwrap_or(reply);
    let raw: RawVerdict = serde_json::from_str(json_text)
        .map_err(|e| SemanticError::MalformedResponse(format!("Failed to parse LLM response: {}", e)))?;
    validate_confidence(raw.confidence)?;

    let index = match raw.selected {
        Some(0) => {
            return Err(SemanticError::MalformedResponse(
                "candidate numbers start at 1".to_string(),
            ))
        }
        Some(n) => Some(n - 1),
        None => None,
    };

    Ok(SelectorVerdict {
        index,
        confidence: raw.confidence,
        rationale: raw.rationale,
    })
}
