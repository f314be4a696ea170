//! Configuration loading, lookup and validation
//!
//! Configuration is a single TOML file. Lookup order:
//! 1. Explicit path (command-line `--config`)
//! 2. `PMM_CONFIG` environment variable
//! 3. `./config/config.toml`, then `./config.toml`
//! 4. OS config directory (`~/.config/pmm/config.toml` on Linux)
//! 5. `~/.pmm/config.toml`
//!
//! `${VAR}` references anywhere in the file are expanded from the
//! environment before parsing. Unset variables are left as written, so an
//! unexpanded API key reads as "not configured" rather than as a key.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "PMM_CONFIG";

/// Default location written by `pmm init`
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

static ENV_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex is valid")
});

const ALLOWED_AVAILABILITY: [&str; 4] = ["announced", "inCinemas", "released", "preDB"];
const ALLOWED_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Complete application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub tmdb: TmdbConfig,
    pub radarr: RadarrConfig,
    pub matching: MatchingConfig,
    pub files: FilesConfig,
    pub prompts: PromptsConfig,
    pub logging: LoggingConfig,
    pub app: AppSettings,
}

/// Semantic (LLM) provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    Anthropic,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: String,
    /// Overrides the provider's public endpoint (proxies, local gateways)
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
            base_url: None,
            max_tokens: 1000,
            temperature: 0.1,
            timeout: 30,
        }
    }
}

/// TMDb catalog configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TmdbConfig {
    pub api_key: String,
    pub base_url: String,
    pub language: String,
    /// Request timeout in seconds
    pub timeout: u64,
    pub requests_per_second: u32,
    pub burst: u32,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.themoviedb.org/3".to_string(),
            language: "en-US".to_string(),
            timeout: 10,
            requests_per_second: 4,
            burst: 10,
        }
    }
}

/// Defaults applied when adding a movie to Radarr
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RadarrProfileConfig {
    pub quality_profile_id: i64,
    pub root_folder_path: String,
    pub minimum_availability: String,
    /// Radarr tag ids
    pub tags: Vec<i64>,
}

impl Default for RadarrProfileConfig {
    fn default() -> Self {
        Self {
            quality_profile_id: 1,
            root_folder_path: "/movies".to_string(),
            minimum_availability: "announced".to_string(),
            tags: Vec::new(),
        }
    }
}

/// How imported files reach the library folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    #[default]
    Hardlink,
    Copy,
    Move,
}

impl ImportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::Hardlink => "hardlink",
            ImportMode::Copy => "copy",
            ImportMode::Move => "move",
        }
    }
}

/// File import settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RadarrImportConfig {
    pub mode: ImportMode,
    pub delete_empty_folders: bool,
}

/// Radarr library manager configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RadarrConfig {
    pub enabled: bool,
    pub url: String,
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout: u64,
    pub default_profile: RadarrProfileConfig,
    pub import: RadarrImportConfig,
}

impl Default for RadarrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost:7878".to_string(),
            api_key: String::new(),
            timeout: 30,
            default_profile: RadarrProfileConfig::default(),
            import: RadarrImportConfig::default(),
        }
    }
}

/// Which semantic call shape drives selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionStrategy {
    /// LLM extracts title info, candidates are scored, confidences are combined
    #[default]
    Extraction,
    /// LLM picks directly from candidates found for the normalized filename
    Direct,
}

/// Composite score weights (must sum to 1.0 ± 0.01)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub title_similarity: f64,
    pub year_proximity: f64,
    pub popularity: f64,
    pub language_match: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            title_similarity: 0.4,
            year_proximity: 0.3,
            popularity: 0.2,
            language_match: 0.1,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.title_similarity + self.year_proximity + self.popularity + self.language_match
    }

    /// Reject negative weights and sums outside [0.99, 1.01]
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("title_similarity", self.title_similarity),
            ("year_proximity", self.year_proximity),
            ("popularity", self.popularity),
            ("language_match", self.language_match),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "Scoring weight {} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        let total = self.sum();
        if !(0.99..=1.01).contains(&total) {
            return Err(Error::Config(format!(
                "Scoring weights must sum to 1.0, got {:.3}",
                total
            )));
        }
        Ok(())
    }
}

/// Matching and resolution policy
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub confidence_threshold: f64,
    pub year_tolerance: u32,
    pub max_search_results: usize,
    pub auto_add_to_library: bool,
    pub auto_import: bool,
    pub selection_strategy: SelectionStrategy,
    pub scoring: ScoringWeights,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            year_tolerance: 1,
            max_search_results: 10,
            auto_add_to_library: false,
            auto_import: false,
            selection_strategy: SelectionStrategy::Extraction,
            scoring: ScoringWeights::default(),
        }
    }
}

/// File discovery settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilesConfig {
    pub video_extensions: Vec<String>,
    pub subtitle_extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub min_file_size_mb: u64,
    pub scan_depth: usize,
}

impl Default for FilesConfig {
    fn default() -> Self {
        let to_strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            video_extensions: to_strings(&[
                ".mkv", ".mp4", ".avi", ".mov", ".wmv", ".flv", ".webm", ".m4v",
            ]),
            subtitle_extensions: to_strings(&[".srt", ".sub", ".idx", ".ass", ".ssa", ".vtt"]),
            ignore_patterns: to_strings(&["sample", "trailer", "extras", "behind.the.scenes"]),
            min_file_size_mb: 100,
            scan_depth: 2,
        }
    }
}

/// Guidance prompts for the semantic resolver
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub default: String,
    pub profiles: BTreeMap<String, String>,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            default: "Identify the movie from the file and folder names. Prefer the original \
                      theatrical release."
                .to_string(),
            profiles: BTreeMap::new(),
        }
    }
}

impl PromptsConfig {
    /// Pick the guidance text: explicit prompt, then named profile, then default
    pub fn resolve(&self, prompt: Option<&str>, profile: Option<&str>) -> String {
        if let Some(prompt) = prompt.filter(|p| !p.trim().is_empty()) {
            return prompt.to_string();
        }
        if let Some(name) = profile {
            match self.profiles.get(name) {
                Some(text) => return text.clone(),
                None => tracing::warn!(profile = name, "Unknown prompt profile, using default"),
            }
        }
        self.default.clone()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr only if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Run behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppSettings {
    pub dry_run: bool,
    pub interactive: bool,
    pub batch_size: usize,
    pub parallel_workers: usize,
    pub retry_attempts: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            dry_run: false,
            interactive: true,
            batch_size: 10,
            parallel_workers: 3,
            retry_attempts: 3,
        }
    }
}

impl AppConfig {
    /// Configuration written by `pmm init`: defaults with API keys taken from
    /// the environment at load time
    pub fn template() -> Self {
        let mut config = Self::default();
        config.llm.api_key = "${OPENAI_API_KEY}".to_string();
        config.tmdb.api_key = "${TMDB_API_KEY}".to_string();
        config.radarr.api_key = "${RADARR_API_KEY}".to_string();
        config.prompts.profiles.insert(
            "foreign".to_string(),
            "Titles may be in their original language. Prefer the original title and year."
                .to_string(),
        );
        config
    }

    /// Validate value ranges and enumerated strings
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::Config(format!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }
        for (name, timeout) in [
            ("llm.timeout", self.llm.timeout),
            ("tmdb.timeout", self.tmdb.timeout),
            ("radarr.timeout", self.radarr.timeout),
        ] {
            if timeout == 0 {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
        }
        if self.tmdb.requests_per_second == 0 || self.tmdb.burst == 0 {
            return Err(Error::Config(
                "tmdb.requests_per_second and tmdb.burst must be greater than 0".to_string(),
            ));
        }
        if !ALLOWED_AVAILABILITY.contains(&self.radarr.default_profile.minimum_availability.as_str())
        {
            return Err(Error::Config(format!(
                "radarr.default_profile.minimum_availability must be one of {:?}, got '{}'",
                ALLOWED_AVAILABILITY, self.radarr.default_profile.minimum_availability
            )));
        }
        if !(0.0..=1.0).contains(&self.matching.confidence_threshold) {
            return Err(Error::Config(format!(
                "matching.confidence_threshold must be between 0.0 and 1.0, got {}",
                self.matching.confidence_threshold
            )));
        }
        if self.matching.max_search_results == 0 {
            return Err(Error::Config(
                "matching.max_search_results must be greater than 0".to_string(),
            ));
        }
        self.matching.scoring.validate()?;
        if self.app.batch_size == 0 || self.app.parallel_workers == 0 {
            return Err(Error::Config(
                "app.batch_size and app.parallel_workers must be greater than 0".to_string(),
            ));
        }
        if !ALLOWED_LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::Config(format!(
                "logging.level must be one of {:?}, got '{}'",
                ALLOWED_LOG_LEVELS, self.logging.level
            )));
        }
        Ok(())
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))
    }
}

/// An API key counts as configured when non-blank and fully expanded
pub fn is_configured(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && !ENV_REFERENCE.is_match(trimmed)
}

/// Expand `${VAR}` references from the process environment
///
/// Unset variables are kept verbatim.
pub fn expand_env_vars(input: &str) -> String {
    ENV_REFERENCE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Candidate locations in lookup order (explicit path excluded)
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
        if !env_path.trim().is_empty() {
            paths.push(PathBuf::from(env_path));
        }
    }

    paths.push(PathBuf::from(DEFAULT_CONFIG_PATH));
    paths.push(PathBuf::from("config.toml"));

    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("pmm").join("config.toml"));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".pmm").join("config.toml"));
    }

    paths
}

/// Find the configuration file to load
pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::NotFound(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let candidates = config_search_paths();
    for path in &candidates {
        if path.exists() {
            debug!(path = %path.display(), "Found configuration file");
            return Ok(path.clone());
        }
    }

    Err(Error::Config(format!(
        "Configuration file not found in any of: {}. Run `pmm init` to create one.",
        candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )))
}

/// Parse and validate configuration text (environment already expanded)
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a specific file
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = parse_config(&expand_env_vars(&raw))?;
    info!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

/// Locate and load configuration
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let path = find_config_file(explicit)?;
    load_config_from(&path)
}

/// Write the template configuration to `path`
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::InvalidInput(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::template().to_toml()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.matching.confidence_threshold, 0.8);
        assert_eq!(config.matching.max_search_results, 10);
        assert_eq!(config.app.parallel_workers, 3);
        assert_eq!(config.radarr.import.mode, ImportMode::Hardlink);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = parse_config(
            r#"
            [llm]
            provider = "anthropic"
            model = "claude-3-haiku"

            [matching]
            confidence_threshold = 0.7
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.provider, LlmProvider::Anthropic);
        assert_eq!(config.llm.max_tokens, 1000);
        assert_eq!(config.matching.confidence_threshold, 0.7);
        assert_eq!(config.matching.year_tolerance, 1);
        assert_eq!(config.tmdb.base_url, "https://api.themoviedb.org/3");
    }

    #[test]
    fn test_weights_outside_tolerance_rejected() {
        let result = parse_config(
            r#"
            [matching.scoring]
            title_similarity = 0.5
            year_proximity = 0.3
            popularity = 0.2
            language_match = 0.1
            "#,
        );
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("sum to 1.0"), "{}", msg),
            other => panic!("Expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_weights_within_tolerance_accepted() {
        let weights = ScoringWeights {
            title_similarity: 0.405,
            year_proximity: 0.3,
            popularity: 0.2,
            language_match: 0.1,
        };
        assert!(weights.validate().is_ok());

        let negative = ScoringWeights {
            title_similarity: 1.1,
            year_proximity: -0.1,
            popularity: 0.0,
            language_match: 0.0,
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let result = parse_config("[llm]\nprovider = \"gemini\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_availability_and_mode_rejected() {
        let availability = parse_config(
            "[radarr.default_profile]\nminimum_availability = \"tomorrow\"\n",
        );
        assert!(matches!(availability, Err(Error::Config(_))));

        let mode = parse_config("[radarr.import]\nmode = \"symlink\"\n");
        assert!(matches!(mode, Err(Error::Config(_))));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let result = parse_config("[matching]\nconfidence_threshold = 1.5\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn test_env_expansion() {
        std::env::set_var("PMM_TEST_TMDB_KEY", "abc123");
        std::env::remove_var("PMM_TEST_UNSET_KEY");

        let expanded = expand_env_vars("key = \"${PMM_TEST_TMDB_KEY}\" other = \"${PMM_TEST_UNSET_KEY}\"");
        assert_eq!(
            expanded,
            "key = \"abc123\" other = \"${PMM_TEST_UNSET_KEY}\""
        );

        std::env::remove_var("PMM_TEST_TMDB_KEY");
    }

    #[test]
    fn test_is_configured() {
        assert!(is_configured("abc"));
        assert!(!is_configured("   "));
        assert!(!is_configured("${OPENAI_API_KEY}"));
    }

    #[test]
    fn test_prompt_resolution_order() {
        let mut prompts = PromptsConfig::default();
        prompts
            .profiles
            .insert("anime".to_string(), "Japanese animation".to_string());

        assert_eq!(prompts.resolve(Some("explicit"), Some("anime")), "explicit");
        assert_eq!(prompts.resolve(None, Some("anime")), "Japanese animation");
        assert_eq!(prompts.resolve(None, Some("missing")), prompts.default);
        assert_eq!(prompts.resolve(Some("  "), None), prompts.default);
    }

    #[test]
    fn test_template_parses_back() {
        let text = AppConfig::template().to_toml().unwrap();
        let config = parse_config(&text).unwrap();
        assert_eq!(config.llm.api_key, "${OPENAI_API_KEY}");
        assert!(config.prompts.profiles.contains_key("foreign"));
    }

    #[test]
    fn test_explicit_missing_path_is_not_found() {
        let result = find_config_file(Some(Path::new("/nonexistent/pmm/config.toml")));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
