//! Configuration resolution for pmm
//!
//! Loads the TOML configuration and resolves API keys with
//! environment → TOML priority.

use pmm_common::config::{self, AppConfig};
use pmm_common::{Error, Result};
use std::path::Path;
use tracing::{info, warn};

/// Environment variable overriding `[llm] api_key`
pub const LLM_API_KEY_ENV: &str = "PMM_LLM_API_KEY";
/// Environment variable overriding `[tmdb] api_key`
pub const TMDB_API_KEY_ENV: &str = "PMM_TMDB_API_KEY";
/// Environment variable overriding `[radarr] api_key`
pub const RADARR_API_KEY_ENV: &str = "PMM_RADARR_API_KEY";

/// Where a resolved key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Environment,
    Toml,
    Missing,
}

/// Resolve one API key
///
/// **Priority:** ENV → TOML
///
/// Returns the key (empty when missing) and its source.
pub fn resolve_api_key(name: &str, env_var: &str, toml_key: &str) -> (String, KeySource) {
    let env_key = std::env::var(env_var).ok().filter(|k| is_valid_key(k));
    let toml_valid = config::is_configured(toml_key);

    // Warn if multiple sources (potential misconfiguration)
    if env_key.is_some() && toml_valid {
        warn!(
            "{} API key found in both {} and TOML config. Using environment variable.",
            name, env_var
        );
    }

    if let Some(key) = env_key {
        info!("{} API key loaded from environment variable", name);
        return (key, KeySource::Environment);
    }

    if toml_valid {
        info!("{} API key loaded from TOML config", name);
        return (toml_key.to_string(), KeySource::Toml);
    }

    (String::new(), KeySource::Missing)
}

/// Apply environment overrides to every API key in `config`
pub fn resolve_api_keys(config: &mut AppConfig) {
    config.llm.api_key = resolve_api_key("LLM", LLM_API_KEY_ENV, &config.llm.api_key).0;
    config.tmdb.api_key = resolve_api_key("TMDb", TMDB_API_KEY_ENV, &config.tmdb.api_key).0;
    config.radarr.api_key = resolve_api_key("Radarr", RADARR_API_KEY_ENV, &config.radarr.api_key).0;
}

/// Load configuration, resolve API keys and apply command-line overrides
pub fn load(explicit: Option<&Path>, dry_run: bool) -> Result<AppConfig> {
    let mut config = config::load_config(explicit)?;
    resolve_api_keys(&mut config);
    if dry_run {
        config.app.dry_run = true;
    }
    Ok(config)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Select the resolver guidance for a run
///
/// An explicit prompt wins; an unknown profile name is an error.
pub fn guidance(config: &AppConfig, prompt: Option<&str>, profile: Option<&str>) -> Result<String> {
    if let Some(name) = profile.filter(|_| prompt.is_none()) {
        if !config.prompts.profiles.contains_key(name) {
            return Err(Error::InvalidInput(format!("Unknown prompt profile '{}'", name)));
        }
    }
    Ok(config.prompts.resolve(prompt, profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_environment_wins_over_toml() {
        std::env::set_var("PMM_TEST_KEY_A", "from-env");
        let (key, source) = resolve_api_key("Test", "PMM_TEST_KEY_A", "from-toml");
        std::env::remove_var("PMM_TEST_KEY_A");

        assert_eq!(key, "from-env");
        assert_eq!(source, KeySource::Environment);
    }

    #[test]
    #[serial]
    fn test_toml_used_when_environment_unset() {
        std::env::remove_var("PMM_TEST_KEY_B");
        let (key, source) = resolve_api_key("Test", "PMM_TEST_KEY_B", "from-toml");
        assert_eq!(key, "from-toml");
        assert_eq!(source, KeySource::Toml);
    }

    #[test]
    #[serial]
    fn test_unexpanded_reference_is_missing() {
        std::env::remove_var("PMM_TEST_KEY_C");
        let (key, source) = resolve_api_key("Test", "PMM_TEST_KEY_C", "${PMM_UNSET_VARIABLE}");
        assert!(key.is_empty());
        assert_eq!(source, KeySource::Missing);
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc123"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }

    #[test]
    fn test_unknown_profile_rejected() {
        let config = AppConfig::template();
        assert!(guidance(&config, None, Some("no-such-profile")).is_err());
        assert_eq!(
            guidance(&config, Some("be strict"), Some("no-such-profile")).unwrap(),
            "be strict"
        );
        assert_eq!(
            guidance(&config, None, Some("foreign")).unwrap(),
            config.prompts.profiles["foreign"]
        );
    }
}
