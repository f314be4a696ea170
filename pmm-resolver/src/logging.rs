//! Tracing subscriber setup
//!
//! Filter priority: `--verbose` (debug) > `RUST_LOG` > `[logging] level`.
//! Logs go to stderr, and additionally to `[logging] file` without ANSI
//! colors when one is configured.

use pmm_common::config::LoggingConfig;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directives used when `RUST_LOG` is not set
pub fn default_directives(config: &LoggingConfig, verbose: bool) -> String {
    let level = if verbose { "debug".to_string() } else { config.level.to_lowercase() };
    format!("pmm={level},pmm_resolver={level},pmm_common={level},warn")
}

fn build_env_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    if !verbose {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
    }
    EnvFilter::new(default_directives(config, verbose))
}

/// Open `path` for appending, creating its parent directory first
fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber
///
/// A log file that cannot be opened is reported once the subscriber is up
/// and skipped.
pub fn init(config: &LoggingConfig, verbose: bool) {
    let mut file_error = None;
    let file_layer = config.file.as_ref().and_then(|path| match open_log_file(path) {
        Ok(file) => Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false)),
        Err(e) => {
            file_error = Some((path.clone(), e));
            None
        }
    });

    tracing_subscriber::registry()
        .with(build_env_filter(config, verbose))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .init();

    if let Some((path, e)) = file_error {
        tracing::warn!(path = %path.display(), error = %e, "Cannot open log file, logging to stderr only");
    }
}
