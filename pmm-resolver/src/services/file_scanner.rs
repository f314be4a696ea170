//! Video file scanner
//!
//! Walks an input path and sorts what it finds into video files, subtitle
//! files and ignored files. Walking is synchronous; async callers run it on
//! the blocking pool via [`FileScanner::scan_blocking`].

use crate::models::{FileInfo, ScanResult};
use crate::normalizer;
use pmm_common::config::FilesConfig;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// File scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Cannot access file
    #[error("File access error {0}: {1}")]
    FileAccessError(PathBuf, String),

    /// Scan task did not complete
    #[error("Scan task failed: {0}")]
    TaskFailed(String),
}

/// Media file scanner
#[derive(Debug, Clone)]
pub struct FileScanner {
    video_extensions: HashSet<String>,
    subtitle_extensions: HashSet<String>,
    ignore_patterns: Vec<String>,
    min_video_bytes: u64,
    max_depth: usize,
}

impl FileScanner {
    pub fn new(config: &FilesConfig) -> Self {
        Self {
            video_extensions: config.video_extensions.iter().map(|e| normalize_extension(e)).collect(),
            subtitle_extensions: config
                .subtitle_extensions
                .iter()
                .map(|e| normalize_extension(e))
                .collect(),
            ignore_patterns: config.ignore_patterns.iter().map(|p| p.to_lowercase()).collect(),
            min_video_bytes: config.min_file_size_mb * BYTES_PER_MB,
            max_depth: config.scan_depth,
        }
    }

    /// Scan a directory (or a single file) for media files
    ///
    /// Unreadable entries are recorded in [`ScanResult::errors`] and skipped;
    /// only a missing root path fails the scan.
    pub fn scan(&self, path: &Path) -> Result<ScanResult, ScanError> {
        if !path.exists() {
            return Err(ScanError::PathNotFound(path.to_path_buf()));
        }

        if path.is_file() {
            return self.scan_single_file(path);
        }

        tracing::info!(path = %path.display(), "Scanning directory");

        let mut result = ScanResult::new(path);

        // Depth 0 is the root itself; files directly in it sit at depth 1
        let walker = WalkDir::new(path)
            .follow_links(false)
            .max_depth(self.max_depth + 1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if let Err(e) = self.process_entry(&entry, path, &mut result) {
                        tracing::warn!(error = %e, "Skipping unreadable file");
                        result.errors.push(e.to_string());
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    result.errors.push(e.to_string());
                }
            }
        }

        result.total_size_bytes = result.video_files.iter().map(|f| f.size_bytes).sum();

        tracing::info!(
            path = %path.display(),
            videos = result.video_files.len(),
            subtitles = result.subtitle_files.len(),
            ignored = result.ignored_files.len(),
            "Scan completed"
        );

        Ok(result)
    }

    /// Run [`FileScanner::scan`] on the blocking pool
    pub async fn scan_blocking(&self, path: PathBuf) -> Result<ScanResult, ScanError> {
        let scanner = self.clone();
        tokio::task::spawn_blocking(move || scanner.scan(&path))
            .await
            .map_err(|e| ScanError::TaskFailed(e.to_string()))?
    }

    /// Paths of every video and subtitle file under `path`
    pub fn list_media_files(&self, path: &Path) -> Result<Vec<PathBuf>, ScanError> {
        let result = self.scan(path)?;
        Ok(result
            .video_files
            .iter()
            .chain(result.subtitle_files.iter())
            .map(|f| f.path.clone())
            .collect())
    }

    pub fn is_video_file(&self, path: &Path) -> bool {
        self.video_extensions.contains(&extension_of(path))
    }

    pub fn is_subtitle_file(&self, path: &Path) -> bool {
        self.subtitle_extensions.contains(&extension_of(path))
    }

    /// An explicitly named file is taken as-is when it is a video
    fn scan_single_file(&self, path: &Path) -> Result<ScanResult, ScanError> {
        let root = path.parent().unwrap_or(path);
        let info = self.file_info(path, root)?;

        let mut result = ScanResult::new(path);
        if info.is_video {
            result.total_size_bytes = info.size_bytes;
            result.video_files.push(info);
        } else {
            result.ignored_files.push(info);
        }
        Ok(result)
    }

    fn process_entry(&self, entry: &DirEntry, root: &Path, result: &mut ScanResult) -> Result<(), ScanError> {
        let info = self.file_info(entry.path(), root)?;

        if self.should_ignore(&info) {
            tracing::debug!(path = %info.path.display(), "Ignoring file");
            result.ignored_files.push(info);
        } else if info.is_video {
            tracing::debug!(path = %info.path.display(), "Found video file");
            result.video_files.push(info);
        } else if info.is_subtitle {
            tracing::debug!(path = %info.path.display(), "Found subtitle file");
            result.subtitle_files.push(info);
        } else {
            result.ignored_files.push(info);
        }
        Ok(())
    }

    fn should_ignore(&self, info: &FileInfo) -> bool {
        let name = info.name.to_lowercase();
        if self.ignore_patterns.iter().any(|p| name.contains(p.as_str())) {
            return true;
        }
        info.is_video && (info.size_bytes < self.min_video_bytes || normalizer::is_sample_name(&info.name))
    }

    fn file_info(&self, path: &Path, root: &Path) -> Result<FileInfo, ScanError> {
        let metadata =
            std::fs::metadata(path).map_err(|e| ScanError::FileAccessError(path.to_path_buf(), e.to_string()))?;

        Ok(FileInfo {
            path: path.to_path_buf(),
            name: file_name(path),
            size_bytes: metadata.len(),
            extension: extension_of(path),
            is_video: self.is_video_file(path),
            is_subtitle: self.is_subtitle_file(path),
            directory_name: path.parent().map(file_name).unwrap_or_default(),
            relative_path: path.strip_prefix(root).unwrap_or(path).to_path_buf(),
        })
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}

/// Lower-case extension with leading dot, "" when absent
fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}
