//! Scanned files and the file context handed to the semantic resolver

use crate::normalizer::{self, FilenameNormalizer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One discovered file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub name: String,
    pub size_bytes: u64,
    /// Lower-case extension including the dot (".mkv")
    pub extension: String,
    pub is_video: bool,
    pub is_subtitle: bool,
    /// Name of the parent directory
    pub directory_name: String,
    /// Path relative to the scan root
    pub relative_path: PathBuf,
}

impl FileInfo {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MB
    }

    /// File name without its extension
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

/// Result of scanning one input path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub root_path: PathBuf,
    pub video_files: Vec<FileInfo>,
    pub subtitle_files: Vec<FileInfo>,
    pub ignored_files: Vec<FileInfo>,
    /// Total size of video files
    pub total_size_bytes: u64,
    /// Non-fatal errors encountered while walking
    pub errors: Vec<String>,
}

impl ScanResult {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            ..Default::default()
        }
    }

    /// The largest video file; equal sizes go to the first path in order
    pub fn main_video_file(&self) -> Option<&FileInfo> {
        self.video_files
            .iter()
            .max_by(|a, b| a.size_bytes.cmp(&b.size_bytes).then_with(|| b.path.cmp(&a.path)))
    }

    pub fn video_paths(&self) -> Vec<PathBuf> {
        self.video_files.iter().map(|f| f.path.clone()).collect()
    }

    /// Narrow the scan to one video file and its subtitles
    ///
    /// A subtitle belongs to the video when its stem is the video's stem,
    /// optionally followed by dot-separated tags ("Heat.1995.en.srt").
    pub fn for_single_video(&self, video: &FileInfo) -> ScanResult {
        let stem = video.stem().to_lowercase();
        let tagged = format!("{}.", stem);
        let subtitles = self
            .subtitle_files
            .iter()
            .filter(|s| {
                let sub_stem = s.stem().to_lowercase();
                sub_stem == stem || sub_stem.starts_with(&tagged)
            })
            .cloned()
            .collect();

        ScanResult {
            root_path: video.path.clone(),
            video_files: vec![video.clone()],
            subtitle_files: subtitles,
            ignored_files: Vec::new(),
            total_size_bytes: video.size_bytes,
            errors: Vec::new(),
        }
    }
}

/// Per-file facts sent to the semantic resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub clean_name: String,
    pub directory: String,
    pub size_mb: f64,
    pub is_main: bool,
    pub extracted_year: Option<i32>,
    pub language_hints: Vec<String>,
    pub edition: Option<String>,
}

/// Everything known about one work item before resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContext {
    /// Folder (or file) name of the work item
    pub root_name: String,
    pub files: Vec<FileDescriptor>,
}

impl FileContext {
    /// Describe the video files of a scan
    pub fn from_scan(scan: &ScanResult, normalizer: &FilenameNormalizer) -> Self {
        let main_path = scan.main_video_file().map(|f| f.path.clone());
        let files = scan
            .video_files
            .iter()
            .map(|file| {
                let query = normalizer.normalize(&file.name);
                FileDescriptor {
                    name: file.name.clone(),
                    clean_name: query.cleaned_title,
                    directory: file.directory_name.clone(),
                    size_mb: (file.size_mb() * 10.0).round() / 10.0,
                    is_main: main_path.as_ref() == Some(&file.path),
                    extracted_year: query.year,
                    language_hints: normalizer::extract_language_hints(&file.name),
                    edition: normalizer::extract_edition(&file.name),
                }
            })
            .collect();

        let root_name = scan
            .root_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| scan.root_path.display().to_string());

        Self { root_name, files }
    }

    /// The main file's descriptor
    pub fn main_file(&self) -> Option<&FileDescriptor> {
        self.files.iter().find(|f| f.is_main).or_else(|| self.files.first())
    }
}
