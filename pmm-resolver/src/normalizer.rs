//! Filename normalization
//!
//! Turns a scene-style release filename into a searchable title and an
//! optional release year. Normalization never fails: when every token of a
//! filename is noise, the minimally cleaned stem is returned instead.
//!
//! ```text
//! The.Matrix.1999.1080p.BluRay.x264-GROUP.mkv  ->  ("The Matrix", 1999)
//! Amelie (2001) [1080p].mkv                    ->  ("Amelie", 2001)
//! ```

use crate::models::ExpectedTitle;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Plausible release years
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2030;

static EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.([A-Za-z0-9]{2,4})$").unwrap());

static BRACKETED_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\[\(\{]\s*(\d{4})\s*[\]\)\}]").unwrap());

static ALNUM_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9]+").unwrap());

static ALNUM_TOKEN_LOWER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").unwrap());

static BRACKET_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]|\([^\)]*\)|\{[^\}]*\}").unwrap());

/// Release metadata tokens that never belong to a title
static NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:",
        // resolution and dynamic range
        r"480p|576p|720p|1080p|1080i|2160p|4k|uhd|hdr10|hdr|dv|",
        // video codecs
        r"x264|x265|h\.?264|h\.?265|hevc|avc|xvid|divx|av1|10bit|",
        // audio
        r"dts-hd|dts|aac|eac3|ac3|truehd|atmos|ddp5\.1|dd5\.1|5\.1|7\.1|",
        // source
        r"blu-ray|bluray|bdrip|brrip|webrip|web-dl|webdl|hdtv|dvdrip|hdrip|remux|",
        // release tags
        r"proper|repack|internal|limited|sample",
        r")\b"
    ))
    .unwrap()
});

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[._]+").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Trailing `-GROUP`; case-sensitive so `Spider-Man` survives
static RELEASE_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*-\s*[A-Z0-9]{2,}$").unwrap());

static EDITION_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s._-]+").unwrap());

static EDITION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"director'?s?[\s._-]*cut",
        r"extended[\s._-]*(?:cut|edition)",
        r"unrated[\s._-]*(?:cut|edition)",
        r"theatrical[\s._-]*(?:cut|edition)",
        r"final[\s._-]*cut",
        r"remastered",
        r"special[\s._-]*edition",
        r"ultimate[\s._-]*edition",
        r"criterion[\s._-]*(?:collection|edition)",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
    .collect()
});

/// ISO 639-1 code and the filename spellings that imply it
const LANGUAGE_VARIANTS: &[(&str, &[&str])] = &[
    ("en", &["english", "eng"]),
    ("es", &["spanish", "esp", "spa", "castellano"]),
    ("fr", &["french", "fra", "fre", "francais"]),
    ("de", &["german", "ger", "deu", "deutsch"]),
    ("it", &["italian", "ita"]),
    ("pt", &["portuguese", "por"]),
    ("ru", &["russian", "rus"]),
    ("ja", &["japanese", "jpn"]),
    ("ko", &["korean", "kor"]),
    ("zh", &["chinese", "chi", "zho", "mandarin"]),
    ("sr", &["serbian", "srp"]),
    ("hr", &["croatian", "hrv"]),
    ("bs", &["bosnian", "bos"]),
];

const SAMPLE_MARKERS: &[&str] = &["sample", "trailer", "preview", "teaser"];

/// Search query derived from a filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedQuery {
    pub raw_filename: String,
    pub cleaned_title: String,
    pub year: Option<i32>,
}

impl From<&NormalizedQuery> for ExpectedTitle {
    fn from(query: &NormalizedQuery) -> Self {
        ExpectedTitle::new(query.cleaned_title.clone(), query.year)
            .with_language_hints(extract_language_hints(&query.raw_filename))
    }
}

/// Filename → (title, year) normalizer
#[derive(Debug, Clone, Default)]
pub struct FilenameNormalizer;

impl FilenameNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, filename: &str) -> NormalizedQuery {
        let stem = strip_extension(filename);
        let mut work = stem.replace('_', ".");

        let year = match find_bracketed_year(&work) {
            Some(year) => Some(year),
            None => match find_last_bare_year(&work) {
                Some((year, start, end)) => {
                    work = if work[..start].chars().any(|c| c.is_alphanumeric()) {
                        // Title.Year.junk: everything after the year is release metadata
                        work[..start].to_string()
                    } else {
                        format!("{} {}", &work[..start], &work[end..])
                    };
                    Some(year)
                }
                None => None,
            },
        };

        let work = BRACKET_GROUP.replace_all(&work, " ");
        let work = NOISE.replace_all(&work, " ");
        let work = SEPARATORS.replace_all(&work, " ");
        let work = WHITESPACE.replace_all(&work, " ");
        let work = RELEASE_GROUP.replace(work.trim(), "");

        let year_token = year.map(|y| y.to_string());
        let cleaned: Vec<&str> = work
            .split_whitespace()
            .filter(|token| Some(*token) != year_token.as_deref())
            .collect();
        let cleaned = cleaned
            .join(" ")
            .trim_matches(|c: char| c == '-' || c.is_whitespace())
            .to_string();

        let (cleaned_title, year) = if cleaned.is_empty() {
            let fallback = minimal_clean(&stem);
            // A bare year as the whole name is the title, not a release year
            let year = year.filter(|y| fallback != y.to_string());
            (fallback, year)
        } else {
            (cleaned, year)
        };

        NormalizedQuery {
            raw_filename: filename.to_string(),
            cleaned_title,
            year,
        }
    }
}

/// Strip a trailing extension of 2-4 alphanumerics containing a letter
fn strip_extension(filename: &str) -> String {
    match EXTENSION.captures(filename) {
        Some(caps) if caps[1].chars().any(|c| c.is_ascii_alphabetic()) => {
            filename[..filename.len() - caps[0].len()].to_string()
        }
        _ => filename.to_string(),
    }
}

fn in_year_range(year: i32) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&year)
}

fn find_bracketed_year(text: &str) -> Option<i32> {
    BRACKETED_YEAR
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse::<i32>().ok())
        .find(|year| in_year_range(*year))
}

/// Last 4-digit alphanumeric token in range, with its byte span
fn find_last_bare_year(text: &str) -> Option<(i32, usize, usize)> {
    ALNUM_TOKEN
        .find_iter(text)
        .filter(|m| m.as_str().len() == 4 && m.as_str().chars().all(|c| c.is_ascii_digit()))
        .filter_map(|m| {
            m.as_str()
                .parse::<i32>()
                .ok()
                .filter(|year| in_year_range(*year))
                .map(|year| (year, m.start(), m.end()))
        })
        .last()
}

/// Release year from a filename; bracketed years win over bare ones
pub fn extract_year(filename: &str) -> Option<i32> {
    let stem = strip_extension(filename);
    find_bracketed_year(&stem).or_else(|| find_last_bare_year(&stem).map(|(year, _, _)| year))
}

/// Separators to spaces, whitespace collapsed
pub fn minimal_clean(name: &str) -> String {
    let spaced = SEPARATORS.replace_all(name, " ");
    WHITESPACE.replace_all(spaced.trim(), " ").to_string()
}

/// ISO 639-1 codes implied by language words in a filename, table order
pub fn extract_language_hints(filename: &str) -> Vec<String> {
    let lower = filename.to_lowercase();
    let tokens: Vec<&str> = ALNUM_TOKEN_LOWER.find_iter(&lower).map(|m| m.as_str()).collect();

    LANGUAGE_VARIANTS
        .iter()
        .filter(|(_, variants)| variants.iter().any(|v| tokens.contains(v)))
        .map(|(code, _)| code.to_string())
        .collect()
}

/// Edition marker (e.g. "Director's Cut"), title-cased
pub fn extract_edition(filename: &str) -> Option<String> {
    EDITION_PATTERNS.iter().find_map(|pattern| {
        pattern
            .find(filename)
            .map(|m| title_case(&EDITION_SEPARATORS.replace_all(m.as_str(), " ")))
    })
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Sample, trailer, preview or teaser clip
pub fn is_sample_name(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    SAMPLE_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(name: &str) -> (String, Option<i32>) {
        let query = FilenameNormalizer::new().normalize(name);
        (query.cleaned_title, query.year)
    }

    #[test]
    fn test_scene_release_name() {
        assert_eq!(
            normalize("The.Matrix.1999.1080p.BluRay.x264-GROUP.mkv"),
            ("The Matrix".to_string(), Some(1999))
        );
    }

    #[test]
    fn test_bracketed_year_wins() {
        assert_eq!(
            normalize("Blade Runner 2049 (2017) [2160p].mkv"),
            ("Blade Runner 2049".to_string(), Some(2017))
        );
        assert_eq!(normalize("Amelie (2001).avi"), ("Amelie".to_string(), Some(2001)));
    }

    #[test]
    fn test_last_bare_year_is_release_year() {
        assert_eq!(
            normalize("2001.A.Space.Odyssey.1968.REMUX.mkv"),
            ("2001 A Space Odyssey".to_string(), Some(1968))
        );
        assert_eq!(normalize("1917.2019.1080p.mkv"), ("1917".to_string(), Some(2019)));
    }

    #[test]
    fn test_leading_year_only_removed() {
        assert_eq!(normalize("1999 - Heat.mkv"), ("Heat".to_string(), Some(1999)));
    }

    #[test]
    fn test_no_year() {
        assert_eq!(
            normalize("Inception.1080p.WEB-DL.DDP5.1.x264-SPARKS.mkv"),
            ("Inception".to_string(), None)
        );
    }

    #[test]
    fn test_hyphenated_title_survives() {
        assert_eq!(normalize("Spider-Man.2002.720p.mkv"), ("Spider-Man".to_string(), Some(2002)));
        assert_eq!(normalize("Spider-Man.720p.mkv"), ("Spider-Man".to_string(), None));
    }

    #[test]
    fn test_underscores_are_separators() {
        assert_eq!(
            normalize("the_big_lebowski_1998_dvdrip.avi"),
            ("the big lebowski".to_string(), Some(1998))
        );
    }

    #[test]
    fn test_out_of_range_years_ignored() {
        assert_eq!(normalize("Movie.1850.mkv").1, None);
        assert_eq!(normalize("Movie.2099.mkv").1, None);
    }

    #[test]
    fn test_all_noise_falls_back_to_stem() {
        assert_eq!(normalize("1080p.x264.mkv"), ("1080p x264".to_string(), None));
        assert_eq!(normalize("1917.mkv"), ("1917".to_string(), None));
    }

    #[test]
    fn test_extension_requires_letter() {
        assert_eq!(strip_extension("movie.mkv"), "movie");
        assert_eq!(strip_extension("Some.Title.2001"), "Some.Title.2001");
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("Heat (1995).mkv"), Some(1995));
        assert_eq!(extract_year("Heat.1995.mkv"), Some(1995));
        assert_eq!(extract_year("Heat.mkv"), None);
    }

    #[test]
    fn test_language_hints() {
        assert_eq!(
            extract_language_hints("Movie.2010.ENG.ITA.srt"),
            vec!["en".to_string(), "it".to_string()]
        );
        assert!(extract_language_hints("Capitalism.2009.mkv").is_empty());
        assert_eq!(extract_language_hints("Film.Serbian.mkv"), vec!["sr".to_string()]);
    }

    #[test]
    fn test_edition() {
        assert_eq!(
            extract_edition("Aliens.1986.Directors.Cut.mkv"),
            Some("Directors Cut".to_string())
        );
        assert_eq!(
            extract_edition("Movie EXTENDED EDITION.mkv"),
            Some("Extended Edition".to_string())
        );
        assert_eq!(extract_edition("Movie.mkv"), None);
    }

    #[test]
    fn test_sample_names() {
        assert!(is_sample_name("movie-sample.mkv"));
        assert!(is_sample_name("Official Trailer.mp4"));
        assert!(!is_sample_name("The.Matrix.mkv"));
    }

    #[test]
    fn test_expected_title_from_query() {
        let query = FilenameNormalizer::new().normalize("Amelie.2001.French.mkv");
        let expected = ExpectedTitle::from(&query);
        assert_eq!(expected.primary(), "Amelie");
        assert_eq!(expected.year, Some(2001));
        assert_eq!(expected.language_hints, vec!["fr".to_string()]);
    }
}
