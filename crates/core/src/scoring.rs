//! Relevance scoring and content-type demotion.
//!
//! Scores are integers in `0..=100`: textual relevance contributes up to 80
//! points and swarm popularity up to 20. A separate penalty demotes titles
//! that look like video releases, since this engine serves music.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Weights of the relevance terms.
const MATCH_WEIGHT: f64 = 0.55;
const CORE_WEIGHT: f64 = 0.25;
const PHRASE_WEIGHT: f64 = 0.10;
const YEAR_WEIGHT: f64 = 0.05;
/// Fuzzy similarity only counts above this.
const FUZZ_FLOOR: f64 = 0.75;
const FUZZ_WEIGHT: f64 = 0.5;
const TEXT_POINTS: f64 = 80.0;
const SEED_POINTS: f64 = 20.0;

/// Penalties subtracted from video-looking titles.
pub const CAM_PENALTY: u8 = 12;
pub const RIP_PENALTY: u8 = 18;
pub const VIDEO_PENALTY: u8 = 15;

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());

static AUDIO_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:flac|mp3|aac|alac|ape|wav|ogg|opus|m4a|dsd|lossless|320\s?kbps|320|v0|24\s?bit|16\s?bit|hi-res|ost|soundtrack|album|discography|vinyl)\b",
    )
    .unwrap()
});

static VIDEO_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:480p|576p|720p|1080p|1080i|2160p|4k|uhd|hdr|bluray|blu-ray|bdrip|brrip|webrip|web-dl|webdl|hdrip|dvdrip|dvdscr|hdtv|x264|x265|h264|h265|hevc|xvid|divx|remux|cam|camrip|hdcam|ts|hdts|telesync|tc|telecine|s\d{1,2}e\d{1,3}|season\s?\d+)\b",
    )
    .unwrap()
});

static CAM_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:cam|camrip|hdcam|ts|hdts|telesync|tc|telecine)\b").unwrap()
});

static RIP_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:bdrip|brrip|webrip|web-dl|webdl|hdrip|dvdrip|x264|x265|h264|h265|hevc|xvid|divx|remux)\b",
    )
    .unwrap()
});

/// What a release title looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Audio,
    Video,
    Unknown,
}

/// Lowercase, strip diacritics, turn non-alphanumerics into spaces and
/// collapse whitespace.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Relevance of `title` to `query`, weighted with swarm popularity.
pub fn score(query: &str, title: &str, seeders: u32) -> u8 {
    let q = normalize(query);
    let t = normalize(title);

    let query_words: Vec<&str> = q.split(' ').filter(|w| !w.is_empty()).collect();
    let title_words: HashSet<&str> = t.split(' ').filter(|w| !w.is_empty()).collect();

    let match_ratio = ratio_present(&query_words, &title_words);

    let keywords: Vec<&str> = query_words
        .iter()
        .copied()
        .filter(|w| w.chars().count() > 3)
        .collect();
    let core_matched = if keywords.is_empty() {
        match_ratio
    } else {
        ratio_present(&keywords, &title_words)
    };

    let phrase_match = if !q.is_empty() && t.contains(q.as_str()) {
        1.0
    } else {
        0.0
    };

    let year_match = if YEAR
        .find_iter(&q)
        .any(|y| title_words.contains(y.as_str()))
    {
        1.0
    } else {
        0.0
    };

    let fuzz = similarity(&q, &t);
    let seed_factor = ((seeders.max(1) as f64).log10() / 3.0).clamp(0.0, 1.0);

    let base = MATCH_WEIGHT * match_ratio
        + CORE_WEIGHT * core_matched
        + PHRASE_WEIGHT * phrase_match
        + YEAR_WEIGHT * year_match;
    let fuzz_boost = (fuzz - FUZZ_FLOOR).max(0.0) * FUZZ_WEIGHT;

    let raw = (base + fuzz_boost) * TEXT_POINTS + seed_factor * SEED_POINTS;
    raw.round().clamp(0.0, 100.0) as u8
}

/// Classify a title by its release tags. Audio tags win over video tags.
pub fn classify(title: &str) -> ContentKind {
    if AUDIO_TAGS.is_match(title) {
        ContentKind::Audio
    } else if VIDEO_TAGS.is_match(title) {
        ContentKind::Video
    } else {
        ContentKind::Unknown
    }
}

/// Points to subtract from a title's score for looking like video.
pub fn content_type_penalty(title: &str) -> u8 {
    match classify(title) {
        ContentKind::Audio | ContentKind::Unknown => 0,
        ContentKind::Video => {
            if CAM_TAGS.is_match(title) {
                CAM_PENALTY
            } else if RIP_TAGS.is_match(title) {
                RIP_PENALTY
            } else {
                VIDEO_PENALTY
            }
        }
    }
}

/// Score with the content-type penalty applied, floored at zero.
pub fn penalized_score(query: &str, title: &str, seeders: u32) -> u8 {
    score(query, title, seeders).saturating_sub(content_type_penalty(title))
}

fn ratio_present(words: &[&str], haystack: &HashSet<&str>) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let hits = words.iter().filter(|w| haystack.contains(*w)).count();
    hits as f64 / words.len() as f64
}

/// `1 - distance / longer_len`, in `0.0..=1.0`.
fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / longest as f64
}

/// Levenshtein edit distance between two strings.
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = if a_char == b_char { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_diacritics() {
        assert_eq!(normalize("Café Déjà-vu"), normalize("cafe deja vu"));
        assert_eq!(normalize("Café Déjà-vu"), "cafe deja vu");
    }

    #[test]
    fn test_normalize_collapses_punctuation() {
        assert_eq!(normalize("  The Beatles -- Abbey_Road!! "), "the beatles abbey road");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn test_exact_title_scores_high() {
        let s = score("Abbey Road", "Abbey Road", 1000);
        // full text relevance (0.9 + 0.125 fuzz boost) * 80 + 20
        assert_eq!(s, 100);
    }

    #[test]
    fn test_unrelated_title_scores_low() {
        let s = score("Abbey Road", "Completely Different Thing", 0);
        assert_eq!(s, 0);
    }

    #[test]
    fn test_seeders_add_popularity() {
        let low = score("Abbey Road", "The Beatles - Abbey Road", 0);
        let high = score("Abbey Road", "The Beatles - Abbey Road", 1000);
        assert_eq!(high - low, 20);
    }

    #[test]
    fn test_seed_factor_saturates() {
        assert_eq!(
            score("Abbey Road", "Abbey Road", 1_000),
            score("Abbey Road", "Abbey Road", 1_000_000)
        );
    }

    #[test]
    fn test_year_match_counts() {
        let with_year = score("Abbey Road 1969", "Beatles Abbey Road 1969 remaster", 0);
        let wrong_year = score("Abbey Road 1969", "Beatles Abbey Road 2019 remaster", 0);
        assert!(with_year > wrong_year);
    }

    #[test]
    fn test_score_is_bounded() {
        for (q, t, s) in [
            ("", "", 0),
            ("a", "a", u32::MAX),
            ("Abbey Road", "abbey road abbey road", 50),
        ] {
            assert!(score(q, t, s) <= 100);
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("Pink Floyd - Animals [FLAC]"), ContentKind::Audio);
        assert_eq!(classify("Interstellar OST 2014"), ContentKind::Audio);
        assert_eq!(classify("Some Movie 1080p BluRay"), ContentKind::Video);
        assert_eq!(classify("Show S01E02 720p"), ContentKind::Video);
        assert_eq!(classify("Abbey Road"), ContentKind::Unknown);
        // audio wins on mixed content
        assert_eq!(classify("Concert 1080p FLAC"), ContentKind::Audio);
    }

    #[test]
    fn test_content_type_penalty() {
        assert_eq!(content_type_penalty("Abbey Road 1080p BDRip x264"), RIP_PENALTY);
        assert_eq!(content_type_penalty("New Movie 2024 HDCAM"), CAM_PENALTY);
        assert_eq!(content_type_penalty("Some Film 1080p"), VIDEO_PENALTY);
        assert_eq!(content_type_penalty("Abbey Road FLAC"), 0);
        assert_eq!(content_type_penalty("Abbey Road"), 0);
    }

    #[test]
    fn test_audio_release_beats_video_after_penalty() {
        let audio = penalized_score("Abbey Road", "The Beatles - Abbey Road (1969) FLAC", 10);
        let video = penalized_score("Abbey Road", "Abbey Road 1080p BDRip x264", 10);
        assert!(audio > video, "audio {} should beat video {}", audio, video);
    }

    #[test]
    fn test_penalty_floors_at_zero() {
        assert_eq!(penalized_score("zzz", "Other Film 1080p BDRip", 0), 0);
    }
}
