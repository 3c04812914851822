//! # Metadata Inference
//!
//! Derives title, artist and album for remote audio files from their names
//! and the names of the folders around them. No file content is read.
//!
//! File names are split on separator runs (`-`, `_`, en dash, em dash,
//! middle dot). For names with exactly two segments the artist is chosen by,
//! in order:
//!
//! 1. a segment matching exactly one folder artist candidate (parent or
//!    grandparent folder name)
//! 2. the artist-first / artist-last majority learned from other files of the
//!    same directory that matched rule 1
//! 3. a segment recurring in the directory at least `token_frequency_threshold`
//!    times and more often than the other segment
//! 4. a segment matching one side of an `Artist - Album` folder name
//!
//! Everything else falls back to the cleaned base name as title and the first
//! folder artist candidate (or nothing) as artist.
//!
//! The voting heuristics are statistical: directories with few files or
//! adversarial naming can be misclassified.

use crate::paths::{file_base_name, folder_name, parent_folder_path};
use bridge_traits::RemoteEntry;
use core_runtime::config::InferenceSettings;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const SEGMENT_SEPARATORS: &[char] = &['-', '_', '–', '—', '·'];

/// Title, artist and album inferred for one file. Empty strings mean unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectoryPattern {
    ArtistFirst,
    ArtistLast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    First,
    Second,
}

#[derive(Debug, Default)]
struct DirectoryVotes {
    artist_first: usize,
    artist_last: usize,
}

/// Infers metadata for a batch of scanned files.
///
/// Construction learns per-directory statistics from the whole batch, so
/// build one inferencer per merged scan rather than per file.
pub struct MetadataInferencer {
    settings: InferenceSettings,
    generic_names: HashSet<String>,
    directory_patterns: HashMap<String, DirectoryPattern>,
    token_frequency: HashMap<String, HashMap<String, usize>>,
}

impl MetadataInferencer {
    pub fn new(files: &[RemoteEntry], settings: InferenceSettings) -> Self {
        let generic_names = settings
            .generic_folder_names
            .iter()
            .map(|name| normalize(name))
            .collect();

        let mut inferencer = Self {
            settings,
            generic_names,
            directory_patterns: HashMap::new(),
            token_frequency: HashMap::new(),
        };
        inferencer.directory_patterns = inferencer.build_directory_patterns(files);
        inferencer.token_frequency = build_token_frequency(files);
        inferencer
    }

    pub fn infer(&self, file: &RemoteEntry) -> ParsedMetadata {
        let base_name = file_base_name(entry_name(file));
        let fallback_title = clean_segment(base_name);
        let segments = split_segments(base_name);
        let artist_candidates = self.folder_artist_candidates(&file.path);

        if let [first, second] = segments.as_slice() {
            let side = self
                .match_folder_artist(first, second, &artist_candidates)
                .or_else(|| self.match_directory_pattern(&file.path))
                .or_else(|| self.match_token_frequency(&file.path, first, second))
                .or_else(|| self.match_folder_album_pattern(&file.path, first, second));

            if let Some(side) = side {
                let (artist, title) = match side {
                    Side::First => (first, second),
                    Side::Second => (second, first),
                };
                return self.parsed(&file.path, title.clone(), artist.clone());
            }
        }

        let artist = artist_candidates.into_iter().next().unwrap_or_default();
        self.parsed(&file.path, fallback_title, artist)
    }

    fn parsed(&self, path: &str, title: String, artist: String) -> ParsedMetadata {
        let album = self.resolve_album_name(path, &artist);
        ParsedMetadata {
            title,
            artist,
            album,
        }
    }

    // ========================================================================
    // Resolution rules
    // ========================================================================

    fn match_folder_artist(
        &self,
        first: &str,
        second: &str,
        candidates: &[String],
    ) -> Option<Side> {
        let keys: HashSet<String> = candidates.iter().map(|c| normalize(c)).collect();
        let first_key = normalize(first);
        let second_key = normalize(second);
        let first_matched = !first_key.is_empty() && keys.contains(&first_key);
        let second_matched = !second_key.is_empty() && keys.contains(&second_key);

        match (first_matched, second_matched) {
            (true, false) => Some(Side::First),
            (false, true) => Some(Side::Second),
            _ => None,
        }
    }

    fn match_directory_pattern(&self, path: &str) -> Option<Side> {
        match self.directory_patterns.get(&parent_folder_path(path))? {
            DirectoryPattern::ArtistFirst => Some(Side::First),
            DirectoryPattern::ArtistLast => Some(Side::Second),
        }
    }

    fn match_token_frequency(&self, path: &str, first: &str, second: &str) -> Option<Side> {
        let frequencies = self.token_frequency.get(&parent_folder_path(path))?;
        let first_key = normalize(first);
        let second_key = normalize(second);
        if first_key.is_empty() || second_key.is_empty() {
            return None;
        }

        let threshold = self.settings.token_frequency_threshold;
        let first_count = frequencies.get(&first_key).copied().unwrap_or(0);
        let second_count = frequencies.get(&second_key).copied().unwrap_or(0);

        if first_count >= threshold && first_count > second_count {
            Some(Side::First)
        } else if second_count >= threshold && second_count > first_count {
            Some(Side::Second)
        } else {
            None
        }
    }

    fn match_folder_album_pattern(&self, path: &str, first: &str, second: &str) -> Option<Side> {
        let first_key = normalize(first);
        let second_key = normalize(second);
        if first_key.is_empty() || second_key.is_empty() {
            return None;
        }

        for candidate in self.folder_album_candidates(path) {
            let parts = split_segments(&candidate);
            let [left, right] = parts.as_slice() else {
                continue;
            };
            let left = normalize(left);
            let right = normalize(right);
            if first_key == left || first_key == right {
                return Some(Side::First);
            }
            if second_key == left || second_key == right {
                return Some(Side::Second);
            }
        }
        None
    }

    fn resolve_album_name(&self, path: &str, artist: &str) -> String {
        let artist_key = normalize(artist);

        for candidate in self.folder_album_candidates(path) {
            if !artist_key.is_empty() {
                if let [first, second] = split_segments(&candidate).as_slice() {
                    if normalize(first) == artist_key && self.looks_like_album(second) {
                        return second.clone();
                    }
                    if normalize(second) == artist_key && self.looks_like_album(first) {
                        return first.clone();
                    }
                }
                if normalize(&candidate) == artist_key {
                    continue;
                }
            }
            return candidate;
        }
        String::new()
    }

    // ========================================================================
    // Batch statistics
    // ========================================================================

    fn build_directory_patterns(&self, files: &[RemoteEntry]) -> HashMap<String, DirectoryPattern> {
        let mut votes: HashMap<String, DirectoryVotes> = HashMap::new();

        for file in files {
            let segments = split_segments(file_base_name(entry_name(file)));
            let [first, second] = segments.as_slice() else {
                continue;
            };
            let candidates = self.folder_artist_candidates(&file.path);
            if candidates.is_empty() {
                continue;
            }

            let Some(side) = self.match_folder_artist(first, second, &candidates) else {
                continue;
            };
            let tally = votes.entry(parent_folder_path(&file.path)).or_default();
            match side {
                Side::First => tally.artist_first += 1,
                Side::Second => tally.artist_last += 1,
            }
        }

        votes
            .into_iter()
            .filter_map(|(directory, tally)| {
                if tally.artist_first > tally.artist_last {
                    Some((directory, DirectoryPattern::ArtistFirst))
                } else if tally.artist_last > tally.artist_first {
                    Some((directory, DirectoryPattern::ArtistLast))
                } else {
                    None
                }
            })
            .collect()
    }

    // ========================================================================
    // Folder candidates
    // ========================================================================

    fn folder_artist_candidates(&self, path: &str) -> Vec<String> {
        self.folder_candidates(path, |value| self.looks_like_artist(value))
    }

    fn folder_album_candidates(&self, path: &str) -> Vec<String> {
        self.folder_candidates(path, |value| self.looks_like_album(value))
    }

    /// Cleaned parent and grandparent folder names passing `accept`, deduplicated.
    fn folder_candidates(&self, path: &str, accept: impl Fn(&str) -> bool) -> Vec<String> {
        let parent = parent_folder_path(path);
        let grandparent = parent_folder_path(&parent);

        let mut candidates: Vec<String> = Vec::with_capacity(2);
        for name in [folder_name(&parent), folder_name(&grandparent)] {
            let cleaned = clean_segment(name);
            if accept(&cleaned) && !candidates.contains(&cleaned) {
                candidates.push(cleaned);
            }
        }
        candidates
    }

    fn looks_like_artist(&self, value: &str) -> bool {
        split_segments(value).len() < 2
            && self.passes_folder_filter(value, self.settings.max_artist_candidate_len)
    }

    fn looks_like_album(&self, value: &str) -> bool {
        self.passes_folder_filter(value, self.settings.max_album_candidate_len)
    }

    fn passes_folder_filter(&self, value: &str, max_len: usize) -> bool {
        let normalized = normalize(value);
        !normalized.is_empty()
            && !self.generic_names.contains(&normalized)
            && !is_numeric(&normalized)
            && !is_disc_folder(&normalized)
            && normalized.chars().count() <= max_len
    }
}

fn build_token_frequency(files: &[RemoteEntry]) -> HashMap<String, HashMap<String, usize>> {
    let mut frequencies: HashMap<String, HashMap<String, usize>> = HashMap::new();

    for file in files {
        let segments = split_segments(file_base_name(entry_name(file)));
        if segments.len() != 2 {
            continue;
        }
        let tokens = frequencies.entry(parent_folder_path(&file.path)).or_default();
        for segment in &segments {
            let key = normalize(segment);
            if !key.is_empty() {
                *tokens.entry(key).or_insert(0) += 1;
            }
        }
    }

    frequencies
}

fn entry_name(entry: &RemoteEntry) -> &str {
    if entry.name.is_empty() {
        folder_name(&entry.path)
    } else {
        &entry.name
    }
}

/// Split on separator runs and clean each piece, dropping empty pieces.
fn split_segments(value: &str) -> Vec<String> {
    value
        .split(|c: char| SEGMENT_SEPARATORS.contains(&c))
        .map(clean_segment)
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Underscores and dots become spaces; whitespace runs collapse to one space.
fn clean_segment(value: &str) -> String {
    value
        .replace(|c: char| c == '_' || c == '.', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize(value: &str) -> String {
    clean_segment(value).to_lowercase()
}

/// Pure digits. Covers four-digit years too.
fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// `disc 2`, `cd1`, `disc  03`.
fn is_disc_folder(value: &str) -> bool {
    let rest = value
        .strip_prefix("disc")
        .or_else(|| value.strip_prefix("cd"));
    match rest {
        Some(rest) => is_numeric(rest.trim_start()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer_one(files: &[&str], target: &str) -> ParsedMetadata {
        infer_with(files, target, InferenceSettings::default())
    }

    fn infer_with(files: &[&str], target: &str, settings: InferenceSettings) -> ParsedMetadata {
        let entries: Vec<RemoteEntry> = files.iter().map(|p| RemoteEntry::file(*p, 1)).collect();
        let inferencer = MetadataInferencer::new(&entries, settings);
        inferencer.infer(&RemoteEntry::file(target, 1))
    }

    #[test]
    fn test_split_and_clean() {
        assert_eq!(split_segments("Artist - Title"), vec!["Artist", "Title"]);
        assert_eq!(split_segments("Artist_–_Some.Title"), vec!["Artist", "Some Title"]);
        assert_eq!(split_segments("A · B · C"), vec!["A", "B", "C"]);
        assert_eq!(split_segments("01 Unknown"), vec!["01 Unknown"]);
        assert_eq!(clean_segment("  many   spaces_here. "), "many spaces here");
    }

    #[test]
    fn test_folder_filters() {
        assert!(is_disc_folder("disc 2"));
        assert!(is_disc_folder("cd1"));
        assert!(!is_disc_folder("cdx"));
        assert!(is_numeric("1999"));
        assert!(!is_numeric("1999a"));
    }

    #[test]
    fn test_folder_artist_match_either_position() {
        let first = infer_one(&[], "/Music/Adele/Adele - Hello.mp3");
        assert_eq!(first.artist, "Adele");
        assert_eq!(first.title, "Hello");

        let last = infer_one(&[], "/Music/Adele/Hello - Adele.mp3");
        assert_eq!(last.artist, "Adele");
        assert_eq!(last.title, "Hello");

        let grandparent = infer_one(&[], "/Adele/25/adele - Hello.flac");
        assert_eq!(grandparent.artist, "adele");
        assert_eq!(grandparent.title, "Hello");
    }

    #[test]
    fn test_directory_vote_applies_to_unmatched_files() {
        let files = [
            "/Queen/Hits/Queen - Bohemian Rhapsody.mp3",
            "/Queen/Hits/Queen - Radio Ga Ga.mp3",
            "/Queen/Hits/Freddie - Love of My Life.mp3",
        ];
        let parsed = infer_one(&files, "/Queen/Hits/Freddie - Love of My Life.mp3");
        assert_eq!(parsed.artist, "Freddie");
        assert_eq!(parsed.title, "Love of My Life");
    }

    #[test]
    fn test_token_frequency_identifies_recurring_artist() {
        let files = [
            "/Music/Mix/Intro - Daft Punk.mp3",
            "/Music/Mix/Around the World - Daft Punk.mp3",
            "/Music/Mix/One More Time - Daft Punk.mp3",
        ];
        let parsed = infer_one(&files, "/Music/Mix/Intro - Daft Punk.mp3");
        assert_eq!(parsed.artist, "Daft Punk");
        assert_eq!(parsed.title, "Intro");
    }

    #[test]
    fn test_folder_album_pattern() {
        let parsed = infer_one(&[], "/Music/Muse - Absolution/Hysteria - Muse.mp3");
        assert_eq!(parsed.artist, "Muse");
        assert_eq!(parsed.title, "Hysteria");
        assert_eq!(parsed.album, "Absolution");
    }

    #[test]
    fn test_unresolved_two_segments_fall_back_to_folder_artist() {
        let parsed = infer_one(&[], "/Jazz/Standards/Take Five - Live.mp3");
        assert_eq!(parsed.title, "Take Five - Live");
        assert_eq!(parsed.artist, "Standards");
        assert_eq!(parsed.album, "Jazz");
    }

    #[test]
    fn test_single_and_many_segments_use_whole_name() {
        let single = infer_one(&[], "/Music/Track01.mp3");
        assert_eq!(single.title, "Track01");
        assert_eq!(single.artist, "");

        let many = infer_one(&[], "/Music/Beatles/01 - Beatles - Help.mp3");
        assert_eq!(many.title, "01 - Beatles - Help");
        assert_eq!(many.artist, "Beatles");
    }

    #[test]
    fn test_generic_album_folder_is_filtered() {
        let parsed = infer_one(&[], "/Artist X/Album/01 Unknown.mp3");
        assert_eq!(parsed.title, "01 Unknown");
        assert_eq!(parsed.artist, "Artist X");
    }

    #[test]
    fn test_album_folder_is_candidate_when_not_generic() {
        let settings = InferenceSettings {
            generic_folder_names: vec!["music".to_string()],
            ..InferenceSettings::default()
        };
        let parsed = infer_with(&[], "/Artist X/Album/02 Unknown.mp3", settings);
        assert_eq!(parsed.title, "02 Unknown");
        assert_eq!(parsed.artist, "Album");
        assert_eq!(parsed.album, "Artist X");
    }

    #[test]
    fn test_album_skips_artist_named_folder() {
        let parsed = infer_one(&[], "/Radiohead/OK Computer/Radiohead - Airbag.mp3");
        assert_eq!(parsed.artist, "Radiohead");
        assert_eq!(parsed.album, "OK Computer");

        let flat = infer_one(&[], "/Radiohead/Radiohead - Airbag.mp3");
        assert_eq!(flat.album, "");
    }
}
