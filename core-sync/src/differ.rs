//! # Incremental Differ
//!
//! Compares the songs cached for a profile with the files found by this
//! run's successful root scans.
//!
//! ## Outputs
//!
//! - **Stale by selection**: cached paths outside every selected root. These
//!   are removed whatever the outcome of the scans.
//! - **Stale by absence**: cached paths under a root that scanned
//!   successfully but missing from the merged results. Paths under a failed
//!   root are never included.
//! - **Upserts**: scanned files that are new or changed, merged with the
//!   cached row for the same path.
//!
//! A cached file is left alone when the content summary of its directory is
//! unchanged since the last run, or when its fingerprint and cover match the
//! stored row.

use crate::identity;
use crate::metadata::ParsedMetadata;
use crate::paths::{file_base_name, is_path_under_any, normalize_folder_path, parent_folder_path};
use crate::scanner::ScanResult;
use bridge_traits::RemoteEntry;
use core_library::{is_unknown_artist, CachedSong, UNKNOWN_ALBUM};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

pub const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";

/// Result of scanning one root folder successfully.
#[derive(Debug, Clone)]
pub struct FolderScan {
    pub folder: String,
    pub result: ScanResult,
}

impl FolderScan {
    pub fn new(folder: impl AsRef<str>, result: ScanResult) -> Self {
        Self {
            folder: normalize_folder_path(folder.as_ref()),
            result,
        }
    }
}

/// Everything the differ needs for one run.
#[derive(Debug, Clone, Copy)]
pub struct DiffInput<'a> {
    /// Songs cached for the profile before this run.
    pub existing: &'a [CachedSong],
    /// Currently selected root folders.
    pub selected_folders: &'a [String],
    /// Successful scans in folder order.
    pub scans: &'a [FolderScan],
    /// Root folders whose scan failed in this run.
    pub failed_folders: &'a [String],
    /// Directory summaries stored by the previous run.
    pub previous_summaries: &'a HashMap<String, String>,
}

/// A scanned file that has to be written, with fields already resolved
/// against the cached row.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpsert {
    pub file: RemoteEntry,
    pub existing: Option<CachedSong>,
    pub content_type: String,
    pub last_modified: i64,
    pub cover_art_path: Option<String>,
    pub fingerprint: String,
    /// Position in the merged scan, starting at 1.
    pub track_number: i64,
}

impl PendingUpsert {
    /// Build the row to persist, preferring inferred metadata and falling back
    /// to what the cache already knew.
    pub fn into_song(
        self,
        profile_id: &str,
        parsed: Option<&ParsedMetadata>,
        updated_at: i64,
    ) -> CachedSong {
        let existing = self.existing.as_ref();
        let path = normalize_file_path(&self.file.path);
        let parent = parent_folder_path(&path);

        let title = resolve_title(
            parsed.map(|p| p.title.as_str()),
            existing.map(|s| s.title.as_str()),
            &path,
        );
        let artist = resolve_artist(
            parsed.map(|p| p.artist.as_str()),
            existing.map(|s| s.artist.as_str()),
        );
        let album = resolve_album(
            parsed.map(|p| p.album.as_str()),
            existing.map(|s| s.album.as_str()),
        );

        CachedSong {
            id: identity::song_id(profile_id, &path),
            profile_id: profile_id.to_string(),
            artist_id: identity::artist_id(profile_id, &artist),
            album_id: identity::album_id(profile_id, &album, &artist, &parent),
            remote_path: path,
            title,
            artist,
            album,
            duration_ms: existing.map(|s| s.duration_ms).unwrap_or(0),
            file_size: i64::try_from(self.file.size).unwrap_or(i64::MAX),
            content_type: self.content_type,
            cover_art_path: self.cover_art_path,
            track_number: self.track_number,
            year: existing.map(|s| s.year).unwrap_or(0),
            remote_last_modified: self.last_modified,
            fingerprint: self.fingerprint,
            updated_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncDiff {
    pub stale_by_selection: Vec<String>,
    pub stale_by_absence: Vec<String>,
    pub upserts: Vec<PendingUpsert>,
    /// Scanned files that already match the cache.
    pub unchanged: usize,
    /// Every scanned audio file, deduplicated across roots, in scan order.
    pub merged_files: Vec<RemoteEntry>,
    /// Summaries of the directories seen in this run.
    pub directory_summaries: HashMap<String, String>,
}

impl SyncDiff {
    pub fn has_deletions(&self) -> bool {
        !self.stale_by_selection.is_empty() || !self.stale_by_absence.is_empty()
    }
}

pub struct IncrementalDiffer;

impl IncrementalDiffer {
    pub fn diff(input: DiffInput<'_>) -> SyncDiff {
        let selected = normalize_all(input.selected_folders);
        let failed = normalize_all(input.failed_folders);
        let successful: Vec<String> = input.scans.iter().map(|s| s.folder.clone()).collect();

        let mut merged = ScanResult::new();
        for scan in input.scans {
            merged.merge(scan.result.clone());
        }
        let scanned_paths: HashSet<String> = merged
            .audio_files()
            .iter()
            .map(|f| normalize_file_path(&f.path))
            .collect();

        let stale_by_selection = Self::stale_by_selection(input.existing, &selected);

        let stale_by_absence: Vec<String> = input
            .existing
            .iter()
            .map(|song| &song.remote_path)
            .filter(|path| is_path_under_any(path, &selected))
            .filter(|path| is_path_under_any(path, &successful))
            .filter(|path| !is_path_under_any(path, &failed))
            .filter(|path| !scanned_paths.contains(path.as_str()))
            .cloned()
            .collect();

        let directory_summaries = build_directory_summaries(&merged);
        let unchanged_directories: HashSet<&str> = directory_summaries
            .iter()
            .filter(|(dir, summary)| input.previous_summaries.get(*dir) == Some(*summary))
            .map(|(dir, _)| dir.as_str())
            .collect();

        let existing_by_path: HashMap<&str, &CachedSong> = input
            .existing
            .iter()
            .map(|song| (song.remote_path.as_str(), song))
            .collect();

        let mut upserts = Vec::new();
        let mut unchanged = 0;

        for (index, file) in merged.audio_files().iter().enumerate() {
            let path = normalize_file_path(&file.path);
            let parent = parent_folder_path(&path);
            let existing = existing_by_path.get(path.as_str()).copied();

            let content_type = file
                .content_type
                .as_deref()
                .filter(|ct| !ct.trim().is_empty())
                .or(existing.map(|s| s.content_type.as_str()))
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string();
            let last_modified = file
                .last_modified
                .or(existing.map(|s| s.remote_last_modified))
                .unwrap_or(0);
            let cover_art_path = merged
                .cover_for(&parent)
                .map(str::to_string)
                .or_else(|| existing.and_then(|s| s.cover_art_path.clone()));
            let fingerprint = file_fingerprint(file.size, last_modified, &content_type);

            if existing.is_some() && unchanged_directories.contains(parent.as_str()) {
                unchanged += 1;
                continue;
            }
            if is_file_unchanged(existing, &fingerprint, cover_art_path.as_deref()) {
                unchanged += 1;
                continue;
            }

            upserts.push(PendingUpsert {
                file: file.clone(),
                existing: existing.cloned(),
                content_type,
                last_modified,
                cover_art_path,
                fingerprint,
                track_number: index as i64 + 1,
            });
        }

        SyncDiff {
            stale_by_selection,
            stale_by_absence,
            upserts,
            unchanged,
            merged_files: merged.audio_files().to_vec(),
            directory_summaries,
        }
    }

    /// Cached paths outside every selected folder.
    pub fn stale_by_selection(existing: &[CachedSong], selected_folders: &[String]) -> Vec<String> {
        existing
            .iter()
            .filter(|song| !is_path_under_any(&song.remote_path, selected_folders))
            .map(|song| song.remote_path.clone())
            .collect()
    }
}

/// `size|last_modified|content_type` with the content type lowercased.
pub fn file_fingerprint(size: u64, last_modified: i64, content_type: &str) -> String {
    format!(
        "{}|{}|{}",
        size,
        last_modified,
        content_type.trim().to_lowercase()
    )
}

/// SHA-256 over the directory, its cover and its files sorted by path.
pub fn directory_summary(directory: &str, cover: Option<&str>, files: &[&RemoteEntry]) -> String {
    let mut sorted: Vec<&RemoteEntry> = files.to_vec();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut payload = format!("{}|{}", directory, cover.unwrap_or_default());
    for file in sorted {
        payload.push_str(&format!(
            "|{}:{}:{}:{}",
            file.path,
            file.size,
            file.last_modified.unwrap_or(0),
            file.content_type.as_deref().unwrap_or_default()
        ));
    }

    format!("{:x}", Sha256::digest(payload.as_bytes()))
}

/// Keep only the summaries of directories under `folders`.
pub fn retain_summaries_under(summaries: &mut HashMap<String, String>, folders: &[String]) {
    summaries.retain(|directory, _| is_path_under_any(directory, folders));
}

fn build_directory_summaries(scan: &ScanResult) -> HashMap<String, String> {
    let mut by_directory: HashMap<String, Vec<&RemoteEntry>> = HashMap::new();
    for file in scan.audio_files() {
        by_directory
            .entry(parent_folder_path(&file.path))
            .or_default()
            .push(file);
    }

    by_directory
        .into_iter()
        .map(|(directory, files)| {
            let summary = directory_summary(&directory, scan.cover_for(&directory), &files);
            (directory, summary)
        })
        .collect()
}

fn is_file_unchanged(existing: Option<&CachedSong>, fingerprint: &str, cover: Option<&str>) -> bool {
    match existing {
        Some(song) => {
            !song.fingerprint.trim().is_empty()
                && song.fingerprint == fingerprint
                && song.cover_art_path.as_deref() == cover
        }
        None => false,
    }
}

fn resolve_title(parsed: Option<&str>, existing: Option<&str>, path: &str) -> String {
    [parsed, existing]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|title| !title.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| file_base_name(path).to_string())
}

fn resolve_artist(parsed: Option<&str>, existing: Option<&str>) -> String {
    if let Some(artist) = parsed.map(str::trim).filter(|a| !a.is_empty()) {
        return artist.to_string();
    }
    existing
        .map(str::trim)
        .filter(|a| !is_unknown_artist(a))
        .unwrap_or_default()
        .to_string()
}

fn resolve_album(parsed: Option<&str>, existing: Option<&str>) -> String {
    [parsed, existing]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|album| !album.is_empty())
        .unwrap_or(UNKNOWN_ALBUM)
        .to_string()
}

fn normalize_all(folders: &[String]) -> Vec<String> {
    folders.iter().map(|f| normalize_folder_path(f)).collect()
}

/// File paths share folder normalization; files never keep a trailing slash.
fn normalize_file_path(path: &str) -> String {
    normalize_folder_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached(path: &str, fingerprint: &str) -> CachedSong {
        CachedSong {
            id: identity::song_id("p1", path),
            profile_id: "p1".to_string(),
            remote_path: path.to_string(),
            title: "Cached Title".to_string(),
            artist: "Cached Artist".to_string(),
            artist_id: -1,
            album: "Cached Album".to_string(),
            album_id: -2,
            duration_ms: 215_000,
            file_size: 10,
            content_type: "audio/flac".to_string(),
            cover_art_path: None,
            track_number: 1,
            year: 1997,
            remote_last_modified: 100,
            fingerprint: fingerprint.to_string(),
            updated_at: 0,
        }
    }

    fn scan(folder: &str, files: &[(&str, u64)]) -> FolderScan {
        let mut result = ScanResult::new();
        for (path, size) in files {
            result.push_audio(RemoteEntry::file(*path, *size).with_last_modified(100));
        }
        FolderScan::new(folder, result)
    }

    fn folders(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    fn run(
        existing: &[CachedSong],
        selected: &[String],
        scans: &[FolderScan],
        failed: &[String],
    ) -> SyncDiff {
        IncrementalDiffer::diff(DiffInput {
            existing,
            selected_folders: selected,
            scans,
            failed_folders: failed,
            previous_summaries: &HashMap::new(),
        })
    }

    #[test]
    fn test_absence_and_new_files() {
        let existing = vec![
            cached("/Music/A.mp3", &file_fingerprint(10, 100, "audio/flac")),
            cached("/Music/B.mp3", "stale"),
        ];
        let mut a = RemoteEntry::file("/Music/A.mp3", 10).with_last_modified(100);
        a.content_type = Some("audio/flac".to_string());
        let mut result = ScanResult::new();
        result.push_audio(a);
        result.push_audio(RemoteEntry::file("/Music/C.mp3", 20));

        let diff = run(
            &existing,
            &folders(&["/Music"]),
            &[FolderScan::new("/Music", result)],
            &[],
        );

        assert_eq!(diff.stale_by_absence, vec!["/Music/B.mp3"]);
        assert!(diff.stale_by_selection.is_empty());
        assert_eq!(diff.unchanged, 1);
        assert_eq!(diff.upserts.len(), 1);
        assert_eq!(diff.upserts[0].file.path, "/Music/C.mp3");
        assert_eq!(diff.upserts[0].content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(diff.upserts[0].track_number, 2);
    }

    #[test]
    fn test_failed_folder_is_preserved() {
        let existing = vec![
            cached("/Music/A.mp3", "x"),
            cached("/Podcasts/Ep1.mp3", "x"),
        ];

        let diff = run(
            &existing,
            &folders(&["/Music", "/Podcasts"]),
            &[scan("/Music", &[])],
            &folders(&["/Podcasts"]),
        );

        assert_eq!(diff.stale_by_absence, vec!["/Music/A.mp3"]);
        assert!(diff.stale_by_selection.is_empty());
    }

    #[test]
    fn test_nested_failed_root_is_preserved() {
        let existing = vec![cached("/Music/Live/A.mp3", "x")];

        let diff = run(
            &existing,
            &folders(&["/Music", "/Music/Live"]),
            &[scan("/Music", &[])],
            &folders(&["/Music/Live"]),
        );

        assert!(diff.stale_by_absence.is_empty());
    }

    #[test]
    fn test_deselected_folder_is_stale_even_when_scannable() {
        let existing = vec![
            cached("/Music/A.mp3", "x"),
            cached("/Old/B.mp3", "x"),
        ];

        let diff = run(
            &existing,
            &folders(&["/Music"]),
            &[scan("/Music", &[("/Music/A.mp3", 10)])],
            &[],
        );

        assert_eq!(diff.stale_by_selection, vec!["/Old/B.mp3"]);
        assert!(diff.stale_by_absence.is_empty());
    }

    #[test]
    fn test_overlapping_roots_keep_first_entry() {
        let diff = run(
            &[],
            &folders(&["/Music", "/Music/Rock"]),
            &[
                scan("/Music", &[("/Music/Rock/A.mp3", 1)]),
                scan("/Music/Rock", &[("/Music/Rock/A.mp3", 2)]),
            ],
            &[],
        );

        assert_eq!(diff.merged_files.len(), 1);
        assert_eq!(diff.upserts.len(), 1);
        assert_eq!(diff.upserts[0].file.size, 1);
    }

    #[test]
    fn test_unchanged_directory_summary_skips_existing_rows() {
        let scans = [scan("/Music", &[("/Music/A.mp3", 10), ("/Music/B.mp3", 20)])];
        let first = run(&[], &folders(&["/Music"]), &scans, &[]);
        assert_eq!(first.upserts.len(), 2);

        let existing: Vec<CachedSong> = first
            .upserts
            .iter()
            .cloned()
            .map(|p| p.into_song("p1", None, 1))
            .collect();
        let second = IncrementalDiffer::diff(DiffInput {
            existing: &existing,
            selected_folders: &folders(&["/Music"]),
            scans: &scans,
            failed_folders: &[],
            previous_summaries: &first.directory_summaries,
        });

        assert!(second.upserts.is_empty());
        assert_eq!(second.unchanged, 2);
        assert!(!second.has_deletions());
    }

    #[test]
    fn test_cover_change_forces_rewrite() {
        let fingerprint = file_fingerprint(10, 100, "audio/flac");
        let existing = vec![cached("/Music/A.mp3", &fingerprint)];

        let mut result = ScanResult::new();
        let mut file = RemoteEntry::file("/Music/A.mp3", 10).with_last_modified(100);
        file.content_type = Some("AUDIO/FLAC ".to_string());
        result.push_audio(file);
        result.record_cover("/Music", "/Music/cover.jpg");

        let diff = run(
            &existing,
            &folders(&["/Music"]),
            &[FolderScan::new("/Music", result)],
            &[],
        );

        assert_eq!(diff.upserts.len(), 1);
        assert_eq!(
            diff.upserts[0].cover_art_path.as_deref(),
            Some("/Music/cover.jpg")
        );
    }

    #[test]
    fn test_into_song_merges_with_cached_row() {
        let mut existing = cached("/Music/A.mp3", "old");
        existing.artist = "Unknown Artist".to_string();
        existing.cover_art_path = Some("/Music/cover.jpg".to_string());

        let mut result = ScanResult::new();
        result.push_audio(RemoteEntry::file("/Music/A.mp3", 99));
        let diff = run(
            std::slice::from_ref(&existing),
            &folders(&["/Music"]),
            &[FolderScan::new("/Music", result)],
            &[],
        );
        let pending = diff.upserts[0].clone();
        assert_eq!(pending.content_type, "audio/flac");
        assert_eq!(pending.last_modified, 100);
        assert_eq!(pending.cover_art_path.as_deref(), Some("/Music/cover.jpg"));

        let parsed = ParsedMetadata {
            title: "Fresh Title".to_string(),
            artist: String::new(),
            album: String::new(),
        };
        let song = pending.into_song("p1", Some(&parsed), 42);

        assert_eq!(song.title, "Fresh Title");
        assert_eq!(song.artist, "");
        assert_eq!(song.album, "Cached Album");
        assert_eq!(song.duration_ms, 215_000);
        assert_eq!(song.year, 1997);
        assert_eq!(song.file_size, 99);
        assert_eq!(song.fingerprint, "99|100|audio/flac");
        assert_eq!(song.id, identity::song_id("p1", "/Music/A.mp3"));
        assert_eq!(song.updated_at, 42);
    }

    #[test]
    fn test_directory_summary_is_order_independent() {
        let a = RemoteEntry::file("/Music/A.mp3", 1);
        let b = RemoteEntry::file("/Music/B.mp3", 2);

        let forward = directory_summary("/Music", None, &[&a, &b]);
        let backward = directory_summary("/Music", None, &[&b, &a]);
        let with_cover = directory_summary("/Music", Some("/Music/cover.jpg"), &[&a, &b]);

        assert_eq!(forward, backward);
        assert_ne!(forward, with_cover);
        assert_eq!(forward.len(), 64);
    }

    #[test]
    fn test_retain_summaries_under_synced_folders() {
        let mut summaries = HashMap::new();
        summaries.insert("/Music/A".to_string(), "1".to_string());
        summaries.insert("/Podcasts".to_string(), "2".to_string());

        retain_summaries_under(&mut summaries, &folders(&["/Music"]));

        assert_eq!(summaries.len(), 1);
        assert!(summaries.contains_key("/Music/A"));
    }
}
