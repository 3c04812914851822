//! Persisted song cache models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Placeholder album name used when neither the path nor the cache knows better.
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Artist identity used for songs whose artist is blank.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// A previously synced remote audio file.
///
/// `(profile_id, remote_path)` is the primary key. The numeric ids are
/// synthesized deterministically from the profile and the entity identity so
/// that a resync produces the same ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CachedSong {
    /// Synthesized song id (negative, non-zero)
    pub id: i64,
    /// Owning connection profile
    pub profile_id: String,
    /// Normalized remote path of the file
    pub remote_path: String,
    pub title: String,
    pub artist: String,
    pub artist_id: i64,
    pub album: String,
    pub album_id: i64,
    /// Duration in milliseconds, zero when unknown
    pub duration_ms: i64,
    pub file_size: i64,
    pub content_type: String,
    /// Remote path of the cover image found next to the file
    pub cover_art_path: Option<String>,
    pub track_number: i64,
    pub year: i64,
    /// Remote last-modified time (epoch ms), zero when the server omits it
    pub remote_last_modified: i64,
    /// `size|last_modified|content_type` of the last stored revision
    pub fingerprint: String,
    /// Time the row was last written (epoch ms)
    pub updated_at: i64,
}

impl CachedSong {
    /// Validate song data
    pub fn validate(&self) -> Result<(), String> {
        if self.profile_id.trim().is_empty() {
            return Err("Song profile id cannot be empty".to_string());
        }

        if !self.remote_path.starts_with('/') {
            return Err(format!(
                "Song remote path must be absolute: {}",
                self.remote_path
            ));
        }

        if self.title.trim().is_empty() {
            return Err("Song title cannot be empty".to_string());
        }

        if self.duration_ms < 0 {
            return Err("Song duration cannot be negative".to_string());
        }

        if self.file_size < 0 {
            return Err("Song file size cannot be negative".to_string());
        }

        Ok(())
    }

    /// Whether the stored artist is a placeholder rather than a real name.
    pub fn has_unknown_artist(&self) -> bool {
        is_unknown_artist(&self.artist)
    }
}

/// `true` for blank artists and the placeholders written by earlier runs.
pub fn is_unknown_artist(artist: &str) -> bool {
    let normalized = artist.trim().to_lowercase();
    matches!(
        normalized.as_str(),
        "" | "unknown" | "<unknown>" | "unknown artist"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song() -> CachedSong {
        CachedSong {
            id: -1,
            profile_id: "profile-1".to_string(),
            remote_path: "/Music/A.mp3".to_string(),
            title: "A".to_string(),
            artist: "Artist".to_string(),
            artist_id: -2,
            album: UNKNOWN_ALBUM.to_string(),
            album_id: -3,
            duration_ms: 0,
            file_size: 1024,
            content_type: "audio/mpeg".to_string(),
            cover_art_path: None,
            track_number: 1,
            year: 0,
            remote_last_modified: 0,
            fingerprint: String::new(),
            updated_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_song_validation() {
        assert!(song().validate().is_ok());

        let mut blank_title = song();
        blank_title.title = "  ".to_string();
        assert!(blank_title.validate().is_err());

        let mut relative = song();
        relative.remote_path = "Music/A.mp3".to_string();
        assert!(relative.validate().is_err());

        let mut negative = song();
        negative.file_size = -1;
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_unknown_artist_detection() {
        assert!(is_unknown_artist(""));
        assert!(is_unknown_artist("Unknown Artist"));
        assert!(is_unknown_artist(" unknown "));
        assert!(is_unknown_artist("<unknown>"));
        assert!(!is_unknown_artist("Artist X"));
        assert!(!song().has_unknown_artist());
    }
}
