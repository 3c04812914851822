//! Deterministic ids for remote songs, artists and albums.
//!
//! Ids are derived from the owning profile and an identity string, so every
//! resync of the same file yields the same ids. Artist and album identities
//! are case-insensitive. Song identities are the exact remote path, since
//! WebDAV servers may keep `a.mp3` and `A.mp3` side by side. Ids are always
//! negative, leaving the positive range to locally indexed media.

use core_library::{UNKNOWN_ALBUM, UNKNOWN_ARTIST};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Song,
    Artist,
    Album,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Song => "song",
            EntityKind::Artist => "artist",
            EntityKind::Album => "album",
        }
    }
}

/// Negative, non-zero id for `identity` within `profile_id`, ignoring case
/// and surrounding whitespace.
pub fn synthesize_entity_id(kind: EntityKind, profile_id: &str, identity: &str) -> i64 {
    hash_identity(kind, profile_id, &identity.trim().to_lowercase())
}

fn hash_identity(kind: EntityKind, profile_id: &str, identity: &str) -> i64 {
    let key = format!("webdav|{}|{}|{}", kind.as_str(), profile_id, identity);
    let digest = Sha256::digest(key.as_bytes());

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let positive = (u64::from_be_bytes(bytes) & i64::MAX as u64) as i64;
    -positive.max(1)
}

/// Song id keyed by the exact remote path.
pub fn song_id(profile_id: &str, remote_path: &str) -> i64 {
    hash_identity(EntityKind::Song, profile_id, remote_path)
}

pub fn artist_id(profile_id: &str, artist: &str) -> i64 {
    synthesize_entity_id(EntityKind::Artist, profile_id, display_artist(artist))
}

/// Album id keyed by album and artist.
///
/// Songs without a known album are grouped by their directory instead of
/// collapsing into one library-wide "Unknown Album".
pub fn album_id(profile_id: &str, album: &str, artist: &str, parent_folder: &str) -> i64 {
    let album = if album.trim().is_empty() {
        UNKNOWN_ALBUM
    } else {
        album
    };
    let artist = display_artist(artist);

    let identity = if album.eq_ignore_ascii_case(UNKNOWN_ALBUM) {
        format!("{}|{}|{}", album, parent_folder, artist)
    } else {
        format!("{}|{}", album, artist)
    };
    synthesize_entity_id(EntityKind::Album, profile_id, &identity)
}

fn display_artist(artist: &str) -> &str {
    if artist.trim().is_empty() {
        UNKNOWN_ARTIST
    } else {
        artist
    }
}
