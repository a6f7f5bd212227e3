use serde::{Deserialize, Serialize};
use std::path::Path;

/// Cover used when neither the track nor its folder ships an image.
pub const DEFAULT_COVER: &str = "/assets/default_cover.jpg";
/// Artist assigned by the scanner when the filename has no separator.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
/// Artist values that mark a song as pending metadata repair.
pub const PLACEHOLDER_ARTISTS: &[&str] = &[UNKNOWN_ARTIST, "Unknown"];
/// Terminal value written once repair was attempted and failed.
pub const AI_CHECKED_ARTIST: &str = "Unknown (AI Checked)";

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

const ARTIST_TITLE_SEP: &str = " - ";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub src: String,
    pub cover: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewSong {
    pub title: String,
    pub artist: String,
    pub src: String,
    pub cover: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    pub user_id: Option<i64>,
    pub is_system: bool,
}

impl Playlist {
    /// System playlists are readable by everyone; user playlists only by their owner.
    pub fn readable_by(&self, user_id: i64) -> bool {
        self.is_system || self.user_id == Some(user_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub profile_pic: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeStatus {
    Added,
    Removed,
}

pub fn is_placeholder_artist(artist: &str) -> bool {
    PLACEHOLDER_ARTISTS.contains(&artist)
}

/// Splits a filename stem on the first `" - "` into `(artist, title)`.
pub fn split_artist_title(stem: &str) -> (String, String) {
    match stem.split_once(ARTIST_TITLE_SEP) {
        Some((artist, title)) => (artist.trim().to_string(), title.trim().to_string()),
        None => (UNKNOWN_ARTIST.to_string(), stem.to_string()),
    }
}

pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            extensions.iter().any(|candidate| *candidate == ext)
        }
        None => false,
    }
}

pub fn is_audio_file(path: &Path) -> bool {
    has_extension(path, AUDIO_EXTENSIONS)
}

pub fn is_image_file(path: &Path) -> bool {
    has_extension(path, IMAGE_EXTENSIONS)
}

pub fn relpath_from(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(path_to_slash_string(rel))
}

/// Web-servable path for a file under the assets directory, e.g.
/// `/assets/music/English/Song.mp3`.
pub fn web_path(assets_dir: &Path, path: &Path) -> Option<String> {
    let rel = relpath_from(assets_dir, path)?;
    Some(format!("/assets/{}", rel))
}

pub fn path_segments(path: &Path) -> Vec<String> {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

fn path_to_slash_string(path: &Path) -> String {
    path_segments(path).join("/")
}
