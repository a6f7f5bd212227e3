use std::fs;
use std::path::{Path, PathBuf};

use common::{
    is_audio_file, is_image_file, path_segments, split_artist_title, web_path, NewSong, Song,
    DEFAULT_COVER, IMAGE_EXTENSIONS,
};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{Catalog, LibraryError};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub folders: usize,
    pub songs_seen: usize,
    pub songs_added: usize,
    pub playlists_added: usize,
    pub links_added: usize,
}

impl Catalog {
    /// Walks `<assets_dir>/music` and inserts whatever songs, system playlists
    /// and membership links are missing. Every row is committed on its own, so
    /// an interrupted scan can simply be run again.
    pub fn scan_library(&self, assets_dir: &Path) -> Result<ScanStats, LibraryError> {
        let music_dir = assets_dir.join("music");
        let mut stats = ScanStats::default();
        if !music_dir.is_dir() {
            info!("No music directory at {:?}; skipping scan", music_dir);
            return Ok(stats);
        }

        for entry in WalkDir::new(&music_dir)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_dir() {
                continue;
            }
            stats.folders += 1;
            self.scan_folder(assets_dir, &music_dir, entry.path(), &mut stats)?;
        }

        info!(
            "Library scan finished: {} folders, {} songs ({} new), {} new playlists, {} new links",
            stats.folders,
            stats.songs_seen,
            stats.songs_added,
            stats.playlists_added,
            stats.links_added
        );
        Ok(stats)
    }

    fn scan_folder(
        &self,
        assets_dir: &Path,
        music_dir: &Path,
        dir: &Path,
        stats: &mut ScanStats,
    ) -> Result<(), LibraryError> {
        let files = list_files(dir)?;
        let folder_cover = files
            .iter()
            .find(|path| is_image_file(path))
            .and_then(|path| web_path(assets_dir, path))
            .unwrap_or_else(|| DEFAULT_COVER.to_string());
        let categories = dir
            .strip_prefix(music_dir)
            .map(path_segments)
            .unwrap_or_default();

        for file in files.iter().filter(|path| is_audio_file(path)) {
            let src = match web_path(assets_dir, file) {
                Some(src) => src,
                None => {
                    warn!("Skipping {:?}: outside of the assets directory", file);
                    continue;
                }
            };
            stats.songs_seen += 1;

            let song = match self.find_song_by_src(&src)? {
                Some(song) => song,
                None => {
                    let song = self.insert_scanned_song(assets_dir, dir, file, src, &folder_cover)?;
                    stats.songs_added += 1;
                    song
                }
            };

            for category in &categories {
                let (playlist, created) = self.ensure_system_playlist(category)?;
                if created {
                    debug!("Created system playlist {:?}", category);
                    stats.playlists_added += 1;
                }
                if self.ensure_playlist_song(playlist.id, song.id)? {
                    stats.links_added += 1;
                }
            }
        }
        Ok(())
    }

    fn insert_scanned_song(
        &self,
        assets_dir: &Path,
        dir: &Path,
        file: &Path,
        src: String,
        folder_cover: &str,
    ) -> Result<Song, LibraryError> {
        let stem = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        let (artist, title) = split_artist_title(&stem);
        let cover = find_track_cover(assets_dir, dir, &stem)
            .unwrap_or_else(|| folder_cover.to_string());
        self.insert_song(&NewSong {
            title,
            artist,
            src,
            cover,
        })
    }
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, LibraryError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// An image sharing the track's basename overrides the folder cover.
fn find_track_cover(assets_dir: &Path, dir: &Path, stem: &str) -> Option<String> {
    for ext in IMAGE_EXTENSIONS {
        let candidate = dir.join(format!("{}.{}", stem, ext));
        if candidate.is_file() {
            return web_path(assets_dir, &candidate);
        }
    }
    None
}
