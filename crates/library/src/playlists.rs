use common::{Playlist, Song};
use rusqlite::{params, OptionalExtension, Row};

use crate::songs::song_from_row;
use crate::{Catalog, LibraryError};

fn playlist_from_row(row: &Row<'_>) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: row.get(0)?,
        name: row.get(1)?,
        user_id: row.get(2)?,
        is_system: row.get(3)?,
    })
}

impl Catalog {
    pub fn get_playlist(&self, playlist_id: i64) -> Result<Option<Playlist>, LibraryError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, user_id, is_system FROM playlists WHERE id = ?1",
                params![playlist_id],
                playlist_from_row,
            )
            .optional()
        })
    }

    /// System playlists first, then the ones owned by `user_id`.
    pub fn list_visible_playlists(&self, user_id: i64) -> Result<Vec<Playlist>, LibraryError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, user_id, is_system FROM playlists
                 WHERE is_system = 1 OR user_id = ?1
                 ORDER BY is_system DESC, id",
            )?;
            let rows = stmt.query_map(params![user_id], playlist_from_row)?;
            rows.collect()
        })
    }

    pub fn find_system_playlist(&self, name: &str) -> Result<Option<Playlist>, LibraryError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, user_id, is_system FROM playlists
                 WHERE name = ?1 AND is_system = 1 ORDER BY id LIMIT 1",
                params![name],
                playlist_from_row,
            )
            .optional()
        })
    }

    /// Returns the system playlist for a folder name, creating it if absent,
    /// along with whether it was created.
    pub fn ensure_system_playlist(&self, name: &str) -> Result<(Playlist, bool), LibraryError> {
        if let Some(playlist) = self.find_system_playlist(name)? {
            return Ok((playlist, false));
        }
        let playlist = self.insert_playlist(name, None, true)?;
        Ok((playlist, true))
    }

    pub fn create_user_playlist(&self, name: &str, user_id: i64) -> Result<Playlist, LibraryError> {
        self.insert_playlist(name, Some(user_id), false)
    }

    fn insert_playlist(
        &self,
        name: &str,
        user_id: Option<i64>,
        is_system: bool,
    ) -> Result<Playlist, LibraryError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO playlists (name, user_id, is_system) VALUES (?1, ?2, ?3)",
                params![name, user_id, is_system],
            )?;
            Ok(Playlist {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
                user_id,
                is_system,
            })
        })
    }

    pub fn find_owned_playlist(
        &self,
        playlist_id: i64,
        user_id: i64,
    ) -> Result<Option<Playlist>, LibraryError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, user_id, is_system FROM playlists
                 WHERE id = ?1 AND user_id = ?2",
                params![playlist_id, user_id],
                playlist_from_row,
            )
            .optional()
        })
    }

    pub fn playlist_songs(&self, playlist_id: i64) -> Result<Vec<Song>, LibraryError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, artist, src, cover FROM songs
                 WHERE id IN (SELECT song_id FROM playlist_songs WHERE playlist_id = ?1)
                 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![playlist_id], song_from_row)?;
            rows.collect()
        })
    }

    /// Links a song to a playlist unless the pair already exists. Returns
    /// whether a link was written.
    pub fn ensure_playlist_song(&self, playlist_id: i64, song_id: i64) -> Result<bool, LibraryError> {
        self.with_conn(|conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM playlist_songs WHERE playlist_id = ?1 AND song_id = ?2",
                    params![playlist_id, song_id],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Ok(false);
            }
            conn.execute(
                "INSERT INTO playlist_songs (playlist_id, song_id) VALUES (?1, ?2)",
                params![playlist_id, song_id],
            )?;
            Ok(true)
        })
    }

    pub fn count_playlist_links(&self) -> Result<usize, LibraryError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM playlist_songs", [], |row| {
                row.get::<_, i64>(0)
            })
        })
        .map(|count| count as usize)
    }
}
