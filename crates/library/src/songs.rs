use common::{LikeStatus, NewSong, Song, AI_CHECKED_ARTIST, PLACEHOLDER_ARTISTS};
use rusqlite::{params, OptionalExtension, Row};

use crate::{Catalog, LibraryError};

const SONG_COLUMNS: &str = "id, title, artist, src, cover";

pub(crate) fn song_from_row(row: &Row<'_>) -> rusqlite::Result<Song> {
    Ok(Song {
        id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        src: row.get(3)?,
        cover: row.get(4)?,
    })
}

impl Catalog {
    pub fn list_songs(&self) -> Result<Vec<Song>, LibraryError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM songs ORDER BY id", SONG_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], song_from_row)?;
            rows.collect()
        })
    }

    pub fn get_song(&self, song_id: i64) -> Result<Option<Song>, LibraryError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM songs WHERE id = ?1", SONG_COLUMNS);
            conn.query_row(&sql, params![song_id], song_from_row).optional()
        })
    }

    pub fn find_song_by_src(&self, src: &str) -> Result<Option<Song>, LibraryError> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM songs WHERE src = ?1", SONG_COLUMNS);
            conn.query_row(&sql, params![src], song_from_row).optional()
        })
    }

    pub fn insert_song(&self, song: &NewSong) -> Result<Song, LibraryError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO songs (title, artist, src, cover) VALUES (?1, ?2, ?3, ?4)",
                params![song.title, song.artist, song.src, song.cover],
            )?;
            Ok(Song {
                id: conn.last_insert_rowid(),
                title: song.title.clone(),
                artist: song.artist.clone(),
                src: song.src.clone(),
                cover: song.cover.clone(),
            })
        })
    }

    /// Songs whose artist is still a placeholder, oldest first.
    pub fn list_songs_pending_repair(&self, limit: usize) -> Result<Vec<Song>, LibraryError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM songs WHERE artist IN (?1, ?2) ORDER BY id LIMIT ?3",
                SONG_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![PLACEHOLDER_ARTISTS[0], PLACEHOLDER_ARTISTS[1], limit as i64],
                song_from_row,
            )?;
            rows.collect()
        })
    }

    pub fn update_song_metadata(
        &self,
        song_id: i64,
        artist: &str,
        title: &str,
    ) -> Result<(), LibraryError> {
        let changed = self.with_conn(|conn| {
            conn.execute(
                "UPDATE songs SET artist = ?1, title = ?2 WHERE id = ?3",
                params![artist, title, song_id],
            )
        })?;
        if changed == 0 {
            return Err(LibraryError::NotFound);
        }
        Ok(())
    }

    /// Marks a song as checked so the repair worker never picks it up again.
    pub fn mark_song_checked(&self, song_id: i64) -> Result<(), LibraryError> {
        let changed = self.with_conn(|conn| {
            conn.execute(
                "UPDATE songs SET artist = ?1 WHERE id = ?2",
                params![AI_CHECKED_ARTIST, song_id],
            )
        })?;
        if changed == 0 {
            return Err(LibraryError::NotFound);
        }
        Ok(())
    }

    pub fn list_liked_song_ids(&self, user_id: i64) -> Result<Vec<i64>, LibraryError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT song_id FROM liked_songs WHERE user_id = ?1 ORDER BY id")?;
            let rows = stmt.query_map(params![user_id], |row| row.get::<_, i64>(0))?;
            rows.collect()
        })
    }

    /// Removes the like if present, otherwise adds it.
    pub fn toggle_like(&self, user_id: i64, song_id: i64) -> Result<LikeStatus, LibraryError> {
        self.with_conn(|conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM liked_songs WHERE user_id = ?1 AND song_id = ?2",
                    params![user_id, song_id],
                    |row| row.get(0),
                )
                .optional()?;
            match existing {
                Some(id) => {
                    conn.execute("DELETE FROM liked_songs WHERE id = ?1", params![id])?;
                    Ok(LikeStatus::Removed)
                }
                None => {
                    conn.execute(
                        "INSERT INTO liked_songs (user_id, song_id) VALUES (?1, ?2)",
                        params![user_id, song_id],
                    )?;
                    Ok(LikeStatus::Added)
                }
            }
        })
    }
}
