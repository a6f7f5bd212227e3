use rusqlite::params;

use crate::{Catalog, LibraryError};

// Membership and likes are guarded by existence checks rather than UNIQUE
// constraints; see playlists.rs and songs.rs.
const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        profile_pic TEXT
    );

    CREATE TABLE IF NOT EXISTS songs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        artist TEXT NOT NULL DEFAULT 'Unknown Artist',
        src TEXT NOT NULL UNIQUE,
        cover TEXT NOT NULL DEFAULT '/assets/default_cover.jpg'
    );

    CREATE TABLE IF NOT EXISTS playlists (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        user_id INTEGER REFERENCES users(id),
        is_system INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS playlist_songs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        playlist_id INTEGER NOT NULL REFERENCES playlists(id),
        song_id INTEGER NOT NULL REFERENCES songs(id)
    );

    CREATE TABLE IF NOT EXISTS liked_songs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id),
        song_id INTEGER NOT NULL REFERENCES songs(id)
    );

    CREATE TABLE IF NOT EXISTS artist_images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        artist_name TEXT NOT NULL UNIQUE,
        image_url TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id),
        expires_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_songs_artist ON songs(artist);
    CREATE INDEX IF NOT EXISTS idx_playlist_songs_playlist ON playlist_songs(playlist_id);
    CREATE INDEX IF NOT EXISTS idx_liked_songs_user ON liked_songs(user_id);
";

impl Catalog {
    pub fn init_tables(&self) -> Result<(), LibraryError> {
        self.with_conn(|conn| conn.execute_batch(SCHEMA))
    }

    /// Adds `users.profile_pic` to databases created before the column existed.
    /// Returns whether the column had to be added.
    pub fn ensure_profile_pic_column(&self) -> Result<bool, LibraryError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
            let columns = stmt
                .query_map(params!["users"], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            if columns.iter().any(|name| name == "profile_pic") {
                return Ok(false);
            }
            conn.execute("ALTER TABLE users ADD COLUMN profile_pic TEXT", [])?;
            Ok(true)
        })
    }
}
