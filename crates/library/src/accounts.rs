use common::User;
use rusqlite::{params, OptionalExtension, Row};

use crate::{Catalog, LibraryError};

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        profile_pic: row.get(4)?,
    })
}

impl Catalog {
    /// Inserts a user. A duplicate email surfaces as `LibraryError::Conflict`.
    pub fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<i64, LibraryError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (name, email, password) VALUES (?1, ?2, ?3)",
                params![name, email, password_hash],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user(&self, user_id: i64) -> Result<Option<User>, LibraryError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, password, profile_pic FROM users WHERE id = ?1",
                params![user_id],
                user_from_row,
            )
            .optional()
        })
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, LibraryError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, email, password, profile_pic FROM users WHERE email = ?1",
                params![email],
                user_from_row,
            )
            .optional()
        })
    }

    pub fn count_users_with_email(&self, email: &str) -> Result<usize, LibraryError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM users WHERE email = ?1",
                params![email],
                |row| row.get::<_, i64>(0),
            )
        })
        .map(|count| count as usize)
    }

    pub fn set_profile_pic(&self, user_id: i64, data_uri: &str) -> Result<(), LibraryError> {
        let changed = self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET profile_pic = ?1 WHERE id = ?2",
                params![data_uri, user_id],
            )
        })?;
        if changed == 0 {
            return Err(LibraryError::NotFound);
        }
        Ok(())
    }

    pub fn insert_session(
        &self,
        token: &str,
        user_id: i64,
        expires_at: u64,
    ) -> Result<(), LibraryError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
                params![token, user_id, expires_at as i64],
            )
        })?;
        Ok(())
    }

    /// User id behind a session token that has not expired at `now`.
    pub fn session_user_id(&self, token: &str, now: u64) -> Result<Option<i64>, LibraryError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT user_id FROM sessions WHERE token = ?1 AND expires_at >= ?2",
                params![token, now as i64],
                |row| row.get::<_, i64>(0),
            )
            .optional()
        })
    }

    pub fn purge_expired_sessions(&self, now: u64) -> Result<usize, LibraryError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM sessions WHERE expires_at < ?1",
                params![now as i64],
            )
        })
    }
}
