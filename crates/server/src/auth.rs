use std::time::Duration;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::http::{header, HeaderMap};
use common::User;
use library::{Catalog, LibraryError};
use rand::Rng;
use rand_core::OsRng;
use tracing::{debug, warn};

use crate::utils::now_secs;

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub expires_at: u64,
}

#[derive(Debug)]
pub enum AuthError {
    UserExists,
    Hash(String),
    Db(LibraryError),
    Task(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::UserExists => write!(f, "email already registered"),
            AuthError::Hash(err) => write!(f, "password hash error: {}", err),
            AuthError::Db(err) => write!(f, "db error: {}", err),
            AuthError::Task(err) => write!(f, "auth task failed: {}", err),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<LibraryError> for AuthError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::Conflict(_) => AuthError::UserExists,
            other => AuthError::Db(other),
        }
    }
}

#[derive(Clone)]
pub struct AuthStore {
    catalog: Catalog,
    session_ttl: Duration,
}

impl AuthStore {
    pub fn new(catalog: Catalog, session_ttl: Duration) -> Self {
        Self {
            catalog,
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Registers a new account. The email pre-check and the UNIQUE constraint
    /// both surface as `UserExists`, so a racing signup looks the same as a
    /// sequential one.
    pub fn signup(&self, name: &str, email: &str, password: &str) -> Result<i64, AuthError> {
        if self.catalog.count_users_with_email(email)? > 0 {
            return Err(AuthError::UserExists);
        }
        let password_hash = hash_password(password)?;
        Ok(self.catalog.create_user(name, email, &password_hash)?)
    }

    pub fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>, AuthError> {
        let user = match self.catalog.find_user_by_email(email)? {
            Some(user) => user,
            None => return Ok(None),
        };
        if verify_password(password, &user.password_hash) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Issues a new session. Expired rows are swept first so the table only
    /// grows with live sessions.
    pub fn create_session(&self, user_id: i64) -> Result<Session, AuthError> {
        match self.purge_expired_sessions() {
            Ok(0) => {}
            Ok(count) => debug!("Purged {} expired sessions", count),
            Err(err) => warn!("Failed to purge expired sessions: {}", err),
        }
        let token = generate_token();
        let expires_at = now_secs() + self.session_ttl.as_secs();
        self.catalog.insert_session(&token, user_id, expires_at)?;
        Ok(Session {
            token,
            user_id,
            expires_at,
        })
    }

    pub fn user_from_token(&self, token: &str) -> Result<Option<User>, AuthError> {
        let user_id = match self.catalog.session_user_id(token, now_secs())? {
            Some(user_id) => user_id,
            None => return Ok(None),
        };
        Ok(self.catalog.get_user(user_id)?)
    }

    pub fn purge_expired_sessions(&self) -> Result<usize, AuthError> {
        Ok(self.catalog.purge_expired_sessions(now_secs())?)
    }
}

/// Runs argon2 work, and the lookups around it, on the blocking pool.
pub async fn run_blocking<T, F>(task: F) -> Result<T, AuthError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| AuthError::Task(err.to_string()))?
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hash(err.to_string()))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn generate_token() -> String {
    let mut rng = rand::rng();
    let chars = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    (0..32)
        .map(|_| chars[rng.random_range(0..chars.len())] as char)
        .collect()
}
