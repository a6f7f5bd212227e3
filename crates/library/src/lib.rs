mod accounts;
mod artists;
mod playlists;
mod scan;
mod schema;
mod songs;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode};
use tracing::info;

pub use scan::ScanStats;

const SQLITE_SCHEME: &str = "sqlite:";
const MEMORY_URL: &str = "sqlite::memory:";

/// Handle to the relational catalog. Clones share one connection.
#[derive(Clone)]
pub struct Catalog {
    conn: Arc<Mutex<Connection>>,
}

impl Catalog {
    pub fn open(path: &Path) -> Result<Self, LibraryError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        info!("Opened catalog at {:?}", path);
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, LibraryError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    /// Opens a catalog from a connection string. `base` anchors relative paths.
    pub fn open_url(url: &str, base: &Path) -> Result<Self, LibraryError> {
        match DatabaseLocation::parse(url)? {
            DatabaseLocation::Memory => Self::open_in_memory(),
            DatabaseLocation::File(path) => {
                let path = if path.is_absolute() { path } else { base.join(path) };
                Self::open(&path)
            }
        }
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, LibraryError> {
        let conn = self.conn.lock();
        f(&conn).map_err(LibraryError::from)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Accepts `sqlite:///relative.db`, `sqlite:////absolute.db`,
    /// `sqlite::memory:` and bare file paths.
    pub fn parse(url: &str) -> Result<Self, LibraryError> {
        let url = url.trim();
        if url == MEMORY_URL {
            return Ok(DatabaseLocation::Memory);
        }
        if let Some(rest) = url.strip_prefix(SQLITE_SCHEME) {
            let rest = rest.strip_prefix("//").unwrap_or(rest);
            let rest = rest.strip_prefix('/').unwrap_or(rest);
            if rest.is_empty() {
                return Ok(DatabaseLocation::Memory);
            }
            return Ok(DatabaseLocation::File(PathBuf::from(rest)));
        }
        if let Some((scheme, _)) = url.split_once("://") {
            return Err(LibraryError::UnsupportedUrl(scheme.to_string()));
        }
        if url.is_empty() {
            return Err(LibraryError::UnsupportedUrl(String::new()));
        }
        Ok(DatabaseLocation::File(PathBuf::from(url)))
    }
}

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    Sqlite(rusqlite::Error),
    Conflict(String),
    UnsupportedUrl(String),
    NotFound,
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Sqlite(err) => write!(f, "db error: {}", err),
            LibraryError::Conflict(message) => write!(f, "constraint violation: {}", message),
            LibraryError::UnsupportedUrl(scheme) => {
                write!(f, "unsupported database url scheme: {:?}", scheme)
            }
            LibraryError::NotFound => write!(f, "not found"),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<rusqlite::Error> for LibraryError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == ErrorCode::ConstraintViolation =>
            {
                LibraryError::Conflict(message.clone().unwrap_or_else(|| code.to_string()))
            }
            _ => LibraryError::Sqlite(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_urls() {
        assert_eq!(
            DatabaseLocation::parse("sqlite:///site.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("site.db"))
        );
        assert_eq!(
            DatabaseLocation::parse("sqlite:////var/lib/rhymic.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("/var/lib/rhymic.db"))
        );
        assert_eq!(
            DatabaseLocation::parse("sqlite::memory:").unwrap(),
            DatabaseLocation::Memory
        );
        assert_eq!(
            DatabaseLocation::parse("data/site.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("data/site.db"))
        );
    }

    #[test]
    fn rejects_foreign_schemes() {
        let err = DatabaseLocation::parse("postgresql://u:p@host/db").unwrap_err();
        assert!(matches!(err, LibraryError::UnsupportedUrl(ref s) if s == "postgresql"));
    }

    #[test]
    fn opens_relative_to_base() {
        let dir = tempfile::TempDir::new().unwrap();
        let catalog = Catalog::open_url("sqlite:///nested/site.db", dir.path()).unwrap();
        catalog.init_tables().unwrap();
        assert!(dir.path().join("nested").join("site.db").exists());
    }
}
