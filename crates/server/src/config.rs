use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
        }
    }
}

impl AiConfig {
    pub fn enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FixerConfig {
    pub batch_size: usize,
    pub idle_secs: u64,
    pub row_delay_secs: u64,
    pub batch_delay_secs: u64,
}

impl Default for FixerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            idle_secs: 60,
            row_delay_secs: 2,
            batch_delay_secs: 5,
        }
    }
}

impl FixerConfig {
    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn row_delay(&self) -> Duration {
        Duration::from_secs(self.row_delay_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.batch_delay_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub frontend_dir: String,
    pub database_url: String,
    pub session_ttl_secs: u64,
    pub max_upload_bytes: usize,
    pub artist_search_url: String,
    pub artist_search_timeout_secs: u64,
    pub ai: AiConfig,
    pub fixer: FixerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            frontend_dir: "rhymic-react".to_string(),
            database_url: "sqlite:///site.db".to_string(),
            session_ttl_secs: 60 * 60 * 24 * 30,
            max_upload_bytes: 5 * 1024 * 1024,
            artist_search_url: "https://api.deezer.com".to_string(),
            artist_search_timeout_secs: 10,
            ai: AiConfig::default(),
            fixer: FixerConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("RHYMIC_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

pub fn load_or_create_config(path: &Path) -> Result<(ServerConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: ServerConfig = serde_yaml::from_str(&contents)?;
        if config.port == 0 {
            config.port = 5000;
        }
        if config.session_ttl_secs == 0 {
            config.session_ttl_secs = ServerConfig::default().session_ttl_secs;
        }
        if config.fixer.batch_size == 0 {
            config.fixer.batch_size = FixerConfig::default().batch_size;
        }
        return Ok((config, false));
    }

    let config = ServerConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

/// Applies `DATABASE_URL`, `GOOGLE_API_KEY`, `GEMINI_MODEL` and `PORT`.
pub fn apply_env_overrides(config: &mut ServerConfig) {
    apply_overrides(config, |key| env::var(key).ok());
}

fn apply_overrides(config: &mut ServerConfig, lookup: impl Fn(&str) -> Option<String>) {
    let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    if let Some(url) = lookup("DATABASE_URL") {
        config.database_url = url.trim().to_string();
    }
    if let Some(key) = lookup("GOOGLE_API_KEY") {
        config.ai.api_key = key;
    }
    if let Some(model) = lookup("GEMINI_MODEL") {
        config.ai.model = model;
    }
    if let Some(port) = lookup("PORT").and_then(|value| value.trim().parse::<u16>().ok()) {
        config.port = port;
    }
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    config_dir(config_path).join(raw)
}

pub fn config_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf()
}

/// Where the frontend lives on disk. A built `dist` switches the server to
/// production mode, otherwise assets come from `public`.
#[derive(Clone, Debug)]
pub struct FrontendPaths {
    pub dist_dir: PathBuf,
    pub assets_dir: PathBuf,
}

impl FrontendPaths {
    pub fn resolve(frontend_dir: &Path) -> Self {
        let dist_dir = frontend_dir.join("dist");
        let assets_dir = if dist_dir.exists() {
            dist_dir.join("assets")
        } else {
            frontend_dir.join("public").join("assets")
        };
        Self {
            dist_dir,
            assets_dir,
        }
    }

    pub fn production(&self) -> bool {
        self.dist_dir.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn env_overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = [
            ("DATABASE_URL", " sqlite:////var/lib/rhymic.db "),
            ("GOOGLE_API_KEY", "secret"),
            ("GEMINI_MODEL", "gemini-pro"),
            ("PORT", "8080"),
        ]
        .into_iter()
        .collect();
        let mut config = ServerConfig::default();
        apply_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.database_url, "sqlite:////var/lib/rhymic.db");
        assert!(config.ai.enabled());
        assert_eq!(config.ai.model, "gemini-pro");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = ServerConfig::default();
        apply_overrides(&mut config, |key| {
            (key == "GOOGLE_API_KEY").then(|| "  ".to_string())
        });
        assert!(!config.ai.enabled());
        assert_eq!(config.database_url, "sqlite:///site.db");
    }

    #[test]
    fn non_sqlite_database_urls_fail_to_open() {
        let mut config = ServerConfig::default();
        apply_overrides(&mut config, |key| {
            (key == "DATABASE_URL").then(|| "postgres://u:p@db.example/rhymic".to_string())
        });
        assert_eq!(config.database_url, "postgres://u:p@db.example/rhymic");
        let opened = library::Catalog::open_url(&config.database_url, Path::new("."));
        assert!(matches!(
            opened,
            Err(library::LibraryError::UnsupportedUrl(ref scheme)) if scheme == "postgres"
        ));
    }

    #[test]
    fn creates_default_config_when_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("config.yaml");
        let (config, created) = load_or_create_config(&path).unwrap();
        assert!(created);
        assert_eq!(config.port, 5000);
        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains("version"));
        assert_eq!(config.fixer.batch_size, 10);

        let (_, created) = load_or_create_config(&path).unwrap();
        assert!(!created);
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "port: 0\nfixer:\n  idle_secs: 5\n").unwrap();
        let (config, _) = load_or_create_config(&path).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.fixer.idle_secs, 5);
        assert_eq!(config.fixer.row_delay_secs, 2);
        assert_eq!(config.session_ttl_secs, 60 * 60 * 24 * 30);
    }

    #[test]
    fn frontend_without_dist_serves_public_assets() {
        let dir = TempDir::new().unwrap();
        let paths = FrontendPaths::resolve(dir.path());
        assert!(!paths.production());
        assert_eq!(paths.assets_dir, dir.path().join("public").join("assets"));

        fs::create_dir_all(dir.path().join("dist")).unwrap();
        let paths = FrontendPaths::resolve(dir.path());
        assert!(paths.production());
        assert_eq!(paths.assets_dir, dir.path().join("dist").join("assets"));
    }
}
