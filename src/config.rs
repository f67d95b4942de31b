use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DiaryConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub photos: PhotoConfig,
    pub albums: AlbumConfig,
    pub services: ServicesConfig,
    pub trash: TrashConfig,
    pub locations: LocationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub media_dir: String,
    /// Prefix of every URL handed out by the local storage adapter.
    pub public_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PhotoConfig {
    /// Upper bound on photos per finalized selection and per diary.
    pub max_selection: usize,
    pub recommendation_cap: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlbumConfig {
    pub home_country: String,
    pub fallback_name: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServicesConfig {
    pub scorer_url: String,
    pub generator_url: String,
    pub geocode_url: String,
    pub timeout_secs: u64,
    /// Diary text used when the generator is unreachable.
    pub degraded_message: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrashConfig {
    pub retention_days: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LocationConfig {
    pub batch_size: usize,
    pub max_attempts: u32,
}

impl Default for DiaryConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            photos: PhotoConfig::default(),
            albums: AlbumConfig::default(),
            services: ServicesConfig::default(),
            trash: TrashConfig::default(),
            locations: LocationConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dir = default_phodiary_dir();
        Self {
            db_path: dir.join("diary.db").to_string_lossy().into_owned(),
            media_dir: dir.join("media").to_string_lossy().into_owned(),
            public_base_url: "http://localhost:8080/media".into(),
        }
    }
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            max_selection: 9,
            recommendation_cap: 9,
        }
    }
}

impl Default for AlbumConfig {
    fn default() -> Self {
        Self {
            home_country: "Korea".into(),
            fallback_name: "Other Places".into(),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            scorer_url: "http://localhost:8000/recommend".into(),
            generator_url: "http://localhost:8000/generate".into(),
            geocode_url: "http://localhost:8000/reverse".into(),
            timeout_secs: 20,
            degraded_message:
                "The diary assistant is unavailable right now. Write about this day in your own words."
                    .into(),
        }
    }
}

impl Default for TrashConfig {
    fn default() -> Self {
        Self { retention_days: 30 }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_attempts: 3,
        }
    }
}

impl ServicesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Returns `~/.phodiary/`
pub fn default_phodiary_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".phodiary")
}

/// Returns the default config file path: `~/.phodiary/config.toml`
pub fn default_config_path() -> PathBuf {
    default_phodiary_dir().join("config.toml")
}

impl DiaryConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            DiaryConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (PHODIARY_DB, PHODIARY_MEDIA_DIR, PHODIARY_LOG_LEVEL, PHODIARY_HOME_COUNTRY).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PHODIARY_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("PHODIARY_MEDIA_DIR") {
            self.storage.media_dir = val;
        }
        if let Ok(val) = std::env::var("PHODIARY_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("PHODIARY_HOME_COUNTRY") {
            self.albums.home_country = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn resolved_media_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.media_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
