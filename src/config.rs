use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "chapterlink.toml";

/// Process-wide settings. Loaded once at startup and handed to each component.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub feed: FeedConfig,
    pub hydrate: HydrateConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `None` falls back to a SQLite file in the user's data directory.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: None, max_connections: 10 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub uploads_url: String,
    /// Public site, used for the `external_url` stored on links.
    pub site_url: String,
    pub user_agent: String,
    /// Key of the `sources` row that upstream links are stored under.
    pub source_key: String,
    pub timeout_ms: u64,
    pub retries: u32,
    /// Backoff before retry `n` is `n * backoff_ms`.
    pub backoff_ms: u64,
    pub content_ratings: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mangadex.org".to_string(),
            uploads_url: "https://uploads.mangadex.org".to_string(),
            site_url: "https://mangadex.org".to_string(),
            user_agent: concat!("chapterlink/", env!("CARGO_PKG_VERSION")).to_string(),
            source_key: "mangadex".to_string(),
            timeout_ms: 8_000,
            retries: 2,
            backoff_ms: 400,
            content_ratings: vec!["safe".into(), "suggestive".into(), "erotica".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Rows per feed request; the catalog rejects anything above 100.
    pub page_size: u32,
    pub max_pages: u32,
    /// Item ceiling used when the caller gives no hint.
    pub default_limit: usize,
    pub group_batch_size: usize,
    /// Width of parallel fan-out batches.
    pub parallelism: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { page_size: 100, max_pages: 20, default_limit: 500, group_batch_size: 90, parallelism: 8 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HydrateConfig {
    /// Numbered slug suffixes tried before falling back to a timestamp suffix.
    pub slug_attempts: u32,
}

impl Default for HydrateConfig {
    fn default() -> Self {
        Self { slug_attempts: 50 }
    }
}

impl Config {
    /// Read `path` (or `chapterlink.toml` if it exists), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?,
            None => Self::default(),
        };
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config: {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CHAPTERLINK_DATABASE_URL").filter(|s| !s.trim().is_empty()) {
            self.database.url = Some(v);
        }
        if let Some(v) = lookup("CHAPTERLINK_CATALOG_URL") { self.catalog.base_url = v; }
        if let Some(v) = lookup("CHAPTERLINK_UPLOADS_URL") { self.catalog.uploads_url = v; }
        if let Some(v) = lookup("CHAPTERLINK_USER_AGENT") { self.catalog.user_agent = v; }
        if let Some(v) = lookup("CHAPTERLINK_TIMEOUT_MS").and_then(|s| s.parse().ok()) { self.catalog.timeout_ms = v; }
        if let Some(v) = lookup("CHAPTERLINK_RETRIES").and_then(|s| s.parse().ok()) { self.catalog.retries = v; }
    }
}
