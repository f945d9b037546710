use anyhow::{Context, Result};
use async_trait::async_trait;
use directories::ProjectDirs;
use sqlx::any::AnyPoolOptions;
use sqlx::{any::AnyConnectOptions, migrate::Migrator, AnyPool, ConnectOptions};
use std::sync::Once;
use std::{path::PathBuf, str::FromStr};

use crate::config::DatabaseConfig;
use crate::dao;
use crate::storage::{Inserted, NewLink, NewSeries, Series, SourceLink, Storage};

// Ensure drivers are installed exactly once for sqlx::any
static INSTALL_DRIVERS: Once = Once::new();

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
}

impl Database {
    /// Connect using `cfg.url`, or a SQLite file in the user's data directory.
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self> {
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

        let url = match cfg.url.as_deref() {
            Some(u) if !u.trim().is_empty() => u.to_string(),
            _ => default_sqlite_url()?,
        };

        let opts = AnyConnectOptions::from_str(&url)
            .with_context(|| format!("invalid database URL: {url}"))?;
        // Quiet by default; callers can enable SQLX_LOG if they want
        let opts = opts.disable_statement_logging();

        let pool = AnyPoolOptions::new()
            .max_connections(cfg.max_connections.max(1))
            .connect_with(opts)
            .await
            .with_context(|| format!("failed to connect to database: {url}"))?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        match MIGRATOR.run(&self.pool).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let msg = e.to_string();
                let looks_modified = msg.contains("was previously applied but has been modified");
                let duplicate_version = msg.contains("UNIQUE constraint failed: _sqlx_migrations.version");
                if looks_modified || duplicate_version {
                    tracing::warn!(error = %msg, "migration ledger out of sync; resetting");
                    if let Err(err) = sqlx::query("DELETE FROM _sqlx_migrations").execute(&self.pool).await {
                        tracing::warn!(error = %err, "clearing migration ledger failed");
                    }
                    MIGRATOR.run(&self.pool).await.context("running migrations after ledger reset")
                } else {
                    Err(e).context("running migrations")
                }
            }
        }
    }

    pub fn pool(&self) -> &AnyPool { &self.pool }
}

#[async_trait]
impl Storage for Database {
    async fn series_by_id(&self, id: i64) -> Result<Option<Series>> {
        dao::find_series_by_id(&self.pool, id).await
    }

    async fn series_by_slug(&self, slug: &str) -> Result<Option<Series>> {
        dao::find_series_by_slug(&self.pool, slug).await
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        dao::slug_exists(&self.pool, slug).await
    }

    async fn link_by_external(&self, source_key: Option<&str>, external_id: &str) -> Result<Option<SourceLink>> {
        dao::find_link_by_external(&self.pool, source_key, external_id).await
    }

    async fn link_for_series(&self, series_id: i64, source_key: &str) -> Result<Option<SourceLink>> {
        dao::find_link_for_series(&self.pool, series_id, source_key).await
    }

    async fn insert_series_with_link(&self, series: &NewSeries, link: &NewLink) -> Result<Inserted<Series>> {
        dao::insert_series_with_link(&self.pool, series, link).await
    }

    async fn insert_link(&self, series_id: i64, link: &NewLink) -> Result<Inserted<()>> {
        dao::insert_link(&self.pool, series_id, link).await
    }

    async fn delete_link(&self, source_key: &str, external_id: &str) -> Result<u64> {
        dao::delete_link(&self.pool, source_key, external_id).await
    }
}

fn default_sqlite_url() -> Result<String> {
    let proj = ProjectDirs::from("dev", "chapterlink", "chapterlink")
        .context("unable to determine data directory for default sqlite path")?;
    let mut path: PathBuf = proj.data_dir().to_path_buf();
    std::fs::create_dir_all(&path).with_context(|| format!("creating data dir: {}", path.display()))?;
    path.push("chapterlink.db");

    // Encode spaces in the path for a valid sqlite URL
    let mut path_str = path.to_string_lossy().to_string();
    if path_str.contains(' ') { path_str = path_str.replace(' ', "%20"); }
    Ok(format!("sqlite://{path_str}?mode=rwc"))
}
