pub mod catalog;
pub mod cli;
pub mod config;
pub mod dao;
pub mod db;
pub mod detail;
pub mod error;
pub mod feed;
pub mod hydrate;
pub mod label;
pub mod logging;
pub mod mapping;
pub mod resolver;
pub mod slug;
pub mod stats;
pub mod storage;
pub mod types;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, FetchError};
    pub use crate::slug::DecodedSlug;
    pub use crate::types::{ChapterDetail, ChapterList, ChapterRow, ChapterTarget, FeedQuery, SeriesMeta, SeriesRef, SeriesStats};
    pub use crate::ChapterLink;
}

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::CatalogClient;
use crate::config::Config;
use crate::db::Database;
use crate::detail::DetailResolver;
use crate::error::Result;
use crate::feed::FeedFetcher;
use crate::hydrate::Hydrator;
use crate::resolver::Resolver;
use crate::storage::Storage;
use crate::types::{ChapterDetail, ChapterList, ChapterTarget, FeedQuery, SeriesRef, SeriesStats};

/// Async library entry point. Owns the configuration, storage and catalog client
/// and wires them into the resolver components.
#[derive(Clone)]
pub struct ChapterLink {
    config: Config,
    catalog: CatalogClient,
    resolver: Resolver,
    hydrator: Hydrator,
    feed: FeedFetcher,
    detail: DetailResolver,
}

impl ChapterLink {
    /// Connect to the configured database and (optionally) run migrations.
    pub async fn connect(config: Config, run_migrations: bool) -> anyhow::Result<Self> {
        let db = Database::connect(&config.database).await?;
        if run_migrations { db.run_migrations().await?; }
        Self::with_storage(config, Arc::new(db))
    }

    /// Build on an existing storage backend.
    pub fn with_storage(config: Config, storage: Arc<dyn Storage>) -> anyhow::Result<Self> {
        let catalog = CatalogClient::new(&config.catalog)?;
        let resolver = Resolver::new(storage.clone(), catalog.clone());
        let hydrator = Hydrator::new(storage, catalog.clone(), config.hydrate.slug_attempts);
        let feed = FeedFetcher::new(resolver.clone(), catalog.clone(), config.feed.clone());
        let detail = DetailResolver::new(resolver.clone(), hydrator.clone(), catalog.clone(), config.feed.clone());
        Ok(Self { config, catalog, resolver, hydrator, feed, detail })
    }

    pub fn config(&self) -> &Config { &self.config }

    /// Numeric id, slug or upstream UUID to a local series. `None` when nothing matches.
    pub async fn resolve(&self, key: &str) -> Result<Option<SeriesRef>> {
        self.resolver.resolve(key).await
    }

    /// Like [`ChapterLink::resolve`], but an upstream-id lookup only considers `source`.
    pub async fn resolve_in(&self, key: &str, source: &str) -> Result<Option<SeriesRef>> {
        self.resolver.resolve_in(key, Some(source)).await
    }

    /// Import an upstream series by UUID (idempotent).
    pub async fn hydrate(&self, uuid: &str) -> Result<SeriesRef> {
        self.hydrator.hydrate(uuid).await
    }

    /// Ordered chapters of a series plus every language seen upstream.
    pub async fn list_chapters(&self, series_key: &str, query: &FeedQuery) -> Result<ChapterList> {
        self.feed.list_chapters(series_key, query).await
    }

    /// Page URLs for a chapter given by upstream id or canonical slug.
    pub async fn resolve_detail(&self, target: &ChapterTarget, save_data: bool) -> Result<ChapterDetail> {
        self.detail.resolve_detail(target, save_data).await
    }

    /// Follow counts and ratings keyed by lowercase upstream id.
    pub async fn statistics(&self, external_ids: &[String]) -> HashMap<String, SeriesStats> {
        stats::series_statistics(&self.catalog, external_ids, self.config.feed.parallelism).await
    }
}
