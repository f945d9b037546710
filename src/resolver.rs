//! Maps a caller-supplied key (numeric id, slug or upstream UUID) to a local series.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::CatalogClient;
use crate::error::Result;
use crate::storage::{Inserted, NewLink, Series, SourceLink, Storage};
use crate::types::SeriesRef;

#[derive(Clone)]
pub struct Resolver {
    storage: Arc<dyn Storage>,
    catalog: CatalogClient,
}

impl Resolver {
    pub fn new(storage: Arc<dyn Storage>, catalog: CatalogClient) -> Self {
        Self { storage, catalog }
    }

    /// Resolve against any source. See [`Resolver::resolve_in`].
    pub async fn resolve(&self, key: &str) -> Result<Option<SeriesRef>> {
        self.resolve_in(key, None).await
    }

    /// Numeric id, then exact slug, then upstream id (restricted to `source` when
    /// given). The first hit wins. Only storage failures are errors.
    ///
    /// A series found by id or slug that has no catalog link is healed on the
    /// way out; a series found through a link is returned as-is.
    pub async fn resolve_in(&self, key: &str, source: Option<&str>) -> Result<Option<SeriesRef>> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(None);
        }

        if let Ok(id) = key.parse::<i64>() {
            if let Some(series) = self.storage.series_by_id(id).await? {
                return Ok(Some(self.with_catalog_link(series).await?));
            }
        }

        if let Some(series) = self.storage.series_by_slug(key).await? {
            return Ok(Some(self.with_catalog_link(series).await?));
        }

        let external_id = key.to_ascii_lowercase();
        let Some(link) = self.storage.link_by_external(source, &external_id).await? else {
            return Ok(None);
        };
        let Some(series) = self.storage.series_by_id(link.series_id).await? else {
            warn!(series_id = link.series_id, source = %link.source_key, external_id = %link.external_id, "dropping orphaned source link");
            self.storage.delete_link(&link.source_key, &link.external_id).await?;
            return Ok(None);
        };

        let external_id = if link.source_key == self.catalog.source_key() {
            Some(link.external_id)
        } else {
            self.storage
                .link_for_series(series.id, self.catalog.source_key())
                .await?
                .map(|l| l.external_id)
        };
        Ok(Some(SeriesRef { id: series.id, slug: series.slug, external_id }))
    }

    async fn with_catalog_link(&self, series: Series) -> Result<SeriesRef> {
        let external_id = match self.storage.link_for_series(series.id, self.catalog.source_key()).await? {
            Some(link) => Some(link.external_id),
            None => self.heal(&series).await,
        };
        Ok(SeriesRef { id: series.id, slug: series.slug, external_id })
    }

    /// Best-effort: link `series` to the catalog's top search hit for its title.
    /// Never fails; outcomes are logged with `healed = true/false`.
    async fn heal(&self, series: &Series) -> Option<String> {
        match self.try_heal(series).await {
            Ok(Some(external_id)) => {
                info!(series_id = series.id, %external_id, healed = true, "linked series to catalog");
                Some(external_id)
            }
            Ok(None) => {
                debug!(series_id = series.id, healed = false, "no catalog match to heal with");
                None
            }
            Err(err) => {
                warn!(series_id = series.id, healed = false, error = %err, "healing failed");
                None
            }
        }
    }

    async fn try_heal(&self, series: &Series) -> anyhow::Result<Option<String>> {
        let query = if series.title.trim().is_empty() { series.slug.replace('-', " ") } else { series.title.clone() };
        let Some(meta) = self.catalog.search_first(&query).await? else {
            return Ok(None);
        };
        let source_key = self.catalog.source_key();

        if let Some(existing) = self.storage.link_by_external(Some(source_key), &meta.external_id).await? {
            if existing.series_id == series.id {
                return Ok(Some(existing.external_id));
            }
            if !self.clear_if_orphaned(&existing).await? {
                debug!(series_id = series.id, owner = existing.series_id, external_id = %meta.external_id, "catalog id already linked elsewhere");
                return Ok(None);
            }
        }

        let link = NewLink {
            source_key: source_key.to_string(),
            external_url: Some(self.catalog.title_url(&meta.external_id)),
            external_id: meta.external_id,
        };
        match self.storage.insert_link(series.id, &link).await? {
            Inserted::Created(()) => Ok(Some(link.external_id)),
            Inserted::Conflict => Ok(None),
        }
    }

    /// Delete `link` if its series is gone. Returns whether it was deleted.
    async fn clear_if_orphaned(&self, link: &SourceLink) -> anyhow::Result<bool> {
        if self.storage.series_by_id(link.series_id).await?.is_some() {
            return Ok(false);
        }
        warn!(series_id = link.series_id, external_id = %link.external_id, "dropping orphaned source link");
        self.storage.delete_link(&link.source_key, &link.external_id).await?;
        Ok(true)
    }
}
