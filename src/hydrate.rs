//! First-time import of an upstream series into local storage.

use anyhow::anyhow;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{parse_upstream_id, CatalogClient};
use crate::error::{Error, Result};
use crate::slug;
use crate::storage::{Inserted, NewLink, NewSeries, Storage};
use crate::types::SeriesRef;

// Insert attempts when a concurrent writer takes our slug between the
// availability check and the insert.
const INSERT_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct Hydrator {
    storage: Arc<dyn Storage>,
    catalog: CatalogClient,
    slug_attempts: u32,
}

impl Hydrator {
    pub fn new(storage: Arc<dyn Storage>, catalog: CatalogClient, slug_attempts: u32) -> Self {
        Self { storage, catalog, slug_attempts }
    }

    /// Materialise the series for upstream id `uuid`, or return the one already linked.
    ///
    /// Series and link are written in one transaction keyed on the
    /// `(source, external_id)` uniqueness constraint, so two concurrent first
    /// hydrations of the same id end with a single series; the loser re-reads
    /// the winner's link.
    pub async fn hydrate(&self, uuid: &str) -> Result<SeriesRef> {
        let external_id = parse_upstream_id(uuid)
            .ok_or_else(|| Error::InvalidInput(format!("not a UUID: {uuid}")))?;

        if let Some(existing) = self.existing(&external_id).await? {
            debug!(%external_id, series_id = existing.id, "already hydrated");
            return Ok(existing);
        }

        let meta = self.catalog.series(&external_id).await?;
        let title = if meta.title.is_empty() { "Untitled".to_string() } else { meta.title.clone() };
        let link = NewLink {
            source_key: self.catalog.source_key().to_string(),
            external_id: external_id.clone(),
            external_url: Some(self.catalog.title_url(&external_id)),
        };

        for _ in 0..INSERT_ATTEMPTS {
            let series = NewSeries {
                slug: self.free_slug(&meta.title).await?,
                title: title.clone(),
                cover_url: meta.cover_url.clone(),
            };
            match self.storage.insert_series_with_link(&series, &link).await? {
                Inserted::Created(created) => {
                    info!(%external_id, series_id = created.id, slug = %created.slug, "hydrated series");
                    return Ok(SeriesRef { id: created.id, slug: created.slug, external_id: Some(external_id) });
                }
                Inserted::Conflict => {
                    if let Some(existing) = self.existing(&external_id).await? {
                        debug!(%external_id, series_id = existing.id, "concurrent hydration won; reusing");
                        return Ok(existing);
                    }
                    warn!(%external_id, slug = %series.slug, "slug taken during insert; retrying");
                }
            }
        }
        Err(Error::Storage(anyhow!("could not allocate a series slug for {external_id}")))
    }

    /// Linked series for `external_id`; a dangling link is deleted and reported as absent.
    async fn existing(&self, external_id: &str) -> Result<Option<SeriesRef>> {
        let source_key = self.catalog.source_key();
        let Some(link) = self.storage.link_by_external(Some(source_key), external_id).await? else {
            return Ok(None);
        };
        match self.storage.series_by_id(link.series_id).await? {
            Some(series) => Ok(Some(SeriesRef { id: series.id, slug: series.slug, external_id: Some(link.external_id) })),
            None => {
                warn!(series_id = link.series_id, %external_id, "dropping orphaned source link before re-hydration");
                self.storage.delete_link(source_key, external_id).await?;
                Ok(None)
            }
        }
    }

    /// `base`, `base-2`, ... `base-<slug_attempts>`, then a timestamp suffix.
    async fn free_slug(&self, title: &str) -> Result<String> {
        let base = slug::series_slug(title);
        if !self.storage.slug_exists(&base).await? {
            return Ok(base);
        }
        for n in 2..=self.slug_attempts.max(2) {
            let candidate = format!("{base}-{n}");
            if !self.storage.slug_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Ok(format!("{base}-{}", Utc::now().timestamp_millis()))
    }
}
