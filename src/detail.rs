//! Resolves a chapter (by upstream id or canonical slug) to its page URLs.

use std::cmp::Ordering;
use tracing::{debug, info};

use crate::catalog::{parse_upstream_id, CatalogClient};
use crate::config::FeedConfig;
use crate::error::{Error, FetchError, Result};
use crate::hydrate::Hydrator;
use crate::resolver::Resolver;
use crate::slug::{self, DecodedSlug};
use crate::types::{ChapterDetail, ChapterRow, ChapterTarget};

#[derive(Clone)]
pub struct DetailResolver {
    resolver: Resolver,
    hydrator: Hydrator,
    catalog: CatalogClient,
    cfg: FeedConfig,
}

impl DetailResolver {
    pub fn new(resolver: Resolver, hydrator: Hydrator, catalog: CatalogClient, cfg: FeedConfig) -> Self {
        Self { resolver, hydrator, catalog, cfg }
    }

    pub async fn resolve_detail(&self, target: &ChapterTarget, save_data: bool) -> Result<ChapterDetail> {
        match target {
            ChapterTarget::Direct(id) => self.direct(id, save_data).await,
            ChapterTarget::Canonical { series_key, slug } => self.canonical(series_key, slug, save_data).await,
        }
    }

    async fn direct(&self, raw_id: &str, save_data: bool) -> Result<ChapterDetail> {
        let chapter_id =
            parse_upstream_id(raw_id).ok_or_else(|| Error::InvalidInput(format!("not a chapter id: {raw_id}")))?;
        let page_urls = self.pages(&chapter_id, save_data).await?;
        // Only used to offer a canonical link; the pages are already in hand.
        let canonical_slug = match self.catalog.chapter(&chapter_id).await {
            Ok(row) => Some(row.canonical_slug()),
            Err(err) => {
                debug!(%chapter_id, error = %err, "chapter metadata unavailable");
                None
            }
        };
        Ok(ChapterDetail { page_urls, resolved_chapter_id: Some(chapter_id), canonical_slug })
    }

    async fn canonical(&self, series_key: &str, raw_slug: &str, save_data: bool) -> Result<ChapterDetail> {
        let decoded = slug::decode(raw_slug).ok_or_else(|| Error::BadSlug(raw_slug.to_string()))?;

        let series = match self.resolver.resolve(series_key).await? {
            Some(series) => series,
            None if parse_upstream_id(series_key).is_some() => match self.hydrator.hydrate(series_key).await {
                Ok(series) => series,
                Err(Error::UpstreamNotFound(_)) => return Err(Error::SeriesNotFound(series_key.to_string())),
                Err(err) => return Err(err),
            },
            None => return Err(Error::SeriesNotFound(series_key.to_string())),
        };
        let Some(external_id) = series.external_id else {
            return Err(Error::ChapterNotFound(format!("{raw_slug} (series {} has no catalog link)", series.slug)));
        };

        let candidates = self.scan(&external_id, &decoded).await?;
        let Some(chosen) = pick_canonical(candidates, &decoded) else {
            return Err(Error::ChapterNotFound(format!("{raw_slug} in {}", series.slug)));
        };
        info!(series_id = series.id, chapter_id = %chosen.id, slug = raw_slug, "resolved canonical chapter");

        let page_urls = self.pages(&chosen.id, save_data).await?;
        Ok(ChapterDetail {
            page_urls,
            canonical_slug: Some(chosen.canonical_slug()),
            resolved_chapter_id: Some(chosen.id),
        })
    }

    /// Rows matching the slug's label (case-insensitively) and language, over
    /// the same bounded pagination the feed uses.
    async fn scan(&self, external_id: &str, decoded: &DecodedSlug) -> Result<Vec<ChapterRow>> {
        let page_size = self.cfg.page_size.clamp(1, 100);
        let languages = [decoded.lang.clone()];
        let mut offset = 0usize;
        let mut matches = Vec::new();

        for _ in 0..self.cfg.max_pages {
            let page = match self.catalog.feed_page(external_id, offset, page_size, &languages).await {
                Ok(page) => page,
                Err(FetchError::NotFound(_)) => break,
                Err(err) => return Err(err.into()),
            };
            offset += page.received;
            matches.extend(page.rows.into_iter().filter(|row| {
                row.language == decoded.lang
                    && slug::label_segment(row.chapter_label.as_deref()).eq_ignore_ascii_case(&decoded.label)
            }));
            if page.received < page_size as usize {
                break;
            }
        }
        Ok(matches)
    }

    async fn pages(&self, chapter_id: &str, save_data: bool) -> Result<Vec<String>> {
        match self.catalog.page_urls(chapter_id, save_data).await {
            Ok(urls) => Ok(urls),
            Err(FetchError::NotFound(_)) => Err(Error::ChapterNotFound(chapter_id.to_string())),
            Err(err) => Err(err.into()),
        }
    }
}

/// Earliest-published match wins. A row whose group prefix equals the slug's
/// only breaks ties between equal timestamps.
fn pick_canonical(candidates: Vec<ChapterRow>, decoded: &DecodedSlug) -> Option<ChapterRow> {
    candidates.into_iter().min_by(|a, b| {
        by_timestamp(a, b)
            .then_with(|| same_group(b, decoded).cmp(&same_group(a, decoded)))
            .then_with(|| a.id.cmp(&b.id))
    })
}

fn same_group(row: &ChapterRow, decoded: &DecodedSlug) -> bool {
    slug::group_short(row.group_id.as_deref()) == decoded.group_short
}

fn by_timestamp(a: &ChapterRow, b: &ChapterRow) -> Ordering {
    match (a.best_timestamp, b.best_timestamp) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
