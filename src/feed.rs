//! Per-series chapter listing built from the upstream feed.
//!
//! Upstream trouble never surfaces as an error here: a 404 ends the scan, a
//! 429 or exhausted retries end it early, and whatever was gathered so far is
//! returned. Only storage failures from resolving the series key propagate.

use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

use crate::catalog::CatalogClient;
use crate::config::FeedConfig;
use crate::error::{FetchError, Result};
use crate::label;
use crate::mapping::placeholder_group_name;
use crate::resolver::Resolver;
use crate::types::{ChapterList, ChapterRow, FeedQuery};

const MIN_LIMIT: usize = 10;
const MAX_LIMIT: usize = 1000;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct FeedFetcher {
    resolver: Resolver,
    catalog: CatalogClient,
    cfg: FeedConfig,
}

impl FeedFetcher {
    pub fn new(resolver: Resolver, catalog: CatalogClient, cfg: FeedConfig) -> Self {
        Self { resolver, catalog, cfg }
    }

    pub async fn list_chapters(&self, series_key: &str, query: &FeedQuery) -> Result<ChapterList> {
        let Some(series) = self.resolver.resolve(series_key).await? else {
            debug!(series_key, "unknown series; empty feed");
            return Ok(ChapterList::default());
        };
        let Some(external_id) = series.external_id else {
            debug!(series_id = series.id, "series has no catalog link; empty feed");
            return Ok(ChapterList::default());
        };

        let ceiling = query.limit.unwrap_or(self.cfg.default_limit).clamp(MIN_LIMIT, MAX_LIMIT);
        let mut rows = self.fetch_rows(&external_id, ceiling).await;
        self.fill_group_names(&mut rows).await;

        let available_languages: Vec<String> =
            rows.iter().map(|r| r.language.clone()).collect::<BTreeSet<_>>().into_iter().collect();

        let languages = language_filter(query.language.as_deref());
        let group = group_filter(query.group.as_deref());
        rows.retain(|r| {
            languages.as_ref().map_or(true, |set| set.contains(&r.language))
                && group.as_ref().map_or(true, |g| r.group_id.as_deref() == Some(g.as_str()))
        });
        label::sort_rows(&mut rows);

        Ok(ChapterList { items: rows, available_languages })
    }

    /// Sequential offset pagination, bounded by page count and `ceiling` rows.
    async fn fetch_rows(&self, external_id: &str, ceiling: usize) -> Vec<ChapterRow> {
        let page_size = self.cfg.page_size.clamp(1, MAX_PAGE_SIZE);
        let mut rows = Vec::new();
        let mut offset = 0usize;

        for page in 0..self.cfg.max_pages {
            match self.catalog.feed_page(external_id, offset, page_size, &[]).await {
                Ok(fetched) => {
                    offset += fetched.received;
                    rows.extend(fetched.rows);
                    debug!(external_id, page, received = fetched.received, total = rows.len(), "feed page");
                    if fetched.received < page_size as usize || rows.len() >= ceiling {
                        break;
                    }
                }
                Err(FetchError::NotFound(_)) => {
                    debug!(external_id, page, "feed returned 404; stopping");
                    break;
                }
                Err(FetchError::RateLimited(_)) => {
                    warn!(external_id, page, kept = rows.len(), "feed rate limited; returning partial list");
                    break;
                }
                Err(err) => {
                    warn!(external_id, page, kept = rows.len(), error = %err, "feed page failed; returning partial list");
                    break;
                }
            }
        }
        rows
    }

    /// Name every referenced group: inline names first, then batched lookups,
    /// then one-by-one lookups for ids whose batch failed, then placeholders.
    async fn fill_group_names(&self, rows: &mut [ChapterRow]) {
        let mut names: HashMap<String, String> = HashMap::new();
        for row in rows.iter() {
            if let (Some(id), Some(name)) = (&row.group_id, &row.group_name) {
                names.entry(id.clone()).or_insert_with(|| name.clone());
            }
        }
        let missing: Vec<String> = rows
            .iter()
            .filter_map(|r| r.group_id.clone())
            .filter(|id| !names.contains_key(id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        if !missing.is_empty() {
            let resolved = self.lookup_group_names(missing).await;
            names.extend(resolved);
        }

        for row in rows.iter_mut() {
            if let Some(id) = &row.group_id {
                let name = names.get(id).cloned().unwrap_or_else(|| placeholder_group_name(id));
                row.group_name = Some(name);
            }
        }
    }

    async fn lookup_group_names(&self, ids: Vec<String>) -> HashMap<String, String> {
        let batch_size = self.cfg.group_batch_size.clamp(1, 100);
        let width = self.cfg.parallelism.max(1);
        let batches: Vec<Vec<String>> = ids.chunks(batch_size).map(<[String]>::to_vec).collect();

        let results: Vec<(Vec<String>, std::result::Result<HashMap<String, String>, FetchError>)> =
            stream::iter(batches)
                .map(|batch| async move {
                    let res = self.catalog.group_names(&batch).await;
                    (batch, res)
                })
                .buffer_unordered(width)
                .collect()
                .await;

        let mut names = HashMap::new();
        let mut retry_single = Vec::new();
        let mut rate_limited = false;
        for (batch, res) in results {
            match res {
                Ok(found) => names.extend(found),
                Err(err) => {
                    rate_limited |= matches!(err, FetchError::RateLimited(_));
                    warn!(batch = batch.len(), error = %err, "group batch lookup failed");
                    retry_single.extend(batch);
                }
            }
        }

        if rate_limited {
            debug!(skipped = retry_single.len(), "rate limited; not resolving groups individually");
            return names;
        }

        let singles: Vec<(String, std::result::Result<String, FetchError>)> = stream::iter(retry_single)
            .map(|id| async move {
                let res = self.catalog.group_name(&id).await;
                (id, res)
            })
            .buffer_unordered(width)
            .collect()
            .await;
        for (id, res) in singles {
            match res {
                Ok(name) => {
                    names.insert(id, name);
                }
                Err(err) => debug!(group_id = %id, error = %err, "group name unavailable"),
            }
        }
        names
    }
}

/// `None` means no filtering.
fn language_filter(raw: Option<&str>) -> Option<HashSet<String>> {
    let set: HashSet<String> = raw?
        .split(',')
        .map(|l| l.trim().to_ascii_lowercase())
        .filter(|l| !l.is_empty())
        .collect();
    if set.is_empty() || set.contains("any") {
        None
    } else {
        Some(set)
    }
}

fn group_filter(raw: Option<&str>) -> Option<String> {
    raw.map(|g| g.trim().to_ascii_lowercase())
        .filter(|g| !g.is_empty() && g != "all")
}
