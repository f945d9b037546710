//! HTTP client for the upstream catalog.
//!
//! Every call carries the configured `User-Agent` and a per-call timeout. A
//! failed call is retried `retries` times with linear backoff, except 404
//! (returned as [`FetchError::NotFound`]) and 429 (returned as
//! [`FetchError::RateLimited`]), which are never retried.

pub mod wire;

use anyhow::Context;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::CatalogConfig;
use crate::error::FetchError;
use crate::mapping;
use crate::types::{ChapterRow, SeriesMeta, SeriesStats};
use wire::{AtHome, ChapterData, Collection, CoverData, Entity, GroupData, MangaData, StatisticsResponse};

/// Lowercased hyphenated UUID, or `None` if `raw` is not one.
pub fn parse_upstream_id(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.len() != 36 {
        return None;
    }
    uuid::Uuid::parse_str(raw).ok().map(|u| u.hyphenated().to_string())
}

/// One page of a chapter feed as returned upstream.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub rows: Vec<ChapterRow>,
    /// Rows the catalog sent, used to detect the last page.
    pub received: usize,
}

enum Attempt {
    Fatal(FetchError),
    Retry(String),
}

#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    uploads_url: String,
    site_url: String,
    source_key: String,
    retries: u32,
    backoff: Duration,
    content_ratings: Vec<String>,
}

impl CatalogClient {
    pub fn new(cfg: &CatalogConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .context("building catalog http client")?;
        Url::parse(&cfg.base_url).with_context(|| format!("invalid catalog url: {}", cfg.base_url))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            uploads_url: cfg.uploads_url.trim_end_matches('/').to_string(),
            site_url: cfg.site_url.trim_end_matches('/').to_string(),
            source_key: cfg.source_key.clone(),
            retries: cfg.retries,
            backoff: Duration::from_millis(cfg.backoff_ms),
            content_ratings: cfg.content_ratings.clone(),
        })
    }

    /// Key of the `sources` row that links to this catalog are stored under.
    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    /// Public page of a series on the catalog site.
    pub fn title_url(&self, external_id: &str) -> String {
        format!("{}/title/{}", self.site_url, external_id)
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path.trim_start_matches('/')))
            .map_err(|e| FetchError::Unavailable(format!("bad url for {path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }
        Ok(url)
    }

    fn rating_pairs(&self) -> Vec<(&str, &str)> {
        self.content_ratings.iter().map(|r| ("contentRating[]", r.as_str())).collect()
    }

    async fn attempt(&self, url: &Url) -> Result<Vec<u8>, Attempt> {
        let resp = match self.http.get(url.clone()).send().await {
            Ok(r) => r,
            Err(e) => return Err(Attempt::Retry(format!("{}: {e}", url.path()))),
        };
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Attempt::Fatal(FetchError::NotFound(url.path().to_string())));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Attempt::Fatal(FetchError::RateLimited(url.path().to_string())));
        }
        if !status.is_success() {
            return Err(Attempt::Retry(format!("{status} from {}", url.path())));
        }
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Attempt::Retry(format!("reading {}: {e}", url.path())))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.attempt(&url).await {
                Ok(body) => {
                    return serde_json::from_slice(&body)
                        .map_err(|e| FetchError::Shape(format!("{}: {e}", url.path())));
                }
                Err(Attempt::Fatal(err)) => return Err(err),
                Err(Attempt::Retry(detail)) if attempt < self.retries => {
                    attempt += 1;
                    warn!(path = url.path(), attempt, %detail, "catalog call failed; retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(Attempt::Retry(detail)) => return Err(FetchError::Unavailable(detail)),
            }
        }
    }

    /// Series-by-id with the cover resolved, falling back to the cover lookup.
    pub async fn series(&self, external_id: &str) -> Result<SeriesMeta, FetchError> {
        let url = self.endpoint(&format!("manga/{external_id}"), &[("includes[]", "cover_art")])?;
        let manga: Entity<MangaData> = self.get_json(url).await?;
        let mut meta = mapping::series_meta_from(&manga.data, &self.uploads_url);
        if meta.cover_url.is_none() {
            match self.cover_file(&meta.external_id).await {
                Ok(Some(file)) => meta.cover_url = Some(mapping::cover_url(&self.uploads_url, &meta.external_id, &file)),
                Ok(None) => {}
                Err(err) => debug!(external_id = %meta.external_id, %err, "cover lookup failed"),
            }
        }
        Ok(meta)
    }

    pub async fn cover_file(&self, external_id: &str) -> Result<Option<String>, FetchError> {
        let url = self.endpoint("cover", &[("manga[]", external_id), ("limit", "1")])?;
        let covers: Collection<CoverData> = self.get_json(url).await?;
        Ok(covers.data.into_iter().next().map(|c| c.attributes.file_name))
    }

    /// Best relevance-ranked match for a free-text title.
    pub async fn search_first(&self, title: &str) -> Result<Option<SeriesMeta>, FetchError> {
        let mut query = vec![("title", title), ("limit", "1"), ("order[relevance]", "desc"), ("includes[]", "cover_art")];
        query.extend(self.rating_pairs());
        let url = self.endpoint("manga", &query)?;
        let found: Collection<MangaData> = self.get_json(url).await?;
        Ok(found.data.first().map(|m| mapping::series_meta_from(m, &self.uploads_url)))
    }

    /// One page of a series feed, ordered by chapter, groups included inline.
    /// An empty `languages` slice requests every language.
    pub async fn feed_page(
        &self,
        external_id: &str,
        offset: usize,
        limit: u32,
        languages: &[String],
    ) -> Result<FeedPage, FetchError> {
        let offset = offset.to_string();
        let limit = limit.to_string();
        let mut query = vec![
            ("limit", limit.as_str()),
            ("offset", offset.as_str()),
            ("includes[]", "scanlation_group"),
            ("order[chapter]", "asc"),
        ];
        query.extend(self.rating_pairs());
        query.extend(languages.iter().map(|l| ("translatedLanguage[]", l.as_str())));
        let url = self.endpoint(&format!("manga/{external_id}/feed"), &query)?;
        let page: Collection<ChapterData> = self.get_json(url).await?;
        let received = page.data.len();
        Ok(FeedPage { rows: mapping::chapter_rows_from(page.data)?, received })
    }

    pub async fn chapter(&self, chapter_id: &str) -> Result<ChapterRow, FetchError> {
        let url = self.endpoint(&format!("chapter/{chapter_id}"), &[("includes[]", "scanlation_group")])?;
        let chapter: Entity<ChapterData> = self.get_json(url).await?;
        mapping::chapter_row_from(chapter.data)
    }

    /// Display names for up to 100 groups in one request.
    pub async fn group_names(&self, ids: &[String]) -> Result<HashMap<String, String>, FetchError> {
        let limit = ids.len().min(100).to_string();
        let mut query = vec![("limit", limit.as_str())];
        query.extend(ids.iter().map(|id| ("ids[]", id.as_str())));
        let url = self.endpoint("group", &query)?;
        let groups: Collection<GroupData> = self.get_json(url).await?;
        Ok(groups.data.into_iter().map(|g| (g.id.to_ascii_lowercase(), g.attributes.name)).collect())
    }

    pub async fn group_name(&self, id: &str) -> Result<String, FetchError> {
        let url = self.endpoint(&format!("group/{id}"), &[])?;
        let group: Entity<GroupData> = self.get_json(url).await?;
        Ok(group.data.attributes.name)
    }

    /// Image-server handshake for a chapter, yielding absolute page URLs.
    pub async fn page_urls(&self, chapter_id: &str, save_data: bool) -> Result<Vec<String>, FetchError> {
        let url = self.endpoint(&format!("at-home/server/{chapter_id}"), &[])?;
        let at_home: AtHome = self.get_json(url).await?;
        Ok(mapping::page_urls_from(&at_home, save_data))
    }

    pub async fn statistics(&self, ids: &[String]) -> Result<HashMap<String, SeriesStats>, FetchError> {
        let query: Vec<_> = ids.iter().map(|id| ("manga[]", id.as_str())).collect();
        let url = self.endpoint("statistics/manga", &query)?;
        let stats: StatisticsResponse = self.get_json(url).await?;
        Ok(mapping::stats_from(stats.statistics))
    }
}
