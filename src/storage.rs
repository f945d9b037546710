use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLink {
    pub series_id: i64,
    pub source_key: String,
    /// Always lowercase.
    pub external_id: String,
    pub external_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSeries {
    pub slug: String,
    pub title: String,
    pub cover_url: Option<String>,
}

/// Link to create; the series id comes from the insert it accompanies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLink {
    pub source_key: String,
    pub external_id: String,
    pub external_url: Option<String>,
}

/// Outcome of a conditional insert keyed on the link uniqueness constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inserted<T> {
    Created(T),
    /// A uniqueness key (series slug, `(source, external_id)` or
    /// `(series, source)`) is already taken. Nothing was written.
    Conflict,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn series_by_id(&self, id: i64) -> Result<Option<Series>>;
    async fn series_by_slug(&self, slug: &str) -> Result<Option<Series>>;
    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Link holding `external_id`, restricted to `source_key` when given.
    async fn link_by_external(&self, source_key: Option<&str>, external_id: &str) -> Result<Option<SourceLink>>;
    async fn link_for_series(&self, series_id: i64, source_key: &str) -> Result<Option<SourceLink>>;

    /// Insert a series and its link in one transaction.
    async fn insert_series_with_link(&self, series: &NewSeries, link: &NewLink) -> Result<Inserted<Series>>;
    async fn insert_link(&self, series_id: i64, link: &NewLink) -> Result<Inserted<()>>;
    async fn delete_link(&self, source_key: &str, external_id: &str) -> Result<u64>;
}
