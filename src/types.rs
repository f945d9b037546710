use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::slug;

/// A local series as seen by callers: numeric id, slug and (if linked) the upstream UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRef {
    pub id: i64,
    pub slug: String,
    pub external_id: Option<String>,
}

/// Minimal upstream metadata needed to materialise a local series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMeta {
    pub external_id: String,
    pub title: String,
    pub cover_url: Option<String>,
}

/// One chapter of an upstream feed. Rebuilt per request, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRow {
    pub id: String,
    /// `None` means a oneshot.
    pub chapter_label: Option<String>,
    pub title: Option<String>,
    pub page_count: u32,
    /// First of readableAt / publishAt / createdAt that is set.
    pub best_timestamp: Option<DateTime<Utc>>,
    pub language: String,
    pub group_id: Option<String>,
    pub group_name: Option<String>,
}

impl ChapterRow {
    pub fn canonical_slug(&self) -> String {
        slug::encode(self.group_id.as_deref(), self.chapter_label.as_deref(), &self.language)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterList {
    pub items: Vec<ChapterRow>,
    pub available_languages: Vec<String>,
}

impl ChapterList {
    /// Previous and next rows around `chapter_id` in list order.
    pub fn neighbours(&self, chapter_id: &str) -> (Option<&ChapterRow>, Option<&ChapterRow>) {
        match self.items.iter().position(|c| c.id == chapter_id) {
            Some(idx) => (
                idx.checked_sub(1).and_then(|i| self.items.get(i)),
                self.items.get(idx + 1),
            ),
            None => (None, None),
        }
    }
}

/// Caller options for listing a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedQuery {
    /// Comma-separated language codes; `"any"` or absent disables the filter.
    pub language: Option<String>,
    /// Exact group UUID; `"all"` or absent disables the filter.
    pub group: Option<String>,
    /// Caller's page-size hint, clamped to 10..=1000.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChapterTarget {
    Direct(String),
    Canonical { series_key: String, slug: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterDetail {
    pub page_urls: Vec<String>,
    pub resolved_chapter_id: Option<String>,
    /// Canonical slug of the resolved chapter, when its metadata was available.
    pub canonical_slug: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub follows: Option<u64>,
    pub rating: Option<f64>,
    pub bayesian_rating: Option<f64>,
}
