//! Upstream JSON shapes. Required fields are required here so that a payload
//! that drifts from the documented shape fails at deserialisation instead of
//! producing half-empty rows further down.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct Entity<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct Collection<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct Relationship {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Option<RelationshipAttributes>,
}

/// Only present when the relationship was requested with `includes[]`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipAttributes {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MangaData {
    pub id: String,
    pub attributes: MangaAttributes,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaAttributes {
    #[serde(default)]
    pub title: HashMap<String, String>,
    #[serde(default)]
    pub alt_titles: Vec<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct ChapterData {
    pub id: String,
    pub attributes: ChapterAttributes,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterAttributes {
    #[serde(default)]
    pub chapter: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub translated_language: String,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub readable_at: Option<String>,
    #[serde(default)]
    pub publish_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupData {
    pub id: String,
    pub attributes: GroupAttributes,
}

#[derive(Debug, Deserialize)]
pub struct GroupAttributes {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CoverData {
    pub attributes: CoverAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverAttributes {
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtHome {
    pub base_url: String,
    pub chapter: AtHomeChapter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtHomeChapter {
    pub hash: String,
    pub data: Vec<String>,
    #[serde(default)]
    pub data_saver: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatisticsResponse {
    #[serde(default)]
    pub statistics: HashMap<String, MangaStatistics>,
}

#[derive(Debug, Deserialize)]
pub struct MangaStatistics {
    #[serde(default)]
    pub follows: Option<u64>,
    #[serde(default)]
    pub rating: Option<Rating>,
}

#[derive(Debug, Deserialize)]
pub struct Rating {
    #[serde(default)]
    pub average: Option<f64>,
    #[serde(default)]
    pub bayesian: Option<f64>,
}
