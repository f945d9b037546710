use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::catalog::wire::{AtHome, ChapterData, MangaData, MangaStatistics, Relationship};
use crate::error::FetchError;
use crate::types::{ChapterRow, SeriesMeta, SeriesStats};

const GROUP_REL: &str = "scanlation_group";
const COVER_REL: &str = "cover_art";

fn pick_title(manga: &MangaData) -> String {
    let attrs = &manga.attributes;
    attrs
        .title
        .get("en")
        .or_else(|| attrs.alt_titles.iter().find_map(|t| t.get("en")))
        .or_else(|| {
            // Deterministic pick among non-English titles.
            let mut keys: Vec<_> = attrs.title.keys().collect();
            keys.sort();
            keys.first().and_then(|k| attrs.title.get(*k))
        })
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

pub fn cover_file(relationships: &[Relationship]) -> Option<String> {
    relationships
        .iter()
        .filter(|r| r.kind == COVER_REL)
        .find_map(|r| r.attributes.as_ref().and_then(|a| a.file_name.clone()))
}

pub fn cover_url(uploads_base: &str, manga_id: &str, file_name: &str) -> String {
    format!("{}/covers/{}/{}", uploads_base.trim_end_matches('/'), manga_id, file_name)
}

/// Series metadata from a manga entity; `cover_url` only if the cover came inline.
pub fn series_meta_from(manga: &MangaData, uploads_base: &str) -> SeriesMeta {
    let external_id = manga.id.to_ascii_lowercase();
    let cover_url = cover_file(&manga.relationships).map(|f| cover_url(uploads_base, &external_id, &f));
    SeriesMeta { title: pick_title(manga), cover_url, external_id }
}

fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, FetchError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| FetchError::Shape(format!("{field} `{raw}`: {e}")))
}

pub fn chapter_row_from(ch: ChapterData) -> Result<ChapterRow, FetchError> {
    let attrs = ch.attributes;
    let best_timestamp = match attrs.readable_at.as_deref().or(attrs.publish_at.as_deref()).or(attrs.created_at.as_deref()) {
        Some(raw) => Some(parse_timestamp("chapter timestamp", raw)?),
        None => None,
    };
    let language = attrs.translated_language.trim().to_ascii_lowercase();
    if language.is_empty() {
        return Err(FetchError::Shape(format!("chapter {} has no language", ch.id)));
    }
    let group = ch.relationships.iter().find(|r| r.kind == GROUP_REL);
    Ok(ChapterRow {
        id: ch.id.to_ascii_lowercase(),
        chapter_label: attrs.chapter.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        title: attrs.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        page_count: attrs.pages,
        best_timestamp,
        language,
        group_id: group.map(|g| g.id.to_ascii_lowercase()),
        group_name: group.and_then(|g| g.attributes.as_ref()).and_then(|a| a.name.clone()),
    })
}

pub fn chapter_rows_from(data: Vec<ChapterData>) -> Result<Vec<ChapterRow>, FetchError> {
    data.into_iter().map(chapter_row_from).collect()
}

/// Page URLs from an image-server handshake, preferring data-saver files when asked.
pub fn page_urls_from(at_home: &AtHome, save_data: bool) -> Vec<String> {
    let base = at_home.base_url.trim_end_matches('/');
    let hash = &at_home.chapter.hash;
    let (quality, files) = if save_data && !at_home.chapter.data_saver.is_empty() {
        ("data-saver", &at_home.chapter.data_saver)
    } else {
        ("data", &at_home.chapter.data)
    };
    files.iter().map(|f| format!("{base}/{quality}/{hash}/{f}")).collect()
}

pub fn stats_from(raw: HashMap<String, MangaStatistics>) -> HashMap<String, SeriesStats> {
    raw.into_iter()
        .map(|(id, s)| {
            let stats = SeriesStats {
                follows: s.follows,
                rating: s.rating.as_ref().and_then(|r| r.average),
                bayesian_rating: s.rating.as_ref().and_then(|r| r.bayesian),
            };
            (id.to_ascii_lowercase(), stats)
        })
        .collect()
}

/// Placeholder display name for a group whose name could not be resolved.
pub fn placeholder_group_name(group_id: &str) -> String {
    let short: String = group_id.chars().filter(|c| *c != '-').take(8).collect();
    format!("Group {short}")
}
