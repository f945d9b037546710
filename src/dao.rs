use anyhow::{anyhow, Result};
use sqlx::AnyPool;

use crate::storage::{Inserted, NewLink, NewSeries, Series, SourceLink};

type SeriesRow = (i64, String, String, String);
type LinkRow = (i64, String, String, String);

fn series_from_row((id, slug, title, cover_url): SeriesRow) -> Series {
    Series { id, slug, title, cover_url: Some(cover_url).filter(|c| !c.is_empty()) }
}

fn link_from_row((series_id, source_key, external_id, external_url): LinkRow) -> SourceLink {
    SourceLink {
        series_id,
        source_key,
        external_id,
        external_url: Some(external_url).filter(|u| !u.is_empty()),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// Nullable text columns go through COALESCE: the Any driver does not decode
// NULL into Option<String> reliably.
pub async fn find_series_by_id(pool: &AnyPool, id: i64) -> Result<Option<Series>> {
    let row = sqlx::query_as::<_, SeriesRow>(
        "SELECT id, slug, title, COALESCE(cover_url, '') FROM series WHERE id = ? LIMIT 1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(series_from_row))
}

pub async fn find_series_by_slug(pool: &AnyPool, slug: &str) -> Result<Option<Series>> {
    let row = sqlx::query_as::<_, SeriesRow>(
        "SELECT id, slug, title, COALESCE(cover_url, '') FROM series WHERE slug = ? LIMIT 1",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(series_from_row))
}

pub async fn slug_exists(pool: &AnyPool, slug: &str) -> Result<bool> {
    let hit: Option<i64> = sqlx::query_scalar("SELECT 1 FROM series WHERE slug = ? LIMIT 1")
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(hit.is_some())
}

pub async fn find_source_id(pool: &AnyPool, key: &str) -> Result<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM sources WHERE key = ? LIMIT 1")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(id)
}

pub async fn ensure_source(pool: &AnyPool, key: &str) -> Result<i64> {
    sqlx::query("INSERT INTO sources(key) VALUES(?) ON CONFLICT(key) DO NOTHING")
        .bind(key)
        .execute(pool)
        .await?;
    find_source_id(pool, key)
        .await?
        .ok_or_else(|| anyhow!("source row missing after insert: {key}"))
}

pub async fn find_link_by_external(
    pool: &AnyPool,
    source_key: Option<&str>,
    external_id: &str,
) -> Result<Option<SourceLink>> {
    let row = if let Some(key) = source_key {
        sqlx::query_as::<_, LinkRow>(
            "SELECT ss.series_id, s.key, ss.external_id, COALESCE(ss.external_url, '')
             FROM series_sources ss JOIN sources s ON s.id = ss.source_id
             WHERE ss.external_id = ? AND s.key = ? LIMIT 1",
        )
        .bind(external_id)
        .bind(key)
        .fetch_optional(pool)
        .await?
    } else {
        sqlx::query_as::<_, LinkRow>(
            "SELECT ss.series_id, s.key, ss.external_id, COALESCE(ss.external_url, '')
             FROM series_sources ss JOIN sources s ON s.id = ss.source_id
             WHERE ss.external_id = ? ORDER BY ss.source_id LIMIT 1",
        )
        .bind(external_id)
        .fetch_optional(pool)
        .await?
    };
    Ok(row.map(link_from_row))
}

pub async fn find_link_for_series(pool: &AnyPool, series_id: i64, source_key: &str) -> Result<Option<SourceLink>> {
    let row = sqlx::query_as::<_, LinkRow>(
        "SELECT ss.series_id, s.key, ss.external_id, COALESCE(ss.external_url, '')
         FROM series_sources ss JOIN sources s ON s.id = ss.source_id
         WHERE ss.series_id = ? AND s.key = ? LIMIT 1",
    )
    .bind(series_id)
    .bind(source_key)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(link_from_row))
}

/// Series row and its link commit together or not at all.
pub async fn insert_series_with_link(pool: &AnyPool, s: &NewSeries, link: &NewLink) -> Result<Inserted<Series>> {
    let source_id = ensure_source(pool, &link.source_key).await?;
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO series(slug, title, cover_url) VALUES(?, ?, ?) RETURNING id",
    )
    .bind(&s.slug)
    .bind(&s.title)
    .bind(&s.cover_url)
    .fetch_one(&mut *tx)
    .await;
    let series_id = match inserted {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => {
            tx.rollback().await?;
            return Ok(Inserted::Conflict);
        }
        Err(e) => return Err(e.into()),
    };

    let linked = sqlx::query(
        "INSERT INTO series_sources(series_id, source_id, external_id, external_url) VALUES(?, ?, ?, ?)",
    )
    .bind(series_id)
    .bind(source_id)
    .bind(link.external_id.to_ascii_lowercase())
    .bind(&link.external_url)
    .execute(&mut *tx)
    .await;
    match linked {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            tx.rollback().await?;
            return Ok(Inserted::Conflict);
        }
        Err(e) => return Err(e.into()),
    }

    tx.commit().await?;
    Ok(Inserted::Created(Series {
        id: series_id,
        slug: s.slug.clone(),
        title: s.title.clone(),
        cover_url: s.cover_url.clone(),
    }))
}

pub async fn insert_link(pool: &AnyPool, series_id: i64, link: &NewLink) -> Result<Inserted<()>> {
    let source_id = ensure_source(pool, &link.source_key).await?;
    let res = sqlx::query(
        "INSERT INTO series_sources(series_id, source_id, external_id, external_url) VALUES(?, ?, ?, ?)",
    )
    .bind(series_id)
    .bind(source_id)
    .bind(link.external_id.to_ascii_lowercase())
    .bind(&link.external_url)
    .execute(pool)
    .await;
    match res {
        Ok(_) => Ok(Inserted::Created(())),
        Err(e) if is_unique_violation(&e) => Ok(Inserted::Conflict),
        Err(e) => Err(e.into()),
    }
}

pub async fn delete_link(pool: &AnyPool, source_key: &str, external_id: &str) -> Result<u64> {
    let res = sqlx::query(
        "DELETE FROM series_sources
         WHERE external_id = ? AND source_id = (SELECT id FROM sources WHERE key = ?)",
    )
    .bind(external_id)
    .bind(source_key)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}
