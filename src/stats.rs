use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::catalog::{parse_upstream_id, CatalogClient};
use crate::types::SeriesStats;

/// Ids per statistics request.
pub const STATS_CHUNK: usize = 100;

/// Follow counts and ratings for many upstream series, `width` chunks in flight.
/// Malformed ids are skipped and failed chunks are logged and left out.
pub async fn series_statistics(catalog: &CatalogClient, ids: &[String], width: usize) -> HashMap<String, SeriesStats> {
    let mut valid: Vec<String> = ids.iter().filter_map(|id| parse_upstream_id(id)).collect();
    valid.sort();
    valid.dedup();
    if valid.len() < ids.len() {
        debug!(requested = ids.len(), kept = valid.len(), "skipped malformed or duplicate ids");
    }

    let chunks: Vec<Vec<String>> = valid.chunks(STATS_CHUNK).map(<[String]>::to_vec).collect();
    let results: Vec<_> = stream::iter(chunks)
        .map(|chunk| async move {
            let res = catalog.statistics(&chunk).await;
            (chunk.len(), res)
        })
        .buffer_unordered(width.max(1))
        .collect()
        .await;

    let mut out = HashMap::new();
    for (len, res) in results {
        match res {
            Ok(stats) => out.extend(stats),
            Err(err) => warn!(chunk = len, error = %err, "statistics chunk failed"),
        }
    }
    out
}
