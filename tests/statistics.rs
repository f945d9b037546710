mod catalog_stub;

use catalog_stub::{CatalogStub, Reply};
use serde_json::{json, Map, Value};

#[tokio::test]
async fn statistics_are_keyed_by_lowercase_id() {
    let stub = CatalogStub::spawn(|hit| {
        if hit.path != "/statistics/manga" {
            return Reply::not_found();
        }
        let mut stats = Map::new();
        for id in hit.params("manga[]") {
            stats.insert(
                id.to_uppercase(),
                json!({ "follows": 1200, "rating": { "average": 8.25, "bayesian": 8.0 } }),
            );
        }
        Reply::json(json!({ "result": "ok", "statistics": Value::Object(stats) }))
    });
    let (_dir, _db, app) = catalog_stub::app(&stub).await;

    let ids = vec![
        "11111111-1111-1111-1111-111111111111".to_string(),
        "11111111-1111-1111-1111-111111111111".to_string(),
        "not-an-id".to_string(),
        "22222222-2222-2222-2222-222222222222".to_string(),
    ];
    let stats = app.statistics(&ids).await;
    assert_eq!(stats.len(), 2);
    let first = &stats["11111111-1111-1111-1111-111111111111"];
    assert_eq!(first.follows, Some(1200));
    assert_eq!(first.rating, Some(8.25));
    assert_eq!(first.bayesian_rating, Some(8.0));

    assert_eq!(stub.count("/statistics/manga"), 1);
    assert_eq!(stub.hits()[0].params("manga[]").len(), 2);
}

#[tokio::test]
async fn large_requests_are_chunked_and_failures_dropped() {
    let stub = CatalogStub::spawn(|hit| {
        let ids = hit.params("manga[]");
        // Fail whichever chunk carries the last id.
        if ids.iter().any(|id| id.ends_with("000000000149")) {
            return Reply::status(500);
        }
        let stats: Map<String, Value> = ids.into_iter().map(|id| (id.to_string(), json!({ "follows": 1 }))).collect();
        Reply::json(json!({ "result": "ok", "statistics": stats }))
    });
    let (_dir, _db, app) = catalog_stub::app(&stub).await;

    let ids: Vec<String> = (0..150).map(|n| format!("aaaaaaaa-0000-4000-8000-{n:012}")).collect();
    let stats = app.statistics(&ids).await;

    assert_eq!(stub.count("/statistics/manga"), 2);
    assert_eq!(stats.len(), 100);
    assert!(stats.values().all(|s| s.follows == Some(1) && s.rating.is_none()));
}
