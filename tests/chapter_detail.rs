mod catalog_stub;

use catalog_stub::{at_home, chapter, feed, manga_entity, CatalogStub, Ch, Hit, Reply};
use chapterlink::error::Error;
use chapterlink::types::ChapterTarget;
use serde_json::json;

const SERIES: &str = "11111111-1111-1111-1111-111111111111";
const FRESH: &str = "66666666-6666-6666-6666-666666666666";
const TEAM_A: &str = "aaaaaaaa-0000-4000-8000-00000000000a";
const TEAM_B: &str = "bbbbbbbb-0000-4000-8000-00000000000b";

const EARLY_B: &str = "f0000000-0000-4000-8000-0000000000b1";
const LATE_A: &str = "f0000000-0000-4000-8000-0000000000a1";
const FRENCH: &str = "f0000000-0000-4000-8000-0000000000f1";

fn chapters() -> Vec<Ch<'static>> {
    vec![
        Ch { id: LATE_A, label: Some("5"), lang: "en", group: Some((TEAM_A, Some("Team A"))), readable_at: "2023-05-01T00:00:00+00:00" },
        Ch { id: EARLY_B, label: Some("5"), lang: "en", group: Some((TEAM_B, Some("Team B"))), readable_at: "2021-05-01T00:00:00+00:00" },
        Ch { id: FRENCH, label: Some("5"), lang: "fr", group: Some((TEAM_A, Some("Team A"))), readable_at: "2020-05-01T00:00:00+00:00" },
        Ch { id: "f0000000-0000-4000-8000-000000000006", label: Some("6"), lang: "en", group: None, readable_at: "2023-06-01T00:00:00+00:00" },
    ]
}

fn catalog(hit: &Hit) -> Reply {
    let path = hit.path.as_str();
    if path == format!("/manga/{SERIES}") {
        return Reply::json(manga_entity(SERIES, "Attack on Example"));
    }
    if path == format!("/manga/{FRESH}") {
        return Reply::json(manga_entity(FRESH, "Fresh Find"));
    }
    if path.ends_with("/feed") {
        let rows = chapters();
        let page: &[Ch<'_>] = if hit.offset() == 0 { &rows[..] } else { &[] };
        return Reply::json(feed(page));
    }
    if let Some(id) = path.strip_prefix("/at-home/server/") {
        return match chapters().iter().find(|c| c.id == id) {
            Some(_) => Reply::json(at_home(&format!("hash-{}", &id[id.len() - 2..]))),
            None => Reply::not_found(),
        };
    }
    if let Some(id) = path.strip_prefix("/chapter/") {
        return match chapters().into_iter().find(|c| c.id == id) {
            Some(ch) => Reply::json(json!({ "result": "ok", "data": chapter(&ch) })),
            None => Reply::not_found(),
        };
    }
    Reply::not_found()
}

fn canonical(series_key: &str, slug: &str) -> ChapterTarget {
    ChapterTarget::Canonical { series_key: series_key.into(), slug: slug.into() }
}

#[tokio::test]
async fn malformed_slug_fails_before_any_request() {
    let stub = CatalogStub::spawn(catalog);
    let (_dir, _db, app) = catalog_stub::app(&stub).await;

    let err = app.resolve_detail(&canonical(SERIES, "not-a-slug"), false).await.unwrap_err();
    assert!(matches!(err, Error::BadSlug(_)), "{err:?}");
    assert!(stub.hits().is_empty());
}

#[tokio::test]
async fn earliest_chapter_wins_when_group_prefix_is_unmatched() {
    let stub = CatalogStub::spawn(catalog);
    let (_dir, _db, app) = catalog_stub::app(&stub).await;
    app.hydrate(SERIES).await.unwrap();

    let detail = app.resolve_detail(&canonical("attack-on-example", "g-ffffffff-chapter-5-en"), false).await.unwrap();
    assert_eq!(detail.resolved_chapter_id.as_deref(), Some(EARLY_B));
    assert_eq!(detail.canonical_slug.as_deref(), Some("g-bbbbbbbb-chapter-5-en"));
    assert_eq!(detail.page_urls, ["https://cdn.test/data/hash-b1/1.png", "https://cdn.test/data/hash-b1/2.png"]);

    let scan = stub.hits().into_iter().find(|h| h.path.ends_with("/feed")).unwrap();
    assert_eq!(scan.params("translatedLanguage[]"), ["en"]);
}

#[tokio::test]
async fn later_group_slug_still_resolves_earliest_chapter() {
    let stub = CatalogStub::spawn(catalog);
    let (_dir, _db, app) = catalog_stub::app(&stub).await;
    app.hydrate(SERIES).await.unwrap();

    let detail = app.resolve_detail(&canonical(SERIES, "g-aaaaaaaa-chapter-5-en"), true).await.unwrap();
    assert_eq!(detail.resolved_chapter_id.as_deref(), Some(EARLY_B));
    assert_eq!(detail.canonical_slug.as_deref(), Some("g-bbbbbbbb-chapter-5-en"));
    assert_eq!(detail.page_urls, ["https://cdn.test/data-saver/hash-b1/1.jpg", "https://cdn.test/data-saver/hash-b1/2.jpg"]);
}

#[tokio::test]
async fn unknown_group_slug_resolves_groupless_chapter() {
    let stub = CatalogStub::spawn(catalog);
    let (_dir, _db, app) = catalog_stub::app(&stub).await;
    app.hydrate(SERIES).await.unwrap();

    let detail = app.resolve_detail(&canonical(SERIES, "g-unknown-chapter-6-EN"), false).await.unwrap();
    assert_eq!(detail.resolved_chapter_id.as_deref(), Some("f0000000-0000-4000-8000-000000000006"));
    assert_eq!(detail.canonical_slug.as_deref(), Some("g-unknown-chapter-6-en"));
}

#[tokio::test]
async fn missing_chapter_is_not_found() {
    let stub = CatalogStub::spawn(catalog);
    let (_dir, _db, app) = catalog_stub::app(&stub).await;
    app.hydrate(SERIES).await.unwrap();

    let err = app.resolve_detail(&canonical(SERIES, "g-aaaaaaaa-chapter-99-en"), false).await.unwrap_err();
    assert!(matches!(err, Error::ChapterNotFound(_)), "{err:?}");
    assert_eq!(err.status(), 404);
    assert_eq!(stub.count("/at-home"), 0);
}

#[tokio::test]
async fn unknown_series_is_not_found() {
    let stub = CatalogStub::spawn(catalog);
    let (_dir, _db, app) = catalog_stub::app(&stub).await;

    let err = app.resolve_detail(&canonical("no-such-series", "g-unknown-chapter-1-en"), false).await.unwrap_err();
    assert!(matches!(err, Error::SeriesNotFound(_)), "{err:?}");

    let err = app
        .resolve_detail(&canonical("77777777-7777-7777-7777-777777777777", "g-unknown-chapter-1-en"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SeriesNotFound(_)), "{err:?}");
}

#[tokio::test]
async fn upstream_series_key_is_hydrated_in_passing() {
    let stub = CatalogStub::spawn(catalog);
    let (_dir, _db, app) = catalog_stub::app(&stub).await;

    let detail = app.resolve_detail(&canonical(FRESH, "g-bbbbbbbb-chapter-5-en"), false).await.unwrap();
    assert_eq!(detail.resolved_chapter_id.as_deref(), Some(EARLY_B));
    let series = app.resolve("fresh-find").await.unwrap().unwrap();
    assert_eq!(series.external_id.as_deref(), Some(FRESH));
}

#[tokio::test]
async fn direct_chapter_id_returns_pages_and_slug() {
    let stub = CatalogStub::spawn(catalog);
    let (_dir, _db, app) = catalog_stub::app(&stub).await;

    let detail = app.resolve_detail(&ChapterTarget::Direct(FRENCH.to_uppercase()), false).await.unwrap();
    assert_eq!(detail.resolved_chapter_id.as_deref(), Some(FRENCH));
    assert_eq!(detail.canonical_slug.as_deref(), Some("g-aaaaaaaa-chapter-5-fr"));
    assert_eq!(detail.page_urls.len(), 2);
}

#[tokio::test]
async fn direct_mode_validates_and_maps_missing_pages() {
    let stub = CatalogStub::spawn(catalog);
    let (_dir, _db, app) = catalog_stub::app(&stub).await;

    let err = app.resolve_detail(&ChapterTarget::Direct("chapter-5".into()), false).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "{err:?}");

    let gone = "99999999-9999-9999-9999-999999999999";
    let err = app.resolve_detail(&ChapterTarget::Direct(gone.into()), false).await.unwrap_err();
    assert!(matches!(err, Error::ChapterNotFound(ref id) if id == gone), "{err:?}");
}

#[tokio::test]
async fn unavailable_image_server_propagates() {
    let stub = CatalogStub::spawn(|hit| {
        if hit.path.starts_with("/at-home/") { Reply::status(500) } else { catalog(hit) }
    });
    let (_dir, _db, app) = catalog_stub::app(&stub).await;

    let err = app.resolve_detail(&ChapterTarget::Direct(LATE_A.into()), false).await.unwrap_err();
    assert!(matches!(err, Error::UpstreamUnavailable(_)), "{err:?}");
    assert_eq!(err.status(), 502);
}
