#![allow(dead_code)]

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chapterlink::config::Config;
use chapterlink::db::Database;
use chapterlink::ChapterLink;
use serde_json::{json, Value};

/// One request as seen by the stub.
#[derive(Debug, Clone)]
pub struct Hit {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Hit {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn params(&self, key: &str) -> Vec<&str> {
        self.query.iter().filter(|(k, _)| k == key).map(|(_, v)| v.as_str()).collect()
    }

    pub fn offset(&self) -> usize {
        self.param("offset").and_then(|v| v.parse().ok()).unwrap_or(0)
    }
}

pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn json(body: Value) -> Self {
        Self { status: 200, body: body.to_string() }
    }

    pub fn status(status: u16) -> Self {
        Self { status, body: json!({"result": "error", "errors": []}).to_string() }
    }

    pub fn not_found() -> Self {
        Self::status(404)
    }
}

/// Catalog API stand-in. Routing is delegated to the handler; every request is recorded.
pub struct CatalogStub {
    pub base_url: String,
    hits: Arc<Mutex<Vec<Hit>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CatalogStub {
    pub fn spawn<F>(handler: F) -> Self
    where
        F: Fn(&Hit) -> Reply + Send + 'static,
    {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start catalog stub server");
        let base_url = format!("http://{}", server.server_addr());
        let hits = Arc::new(Mutex::new(Vec::new()));
        let recorded = hits.clone();

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }
            let request = match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };

            let url = url::Url::parse(&format!("http://stub{}", request.url())).expect("parse request url");
            let hit = Hit {
                path: url.path().to_string(),
                query: url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect(),
            };
            recorded.lock().expect("hits lock").push(hit.clone());

            let reply = handler(&hit);
            let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                .expect("content-type header");
            let response = tiny_http::Response::from_string(reply.body)
                .with_status_code(reply.status)
                .with_header(header);
            let _ = request.respond(response);
        });

        Self { base_url, hits, shutdown_tx: Some(shutdown_tx), handle: Some(handle) }
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().expect("hits lock").clone()
    }

    pub fn count(&self, path_prefix: &str) -> usize {
        self.hits().iter().filter(|h| h.path.starts_with(path_prefix)).count()
    }
}

impl Drop for CatalogStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn config(base_url: &str, db_path: &std::path::Path) -> Config {
    let mut cfg = Config::default();
    cfg.database.url = Some(format!("sqlite://{}?mode=rwc", db_path.display()));
    cfg.catalog.base_url = base_url.to_string();
    cfg.catalog.uploads_url = "https://uploads.test".to_string();
    cfg.catalog.site_url = "https://site.test".to_string();
    cfg.catalog.timeout_ms = 2_000;
    cfg.catalog.retries = 0;
    cfg.catalog.backoff_ms = 1;
    cfg
}

/// Fresh database in a temp dir, plus a facade pointed at `stub`.
pub async fn app(stub: &CatalogStub) -> (tempfile::TempDir, Database, ChapterLink) {
    app_with(stub, |_| {}).await
}

/// Like [`app`], with `tweak` applied to the config first.
pub async fn app_with<F>(stub: &CatalogStub, tweak: F) -> (tempfile::TempDir, Database, ChapterLink)
where
    F: FnOnce(&mut Config),
{
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = config(&stub.base_url, &dir.path().join("chapterlink.db"));
    tweak(&mut cfg);
    let db = Database::connect(&cfg.database).await.expect("connect");
    db.run_migrations().await.expect("migrate");
    let app = ChapterLink::with_storage(cfg, Arc::new(db.clone())).expect("build facade");
    (dir, db, app)
}

/// Remove a series row and leave its links dangling.
pub async fn delete_series(db: &Database, series_id: i64) {
    sqlx::query("DELETE FROM series WHERE id = ?")
        .bind(series_id)
        .execute(db.pool())
        .await
        .expect("delete series");
}

// --- payload builders ---

pub fn manga(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "type": "manga",
        "attributes": { "title": { "en": title }, "altTitles": [] },
        "relationships": [
            { "id": "c0000000-0000-4000-8000-000000000000", "type": "cover_art", "attributes": { "fileName": "cover.jpg" } }
        ]
    })
}

pub fn manga_entity(id: &str, title: &str) -> Value {
    json!({ "result": "ok", "response": "entity", "data": manga(id, title) })
}

pub fn manga_collection(items: Vec<Value>) -> Value {
    let total = items.len();
    json!({ "result": "ok", "response": "collection", "data": items, "limit": 1, "offset": 0, "total": total })
}

#[derive(Clone)]
pub struct Ch<'a> {
    pub id: &'a str,
    pub label: Option<&'a str>,
    pub lang: &'a str,
    pub group: Option<(&'a str, Option<&'a str>)>,
    pub readable_at: &'a str,
}

pub fn chapter(ch: &Ch<'_>) -> Value {
    let relationships: Vec<Value> = match ch.group {
        Some((id, Some(name))) => vec![json!({ "id": id, "type": "scanlation_group", "attributes": { "name": name } })],
        Some((id, None)) => vec![json!({ "id": id, "type": "scanlation_group" })],
        None => Vec::new(),
    };
    json!({
        "id": ch.id,
        "type": "chapter",
        "attributes": {
            "chapter": ch.label,
            "title": null,
            "translatedLanguage": ch.lang,
            "pages": 12,
            "readableAt": ch.readable_at,
            "publishAt": ch.readable_at,
            "createdAt": ch.readable_at
        },
        "relationships": relationships
    })
}

pub fn feed(chapters: &[Ch<'_>]) -> Value {
    let data: Vec<Value> = chapters.iter().map(chapter).collect();
    let total = data.len();
    json!({ "result": "ok", "response": "collection", "data": data, "limit": 100, "offset": 0, "total": total })
}

pub fn at_home(hash: &str) -> Value {
    json!({
        "result": "ok",
        "baseUrl": "https://cdn.test",
        "chapter": { "hash": hash, "data": ["1.png", "2.png"], "dataSaver": ["1.jpg", "2.jpg"] }
    })
}

pub fn groups(items: &[(&str, &str)]) -> Value {
    let data: Vec<Value> = items
        .iter()
        .map(|(id, name)| json!({ "id": id, "type": "scanlation_group", "attributes": { "name": name } }))
        .collect();
    json!({ "result": "ok", "data": data, "total": items.len() })
}

pub fn group_entity(id: &str, name: &str) -> Value {
    json!({ "result": "ok", "data": { "id": id, "type": "scanlation_group", "attributes": { "name": name } } })
}
