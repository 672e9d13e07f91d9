use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use catalog_core::persist::{open_index, save_snapshot, IndexPaths, LogWriter, OpLog};
use catalog_core::{Document, DocumentId, SearchConfig, SearchIndex};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use server::{router, AppState};
use std::io::{self, Write};
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

const TOKEN: &str = "secret";

fn build_tiny_index(dir: &std::path::Path) {
    let index = SearchIndex::default();
    index.add_document(Document::new("P1", "red shoes", "Classic red running shoes", "Footwear", 40.0, "Acme")).unwrap();
    index.add_document(Document::new("P2", "blue shoes", "Blue walking shoes", "Footwear", 60.0, "Acme")).unwrap();
    index.add_document(Document::new("P3", "garden hose", "Kink-free hose", "Garden", 25.0, "Flow")).unwrap();
    save_snapshot(&IndexPaths::new(dir), &index).unwrap();
}

fn app(dir: &std::path::Path) -> Router {
    let state = AppState::open(&dir.to_string_lossy(), SearchConfig::default(), Some(TOKEN.into())).unwrap();
    router(state)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn admin(method: &str, uri: &str, body: Option<Value>, token: &str) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri).header("X-ADMIN-TOKEN", token);
    match body {
        Some(v) => builder.header("content-type", "application/json").body(Body::from(v.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn result_ids(json: &Value) -> Vec<String> {
    json["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());

    let (status, json) = get(&app, "/search?q=shoes&k=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result_ids(&json), vec!["P1", "P2"]);
    assert_eq!(json["count"], 2);
    assert_eq!(json["results"][0]["highlight"], "Classic red running <em>shoes</em>");

    let (_, json) = get(&app, "/search?q=shoes&price_min=50").await;
    assert_eq!(result_ids(&json), vec!["P2"]);

    let (_, json) = get(&app, "/search?q=shoes&k=-3").await;
    assert!(result_ids(&json).is_empty());

    let (_, json) = get(&app, "/search?q=").await;
    assert!(result_ids(&json).is_empty());
}

#[tokio::test]
async fn suggest_facets_and_doc() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());

    let (_, json) = get(&app, "/suggest?prefix=Sh").await;
    assert_eq!(json["suggestions"], json!(["shoes"]));

    let (_, json) = get(&app, "/facets?q=shoes").await;
    assert_eq!(
        json["price_range"],
        json!([{"value": "Under $50", "count": 1}, {"value": "$50-$100", "count": 1}])
    );

    let (status, json) = get(&app, "/doc/P3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["title"], "garden hose");

    let (status, json) = get(&app, "/doc/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not found");
}

#[tokio::test]
async fn admin_mutations_are_logged_and_survive_restart() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());

    let batch = json!([{"id": "P4", "title": "green shoes", "price": 75.0, "category": "Footwear", "brand": "Zed"}]);
    let (status, _) = send(&app, admin("POST", "/index/batch", Some(batch.clone()), "wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = send(&app, admin("POST", "/index/batch", Some(batch), TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["indexed"], 1);

    let bad = json!([{"id": "P5", "title": "broken", "price": -1.0}]);
    let (status, _) = send(&app, admin("POST", "/index/batch", Some(bad), TOKEN)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&app, admin("DELETE", "/doc/P1", None, TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], true);
    let (_, json) = send(&app, admin("DELETE", "/doc/P1", None, TOKEN)).await;
    assert_eq!(json["removed"], false);

    let (_, json) = get(&app, "/search?q=shoes").await;
    assert_eq!(result_ids(&json), vec!["P2", "P4"]);

    // restart from snapshot + log, before and after compaction
    let paths = IndexPaths::new(dir.path());
    let reopened = open_index(&paths, SearchConfig::default()).unwrap();
    assert!(reopened.get(&DocumentId::new("P1")).is_none());
    assert!(reopened.get(&DocumentId::new("P4")).is_some());
    assert!(reopened.get(&DocumentId::new("P5")).is_none());

    let (status, json) = send(&app, admin("POST", "/index/commit", None, TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_docs"], 3);
    let reopened = open_index(&paths, SearchConfig::default()).unwrap();
    assert_eq!(reopened.len(), 3);
}

/// A log device that rejects every write.
struct FullDisk;

impl Write for FullDisk {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
    }
    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl LogWriter for FullDisk {
    fn truncate(&mut self) -> io::Result<()> { Ok(()) }
}

#[tokio::test]
async fn failed_log_write_leaves_index_unchanged() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let paths = IndexPaths::new(dir.path());
    let state = AppState {
        index: Arc::new(open_index(&paths, SearchConfig::default()).unwrap()),
        paths: paths.clone(),
        log: Arc::new(Mutex::new(OpLog::from_writer(FullDisk))),
        admin_token: Some(TOKEN.into()),
    };
    let index = state.index.clone();
    let app = router(state);

    let batch = json!([{"id": "P9", "title": "purple shoes", "price": 30.0}]);
    let (status, _) = send(&app, admin("POST", "/index/batch", Some(batch), TOKEN)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!index.contains(&DocumentId::new("P9")));

    let (status, _) = send(&app, admin("DELETE", "/doc/P1", None, TOKEN)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(index.contains(&DocumentId::new("P1")));

    // live state and a restart agree
    let reopened = open_index(&paths, SearchConfig::default()).unwrap();
    assert_eq!(reopened.len(), index.len());
    let (_, json) = get(&app, "/search?q=shoes").await;
    assert_eq!(result_ids(&json), vec!["P1", "P2"]);
}
