use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use catalog_core::config::{DEFAULT_MAX_SUGGESTIONS, DEFAULT_TOP_K, MAX_K};
use catalog_core::persist::{compact, open_index, IndexPaths, OpLog, Operation};
use catalog_core::tokenizer::Analyzer;
use catalog_core::{Document, DocumentId, FacetCounts, SearchConfig, SearchError, SearchFilters, SearchIndex};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_k")]
    pub k: i64,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
}
fn default_k() -> i64 { DEFAULT_TOP_K as i64 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub count: usize,
    pub results: Vec<SearchHitView>,
}

#[derive(Serialize)]
pub struct SearchHitView {
    pub id: DocumentId,
    pub score: f64,
    pub document: Document,
    /// Description excerpt with query terms wrapped in `<em>`.
    pub highlight: Option<String>,
}

#[derive(Deserialize)]
pub struct SuggestParams {
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_max")]
    pub max: usize,
}
fn default_max() -> usize { DEFAULT_MAX_SUGGESTIONS }

#[derive(Serialize)]
pub struct SuggestResponse {
    pub prefix: String,
    pub suggestions: Vec<String>,
}

#[derive(Deserialize)]
pub struct FacetParams {
    #[serde(default)]
    pub q: String,
}

type ApiError = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<SearchIndex>,
    pub paths: IndexPaths,
    /// Also serializes mutations so the log order matches the index.
    pub log: Arc<Mutex<OpLog>>,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn open(index_dir: &str, config: SearchConfig, admin_token: Option<String>) -> Result<Self> {
        let paths = IndexPaths::new(index_dir);
        let index = open_index(&paths, config)?;
        let log = OpLog::open(&paths)?;
        Ok(Self { index: Arc::new(index), paths, log: Arc::new(Mutex::new(log)), admin_token })
    }
}

pub fn build_app(index_dir: String, config: SearchConfig) -> Result<Router> {
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let state = AppState::open(&index_dir, config, admin_token)?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/suggest", get(suggest_handler))
        .route("/facets", get(facets_handler))
        .route("/doc/:doc_id", get(doc_handler).delete(delete_handler))
        .route("/index/batch", post(index_batch))
        .route("/index/commit", post(index_commit))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    // non-positive k means no results
    let k = params.k.clamp(0, MAX_K as i64) as usize;
    let filters = SearchFilters {
        price_min: params.price_min,
        price_max: params.price_max,
        category: params.category,
        brand: params.brand,
    };
    let hits = state.index.search(&params.q, k, &filters);

    let analyzer = Analyzer::new(state.index.config().tokenizer);
    let terms: Vec<String> = analyzer.analyze(&params.q).into_iter().map(|t| t.as_str().to_string()).collect();
    let results: Vec<SearchHitView> = hits
        .into_iter()
        .map(|hit| {
            let highlight = snippet_from_text(&hit.document.description, &terms);
            SearchHitView { id: hit.document.id.clone(), score: hit.score, document: hit.document, highlight }
        })
        .collect();

    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, count = results.len(), "search");
    Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), count: results.len(), results })
}

pub async fn suggest_handler(State(state): State<AppState>, Query(params): Query<SuggestParams>) -> Json<SuggestResponse> {
    let suggestions = state.index.suggest(&params.prefix, params.max.min(MAX_K));
    Json(SuggestResponse { prefix: params.prefix, suggestions })
}

pub async fn facets_handler(State(state): State<AppState>, Query(params): Query<FacetParams>) -> Json<FacetCounts> {
    Json(state.index.facets(&params.q))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> Result<Json<Document>, (StatusCode, Json<serde_json::Value>)> {
    match state.index.get(&DocumentId::new(doc_id)) {
        Some(doc) => Ok(Json(doc)),
        None => Err((StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" })))),
    }
}

fn snippet_from_text(text: &str, terms: &[String]) -> Option<String> {
    if text.is_empty() { return None; }
    // find first match (case-insensitive) of any query term
    let first_idx = terms
        .iter()
        .filter_map(|t| term_pattern(t))
        .filter_map(|pat| pat.find(text).map(|m| m.start()))
        .min();
    let snippet = match first_idx {
        Some(idx) => {
            let mut start = idx.saturating_sub(100);
            while !text.is_char_boundary(start) { start -= 1; }
            let mut end = (idx + 200).min(text.len());
            while !text.is_char_boundary(end) { end += 1; }
            text[start..end].to_string()
        }
        None => text.chars().take(200).collect(),
    };
    Some(highlight_terms(&snippet, terms))
}

fn term_pattern(term: &str) -> Option<regex::Regex> {
    if term.trim().is_empty() { return None; }
    regex::RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .ok()
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut s = snippet.to_string();
    for t in terms {
        if let Some(pat) = term_pattern(t) {
            s = pat.replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string();
        }
    }
    s
}

// --- Admin endpoints ---
async fn index_batch(State(state): State<AppState>, headers: HeaderMap, Json(docs): Json<Vec<Document>>) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    // all or nothing: reject the batch before touching the index
    for doc in &docs {
        doc.validate().map_err(to_api_error)?;
    }
    // the index only changes once the log holds the records
    let mut log = state.log.lock();
    let ops: Vec<Operation> = docs.into_iter().map(|document| Operation::Add { document }).collect();
    log.append_all(&ops).map_err(to_api_error)?;
    let indexed = ops.len();
    for op in ops {
        op.apply(&state.index).map_err(to_api_error)?;
    }
    tracing::info!(indexed, "batch indexed");
    Ok(Json(serde_json::json!({ "indexed": indexed })))
}

async fn delete_handler(State(state): State<AppState>, headers: HeaderMap, Path(doc_id): Path<String>) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let id = DocumentId::new(doc_id);
    let mut log = state.log.lock();
    if !state.index.contains(&id) {
        return Ok(Json(serde_json::json!({ "removed": false })));
    }
    log.append(&Operation::Remove { id: id.clone() }).map_err(to_api_error)?;
    let removed = state.index.remove_document(&id);
    Ok(Json(serde_json::json!({ "removed": removed })))
}

async fn index_commit(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let mut log = state.log.lock();
    let meta = compact(&state.paths, &state.index, &mut log).map_err(to_api_error)?;
    Ok(Json(serde_json::json!({ "num_docs": meta.num_docs, "created_at": meta.created_at })))
}

fn to_api_error(e: SearchError) -> ApiError {
    match e {
        SearchError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        other => {
            tracing::error!(error = %other, "index mutation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
