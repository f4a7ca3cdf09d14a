//! In-process stand-in for the KRAG backend.

#![allow(dead_code)]

use axum::{
    extract::{Multipart, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct StoredDoc {
    pub doc_id: String,
    pub chunks: Vec<String>,
}

#[derive(Default)]
pub struct Store {
    next_id: usize,
    docs: HashMap<(String, String), Vec<StoredDoc>>,
}

/// What the stub saw on the last `/ingest/text` call, after url decoding.
#[derive(Clone, Debug, Default)]
pub struct SeenIngest {
    pub tenant_id: String,
    pub kb_id: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Clone, Default)]
pub struct StubState {
    store: Arc<RwLock<Store>>,
    pub hits: Arc<AtomicUsize>,
    last_ingest: Arc<Mutex<Option<SeenIngest>>>,
}

impl StubState {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_ingest(&self) -> Option<SeenIngest> {
        self.last_ingest.lock().unwrap().clone()
    }
}

/// Binds to an ephemeral port and returns the base url.
pub async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A base url nothing listens on.
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn cooperative(state: StubState) -> Router {
    Router::new()
        .route("/api/v1/hello", get(hello))
        .route("/api/v1/ingest/text", post(ingest_text))
        .route("/api/v1/ingest/txt", post(ingest_txt))
        .route("/api/v1/query", post(query))
        .route("/api/v1/docs", get(list_docs))
        .route("/api/v1/doc/chunks", get(doc_chunks))
        .with_state(state)
}

/// Every request answers with `status`.
pub fn failing(state: StubState, status: StatusCode) -> Router {
    Router::new()
        .fallback(move |State(s): State<StubState>| async move {
            s.hits.fetch_add(1, Ordering::SeqCst);
            (status, "backend exploded")
        })
        .with_state(state)
}

/// Every request answers with `{}`.
pub fn empty_objects() -> Router {
    Router::new().fallback(|| async { Json(json!({})) })
}

/// Always returns vectors, requested or not.
pub fn leaky_vectors() -> Router {
    Router::new().route(
        "/api/v1/doc/chunks",
        get(|| async {
            Json(json!({
                "tenantId": "t1",
                "kbId": "kb1",
                "docId": "doc-1",
                "chunks": [{"chunkId": "doc-1_0", "text": "a"}],
                "dimension": 2,
                "vectors": [[0.1, 0.2]]
            }))
        }),
    )
}

pub fn slow(delay: Duration) -> Router {
    Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        Json(json!({}))
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScopeQuery {
    tenant_id: String,
    kb_id: String,
    filename: Option<String>,
    doc_id: Option<String>,
    page: Option<usize>,
    size: Option<usize>,
    include_vectors: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody {
    tenant_id: String,
    kb_id: String,
    query: Option<String>,
    top_k: Option<usize>,
    min_score: Option<f32>,
    doc_id: Option<String>,
    full: Option<bool>,
}

async fn hello(State(s): State<StubState>) -> Json<Value> {
    s.hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({"message": "Hello, KRAG!", "version": "0.1.0-SNAPSHOT"}))
}

fn split_chunks(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

async fn store_doc(
    s: &StubState,
    tenant_id: String,
    kb_id: String,
    text: &str,
) -> Result<Json<Value>, StatusCode> {
    let chunks = split_chunks(text);
    if chunks.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let mut store = s.store.write().await;
    let doc_id = format!("doc-{}", 123 + store.next_id);
    store.next_id += 1;
    let n = chunks.len();
    store
        .docs
        .entry((tenant_id, kb_id))
        .or_default()
        .push(StoredDoc {
            doc_id: doc_id.clone(),
            chunks,
        });
    Ok(Json(json!({"docId": doc_id, "chunks": n, "dimension": 3})))
}

async fn ingest_text(
    State(s): State<StubState>,
    Query(q): Query<ScopeQuery>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, StatusCode> {
    s.hits.fetch_add(1, Ordering::SeqCst);
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *s.last_ingest.lock().unwrap() = Some(SeenIngest {
        tenant_id: q.tenant_id.clone(),
        kb_id: q.kb_id.clone(),
        filename: q.filename.clone(),
        content_type: content_type.clone(),
        body: body.clone(),
    });
    let is_plain = content_type
        .as_deref()
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("text/plain"))
        .unwrap_or(false);
    if !is_plain {
        return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
    let filename = q.filename.unwrap_or_default();
    if !filename.to_lowercase().ends_with(".txt") {
        return Err(StatusCode::BAD_REQUEST);
    }
    store_doc(&s, q.tenant_id, q.kb_id, &body).await
}

async fn ingest_txt(
    State(s): State<StubState>,
    Query(q): Query<ScopeQuery>,
    mut multipart: Multipart,
) -> Result<Json<Value>, StatusCode> {
    s.hits.fetch_add(1, Ordering::SeqCst);
    let mut text = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        if field.name() == Some("file") {
            if field.file_name().is_none() {
                return Err(StatusCode::BAD_REQUEST);
            }
            text = Some(field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?);
        }
    }
    let text = text.ok_or(StatusCode::BAD_REQUEST)?;
    store_doc(&s, q.tenant_id, q.kb_id, &text).await
}

fn score(query: &str, chunk: &str) -> f32 {
    let chunk = chunk.to_lowercase();
    let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if words.is_empty() {
        return 0.0;
    }
    let hits = words.iter().filter(|w| chunk.contains(w.as_str())).count();
    hits as f32 / words.len() as f32
}

async fn query(
    State(s): State<StubState>,
    Json(req): Json<QueryBody>,
) -> Result<Json<Value>, StatusCode> {
    s.hits.fetch_add(1, Ordering::SeqCst);
    let store = s.store.read().await;
    let docs = store
        .docs
        .get(&(req.tenant_id.clone(), req.kb_id.clone()))
        .cloned()
        .unwrap_or_default();

    if let Some(doc_id) = req.doc_id.filter(|d| !d.trim().is_empty()) {
        let chunks: Vec<Value> = docs
            .iter()
            .filter(|d| d.doc_id == doc_id)
            .flat_map(|d| {
                d.chunks.iter().enumerate().map(move |(i, c)| {
                    json!({"docId": d.doc_id, "chunkId": format!("{}_{}", d.doc_id, i), "text": c})
                })
            })
            .collect();
        let mut resp = json!({
            "tenantId": req.tenant_id,
            "kbId": req.kb_id,
            "docId": doc_id,
            "chunks": chunks,
        });
        if req.full == Some(true) {
            let full = docs
                .iter()
                .filter(|d| d.doc_id == doc_id)
                .flat_map(|d| d.chunks.clone())
                .collect::<Vec<_>>()
                .join("\n\n");
            resp["documentText"] = json!(full);
        }
        return Ok(Json(resp));
    }

    let query = req
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or(StatusCode::BAD_REQUEST)?;
    let top_k = req.top_k.unwrap_or(5);
    let min_score = req.min_score.unwrap_or(0.0);
    let query = query.as_str();
    let mut hits: Vec<(f32, Value)> = docs
        .iter()
        .flat_map(|d| {
            d.chunks.iter().enumerate().map(move |(i, c)| {
                let sc = score(query, c);
                (
                    sc,
                    json!({"docId": d.doc_id, "chunkId": format!("{}_{}", d.doc_id, i), "score": sc, "text": c}),
                )
            })
        })
        .filter(|(sc, _)| *sc > 0.0 && *sc >= min_score)
        .collect();
    hits.sort_by(|a, b| b.0.total_cmp(&a.0));
    hits.truncate(top_k);
    let results: Vec<Value> = hits.into_iter().map(|(_, v)| v).collect();
    Ok(Json(json!({
        "tenantId": req.tenant_id,
        "kbId": req.kb_id,
        "model": "stub-embed",
        "topK": top_k,
        "results": results,
    })))
}

async fn list_docs(State(s): State<StubState>, Query(q): Query<ScopeQuery>) -> Json<Value> {
    s.hits.fetch_add(1, Ordering::SeqCst);
    let page = q.page.filter(|p| *p > 0).unwrap_or(1);
    let size = q.size.filter(|s| *s > 0).unwrap_or(10);
    let store = s.store.read().await;
    let docs = store
        .docs
        .get(&(q.tenant_id.clone(), q.kb_id.clone()))
        .cloned()
        .unwrap_or_default();
    let total = docs.len();
    let from = ((page - 1) * size).min(total);
    let to = (from + size).min(total);
    let items: Vec<Value> = docs[from..to]
        .iter()
        .map(|d| json!({"docId": d.doc_id, "chunks": d.chunks.len()}))
        .collect();
    Json(json!({
        "tenantId": q.tenant_id,
        "kbId": q.kb_id,
        "page": page,
        "size": size,
        "total": total,
        "items": items,
    }))
}

async fn doc_chunks(State(s): State<StubState>, Query(q): Query<ScopeQuery>) -> Json<Value> {
    s.hits.fetch_add(1, Ordering::SeqCst);
    let doc_id = q.doc_id.unwrap_or_default();
    let store = s.store.read().await;
    let texts: Vec<String> = store
        .docs
        .get(&(q.tenant_id.clone(), q.kb_id.clone()))
        .and_then(|docs| docs.iter().find(|d| d.doc_id == doc_id))
        .map(|d| d.chunks.clone())
        .unwrap_or_default();
    let chunks: Vec<Value> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| json!({"chunkId": format!("{}_{}", doc_id, i), "text": t}))
        .collect();
    let mut resp = json!({
        "tenantId": q.tenant_id,
        "kbId": q.kb_id,
        "docId": doc_id,
        "chunks": chunks,
    });
    if q.include_vectors == Some(true) {
        let vectors: Vec<Vec<f32>> = texts
            .iter()
            .map(|t| vec![t.len() as f32, 0.5, 1.0])
            .collect();
        resp["dimension"] = json!(3);
        resp["vectors"] = json!(vectors);
    }
    Json(resp)
}
