use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rag_core::persist::{load_index, IndexPaths};
use rag_core::tokenizer::is_stopword;
use rag_core::{
    DocumentIndex, DocumentRetriever, GenerationPort, Presentation, RagPipeline, RetrievedDocument, Retriever,
    Timings,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod ollama;

use config::AppConfig;

pub type Pipeline = RagPipeline<Retriever, Arc<dyn GenerationPort>>;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: f64,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub snippet: String,
}

#[derive(Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default = "default_k")]
    pub top_k: usize,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub retrieved_docs: Vec<RetrievedDocument>,
    pub timings: Option<Timings>,
}

#[derive(Serialize)]
pub struct SystemInfo {
    pub model: String,
    pub document_count: usize,
    pub vocabulary_size: usize,
    pub max_features: Option<usize>,
    pub retrieval_method: &'static str,
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub max_top_k: usize,
}

impl AppState {
    pub fn new(index: Arc<DocumentIndex>, generator: Arc<dyn GenerationPort>, config: &AppConfig) -> Self {
        let pipeline = RagPipeline::new(Retriever::new(index), generator, config.pipeline.clone());
        Self { pipeline: Arc::new(pipeline), max_top_k: config.max_top_k.max(1) }
    }

    /// Load a persisted index. Any mismatch between the snapshot and its meta
    /// file is fatal: the server never serves an index it could not validate.
    pub fn load(index_dir: &str, generator: Arc<dyn GenerationPort>, config: &AppConfig) -> Result<Self> {
        let (index, _meta) = load_index(&IndexPaths::new(index_dir))?;
        Ok(Self::new(Arc::new(index), generator, config))
    }

    fn index(&self) -> &DocumentIndex {
        self.pipeline.retriever().index()
    }

    fn clamp_k(&self, k: usize) -> usize {
        k.min(self.max_top_k)
    }
}

pub fn build_app(state: AppState) -> Router {
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
        .route("/info", get(info_handler))
        .route("/search", get(search_handler))
        .route("/ask", post(ask_handler))
        .route("/query", post(query_handler))
        .route("/doc/:id", get(doc_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Retrieval only; no generation.
pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let k = state.clamp_k(params.k.max(1));
    let docs = state.pipeline.retriever().retrieve(&params.q, k);

    let raw_terms: Vec<String> = params
        .q
        .split_whitespace()
        .map(|s| s.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|s| !s.is_empty() && !is_stopword(&s.to_lowercase()))
        .collect();
    let results = docs
        .into_iter()
        .map(|doc| SearchHit { snippet: snippet(&doc.content, &raw_terms), id: doc.id, score: doc.score })
        .collect();

    Json(SearchResponse { query: params.q, took_ms: start.elapsed().as_secs_f64() * 1000.0, results })
}

pub async fn ask_handler(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Presentation>, (StatusCode, String)> {
    let k = validate_k(&state, req.top_k)?;
    Ok(Json(state.pipeline.present(&req.question, k).await))
}

pub async fn query_handler(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, String)> {
    let k = validate_k(&state, req.top_k)?;
    let outcome = state.pipeline.run(&req.question, k).await;
    let timings = outcome.timings();
    let (answer, retrieved_docs) = outcome.into_parts();
    Ok(Json(QueryResponse { answer, retrieved_docs, timings }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<rag_core::Document>, (StatusCode, String)> {
    match state.index().document(&id) {
        Some(doc) => Ok(Json(doc.clone())),
        None => Err((StatusCode::NOT_FOUND, format!("document {id} not found"))),
    }
}

pub async fn info_handler(State(state): State<AppState>) -> Json<SystemInfo> {
    let index = state.index();
    Json(SystemInfo {
        model: state.pipeline.generator().model().to_string(),
        document_count: index.len(),
        vocabulary_size: index.vocabulary_size(),
        max_features: index.config().max_features,
        retrieval_method: "TF-IDF",
    })
}

fn validate_k(state: &AppState, k: usize) -> Result<usize, (StatusCode, String)> {
    if k == 0 {
        return Err((StatusCode::BAD_REQUEST, "top_k must be at least 1".into()));
    }
    Ok(state.clamp_k(k))
}

/// Up to 200 characters around the first query term, with matches wrapped in `<em>`.
fn snippet(text: &str, raw_terms: &[String]) -> String {
    let lower = text.to_lowercase();
    // byte offsets only line up when lowercasing kept the length
    let first_idx = if lower.len() == text.len() {
        raw_terms.iter().find_map(|t| lower.find(&t.to_lowercase()))
    } else {
        None
    };
    let window: String = match first_idx {
        Some(idx) => {
            let start = floor_char_boundary(text, idx.saturating_sub(100));
            text[start..].chars().take(200).collect()
        }
        None => text.chars().take(200).collect(),
    };
    highlight_terms(&window, raw_terms)
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut s = snippet.to_string();
    for t in terms {
        let Ok(pat) = regex::RegexBuilder::new(&regex::escape(t)).case_insensitive(true).build() else {
            continue;
        };
        s = pat.replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string();
    }
    s
}
