//! JSON HTTP surface over the engine's query functions

use crate::catalog::ViewFilter;
use crate::config::ScoringConfig;
use crate::error::RecommendError;
use crate::types::{Recommendation, UserId};
use crate::RecommenderEngine;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Application state
pub struct AppState {
    pub engine: Arc<RecommenderEngine>,
    pub scoring: ScoringConfig,
}

impl ResponseError for RecommendError {
    fn status_code(&self) -> StatusCode {
        match self {
            RecommendError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            RecommendError::ItemNotFound { .. }
            | RecommendError::UnknownUser { .. }
            | RecommendError::UnknownItem { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        }))
    }
}

/// View filter and result count carried in query strings
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    /// Comma separated genre list
    pub genre: Option<String>,
    pub min_rating: Option<f32>,
    pub min_votes: Option<u64>,
    pub n: Option<usize>,
    /// Tag search text
    pub q: Option<String>,
}

impl FilterQuery {
    fn view_filter(&self) -> ViewFilter {
        ViewFilter {
            genres: self
                .genre
                .as_deref()
                .map(|genres| {
                    genres
                        .split(',')
                        .map(str::trim)
                        .filter(|g| !g.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            min_rating: self.min_rating,
            min_votes: self.min_votes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub tags: Vec<String>,
    pub n: Option<usize>,
    #[serde(default)]
    pub filter: ViewFilter,
}

#[derive(Debug, Deserialize)]
pub struct HybridRequest {
    pub reference: String,
    pub n: Option<usize>,
    pub alpha: Option<f32>,
    #[serde(default)]
    pub filter: ViewFilter,
}

#[derive(Debug, Deserialize)]
pub struct TowerRequest {
    pub user_id: UserId,
    pub n: Option<usize>,
    #[serde(default)]
    pub filter: ViewFilter,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    pub count: usize,
    pub recommendations: Vec<Recommendation>,
}

impl From<Vec<Recommendation>> for RecommendationsResponse {
    fn from(recommendations: Vec<Recommendation>) -> Self {
        Self {
            count: recommendations.len(),
            recommendations,
        }
    }
}

/// Register every route
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check)).service(
        web::scope("/api/v1")
            .route("/catalog/stats", web::get().to(catalog_stats))
            .route("/tags", web::get().to(tag_pool))
            .route("/users", web::get().to(known_users))
            .route("/recommendations/top-quality", web::get().to(top_quality))
            .route("/recommendations/by-tags", web::post().to(by_tags))
            .route("/recommendations/hybrid", web::post().to(hybrid))
            .route("/recommendations/two-tower", web::post().to(two_tower)),
    );
}

async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "switch-recs",
        "games": state.engine.catalog().len(),
        "tower_ready": state.engine.tower().is_ready(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn catalog_stats(
    state: web::Data<AppState>,
    query: web::Query<FilterQuery>,
) -> HttpResponse {
    let view = state.engine.view(&query.view_filter());
    HttpResponse::Ok().json(view.stats())
}

async fn tag_pool(state: web::Data<AppState>, query: web::Query<FilterQuery>) -> HttpResponse {
    let view = state.engine.view(&query.view_filter());
    let tags = view.tag_pool(query.q.as_deref().unwrap_or(""));
    HttpResponse::Ok().json(serde_json::json!({ "tags": tags }))
}

#[instrument(skip(state))]
async fn top_quality(
    state: web::Data<AppState>,
    query: web::Query<FilterQuery>,
) -> HttpResponse {
    let view = state.engine.view(&query.view_filter());
    let n = state.scoring.top_n(query.n);
    let recs = state.engine.top_quality(&view, n);
    HttpResponse::Ok().json(RecommendationsResponse::from(recs))
}

#[instrument(skip(state))]
async fn by_tags(
    state: web::Data<AppState>,
    body: web::Json<TagRequest>,
) -> Result<HttpResponse, RecommendError> {
    let view = state.engine.view(&body.filter);
    let n = state.scoring.top_n(body.n);
    let recs = state.engine.by_tags(&view, &body.tags, n)?;
    Ok(HttpResponse::Ok().json(RecommendationsResponse::from(recs)))
}

#[instrument(skip(state))]
async fn hybrid(
    state: web::Data<AppState>,
    body: web::Json<HybridRequest>,
) -> Result<HttpResponse, RecommendError> {
    let view = state.engine.view(&body.filter);
    let n = state.scoring.top_n(body.n);
    let alpha = body.alpha.unwrap_or(state.scoring.default_alpha);
    let recs = state.engine.hybrid(&view, &body.reference, n, alpha)?;
    Ok(HttpResponse::Ok().json(RecommendationsResponse::from(recs)))
}

#[instrument(skip(state))]
async fn two_tower(
    state: web::Data<AppState>,
    body: web::Json<TowerRequest>,
) -> actix_web::Result<HttpResponse> {
    let engine = Arc::clone(&state.engine);
    if !engine.tower().is_ready() {
        // First load reads the checkpoint; keep it off the request workers
        let loader = Arc::clone(&engine);
        web::block(move || loader.tower().ensure_ready().map(|_| ())).await??;
    }

    let view = engine.view(&body.filter);
    let n = state.scoring.top_n(body.n);
    let recs = engine.tower_recall(&view, body.user_id, n)?;
    Ok(HttpResponse::Ok().json(RecommendationsResponse::from(recs)))
}

async fn known_users(state: web::Data<AppState>) -> actix_web::Result<HttpResponse> {
    let engine = Arc::clone(&state.engine);
    let users = web::block(move || engine.list_known_users()).await??;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "count": users.len(), "users": users })))
}
