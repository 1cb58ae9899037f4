use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::info;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::metrics;

/// Fused text search over one or more queries.
#[utoipa::path(
    post,
    path = "/search/text",
    request_body = TextSearchRequest,
    responses(
        (status = 200, body = SearchResponse),
        (status = 400, description = "no usable query"),
    )
)]
pub async fn search_text(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TextSearchRequest>,
) -> Result<Json<SearchResponse>> {
    let queries: Vec<String> =
        request.queries.into_iter().filter(|q| !q.trim().is_empty()).collect();
    if queries.is_empty() {
        return Err(AppError::bad_request("at least one non-empty query is required"));
    }

    info!("text search: {} queries", queries.len());
    let started = Instant::now();

    let vectors = state.embedder.encode_text(&queries).await?;
    let params = state.fuse_params(request.limit, request.score_threshold, request.object_filters);
    let outcome = state.engine.fuse(&vectors, &params).await?;

    metrics::observe_search("text", started.elapsed().as_secs_f64(), outcome.total_results);
    Ok(Json(SearchResponse::new(outcome, started.elapsed())))
}

/// Fused search for a single query image.
#[utoipa::path(
    post,
    path = "/search/image",
    request_body = ImageSearchRequest,
    responses(
        (status = 200, body = SearchResponse),
        (status = 400, description = "image is not valid base64"),
    )
)]
pub async fn search_image(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ImageSearchRequest>,
) -> Result<Json<SearchResponse>> {
    let image = BASE64
        .decode(request.image_base64.as_bytes())
        .map_err(|e| AppError::bad_request(format!("invalid base64 image: {e}")))?;

    info!("image search: {} bytes", image.len());
    let started = Instant::now();

    let vector = state.embedder.encode_image(&image).await?;
    let params = state.fuse_params(request.limit, request.score_threshold, request.object_filters);
    let outcome = state.engine.fuse(&[vector], &params).await?;

    metrics::observe_search("image", started.elapsed().as_secs_f64(), outcome.total_results);
    Ok(Json(SearchResponse::new(outcome, started.elapsed())))
}

/// Collection statistics passthrough.
#[utoipa::path(
    get,
    path = "/collection",
    responses((status = 200, body = CollectionInfoResponse))
)]
pub async fn collection_info(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CollectionInfoResponse>> {
    let stats = state.store.collection_info().await?;
    Ok(Json(CollectionInfoResponse::new(&state.collection, stats)))
}

/// Reports vector store reachability.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, body = HealthResponse),
        (status = 503, body = HealthResponse),
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    if state.store.healthy().await {
        (StatusCode::OK, Json(HealthResponse { status: "healthy".to_string() })).into_response()
    } else {
        let body = HealthResponse { status: "unavailable".to_string() };
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}
