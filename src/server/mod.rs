mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;

pub use self::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(api::search_text, api::search_image, api::collection_info, api::health),
    components(schemas(
        types::TextSearchRequest,
        types::ImageSearchRequest,
        types::SearchResponse,
        types::CollectionInfoResponse,
        types::HealthResponse,
    ))
)]
pub struct ApiDoc;

/// Builds the API router.
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search/text", post(api::search_text))
        .route("/search/image", post(api::search_image))
        .route("/collection", get(api::collection_info))
        .route("/health", get(api::health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(DefaultBodyLimit::disable())
        // upload limit: 10M, enough for any base64 query image
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
