//! HTTP surface of the translation service: request orchestration over the
//! job store, quota engine, blob store, and task queue.

pub mod context;
pub mod erase;
pub mod error;
pub mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use axum::routing::{get, post};
use axum::Json;

use crate::context::AppContext;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Builds the service router. `static_root`, when given, is served under
/// `/static` (local blob deployments only).
pub fn build_router(
    ctx: Arc<AppContext>,
    static_root: Option<PathBuf>,
    allow_origin: &[String],
) -> anyhow::Result<axum::Router> {
    let allow_origin = allow_origin
        .iter()
        .map(|origin| origin.parse::<axum::http::HeaderValue>())
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse allowed origins")?;

    let cors = tower_http::cors::CorsLayer::new()
        .allow_methods(tower_http::cors::AllowMethods::mirror_request())
        .allow_origin(tower_http::cors::AllowOrigin::list(allow_origin))
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let mut router = axum::Router::new()
        .route("/health", get(health))
        .route("/upload", post(routes::upload::create_upload))
        .route("/upload/:upload_id", get(routes::upload::get_upload))
        .route("/translate", post(routes::translate::create_translate))
        .route(
            "/translate/:translate_id",
            get(routes::translate::get_translate),
        )
        .route("/batch", post(routes::batch::create_batch))
        .route("/batch/:batch_id", get(routes::batch::get_batch))
        .route("/erase", post(routes::erase::erase));

    if let Some(root) = static_root {
        router = router.nest_service("/static", tower_http::services::ServeDir::new(root));
    }

    Ok(router
        .layer(axum::extract::DefaultBodyLimit::max(
            blobs::MAX_UPLOAD_BYTES + 64 * 1024,
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ctx))
}
