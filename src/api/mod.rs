//! Thin HTTP surface: request decoding, orchestrator invocation and
//! response encoding. All pipeline behavior lives in the service layer.

pub mod longform;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::Settings;
use crate::services::longform::LongformPipeline;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub pipeline: Arc<LongformPipeline>,
}

pub fn router(state: AppState) -> Router {
    let downloads = ServeDir::new(state.settings.output_dir.clone());

    Router::new()
        .route("/api/v1/longform/scenes", post(longform::process_scenes))
        .route(
            "/api/v1/longform/storage",
            get(longform::describe_storage).delete(longform::clear_storage),
        )
        .nest_service("/generated_audio", downloads)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
