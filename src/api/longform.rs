//! Long-form narration endpoints.

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::Response;
use log::info;

use super::AppState;
use crate::errors::{AppError, AppResult};
use crate::models::{LongformScenesRequest, LongformScenesResponse};
use crate::services::storage::{self, ClearReport, StorageReport};

/// Boundary token separating the JSON metadata part from the audio part.
pub const MULTIPART_BOUNDARY: &str = "longform-scenes-boundary";

pub fn multipart_media_type() -> String {
    format!("multipart/mixed; boundary={MULTIPART_BOUNDARY}")
}

/// Render the two-part response body: metadata JSON first, then the
/// combined audio as an attachment.
pub fn build_multipart_body(metadata_json: &str, final_audio: &[u8]) -> Vec<u8> {
    let mut body: Vec<u8> = Vec::with_capacity(metadata_json.len() + final_audio.len() + 256);

    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: audio/mpeg\r\n");
    body.extend_from_slice(b"Content-Disposition: attachment; filename=longform.mp3\r\n\r\n");
    body.extend_from_slice(final_audio);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    body
}

/// POST /api/v1/longform/scenes: run the whole pipeline over a script.
pub async fn process_scenes(
    State(state): State<AppState>,
    Json(request): Json<LongformScenesRequest>,
) -> AppResult<Response> {
    if request.script.trim().is_empty() {
        return Err(AppError::Validation("Script must not be empty.".to_string()));
    }

    info!(
        "Processing long-form script ({} bytes, voice_override={})",
        request.script.len(),
        request.voice_id.is_some()
    );

    let (metadata, final_audio): (LongformScenesResponse, Vec<u8>) = state
        .pipeline
        .process_script(&request.script, request.voice_id.as_deref())
        .await?;

    let metadata_json = serde_json::to_string(&metadata)?;
    let body = build_multipart_body(&metadata_json, &final_audio);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, multipart_media_type())
        .body(Body::from(body))
        .map_err(|e| AppError::Unknown(e.to_string()))
}

/// GET /api/v1/longform/storage: describe persisted artifacts.
pub async fn describe_storage(State(state): State<AppState>) -> Json<StorageReport> {
    Json(storage::describe_output_dir(&state.settings))
}

/// DELETE /api/v1/longform/storage: remove persisted artifacts.
pub async fn clear_storage(State(state): State<AppState>) -> AppResult<Json<ClearReport>> {
    Ok(Json(storage::clear_output_dir(&state.settings)?))
}
