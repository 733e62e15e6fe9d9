//! Transcription collaborator: time-stamped segments for an assembled
//! scene.
//!
//! The endpoint's verbose response is not uniform across models, so raw
//! segments are taken in as loose JSON and normalized through a single
//! adapter into [`TranscriptSegment`].

use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::config::Settings;
use crate::errors::{AppError, AppResult};
use crate::models::TranscriptSegment;

const TRANSCRIPTION_TIMEOUT: Duration = Duration::from_secs(120);
const TRANSCRIPTIONS_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const TRANSCRIPTION_MODEL: &str = "gpt-4o-mini-transcribe";

/// External speech-to-text service. Absence of credentials is a supported
/// state: callers receive empty results instead of errors.
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn is_configured(&self) -> bool;
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str)
    -> AppResult<Vec<TranscriptSegment>>;
}

/// One segment as the endpoint reports it: timestamps may be numbers or
/// strings, text may be missing. Normalized by [`normalize_segment`].
#[derive(Debug, Default, Deserialize)]
pub struct RawTranscriptSegment {
    #[serde(default)]
    text: Value,
    #[serde(default)]
    start: Value,
    #[serde(default)]
    end: Value,
}

#[derive(Debug, Default, Deserialize)]
struct TranscriptionPayload {
    #[serde(default)]
    segments: Vec<RawTranscriptSegment>,
}

fn coerce_f64(value: &Value, default: f64) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(default),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(default),
        _ => default,
    }
}

fn coerce_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Normalize one raw segment; segments without text are dropped.
pub fn normalize_segment(raw: &RawTranscriptSegment) -> Option<TranscriptSegment> {
    let text = coerce_str(&raw.text).trim().to_string();
    if text.is_empty() {
        return None;
    }
    let start = coerce_f64(&raw.start, 0.0).max(0.0);
    let end = coerce_f64(&raw.end, start).max(start);
    Some(TranscriptSegment {
        text,
        start_ms: (start * 1000.0).round() as u64,
        end_ms: (end * 1000.0).round() as u64,
    })
}

/// Whisper-style client for the transcription endpoint.
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl WhisperTranscriber {
    pub fn new(settings: &Settings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(TRANSCRIPTION_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: settings.openai_api_key.clone(),
            model: TRANSCRIPTION_MODEL.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn transcribe(
        &self,
        audio: Vec<u8>,
        file_name: &str,
    ) -> AppResult<Vec<TranscriptSegment>> {
        if !self.is_configured() {
            warn!("Skipping transcription because OPENAI_API_KEY is missing");
            return Ok(Vec::new());
        }

        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str("audio/mpeg")
            .map_err(|e| AppError::Serialization(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("temperature", "0");

        let response = self
            .client
            .post(TRANSCRIPTIONS_URL)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                status: status.as_u16(),
                detail,
            });
        }

        let payload: TranscriptionPayload = response.json().await?;
        Ok(payload
            .segments
            .iter()
            .filter_map(normalize_segment)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_numeric_timestamps() {
        let raw: RawTranscriptSegment =
            serde_json::from_str(r#"{"text": "hello", "start": 0.5, "end": 1.25}"#).unwrap();
        let segment = normalize_segment(&raw).unwrap();
        assert_eq!(segment.start_ms, 500);
        assert_eq!(segment.end_ms, 1250);
        assert_eq!(segment.text, "hello");
    }

    #[test]
    fn normalizes_string_timestamps() {
        let raw: RawTranscriptSegment =
            serde_json::from_str(r#"{"text": "hi", "start": "2.0", "end": "3.5"}"#).unwrap();
        let segment = normalize_segment(&raw).unwrap();
        assert_eq!(segment.start_ms, 2000);
        assert_eq!(segment.end_ms, 3500);
    }

    #[test]
    fn end_never_precedes_start() {
        let raw: RawTranscriptSegment =
            serde_json::from_str(r#"{"text": "x", "start": 4.0, "end": 1.0}"#).unwrap();
        let segment = normalize_segment(&raw).unwrap();
        assert_eq!(segment.start_ms, 4000);
        assert_eq!(segment.end_ms, 4000);
    }

    #[test]
    fn textless_segments_are_dropped() {
        let raw: RawTranscriptSegment =
            serde_json::from_str(r#"{"start": 0.0, "end": 1.0}"#).unwrap();
        assert!(normalize_segment(&raw).is_none());
    }
}
