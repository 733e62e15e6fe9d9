//! Speech synthesis collaborator: one request per narratable unit.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::warn;
use serde_json::json;

use crate::config::Settings;
use crate::errors::{AppError, AppResult};

/// Upper bound for a synthesis call.
const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(240);

/// External text-to-speech service. Non-success responses are fatal for the
/// unit being synthesized; callers skip the call entirely for pure-pause
/// clauses.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn is_configured(&self) -> bool;
    async fn synthesize(&self, text: &str, voice_id: &str) -> AppResult<Bytes>;
}

/// reqwest client for the ElevenLabs dialogue endpoint.
pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    api_key: String,
    url: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(settings: &Settings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SYNTHESIS_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: settings.elevenlabs_api_key.clone(),
            url: settings.elevenlabs_url.clone(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn synthesize(&self, text: &str, voice_id: &str) -> AppResult<Bytes> {
        if !self.is_configured() {
            return Err(AppError::Validation(
                "ELEVENLABS_API_KEY is not configured.".to_string(),
            ));
        }
        let voice_id = voice_id.trim();
        if voice_id.is_empty() {
            return Err(AppError::Validation(
                "A voice_id is required for synthesis.".to_string(),
            ));
        }

        let payload = json!({
            "inputs": [{ "text": text, "voice_id": voice_id }]
        });

        let response = self
            .client
            .post(&self.url)
            .header("xi-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!("Synthesis failed (status={status}): {detail}");
            return Err(AppError::Upstream {
                status: status.as_u16(),
                detail,
            });
        }

        Ok(response.bytes().await?)
    }
}
