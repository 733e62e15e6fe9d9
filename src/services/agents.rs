//! Language-model collaborator clients: synthesis planning, clause
//! re-segmentation and splice correction.
//!
//! Each method sends one JSON payload to a chat-completion endpoint and
//! parses the JSON the model returns. Failures here are never fatal to a
//! request; every caller has a deterministic fallback.

use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::Settings;
use crate::errors::{AppError, AppResult};
use crate::models::{
    LongFormAudioPlan, PauseAdjustment, PauseAdjustmentResponse, SceneBlock, SegmentPausePlan,
};

const AGENT_TIMEOUT: Duration = Duration::from_secs(120);
const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const AGENT_MODEL: &str = "gpt-5";

const PLAN_SYSTEM_PROMPT: &str = "You are an audio narration planner. Given a JSON payload \
describing narration scenes, return a JSON object with voice_id, segments (segment_id, text, \
emotion, character_count, estimated_duration_seconds, pause_after_seconds, enforce_comma_pause), \
total_segments, total_estimated_duration_seconds and stitching_instructions (crossfade_ms, \
normalize_volume, output_format). Keep scene text unchanged and keep one segment per scene, in \
order.";

const CLAUSE_SYSTEM_PROMPT: &str = "You re-segment narration for pacing. Given a scene text and a \
fallback segmentation, return a JSON object {\"segments\": [{\"text\", \
\"pause_after_seconds\"}]}. You may move unit boundaries and adjust pauses, but the concatenated \
text must stay exactly the narrated content; never reword it and never use negative pauses.";

const SPLICE_SYSTEM_PROMPT: &str = "You correct narration pacing. Given per-clause target and \
observed pauses (and optionally transcript context and base64 audio), return a JSON object \
{\"adjustments\": [{\"clause_index\", \"desired_pause_seconds\"}]} listing only clauses whose \
pause should change.";

/// Planning, clause and splice collaborators behind one seam so the
/// orchestrator can take a single injected dependency.
#[async_trait]
pub trait NarrationPlanner: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Draft the scene-collection synthesis plan.
    async fn draft_plan(&self, scenes: &[SceneBlock]) -> AppResult<LongFormAudioPlan>;

    /// Propose an alternative segmentation for one scene. The caller
    /// validates content preservation before accepting it.
    async fn refine_segments(
        &self,
        scene_name: &str,
        scene_text: &str,
        fallback: &[SegmentPausePlan],
    ) -> AppResult<Vec<SegmentPausePlan>>;

    /// Propose sparse pause overrides for a scene whose measured pauses
    /// drifted from their targets.
    async fn propose_pause_adjustments(&self, payload: &Value) -> AppResult<Vec<PauseAdjustment>>;
}

#[derive(Debug, Deserialize)]
struct SceneSegmentationPlan {
    #[serde(default)]
    segments: Vec<SegmentPausePlan>,
}

/// Chat-completion client used for all three agent roles.
pub struct OpenAiPlanner {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiPlanner {
    pub fn new(settings: &Settings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(AGENT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: settings.openai_api_key.clone(),
            model: AGENT_MODEL.to_string(),
        }
    }

    async fn run_agent(&self, system_prompt: &str, payload: &Value) -> AppResult<String> {
        if !self.is_configured() {
            return Err(AppError::Validation(
                "OPENAI_API_KEY is not configured.".to_string(),
            ));
        }

        let body = json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": payload.to_string() },
            ],
        });

        let response = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
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

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .ok_or_else(|| {
                AppError::Serialization("Agent response had no message content".to_string())
            })
    }
}

#[async_trait]
impl NarrationPlanner for OpenAiPlanner {
    fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn draft_plan(&self, scenes: &[SceneBlock]) -> AppResult<LongFormAudioPlan> {
        let payload = json!({
            "mode": "scene_collection",
            "scenes": scenes
                .iter()
                .map(|scene| json!({
                    "scene_id": scene.name,
                    "text": scene.raw_text(),
                    "pause_after_seconds": 0.0,
                    "enforce_comma_pause": true,
                }))
                .collect::<Vec<_>>(),
        });

        let output = self.run_agent(PLAN_SYSTEM_PROMPT, &payload).await?;
        let plan: LongFormAudioPlan = serde_json::from_str(&output)?;
        Ok(plan)
    }

    async fn refine_segments(
        &self,
        scene_name: &str,
        scene_text: &str,
        fallback: &[SegmentPausePlan],
    ) -> AppResult<Vec<SegmentPausePlan>> {
        let payload = json!({
            "scene_name": scene_name,
            "scene_text": scene_text,
            "fallback_segments": fallback,
        });

        let output = self.run_agent(CLAUSE_SYSTEM_PROMPT, &payload).await?;
        let plan: SceneSegmentationPlan = serde_json::from_str(&output).unwrap_or_else(|error| {
            warn!("Clause agent output was not a valid plan: {error}");
            SceneSegmentationPlan {
                segments: Vec::new(),
            }
        });
        Ok(plan.segments)
    }

    async fn propose_pause_adjustments(&self, payload: &Value) -> AppResult<Vec<PauseAdjustment>> {
        let output = self.run_agent(SPLICE_SYSTEM_PROMPT, payload).await?;
        let parsed: PauseAdjustmentResponse = serde_json::from_str(&output)?;
        Ok(parsed.adjustments)
    }
}
