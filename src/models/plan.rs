//! Synthesis plan types produced by the planning collaborator.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_output_format() -> String {
    "mp3".to_string()
}

/// One scene-level entry of the synthesis plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSegment {
    pub segment_id: String,
    pub text: String,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub character_count: usize,
    #[serde(default)]
    pub estimated_duration_seconds: f64,
    #[serde(default)]
    pub pause_after_seconds: f64,
    #[serde(default = "default_true")]
    pub enforce_comma_pause: bool,
    #[serde(default)]
    pub title: Option<String>,
}

/// How the per-scene files should be folded into the combined output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StitchingInstructions {
    #[serde(default)]
    pub crossfade_ms: u64,
    #[serde(default = "default_true")]
    pub normalize_volume: bool,
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

impl Default for StitchingInstructions {
    fn default() -> Self {
        Self {
            crossfade_ms: 0,
            normalize_volume: true,
            output_format: default_output_format(),
        }
    }
}

/// The full synthesis plan for a long-form request. Immutable downstream
/// except for the voice override and pause corrections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongFormAudioPlan {
    pub voice_id: String,
    pub segments: Vec<PlanSegment>,
    #[serde(default)]
    pub total_segments: usize,
    #[serde(default)]
    pub total_estimated_duration_seconds: f64,
    #[serde(default)]
    pub stitching_instructions: StitchingInstructions,
}

impl LongFormAudioPlan {
    /// Re-establish the `total_segments == segments.len()` invariant.
    pub fn reconcile_totals(&mut self) {
        self.total_segments = self.segments.len();
        if self.total_estimated_duration_seconds <= 0.0 {
            self.total_estimated_duration_seconds = self
                .segments
                .iter()
                .map(|s| s.estimated_duration_seconds + s.pause_after_seconds)
                .sum();
        }
    }

    pub fn any_explicit_pause(&self) -> bool {
        self.segments.iter().any(|s| s.pause_after_seconds > 0.0)
    }
}

/// Finer-grained than a segment plan: one renderable clause. A `None` text
/// means the clause is pure pause and no synthesis call is made for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClauseRenderSpec {
    pub text: Option<String>,
    pub pause_seconds: f64,
}

impl ClauseRenderSpec {
    pub fn spoken(text: impl Into<String>, pause_seconds: f64) -> Self {
        Self {
            text: Some(text.into()),
            pause_seconds,
        }
    }

    pub fn pause_only(pause_seconds: f64) -> Self {
        Self {
            text: None,
            pause_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_fixes_segment_count() {
        let mut plan = LongFormAudioPlan {
            voice_id: "voice-a".to_string(),
            segments: vec![PlanSegment {
                segment_id: "scene_1".to_string(),
                text: "Hello.".to_string(),
                emotion: None,
                character_count: 6,
                estimated_duration_seconds: 0.5,
                pause_after_seconds: 1.0,
                enforce_comma_pause: true,
                title: None,
            }],
            total_segments: 7,
            total_estimated_duration_seconds: 0.0,
            stitching_instructions: StitchingInstructions::default(),
        };
        plan.reconcile_totals();
        assert_eq!(plan.total_segments, 1);
        assert!((plan.total_estimated_duration_seconds - 1.5).abs() < 1e-9);
    }

    #[test]
    fn plan_deserializes_with_sparse_fields() {
        let raw = r#"{
            "voice_id": "v1",
            "segments": [{"segment_id": "s1", "text": "Hi."}]
        }"#;
        let plan: LongFormAudioPlan = serde_json::from_str(raw).unwrap();
        assert!(plan.segments[0].enforce_comma_pause);
        assert_eq!(plan.stitching_instructions.output_format, "mp3");
    }
}
