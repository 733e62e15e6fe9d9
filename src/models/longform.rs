//! Scene, segmentation and timing types for long-form narration.

use serde::{Deserialize, Serialize};

/// Incoming payload containing the entire multi-scene script.
#[derive(Debug, Clone, Deserialize)]
pub struct LongformScenesRequest {
    /// Full script containing scene headers and narration lines.
    pub script: String,
    /// Optional voice override applied to the synthesis plan.
    #[serde(default)]
    pub voice_id: Option<String>,
}

/// One scene extracted from the script: the header line and the narration
/// lines accumulated under it. Immutable once built by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneBlock {
    pub name: String,
    pub lines: Vec<String>,
}

impl SceneBlock {
    /// Narration text of the scene: lines joined with single spaces.
    pub fn raw_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }
}

/// A single narratable unit and the silence that should follow it.
///
/// `text` never changes after creation; pause corrections build a new plan
/// instead of mutating this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPausePlan {
    /// Exact unit text with explicit pause markers removed.
    pub text: String,
    /// Target pause to insert after this unit, in seconds (>= 0).
    pub pause_after_seconds: f64,
}

/// Timestamped transcription span returned by the transcription collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// A stretch of non-speech detected by the voice-activity detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceWindow {
    pub start_ms: u64,
    pub end_ms: u64,
    pub duration_ms: u64,
}

/// Expected-versus-measured timing for one narratable unit.
/// Measured fields are None when no transcript alignment was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentTimingReport {
    pub expected_text: String,
    pub expected_pause_seconds: f64,
    pub measured_start_ms: Option<u64>,
    pub measured_end_ms: Option<u64>,
    pub measured_pause_ms: Option<u64>,
}

/// Full timing picture of an assembled scene. Built fresh after every
/// assembly pass; replaced, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneTimingAnalysis {
    pub segments: Vec<SegmentTimingReport>,
    pub transcript_segments: Vec<TranscriptSegment>,
    pub silence_windows: Vec<SilenceWindow>,
}

impl SceneTimingAnalysis {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
            && self.transcript_segments.is_empty()
            && self.silence_windows.is_empty()
    }
}

/// One pause override proposed by the splice-correction collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseAdjustment {
    pub clause_index: usize,
    pub desired_pause_seconds: f64,
}

/// Wire shape of the splice-correction response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PauseAdjustmentResponse {
    #[serde(default)]
    pub adjustments: Vec<PauseAdjustment>,
}

/// Metadata returned for each processed scene.
#[derive(Debug, Clone, Serialize)]
pub struct SceneProcessingSummary {
    pub scene_name: String,
    /// Ordered unit segmentation and pauses actually used for the scene.
    pub segments: Vec<SegmentPausePlan>,
    /// Where the plan came from: "fallback", "agent" or "corrected".
    pub plan_source: String,
    /// Download URL of the assembled scene audio.
    pub audio_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing_analysis: Option<SceneTimingAnalysis>,
}

/// Reference to a generated audio file exposed for download.
#[derive(Debug, Clone, Serialize)]
pub struct AudioFileRef {
    pub file_name: String,
    pub audio_file: String,
}

/// Aggregated response spanning all processed scenes.
#[derive(Debug, Clone, Serialize)]
pub struct LongformScenesResponse {
    pub scenes: Vec<SceneProcessingSummary>,
    pub combined: AudioFileRef,
    pub manifest_file: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_text_joins_and_trims_lines() {
        let scene = SceneBlock {
            name: "Opening".to_string(),
            lines: vec![
                "  Breathe in. ".to_string(),
                "".to_string(),
                "Breathe out.".to_string(),
            ],
        };
        assert_eq!(scene.raw_text(), "Breathe in. Breathe out.");
    }

    #[test]
    fn adjustment_response_tolerates_missing_field() {
        let parsed: PauseAdjustmentResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.adjustments.is_empty());
    }
}
