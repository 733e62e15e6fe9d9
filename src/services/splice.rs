//! Splice correction: comparing target pauses against what the assembled
//! audio actually contains, and applying collaborator-proposed overrides.
//!
//! A single corrective pass by design: deviation triggers at most one
//! adjustment request, one reassembly and one re-measurement.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use serde_json::{Value, json};

use crate::models::{ClauseRenderSpec, PauseAdjustment, SceneTimingAnalysis};

/// Observed-versus-target deviation beyond which a correction is requested.
pub const PAUSE_DEVIATION_THRESHOLD: f64 = 0.2;
/// Overrides closer than this to the current value are ignored.
pub const PAUSE_UPDATE_EPSILON: f64 = 1e-3;
/// Raw audio is attached to the correction request only below this size.
pub const SPLICE_AGENT_MAX_AUDIO_BYTES: usize = 800_000;

/// Target and observed pacing for one rendered clause.
#[derive(Debug, Clone, Serialize)]
pub struct ClauseMetric {
    pub clause_index: usize,
    pub text: String,
    pub target_pause_seconds: f64,
    pub observed_pause_seconds: Option<f64>,
    pub measured_start_ms: Option<u64>,
    pub measured_end_ms: Option<u64>,
}

/// Combine assembly bookkeeping with timing analysis into per-clause
/// metrics. `spoken_indices` maps analysis report positions (spoken
/// clauses only) back to clause indices.
pub fn build_clause_metrics(
    specs: &[ClauseRenderSpec],
    assembly_observed: &[f64],
    analysis: Option<&SceneTimingAnalysis>,
    spoken_indices: &[usize],
) -> Vec<ClauseMetric> {
    let mut metrics: Vec<ClauseMetric> = specs
        .iter()
        .enumerate()
        .map(|(index, spec)| ClauseMetric {
            clause_index: index,
            text: spec.text.clone().unwrap_or_default(),
            target_pause_seconds: spec.pause_seconds,
            observed_pause_seconds: assembly_observed.get(index).copied(),
            measured_start_ms: None,
            measured_end_ms: None,
        })
        .collect();

    // Measured timing, where the analysis found an alignment, overrides
    // the assembly estimate.
    if let Some(analysis) = analysis {
        for (report_index, report) in analysis.segments.iter().enumerate() {
            let Some(&clause_index) = spoken_indices.get(report_index) else {
                continue;
            };
            let Some(metric) = metrics.get_mut(clause_index) else {
                continue;
            };
            metric.measured_start_ms = report.measured_start_ms;
            metric.measured_end_ms = report.measured_end_ms;
            if let Some(pause_ms) = report.measured_pause_ms {
                metric.observed_pause_seconds = Some(pause_ms as f64 / 1000.0);
            }
        }
    }

    metrics
}

/// True when any clause drifted past the deviation threshold.
pub fn needs_splice_review(metrics: &[ClauseMetric]) -> bool {
    metrics.iter().any(|metric| {
        metric
            .observed_pause_seconds
            .map(|observed| (observed - metric.target_pause_seconds).abs() > PAUSE_DEVIATION_THRESHOLD)
            .unwrap_or(false)
    })
}

/// Build the correction request payload: per-clause metrics, transcript and
/// silence context, and the raw audio when it fits under the byte cap.
pub fn build_splice_payload(
    scene_name: &str,
    metrics: &[ClauseMetric],
    analysis: Option<&SceneTimingAnalysis>,
    audio_bytes: &[u8],
) -> Value {
    let mut payload = json!({
        "scene_id": scene_name,
        "clauses": metrics,
        "measurement_source": "transcription+vad",
        "expected_clause_count": metrics.len(),
    });

    if let Some(analysis) = analysis {
        if !analysis.transcript_segments.is_empty() {
            payload["transcript_segments"] = json!(analysis.transcript_segments);
        }
        if !analysis.silence_windows.is_empty() {
            payload["silence_windows"] = json!(analysis.silence_windows);
        }
    }

    if !audio_bytes.is_empty() && audio_bytes.len() <= SPLICE_AGENT_MAX_AUDIO_BYTES {
        payload["audio_base64"] = json!(BASE64.encode(audio_bytes));
    } else {
        payload["audio_notice"] = json!({
            "included": false,
            "audio_size_bytes": audio_bytes.len(),
            "reason": if audio_bytes.is_empty() {
                "no audio available"
            } else {
                "audio payload exceeds limit"
            },
        });
    }

    payload
}

/// Apply sparse pause overrides, producing a new clause list and a flag
/// saying whether anything changed. Overrides are clamped to finite,
/// non-negative values; non-finite proposals keep the prior pause, and
/// values within the epsilon of the current pause are ignored.
pub fn apply_pause_adjustments(
    specs: &[ClauseRenderSpec],
    adjustments: &[PauseAdjustment],
) -> (Vec<ClauseRenderSpec>, bool) {
    if adjustments.is_empty() {
        return (specs.to_vec(), false);
    }

    let mut updated = specs.to_vec();
    let mut changed = false;

    for adjustment in adjustments {
        let Some(spec) = updated.get_mut(adjustment.clause_index) else {
            continue;
        };
        let proposed = adjustment.desired_pause_seconds;
        if !proposed.is_finite() {
            continue;
        }
        let sanitized = proposed.max(0.0);
        if (sanitized - spec.pause_seconds).abs() > PAUSE_UPDATE_EPSILON {
            spec.pause_seconds = sanitized;
            changed = true;
        }
    }

    (updated, changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spoken(text: &str, pause: f64) -> ClauseRenderSpec {
        ClauseRenderSpec::spoken(text, pause)
    }

    #[test]
    fn review_triggers_only_past_threshold() {
        let specs = vec![spoken("One.", 1.5), spoken("Two.", 1.5)];
        let within = build_clause_metrics(&specs, &[1.6, 1.4], None, &[0, 1]);
        assert!(!needs_splice_review(&within));

        let beyond = build_clause_metrics(&specs, &[1.9, 1.5], None, &[0, 1]);
        assert!(needs_splice_review(&beyond));
    }

    #[test]
    fn analysis_measurement_overrides_assembly_estimate() {
        let specs = vec![spoken("One.", 1.5)];
        let analysis = SceneTimingAnalysis {
            segments: vec![crate::models::SegmentTimingReport {
                expected_text: "One.".to_string(),
                expected_pause_seconds: 1.5,
                measured_start_ms: Some(0),
                measured_end_ms: Some(800),
                measured_pause_ms: Some(2100),
            }],
            transcript_segments: Vec::new(),
            silence_windows: Vec::new(),
        };
        let metrics = build_clause_metrics(&specs, &[1.5], Some(&analysis), &[0]);
        assert_eq!(metrics[0].observed_pause_seconds, Some(2.1));
        assert_eq!(metrics[0].measured_end_ms, Some(800));
    }

    #[test]
    fn small_audio_is_embedded_large_audio_is_noted() {
        let metrics = build_clause_metrics(&[spoken("One.", 1.5)], &[1.5], None, &[0]);

        let small = build_splice_payload("scene", &metrics, None, &[1, 2, 3]);
        assert!(small.get("audio_base64").is_some());
        assert!(small.get("audio_notice").is_none());

        let big = vec![0u8; SPLICE_AGENT_MAX_AUDIO_BYTES + 1];
        let noted = build_splice_payload("scene", &metrics, None, &big);
        assert!(noted.get("audio_base64").is_none());
        assert_eq!(noted["audio_notice"]["included"], false);
    }

    #[test]
    fn adjustments_clamp_and_produce_new_plan() {
        let specs = vec![spoken("One.", 1.5), spoken("Two.", 1.5)];
        let adjustments = vec![
            PauseAdjustment {
                clause_index: 0,
                desired_pause_seconds: -2.0,
            },
            PauseAdjustment {
                clause_index: 1,
                desired_pause_seconds: 0.9,
            },
        ];
        let (updated, changed) = apply_pause_adjustments(&specs, &adjustments);
        assert!(changed);
        assert_eq!(updated[0].pause_seconds, 0.0);
        assert_eq!(updated[1].pause_seconds, 0.9);
        // The input is untouched.
        assert_eq!(specs[0].pause_seconds, 1.5);
    }

    #[test]
    fn non_finite_override_keeps_prior_pause() {
        let specs = vec![spoken("One.", 1.5)];
        let adjustments = vec![PauseAdjustment {
            clause_index: 0,
            desired_pause_seconds: f64::NAN,
        }];
        let (updated, changed) = apply_pause_adjustments(&specs, &adjustments);
        assert!(!changed);
        assert_eq!(updated[0].pause_seconds, 1.5);
    }

    #[test]
    fn epsilon_changes_are_ignored() {
        let specs = vec![spoken("One.", 1.5)];
        let adjustments = vec![PauseAdjustment {
            clause_index: 0,
            desired_pause_seconds: 1.5004,
        }];
        let (_, changed) = apply_pause_adjustments(&specs, &adjustments);
        assert!(!changed);
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let specs = vec![spoken("One.", 1.5)];
        let adjustments = vec![PauseAdjustment {
            clause_index: 9,
            desired_pause_seconds: 0.1,
        }];
        let (updated, changed) = apply_pause_adjustments(&specs, &adjustments);
        assert!(!changed);
        assert_eq!(updated.len(), 1);
    }
}
