//! Scene-level timing analysis: transcription plus VAD, aligned against
//! the expected unit plan.
//!
//! Alignment is positional: expected unit i is matched with transcript
//! segment i. This assumes the transcription returns one segment per
//! narrated unit; a count mismatch leaves trailing units with null
//! measurements and only the silence-window fallback. Measurement is
//! diagnostic: any collaborator failure yields an empty analysis, never
//! an error.

use log::{debug, warn};

use crate::models::{
    SceneTimingAnalysis, SegmentPausePlan, SegmentTimingReport, SilenceWindow, TranscriptSegment,
};
use crate::services::audio::{decode, vad};
use crate::services::transcription::Transcriber;

fn first_silence_after(timestamp_ms: u64, windows: &[SilenceWindow]) -> Option<&SilenceWindow> {
    windows.iter().find(|w| w.start_ms >= timestamp_ms)
}

/// Build expected-versus-measured reports for each unit.
pub fn build_segment_reports(
    expected: &[SegmentPausePlan],
    transcript: &[TranscriptSegment],
    silence_windows: &[SilenceWindow],
) -> Vec<SegmentTimingReport> {
    let mut reports: Vec<SegmentTimingReport> = expected
        .iter()
        .enumerate()
        .map(|(index, unit)| {
            let aligned = transcript.get(index);
            let next = transcript.get(index + 1);
            let measured_pause = match (aligned, next) {
                (Some(current), Some(following)) => {
                    Some(following.start_ms.saturating_sub(current.end_ms))
                }
                _ => None,
            };
            SegmentTimingReport {
                expected_text: unit.text.clone(),
                expected_pause_seconds: unit.pause_after_seconds,
                measured_start_ms: aligned.map(|s| s.start_ms),
                measured_end_ms: aligned.map(|s| s.end_ms),
                measured_pause_ms: measured_pause,
            }
        })
        .collect();

    // Units with a known end but no following transcript segment fall back
    // to the first silence window after that end.
    for report in &mut reports {
        if report.measured_pause_ms.is_some() {
            continue;
        }
        let Some(end_ms) = report.measured_end_ms else {
            continue;
        };
        if let Some(window) = first_silence_after(end_ms, silence_windows) {
            report.measured_pause_ms = Some(window.duration_ms);
        }
    }

    reports
}

/// Analyze an assembled scene: transcribe it, detect silence windows and
/// align both against the expected plan.
pub async fn analyze_scene_audio(
    transcriber: &dyn Transcriber,
    audio: &[u8],
    expected_plan: &[SegmentPausePlan],
) -> SceneTimingAnalysis {
    if audio.is_empty() {
        return SceneTimingAnalysis::default();
    }

    let transcript_segments = if transcriber.is_configured() {
        match transcriber.transcribe(audio.to_vec(), "scene.mp3").await {
            Ok(segments) => segments,
            Err(error) => {
                warn!("Transcription failed, continuing without alignment: {error}");
                Vec::new()
            }
        }
    } else {
        debug!("Transcription credentials missing; skipping alignment");
        Vec::new()
    };

    let silence_windows = match decode::decode_bytes(audio, Some("mp3")) {
        Ok(decoded) => vad::detect_silence_windows(&decoded),
        Err(error) => {
            warn!("Unable to decode audio for VAD: {error}");
            Vec::new()
        }
    };

    if transcript_segments.is_empty() && silence_windows.is_empty() {
        // No measurement source at all: report nothing rather than a list
        // of all-null reports.
        return SceneTimingAnalysis::default();
    }

    if transcript_segments.len() != expected_plan.len() && !transcript_segments.is_empty() {
        debug!(
            "Transcript returned {} segment(s) for {} expected unit(s); alignment is positional",
            transcript_segments.len(),
            expected_plan.len()
        );
    }

    let segment_reports =
        build_segment_reports(expected_plan, &transcript_segments, &silence_windows);

    SceneTimingAnalysis {
        segments: segment_reports,
        transcript_segments,
        silence_windows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppResult;
    use async_trait::async_trait;

    struct UnconfiguredTranscriber;

    #[async_trait]
    impl Transcriber for UnconfiguredTranscriber {
        fn is_configured(&self) -> bool {
            false
        }
        async fn transcribe(
            &self,
            _audio: Vec<u8>,
            _file_name: &str,
        ) -> AppResult<Vec<TranscriptSegment>> {
            panic!("must not be called without credentials");
        }
    }

    fn unit(text: &str, pause: f64) -> SegmentPausePlan {
        SegmentPausePlan {
            text: text.to_string(),
            pause_after_seconds: pause,
        }
    }

    fn span(text: &str, start_ms: u64, end_ms: u64) -> TranscriptSegment {
        TranscriptSegment {
            text: text.to_string(),
            start_ms,
            end_ms,
        }
    }

    #[test]
    fn measured_pause_is_gap_to_next_segment() {
        let expected = vec![unit("One.", 1.5), unit("Two.", 1.5)];
        let transcript = vec![span("One.", 0, 1000), span("Two.", 2400, 3400)];
        let reports = build_segment_reports(&expected, &transcript, &[]);

        assert_eq!(reports[0].measured_pause_ms, Some(1400));
        assert_eq!(reports[1].measured_pause_ms, None);
    }

    #[test]
    fn silence_window_fallback_for_last_unit() {
        let expected = vec![unit("Only.", 2.0)];
        let transcript = vec![span("Only.", 0, 900)];
        let windows = vec![SilenceWindow {
            start_ms: 950,
            end_ms: 2950,
            duration_ms: 2000,
        }];
        let reports = build_segment_reports(&expected, &transcript, &windows);
        assert_eq!(reports[0].measured_pause_ms, Some(2000));
    }

    #[test]
    fn unaligned_units_keep_null_measurements() {
        // Count-mismatch assumption made explicit: transcript has fewer
        // segments than the plan expects.
        let expected = vec![unit("One.", 1.0), unit("Two.", 1.0), unit("Three.", 1.0)];
        let transcript = vec![span("One. Two.", 0, 2000)];
        let reports = build_segment_reports(&expected, &transcript, &[]);

        assert_eq!(reports[0].measured_start_ms, Some(0));
        assert!(reports[1].measured_start_ms.is_none());
        assert!(reports[2].measured_pause_ms.is_none());
    }

    #[tokio::test]
    async fn missing_credentials_yield_empty_analysis() {
        let transcriber = UnconfiguredTranscriber;
        // Bytes that are not decodable audio: VAD degrades to empty too.
        let analysis = analyze_scene_audio(&transcriber, b"not-audio", &[unit("One.", 1.5)]).await;
        assert!(analysis.is_empty());
    }

    #[tokio::test]
    async fn empty_audio_yields_default_analysis() {
        let transcriber = UnconfiguredTranscriber;
        let analysis = analyze_scene_audio(&transcriber, &[], &[unit("One.", 1.5)]).await;
        assert!(analysis.is_empty());
    }
}
