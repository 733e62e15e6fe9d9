//! Silence-window detection with WebRTC voice-activity detection.
//!
//! The clip is resampled to the fixed VAD rate, cut into 30 ms frames and
//! classified frame by frame; runs of non-speech frames of at least the
//! minimum length become silence windows.

use log::warn;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use webrtc_vad::{SampleRate, Vad, VadMode};

use super::decode::DecodedAudio;
use crate::models::SilenceWindow;

pub const VAD_SAMPLE_RATE: u32 = 16_000;
pub const VAD_FRAME_MS: u64 = 30;
pub const MIN_SILENCE_MS: u64 = 400;

/// Detect silence windows of at least [`MIN_SILENCE_MS`] in a clip.
/// Resampling or classification problems degrade to an empty result.
pub fn detect_silence_windows(audio: &DecodedAudio) -> Vec<SilenceWindow> {
    if audio.samples.is_empty() || audio.sample_rate == 0 {
        return Vec::new();
    }

    let samples = if audio.sample_rate == VAD_SAMPLE_RATE {
        audio.samples.clone()
    } else {
        match resample_to_vad_rate(&audio.samples, audio.sample_rate) {
            Ok(resampled) => resampled,
            Err(error) => {
                warn!("Unable to resample audio for VAD: {error}");
                return Vec::new();
            }
        }
    };

    let frame_len = (VAD_SAMPLE_RATE as u64 * VAD_FRAME_MS / 1000) as usize;
    if samples.len() < frame_len {
        return Vec::new();
    }

    let pcm: Vec<i16> = samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect();

    let mut vad = Vad::new_with_rate_and_mode(SampleRate::Rate16kHz, VadMode::Aggressive);
    let mut windows: Vec<SilenceWindow> = Vec::new();
    let mut silence_start_ms: Option<u64> = None;

    for (index, frame) in pcm.chunks_exact(frame_len).enumerate() {
        let frame_start_ms = index as u64 * VAD_FRAME_MS;
        // An unclassifiable frame is treated as speech so it closes any
        // open window instead of inflating it.
        let is_speech = vad.is_voice_segment(frame).unwrap_or(true);

        if !is_speech {
            silence_start_ms.get_or_insert(frame_start_ms);
            continue;
        }

        if let Some(start_ms) = silence_start_ms.take() {
            let duration = frame_start_ms - start_ms;
            if duration >= MIN_SILENCE_MS {
                windows.push(SilenceWindow {
                    start_ms,
                    end_ms: frame_start_ms,
                    duration_ms: duration,
                });
            }
        }
    }

    let total_ms = (pcm.len() as u64 * 1000) / VAD_SAMPLE_RATE as u64;
    if let Some(start_ms) = silence_start_ms {
        let duration = total_ms.saturating_sub(start_ms);
        if duration >= MIN_SILENCE_MS {
            windows.push(SilenceWindow {
                start_ms,
                end_ms: total_ms,
                duration_ms: duration,
            });
        }
    }

    windows
}

/// Block-based sinc resampling down to the VAD rate.
fn resample_to_vad_rate(samples: &[f32], input_rate: u32) -> Result<Vec<f32>, String> {
    const BLOCK_SIZE: usize = 1024;

    let ratio = VAD_SAMPLE_RATE as f64 / input_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, BLOCK_SIZE, 1)
        .map_err(|e| format!("resampler init failed: {e}"))?;

    let mut output = Vec::with_capacity((samples.len() as f64 * ratio) as usize + BLOCK_SIZE);
    let mut offset = 0usize;
    while offset < samples.len() {
        let end = (offset + BLOCK_SIZE).min(samples.len());
        let mut block = samples[offset..end].to_vec();
        block.resize(BLOCK_SIZE, 0.0);

        let frames = resampler
            .process(&[block], None)
            .map_err(|e| format!("resampling failed: {e}"))?;
        if let Some(channel) = frames.into_iter().next() {
            output.extend(channel);
        }
        offset = end;
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(seconds: f64, rate: u32) -> Vec<f32> {
        let count = (seconds * rate as f64) as usize;
        (0..count)
            .map(|i| {
                let t = i as f32 / rate as f32;
                (t * 300.0 * 2.0 * std::f32::consts::PI).sin() * 0.6
            })
            .collect()
    }

    #[test]
    fn finds_a_long_gap_between_two_tones() {
        let rate = VAD_SAMPLE_RATE;
        let mut samples = tone(0.6, rate);
        samples.extend(std::iter::repeat(0.0).take(rate as usize)); // 1 s gap
        samples.extend(tone(0.6, rate));

        let windows = detect_silence_windows(&DecodedAudio {
            samples,
            sample_rate: rate,
        });

        assert!(!windows.is_empty(), "expected at least one silence window");
        let longest = windows.iter().map(|w| w.duration_ms).max().unwrap();
        assert!(
            (longest as i64 - 1000).abs() <= 120,
            "longest window was {longest} ms"
        );
    }

    #[test]
    fn short_gaps_are_ignored() {
        let rate = VAD_SAMPLE_RATE;
        let mut samples = tone(0.5, rate);
        samples.extend(std::iter::repeat(0.0).take((rate / 10) as usize)); // 100 ms
        samples.extend(tone(0.5, rate));

        let windows = detect_silence_windows(&DecodedAudio {
            samples,
            sample_rate: rate,
        });
        assert!(windows.iter().all(|w| w.duration_ms >= MIN_SILENCE_MS));
    }

    #[test]
    fn empty_audio_yields_no_windows() {
        let windows = detect_silence_windows(&DecodedAudio {
            samples: Vec::new(),
            sample_rate: VAD_SAMPLE_RATE,
        });
        assert!(windows.is_empty());
    }

    #[test]
    fn trailing_silence_closes_a_window() {
        let rate = VAD_SAMPLE_RATE;
        let mut samples = tone(0.5, rate);
        samples.extend(std::iter::repeat(0.0).take(rate as usize));

        let windows = detect_silence_windows(&DecodedAudio {
            samples,
            sample_rate: rate,
        });
        assert!(!windows.is_empty());
        let last = windows.last().unwrap();
        assert!(last.duration_ms >= MIN_SILENCE_MS);
    }
}
