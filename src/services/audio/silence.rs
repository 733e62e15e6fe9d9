//! Trailing-silence measurement via energy thresholding.
//!
//! A chunk counts as silent when its loudness sits at or below the whole
//! clip's dBFS minus a fixed padding. The scan walks backwards from the
//! end in small steps and stops at the first louder chunk.

use super::decode::DecodedAudio;

/// How far below the clip's overall loudness a chunk must stay to count as
/// silence.
pub const SILENCE_DB_PADDING: f64 = 16.0;
/// Step of the backward scan.
pub const SILENCE_SCAN_STEP_MS: u64 = 10;

/// Loudness of a sample block relative to full scale. Digital silence is
/// negative infinity.
pub fn dbfs(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return f64::NEG_INFINITY;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_squares / samples.len() as f64).sqrt();
    if rms <= 0.0 {
        return f64::NEG_INFINITY;
    }
    20.0 * rms.log10()
}

/// Measure the trailing silence of a clip in milliseconds.
pub fn trailing_silence_ms(audio: &DecodedAudio) -> u64 {
    if audio.samples.is_empty() || audio.sample_rate == 0 {
        return 0;
    }

    let clip_dbfs = dbfs(&audio.samples);
    let threshold = clip_dbfs - SILENCE_DB_PADDING;
    let step_samples =
        ((audio.sample_rate as u64 * SILENCE_SCAN_STEP_MS) / 1000).max(1) as usize;

    let mut trailing_samples = 0usize;
    let mut cursor = audio.samples.len();

    while cursor > 0 {
        let start = cursor.saturating_sub(step_samples);
        let chunk = &audio.samples[start..cursor];
        if dbfs(chunk) > threshold {
            break;
        }
        trailing_samples += cursor - start;
        cursor = start;
    }

    (trailing_samples as u64 * 1000) / audio.sample_rate as u64
}

/// Trailing silence in seconds, as used by the assembler bookkeeping.
pub fn trailing_silence_seconds(audio: &DecodedAudio) -> f64 {
    trailing_silence_ms(audio) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;

    fn tone(seconds: f64) -> Vec<f32> {
        let count = (seconds * RATE as f64) as usize;
        (0..count)
            .map(|i| {
                let t = i as f32 / RATE as f32;
                (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.5
            })
            .collect()
    }

    fn with_trailing_silence(speech_seconds: f64, silence_seconds: f64) -> DecodedAudio {
        let mut samples = tone(speech_seconds);
        samples.extend(std::iter::repeat(0.0).take((silence_seconds * RATE as f64) as usize));
        DecodedAudio {
            samples,
            sample_rate: RATE,
        }
    }

    #[test]
    fn measures_trailing_silence_within_tolerance() {
        let audio = with_trailing_silence(1.0, 0.8);
        let measured = trailing_silence_ms(&audio);
        assert!(
            (measured as i64 - 800).abs() <= 60,
            "measured {measured} ms, expected ~800 ms"
        );
    }

    #[test]
    fn no_silence_on_a_pure_tone() {
        let audio = DecodedAudio {
            samples: tone(0.5),
            sample_rate: RATE,
        };
        assert!(trailing_silence_ms(&audio) <= 20);
    }

    #[test]
    fn all_silent_clip_is_all_trailing_silence() {
        let audio = DecodedAudio {
            samples: vec![0.0; RATE as usize],
            sample_rate: RATE,
        };
        let measured = trailing_silence_ms(&audio);
        assert!((measured as i64 - 1000).abs() <= 20);
    }

    #[test]
    fn empty_clip_has_no_trailing_silence() {
        let audio = DecodedAudio {
            samples: Vec::new(),
            sample_rate: RATE,
        };
        assert_eq!(trailing_silence_ms(&audio), 0);
    }

    #[test]
    fn dbfs_of_full_scale_square_is_zero() {
        let samples = vec![1.0f32; 1024];
        assert!(dbfs(&samples).abs() < 1e-6);
    }
}
