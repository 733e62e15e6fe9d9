//! Decoding encoded audio into mono PCM samples.
//!
//! WAV goes through hound directly; everything else (mp3, aac, m4a, flac)
//! through symphonia's probe. Multi-channel audio is mixed down to mono.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::errors::{AppError, AppResult};

/// Mono PCM audio with its sample rate.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode an encoded audio buffer into mono PCM. The extension hint helps
/// the probe pick the right demuxer but is not required.
pub fn decode_bytes(data: &[u8], extension_hint: Option<&str>) -> AppResult<DecodedAudio> {
    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint {
        hint.with_extension(ext);
    }

    let format_opts = FormatOptions {
        enable_gapless: false,
        ..Default::default()
    };

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &MetadataOptions::default())
        .map_err(|e| AppError::AudioProcessing(format!("Unrecognised audio format: {e}")))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AppError::AudioProcessing("No audio track found".to_string()))?;

    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(44_100);
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1)
        .max(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AppError::AudioProcessing(format!("Failed to create decoder: {e}")))?;

    let mut samples: Vec<f32> = Vec::new();
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }
        let Ok(decoded) = decoder.decode(&packet) else {
            // Skip the damaged packet and keep decoding.
            continue;
        };
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buf.copy_interleaved_ref(decoded);
        if channels > 1 {
            for frame in buf.samples().chunks(channels) {
                samples.push(frame.iter().sum::<f32>() / channels as f32);
            }
        } else {
            samples.extend_from_slice(buf.samples());
        }
    }

    debug!(
        "Decoded {} mono samples at {} Hz",
        samples.len(),
        sample_rate
    );
    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Decode an audio file into mono PCM.
pub fn decode_file(path: &Path) -> AppResult<DecodedAudio> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    if extension.as_deref() == Some("wav") {
        return decode_wav_file(path);
    }

    let data = std::fs::read(path)?;
    decode_bytes(&data, extension.as_deref())
}

fn decode_wav_file(path: &Path) -> AppResult<DecodedAudio> {
    let file = File::open(path)?;
    let mut reader = WavReader::new(file)
        .map_err(|e| AppError::AudioProcessing(format!("Failed to read WAV: {e}")))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<Result<_, _>>()
            .map_err(|e| AppError::AudioProcessing(format!("WAV decode error: {e}")))?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8_388_608.0))
            .collect::<Result<_, _>>()
            .map_err(|e| AppError::AudioProcessing(format!("WAV decode error: {e}")))?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2_147_483_648.0))
            .collect::<Result<_, _>>()
            .map_err(|e| AppError::AudioProcessing(format!("WAV decode error: {e}")))?,
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| AppError::AudioProcessing(format!("WAV decode error: {e}")))?,
        (format, bits) => {
            return Err(AppError::AudioProcessing(format!(
                "Unsupported WAV format: {format:?}, {bits} bit"
            )));
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels > 1 {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        interleaved
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Write mono PCM samples to a 16-bit WAV file.
pub fn encode_wav(samples: &[f32], sample_rate: u32, path: &Path) -> AppResult<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)
        .map_err(|e| AppError::AudioProcessing(format!("Failed to create WAV: {e}")))?;
    for &sample in samples {
        let clamped = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        writer
            .write_sample(clamped)
            .map_err(|e| AppError::AudioProcessing(format!("Failed to write WAV: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| AppError::AudioProcessing(format!("Failed to finalize WAV: {e}")))?;
    Ok(())
}
