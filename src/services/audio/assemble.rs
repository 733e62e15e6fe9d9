//! ffmpeg-backed audio assembly: concatenation, crossfade folding, silence
//! clip generation and loudness normalization.
//!
//! Every invocation is a bounded subprocess call; a non-zero exit is fatal
//! and carries ffmpeg's stderr. Intermediate files live in scoped temp
//! directories that are removed on all exit paths.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use log::{debug, info};
use tokio::process::Command;
use tokio::time::timeout;

use crate::errors::{AppError, AppResult};

/// Upper bound for a single ffmpeg run.
const FFMPEG_TIMEOUT: Duration = Duration::from_secs(600);

/// Sample layout used for generated silence clips. Mono at 44.1 kHz to
/// match single-voice narration output.
const SILENCE_SOURCE: &str = "anullsrc=r=44100:cl=mono";

fn ffmpeg_path() -> AppResult<PathBuf> {
    which::which("ffmpeg")
        .map_err(|_| AppError::AudioProcessing("ffmpeg executable not found on PATH".to_string()))
}

/// Encoder arguments for the target container, keyed by file extension.
pub fn codec_args_for_format(extension: &str) -> Vec<&'static str> {
    match extension.to_lowercase().as_str() {
        "mp3" => vec!["-c:a", "libmp3lame", "-q:a", "2"],
        "wav" | "wave" => vec!["-c:a", "pcm_s16le"],
        "flac" => vec!["-c:a", "flac"],
        "aac" | "m4a" => vec!["-c:a", "aac", "-b:a", "256k"],
        _ => Vec::new(),
    }
}

async fn run_ffmpeg(args: &[String]) -> AppResult<()> {
    let ffmpeg = ffmpeg_path()?;
    debug!("Running ffmpeg {}", args.join(" "));

    let mut command = Command::new(ffmpeg);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let child = command
        .spawn()
        .map_err(|e| AppError::AudioProcessing(format!("Failed to start ffmpeg: {e}")))?;

    let output = match timeout(FFMPEG_TIMEOUT, child.wait_with_output()).await {
        Ok(result) => {
            result.map_err(|e| AppError::AudioProcessing(format!("ffmpeg wait failed: {e}")))?
        }
        Err(_) => {
            return Err(AppError::Timeout(format!(
                "ffmpeg did not finish within {} s",
                FFMPEG_TIMEOUT.as_secs()
            )));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::AudioProcessing(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}

fn escape_concat_entry(path: &Path) -> String {
    // The concat demuxer expects single-quoted paths with embedded quotes
    // closed, escaped and reopened.
    let rendered = path.to_string_lossy().replace('\'', r"'\''");
    format!("file '{rendered}'\n")
}

/// Concatenate an ordered list of audio files into `output`.
///
/// A single input is copied byte for byte. Zero crossfade uses the concat
/// demuxer; a positive crossfade folds the inputs pairwise with an
/// equal-power `acrossfade`, re-encoding per the codec table.
pub async fn concat_audio_files(
    inputs: &[PathBuf],
    output: &Path,
    extension: &str,
    crossfade_seconds: f64,
) -> AppResult<()> {
    if inputs.is_empty() {
        return Err(AppError::Validation(
            "No audio segments available for stitching.".to_string(),
        ));
    }

    if inputs.len() == 1 {
        std::fs::copy(&inputs[0], output)?;
        return Ok(());
    }

    if crossfade_seconds <= 0.0 {
        return concat_with_demuxer(inputs, output, extension).await;
    }

    concat_with_crossfade(inputs, output, extension, crossfade_seconds).await
}

async fn concat_with_demuxer(inputs: &[PathBuf], output: &Path, extension: &str) -> AppResult<()> {
    let mut list = String::new();
    for path in inputs {
        list.push_str(&escape_concat_entry(path));
    }

    let workspace = tempfile::Builder::new().prefix("narravox_concat_").tempdir()?;
    let list_path = workspace.path().join("inputs.txt");
    std::fs::write(&list_path, list)?;

    let mut args: Vec<String> = vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list_path.to_string_lossy().into_owned(),
    ];
    args.extend(codec_args_for_format(extension).iter().map(|s| s.to_string()));
    args.push(output.to_string_lossy().into_owned());

    run_ffmpeg(&args).await
}

async fn concat_with_crossfade(
    inputs: &[PathBuf],
    output: &Path,
    extension: &str,
    crossfade_seconds: f64,
) -> AppResult<()> {
    let workspace = tempfile::Builder::new().prefix("narravox_xfade_").tempdir()?;
    let codec_args = codec_args_for_format(extension);

    let mut current: PathBuf = inputs[0].clone();
    for (index, next) in inputs.iter().skip(1).enumerate() {
        let folded = workspace.path().join(format!("xf_{index}.{extension}"));
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-i".into(),
            current.to_string_lossy().into_owned(),
            "-i".into(),
            next.to_string_lossy().into_owned(),
            "-filter_complex".into(),
            format!("[0:a][1:a]acrossfade=d={crossfade_seconds}:curve1=tri:curve2=tri"),
        ];
        args.extend(codec_args.iter().map(|s| s.to_string()));
        args.push(folded.to_string_lossy().into_owned());

        run_ffmpeg(&args).await?;
        current = folded;
    }

    std::fs::copy(&current, output)?;
    info!(
        "Crossfaded {} inputs into {}",
        inputs.len(),
        output.display()
    );
    Ok(())
}

/// Generate a silent clip of exactly `duration_seconds` in the target codec.
pub async fn create_silence_clip(
    duration_seconds: f64,
    output: &Path,
    extension: &str,
) -> AppResult<()> {
    if duration_seconds <= 0.0 {
        return Ok(());
    }

    let mut args: Vec<String> = vec![
        "-y".into(),
        "-f".into(),
        "lavfi".into(),
        "-i".into(),
        SILENCE_SOURCE.into(),
        "-t".into(),
        format!("{duration_seconds}"),
    ];
    args.extend(codec_args_for_format(extension).iter().map(|s| s.to_string()));
    args.push(output.to_string_lossy().into_owned());

    run_ffmpeg(&args).await
}

/// Apply a loudness-normalization pass to the file, replacing it in place.
pub async fn normalize_loudness(path: &Path, extension: &str) -> AppResult<()> {
    let workspace = tempfile::Builder::new().prefix("narravox_norm_").tempdir()?;
    let normalized = workspace.path().join(format!("norm.{extension}"));

    let mut args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        path.to_string_lossy().into_owned(),
        "-af".into(),
        "loudnorm".into(),
    ];
    args.extend(codec_args_for_format(extension).iter().map(|s| s.to_string()));
    args.push(normalized.to_string_lossy().into_owned());

    run_ffmpeg(&args).await?;
    std::fs::copy(&normalized, path)?;
    Ok(())
}
