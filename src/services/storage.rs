//! Generated-audio storage: enumerating and clearing persisted artifacts.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::config::Settings;
use crate::errors::{AppError, AppResult};
use crate::utils::format_file_size;

const AUDIO_EXTENSIONS: [&str; 5] = ["mp3", "wav", "m4a", "aac", "flac"];
const MANIFEST_PREFIX: &str = "longform_manifest";

#[derive(Debug, Serialize)]
pub struct StoredAudioFile {
    pub file_name: String,
    pub size_bytes: u64,
    pub size_readable: String,
    pub modified_at: String,
    pub download_url: String,
}

#[derive(Debug, Serialize)]
pub struct StorageReport {
    pub count: usize,
    pub files: Vec<StoredAudioFile>,
    pub manifest_count: usize,
    pub manifests: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearReport {
    pub deleted: usize,
    pub deleted_files: Vec<String>,
    pub removed_manifests: Vec<String>,
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn list_audio_files(output_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(output_dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_audio_file(path))
        .collect();
    // Newest first.
    files.sort_by_key(|path| {
        std::cmp::Reverse(
            std::fs::metadata(path)
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        )
    });
    files
}

fn list_manifests(output_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(output_dir) else {
        return Vec::new();
    };
    let mut manifests: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some("json")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(MANIFEST_PREFIX))
                    .unwrap_or(false)
        })
        .collect();
    manifests.sort();
    manifests
}

/// Describe the contents of the generated-audio directory.
pub fn describe_output_dir(settings: &Settings) -> StorageReport {
    let files: Vec<StoredAudioFile> = list_audio_files(&settings.output_dir)
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            let metadata = std::fs::metadata(&path).ok()?;
            let modified: DateTime<Utc> = metadata.modified().ok()?.into();
            Some(StoredAudioFile {
                download_url: format!("/generated_audio/{name}"),
                size_bytes: metadata.len(),
                size_readable: format_file_size(metadata.len()),
                modified_at: modified.to_rfc3339(),
                file_name: name,
            })
        })
        .collect();

    let manifests: Vec<String> = list_manifests(&settings.output_dir)
        .into_iter()
        .filter_map(|path| Some(path.file_name()?.to_str()?.to_string()))
        .collect();

    StorageReport {
        count: files.len(),
        files,
        manifest_count: manifests.len(),
        manifests,
    }
}

/// Delete generated audio files and manifests from disk.
pub fn clear_output_dir(settings: &Settings) -> AppResult<ClearReport> {
    info!("Clearing generated audio storage");
    let mut deleted_files = Vec::new();
    let mut removed_manifests = Vec::new();
    let mut errors = Vec::new();

    for path in list_audio_files(&settings.output_dir) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match std::fs::remove_file(&path) {
            Ok(()) => deleted_files.push(name),
            Err(error) => {
                warn!("Failed to delete audio file {name}: {error}");
                errors.push(format!("Failed to delete {name}: {error}"));
            }
        }
    }

    for path in list_manifests(&settings.output_dir) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match std::fs::remove_file(&path) {
            Ok(()) => removed_manifests.push(name),
            Err(error) => {
                warn!("Failed to delete manifest {name}: {error}");
                errors.push(format!("Failed to delete {name}: {error}"));
            }
        }
    }

    if !errors.is_empty() {
        return Err(AppError::Unknown(errors.join("; ")));
    }

    Ok(ClearReport {
        deleted: deleted_files.len(),
        deleted_files,
        removed_manifests,
    })
}
