//! Script parsing: splitting a raw multi-scene script into ordered scenes.
//!
//! A line is treated as a scene header when it is non-empty, carries no
//! inline pause annotation and does not end in sentence-terminal
//! punctuation. Known limitation: a long unterminated sentence sitting on
//! its own line satisfies the same test and is classified as a header, so
//! narration lines should end with sentence punctuation.

use log::debug;

use crate::errors::{AppError, AppResult};
use crate::models::SceneBlock;
use crate::services::segmentation::{SENTENCE_ENDINGS, contains_pause_annotation};

fn is_scene_header(line: &str) -> bool {
    let stripped = line.trim();
    if stripped.is_empty() {
        return false;
    }
    if contains_pause_annotation(stripped) {
        return false;
    }
    match stripped.chars().last() {
        Some(last) => !SENTENCE_ENDINGS.contains(&last),
        None => false,
    }
}

/// Split a script into ordered scene blocks. Content appearing before any
/// header is collected under a synthetic `Scene {n}` header.
pub fn parse_script(script: &str) -> AppResult<Vec<SceneBlock>> {
    let mut scenes: Vec<SceneBlock> = Vec::new();
    let mut current_name: Option<String> = None;
    let mut current_lines: Vec<String> = Vec::new();
    let mut fallback_index = 1usize;

    for raw_line in script.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if is_scene_header(line) {
            if let Some(name) = current_name.take() {
                if !current_lines.is_empty() {
                    scenes.push(SceneBlock {
                        name,
                        lines: std::mem::take(&mut current_lines),
                    });
                }
            }
            current_lines.clear();
            current_name = Some(line.to_string());
        } else {
            if current_name.is_none() {
                current_name = Some(format!("Scene {}", fallback_index));
                fallback_index += 1;
            }
            current_lines.push(line.to_string());
        }
    }

    if let Some(name) = current_name {
        if !current_lines.is_empty() {
            scenes.push(SceneBlock {
                name,
                lines: current_lines,
            });
        }
    }

    if scenes.is_empty() {
        return Err(AppError::Validation(
            "Unable to identify any scenes in the script.".to_string(),
        ));
    }

    debug!("Parsed {} scene(s) from script", scenes.len());
    Ok(scenes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "Morning Calm\nBreathe in deeply. Hold for a moment.\n\nEvening Wind-down\nRelax your shoulders.\nLet the day go.\n";

    #[test]
    fn splits_scenes_on_headers() {
        let scenes = parse_script(SCRIPT).unwrap();
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].name, "Morning Calm");
        assert_eq!(scenes[0].raw_text(), "Breathe in deeply. Hold for a moment.");
        assert_eq!(scenes[1].name, "Evening Wind-down");
        assert_eq!(
            scenes[1].raw_text(),
            "Relax your shoulders. Let the day go."
        );
    }

    #[test]
    fn synthesizes_header_for_leading_content() {
        let scenes = parse_script("Just start talking now.\nAnd keep going.\n").unwrap();
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].name, "Scene 1");
        assert_eq!(scenes[0].lines.len(), 2);
    }

    #[test]
    fn line_with_pause_annotation_is_not_a_header() {
        // "(2 seconds)" carries a pause annotation, so despite having no
        // terminal punctuation it is narration, not a header.
        let scenes = parse_script("Intro\nPause here (2 seconds)\n").unwrap();
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].name, "Intro");
    }

    #[test]
    fn empty_script_is_rejected() {
        let err = parse_script("\n\n").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn header_only_script_is_rejected() {
        let err = parse_script("A Lonely Header\n").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn parsing_is_idempotent() {
        let first = parse_script(SCRIPT).unwrap();
        let second = parse_script(SCRIPT).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn devanagari_terminator_ends_a_narration_line() {
        let scenes = parse_script("प्रारंभ\nगहरी साँस लें।\n").unwrap();
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].name, "प्रारंभ");
    }
}
