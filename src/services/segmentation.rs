//! Segmentation engine: deciding the ordered narratable units of a scene
//! and the pause that should follow each of them.
//!
//! The deterministic sentence plan is an explicit character scan
//! (accumulate until a terminator), not a backtracking regex; only the
//! inline pause annotation itself is matched with a regex. An assisted
//! plan from the language-model collaborator is accepted only when it
//! preserves the narrated text exactly.

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{AppError, AppResult};
use crate::models::{ClauseRenderSpec, SegmentPausePlan};

/// Pause inserted after a sentence-terminal mark when no annotation says
/// otherwise.
pub const DEFAULT_PAUSE_SECONDS: f64 = 1.5;
/// Pause inserted after a comma when clause pauses are enforced.
pub const COMMA_PAUSE_SECONDS: f64 = 0.5;

/// Characters that close a sentence. The danda terminates Devanagari text.
pub const SENTENCE_ENDINGS: [char; 4] = ['.', '?', '!', '।'];

/// Inline pause annotation: optional emphasis/parenthesis wrapping around a
/// number and a seconds label, in either order ("(3 seconds)", "*2s*",
/// "(sec 1.5)").
static PAUSE_ANNOTATION_RE: Lazy<Regex> = Lazy::new(|| {
    let label = r"(?:sec(?:onds?)?|secs?|s)";
    let pattern = format!(
        r"(?i)\*?\(?\s*(?:(?P<pause>\d+(?:\.\d+)?)\s*{label}\b|{label}\s*(?P<pause_alt>\d+(?:\.\d+)?))\s*\)?\*?"
    );
    Regex::new(&pattern).expect("pause annotation pattern must compile")
});

pub fn contains_pause_annotation(text: &str) -> bool {
    PAUSE_ANNOTATION_RE.is_match(text)
}

/// Remove every inline pause annotation from the text.
pub fn strip_pause_markers(text: &str) -> String {
    PAUSE_ANNOTATION_RE.replace_all(text, "").to_string()
}

fn first_annotation_value(text: &str) -> Option<f64> {
    let captures = PAUSE_ANNOTATION_RE.captures(text)?;
    let value = captures
        .name("pause")
        .or_else(|| captures.name("pause_alt"))?;
    value.as_str().parse::<f64>().ok()
}

/// Collapse whitespace runs and pull terminal punctuation back against the
/// preceding word, so that stripping "(3 seconds)" out of
/// "Relax now (3 seconds)." leaves "Relax now.".
fn tidy_unit_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut result = String::with_capacity(collapsed.len());
    for ch in collapsed.chars() {
        if SENTENCE_ENDINGS.contains(&ch) || ch == ',' {
            while result.ends_with(' ') {
                result.pop();
            }
        }
        result.push(ch);
    }
    result
}

fn ends_with_sentence_terminal(text: &str) -> bool {
    text.chars()
        .last()
        .map(|c| SENTENCE_ENDINGS.contains(&c))
        .unwrap_or(false)
}

/// Consume an annotation sitting right after a closed sentence (past any
/// whitespace). Returns the number of bytes consumed from `rest`.
fn take_trailing_annotation(rest: &str) -> usize {
    let skipped = rest.len() - rest.trim_start().len();
    let candidate = &rest[skipped..];
    match PAUSE_ANNOTATION_RE.find(candidate) {
        Some(m) if m.start() == 0 => skipped + m.end(),
        _ => 0,
    }
}

/// Build the deterministic sentence plan for a scene: scan the text
/// character by character, closing a unit at every sentence terminator.
/// Annotated units take the annotated pause; otherwise terminal-punctuated
/// units take the default pause and bare remainders take none. An
/// annotation-only remainder applies its pause to the last unit.
pub fn fallback_sentence_plan(scene_text: &str) -> AppResult<Vec<SegmentPausePlan>> {
    let mut segments: Vec<SegmentPausePlan> = Vec::new();
    let mut raw_units: Vec<String> = Vec::new();

    let mut buffer = String::new();
    let mut cursor = 0usize;
    let mut chars = scene_text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        buffer.push(ch);
        cursor = idx + ch.len_utf8();
        if SENTENCE_ENDINGS.contains(&ch) {
            // A pause annotation directly after the terminator belongs to
            // this unit; pull it into the buffer before closing.
            let rest = &scene_text[cursor..];
            let consumed = take_trailing_annotation(rest);
            if consumed > 0 {
                buffer.push_str(&rest[..consumed]);
                cursor += consumed;
                while let Some(&(next_idx, _)) = chars.peek() {
                    if next_idx < cursor {
                        chars.next();
                    } else {
                        break;
                    }
                }
            }
            raw_units.push(std::mem::take(&mut buffer));
        }
    }
    let remainder = buffer.trim().to_string();

    for raw_unit in &raw_units {
        let annotated_pause = first_annotation_value(raw_unit);
        let cleaned = tidy_unit_text(&strip_pause_markers(raw_unit));
        if cleaned.is_empty() {
            if let (Some(pause), Some(last)) = (annotated_pause, segments.last_mut()) {
                last.pause_after_seconds = pause;
            }
            continue;
        }
        let pause = match annotated_pause {
            Some(value) => value,
            None if ends_with_sentence_terminal(&cleaned) => DEFAULT_PAUSE_SECONDS,
            None => 0.0,
        };
        segments.push(SegmentPausePlan {
            text: cleaned,
            pause_after_seconds: pause,
        });
    }

    if !remainder.is_empty() {
        let annotated_pause = first_annotation_value(&remainder);
        let cleaned = tidy_unit_text(&strip_pause_markers(&remainder));
        if !cleaned.is_empty() {
            let pause = match annotated_pause {
                Some(value) => value,
                None if ends_with_sentence_terminal(&cleaned) => DEFAULT_PAUSE_SECONDS,
                None => 0.0,
            };
            segments.push(SegmentPausePlan {
                text: cleaned,
                pause_after_seconds: pause,
            });
        } else if let (Some(pause), Some(last)) = (annotated_pause, segments.last_mut()) {
            // The remainder was only a pause marker; it belongs to the
            // preceding unit.
            last.pause_after_seconds = pause;
        }
    }

    if segments.is_empty() {
        return Err(AppError::Validation(
            "No sentences detected within scene text.".to_string(),
        ));
    }

    Ok(segments)
}

/// Concatenated unit text with whitespace, markup and zero-width characters
/// removed. Two plans narrate the same words iff their normalized
/// concatenations are byte-identical.
pub fn normalized_concat(segments: &[SegmentPausePlan]) -> String {
    let combined: String = segments.iter().map(|s| s.text.trim()).collect();
    combined
        .chars()
        .filter(|c| {
            !c.is_whitespace()
                && !matches!(c, '*' | '_' | '`' | '~' | '\u{200b}' | '\u{200c}' | '\u{200d}')
        })
        .collect()
}

/// Accept an assisted plan only when it preserves the narrated content of
/// the expected plan and carries no negative pause; otherwise return the
/// expected plan unchanged.
pub fn validate_agent_plan(
    expected: Vec<SegmentPausePlan>,
    candidate: Vec<SegmentPausePlan>,
    scene_name: &str,
) -> Vec<SegmentPausePlan> {
    if candidate.is_empty() {
        warn!("Assisted segmentation produced an empty plan for scene '{scene_name}'");
        return expected;
    }

    if normalized_concat(&expected) != normalized_concat(&candidate) {
        warn!("Assisted segmentation altered text content for scene '{scene_name}'; reverting");
        return expected;
    }

    for (index, segment) in candidate.iter().enumerate() {
        if segment.pause_after_seconds < 0.0 {
            warn!(
                "Negative pause in assisted plan for scene '{scene_name}' at index {index}; reverting"
            );
            return expected;
        }
    }

    if expected.len() != candidate.len() {
        debug!(
            "Assisted plan adjusted unit count for scene '{scene_name}' ({} -> {})",
            expected.len(),
            candidate.len()
        );
    }

    candidate
}

/// Punctuation that closes a clause, with its default trailing pause.
fn clause_pause_for(punctuation: Option<char>) -> f64 {
    match punctuation {
        Some(',') => COMMA_PAUSE_SECONDS,
        Some(c) if SENTENCE_ENDINGS.contains(&c) => DEFAULT_PAUSE_SECONDS,
        _ => 0.0,
    }
}

fn split_into_clauses(text: &str) -> Vec<(String, Option<char>)> {
    let mut clauses = Vec::new();
    let mut buffer = String::new();
    for ch in text.chars() {
        buffer.push(ch);
        if ch == ',' || SENTENCE_ENDINGS.contains(&ch) {
            let clause = buffer.trim().to_string();
            if !clause.is_empty() {
                clauses.push((clause, Some(ch)));
            }
            buffer.clear();
        }
    }
    let trailing = buffer.trim().to_string();
    if !trailing.is_empty() {
        clauses.push((trailing, None));
    }
    clauses
}

/// Expand one unit into renderable clauses. Intermediate clauses take the
/// punctuation default; the final clause carries the unit's target pause.
/// With comma pauses disabled the unit renders as a single clause.
pub fn clause_specs_for_segment(
    segment: &SegmentPausePlan,
    enforce_comma_pause: bool,
) -> Vec<ClauseRenderSpec> {
    let text = segment.text.trim();
    if text.is_empty() {
        if segment.pause_after_seconds > 0.0 {
            return vec![ClauseRenderSpec::pause_only(segment.pause_after_seconds)];
        }
        return Vec::new();
    }

    if !enforce_comma_pause {
        return vec![ClauseRenderSpec::spoken(text, segment.pause_after_seconds)];
    }

    let clauses = split_into_clauses(text);
    if clauses.is_empty() {
        return vec![ClauseRenderSpec::spoken(text, segment.pause_after_seconds)];
    }

    let last = clauses.len() - 1;
    clauses
        .into_iter()
        .enumerate()
        .map(|(index, (clause, punctuation))| {
            let pause = if index == last {
                segment.pause_after_seconds
            } else {
                clause_pause_for(punctuation)
            };
            ClauseRenderSpec::spoken(clause, pause)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(text: &str) -> Vec<SegmentPausePlan> {
        fallback_sentence_plan(text).unwrap()
    }

    #[test]
    fn two_sentence_scene_gets_default_pauses() {
        let segments = plan("Breathe in deeply. Hold for a moment.");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Breathe in deeply.");
        assert_eq!(segments[0].pause_after_seconds, DEFAULT_PAUSE_SECONDS);
        assert_eq!(segments[1].text, "Hold for a moment.");
        assert_eq!(segments[1].pause_after_seconds, DEFAULT_PAUSE_SECONDS);
    }

    #[test]
    fn explicit_annotation_overrides_default_and_is_stripped() {
        let segments = plan("Relax now (3 seconds). Continue.");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Relax now.");
        assert_eq!(segments[0].pause_after_seconds, 3.0);
        assert_eq!(segments[1].text, "Continue.");
        assert_eq!(segments[1].pause_after_seconds, DEFAULT_PAUSE_SECONDS);
    }

    #[test]
    fn annotation_after_terminator_belongs_to_the_sentence() {
        let segments = plan("Settle in. (2.5 sec) Now begin.");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Settle in.");
        assert_eq!(segments[0].pause_after_seconds, 2.5);
        assert_eq!(segments[1].text, "Now begin.");
    }

    #[test]
    fn annotation_only_remainder_applies_to_last_unit() {
        let segments = plan("Rest your eyes. (4 seconds)");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "Rest your eyes.");
        assert_eq!(segments[0].pause_after_seconds, 4.0);
    }

    #[test]
    fn unterminated_remainder_gets_no_pause() {
        let segments = plan("First part ends. and then it trails off");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].text, "and then it trails off");
        assert_eq!(segments[1].pause_after_seconds, 0.0);
    }

    #[test]
    fn label_before_number_is_recognized() {
        let segments = plan("Hold still (sec 2). Done.");
        assert_eq!(segments[0].pause_after_seconds, 2.0);
        assert_eq!(segments[0].text, "Hold still.");
    }

    #[test]
    fn annotation_only_text_is_rejected() {
        let err = fallback_sentence_plan("(3 seconds)").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn all_fallback_pauses_are_non_negative() {
        let segments = plan("One. Two (0 sec). Three! Four?");
        assert!(segments.iter().all(|s| s.pause_after_seconds >= 0.0));
    }

    #[test]
    fn content_preservation_accepts_reboundaried_plan() {
        let expected = plan("Breathe in deeply. Hold for a moment.");
        let candidate = vec![
            SegmentPausePlan {
                text: "Breathe in deeply. Hold".to_string(),
                pause_after_seconds: 0.4,
            },
            SegmentPausePlan {
                text: "for a moment.".to_string(),
                pause_after_seconds: 2.0,
            },
        ];
        let accepted = validate_agent_plan(expected, candidate.clone(), "scene");
        assert_eq!(accepted, candidate);
    }

    #[test]
    fn content_preservation_rejects_altered_words() {
        let expected = plan("Breathe in deeply. Hold for a moment.");
        let candidate = vec![SegmentPausePlan {
            text: "Breathe in very deeply. Hold for a moment.".to_string(),
            pause_after_seconds: 1.0,
        }];
        let accepted = validate_agent_plan(expected.clone(), candidate, "scene");
        assert_eq!(accepted, expected);
    }

    #[test]
    fn markup_differences_do_not_fail_preservation() {
        let expected = plan("Breathe in deeply.");
        let candidate = vec![SegmentPausePlan {
            text: "*Breathe in deeply.*".to_string(),
            pause_after_seconds: 1.0,
        }];
        let accepted = validate_agent_plan(expected, candidate.clone(), "scene");
        assert_eq!(accepted, candidate);
    }

    #[test]
    fn negative_pause_rejects_candidate() {
        let expected = plan("Breathe in deeply.");
        let candidate = vec![SegmentPausePlan {
            text: "Breathe in deeply.".to_string(),
            pause_after_seconds: -0.5,
        }];
        let accepted = validate_agent_plan(expected.clone(), candidate, "scene");
        assert_eq!(accepted, expected);
    }

    #[test]
    fn clause_split_assigns_punctuation_pauses() {
        let segment = SegmentPausePlan {
            text: "Breathe in, hold, and release.".to_string(),
            pause_after_seconds: 2.0,
        };
        let specs = clause_specs_for_segment(&segment, true);
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].text.as_deref(), Some("Breathe in,"));
        assert_eq!(specs[0].pause_seconds, COMMA_PAUSE_SECONDS);
        assert_eq!(specs[1].pause_seconds, COMMA_PAUSE_SECONDS);
        // The unit's own target pause lands on the final clause.
        assert_eq!(specs[2].text.as_deref(), Some("and release."));
        assert_eq!(specs[2].pause_seconds, 2.0);
    }

    #[test]
    fn clause_split_disabled_yields_single_clause() {
        let segment = SegmentPausePlan {
            text: "Breathe in, hold, and release.".to_string(),
            pause_after_seconds: 2.0,
        };
        let specs = clause_specs_for_segment(&segment, false);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].pause_seconds, 2.0);
    }
}
