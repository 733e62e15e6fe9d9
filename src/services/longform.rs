//! Long-form orchestration: PARSING → PLANNING → per scene (SYNTHESIZING →
//! MEASURING → [CORRECTING] → ASSEMBLING) → COMBINING → NORMALIZING → DONE.
//!
//! The contract is all-scenes-or-error: a combined narration file with
//! missing scenes is not a valid product, so any fatal failure aborts the
//! whole request. Collaborator hiccups (planning, refinement, measurement,
//! correction) degrade to deterministic behavior instead.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::config::Settings;
use crate::errors::{AppError, AppResult};
use crate::models::{
    ClauseRenderSpec, LongFormAudioPlan, LongformScenesResponse, PlanSegment, SceneBlock,
    SceneProcessingSummary, SegmentPausePlan, StitchingInstructions,
};
use crate::models::longform::AudioFileRef;
use crate::services::agents::NarrationPlanner;
use crate::services::analysis::analyze_scene_audio;
use crate::services::audio::assemble::{
    concat_audio_files, create_silence_clip, normalize_loudness,
};
use crate::services::audio::{decode, silence};
use crate::services::script::parse_script;
use crate::services::segmentation::{
    clause_specs_for_segment, fallback_sentence_plan, strip_pause_markers, validate_agent_plan,
};
use crate::services::splice::{
    apply_pause_adjustments, build_clause_metrics, build_splice_payload, needs_splice_review,
};
use crate::services::synthesis::SpeechSynthesizer;
use crate::services::transcription::Transcriber;
use crate::utils::sanitize_component;

/// Rough speaking rate used for duration estimates in the local plan.
const ESTIMATED_CHARS_PER_SECOND: f64 = 15.0;
/// A pause shortfall below this is absorbed by the clip's own trailing
/// silence instead of a generated clip.
const INSERTION_TOLERANCE_SECONDS: f64 = 0.06;
const FILE_PREFIX: &str = "longform";
const MANIFEST_PREFIX: &str = "longform_manifest";

fn short_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Synthesized clause audio cached for reassembly during correction.
struct ClauseAudio {
    path: Option<PathBuf>,
    trailing_seconds: f64,
}

#[derive(Serialize)]
struct ManifestSegment {
    segment_id: String,
    file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    emotion: Option<String>,
    character_count: usize,
    estimated_duration_seconds: f64,
    pause_after_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    scene_title: Option<String>,
}

#[derive(Serialize)]
struct LongformManifest {
    generated_at: String,
    voice_id: String,
    total_segments: usize,
    total_estimated_duration_seconds: f64,
    segments: Vec<ManifestSegment>,
    combined: AudioFileRef,
    stitching_instructions: StitchingInstructions,
}

/// The long-form pipeline with its collaborators injected at construction.
pub struct LongformPipeline {
    settings: Settings,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    planner: Arc<dyn NarrationPlanner>,
    transcriber: Arc<dyn Transcriber>,
}

impl LongformPipeline {
    pub fn new(
        settings: Settings,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        planner: Arc<dyn NarrationPlanner>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        Self {
            settings,
            synthesizer,
            planner,
            transcriber,
        }
    }

    /// Process a whole multi-scene script into per-scene audio, a combined
    /// file and a manifest. Returns the response payload plus the combined
    /// audio bytes for the multipart body.
    pub async fn process_script(
        &self,
        script: &str,
        voice_override: Option<&str>,
    ) -> AppResult<(LongformScenesResponse, Vec<u8>)> {
        let scenes = parse_script(script)?;
        let plan = self.resolve_plan(&scenes, voice_override).await?;
        let voice_id = plan.voice_id.clone();
        let extension = plan
            .stitching_instructions
            .output_format
            .trim_start_matches('.')
            .to_lowercase();

        std::fs::create_dir_all(&self.settings.output_dir)?;

        let mut summaries: Vec<SceneProcessingSummary> = Vec::new();
        let mut manifest_segments: Vec<ManifestSegment> = Vec::new();
        let mut scene_paths: Vec<PathBuf> = Vec::new();

        for (index, scene) in scenes.iter().enumerate() {
            let plan_segment = &plan.segments[index];
            let outcome = self
                .process_scene(scene, plan_segment, &voice_id, &extension)
                .await
                .map_err(|error| annotate_scene_error(error, &scene.name))?;

            manifest_segments.push(ManifestSegment {
                segment_id: scene.name.clone(),
                file_name: outcome.file_name.clone(),
                emotion: plan_segment.emotion.clone(),
                character_count: plan_segment.character_count,
                estimated_duration_seconds: plan_segment.estimated_duration_seconds,
                pause_after_seconds: outcome
                    .summary
                    .segments
                    .last()
                    .map(|s| s.pause_after_seconds)
                    .unwrap_or(0.0),
                scene_title: plan_segment.title.clone(),
            });
            scene_paths.push(outcome.path.clone());
            summaries.push(outcome.summary);
        }

        if scene_paths.is_empty() {
            return Err(AppError::Validation(
                "No scenes produced audio output.".to_string(),
            ));
        }

        // COMBINING: fold the per-scene files into one master file.
        let combined_name = format!("{FILE_PREFIX}_combined__{}.{extension}", short_suffix());
        let combined_path = self.settings.output_dir.join(&combined_name);
        let crossfade_seconds = plan.stitching_instructions.crossfade_ms as f64 / 1000.0;
        concat_audio_files(&scene_paths, &combined_path, &extension, crossfade_seconds).await?;

        if plan.stitching_instructions.normalize_volume {
            normalize_loudness(&combined_path, &extension).await?;
            info!("Applied loudness normalization to {combined_name}");
        }

        let manifest_name = self
            .write_manifest(&plan, manifest_segments, &combined_name)
            .await?;

        let combined_bytes = std::fs::read(&combined_path)?;
        let response = LongformScenesResponse {
            scenes: summaries,
            combined: AudioFileRef {
                file_name: combined_name.clone(),
                audio_file: format!("/generated_audio/{combined_name}"),
            },
            manifest_file: format!("/generated_audio/{manifest_name}"),
        };

        info!(
            "Long-form synthesis complete: file={} scenes={}",
            combined_name,
            response.scenes.len()
        );
        Ok((response, combined_bytes))
    }

    /// PLANNING: ask the planning collaborator for the synthesis plan and
    /// fall back to a deterministic local plan when it is unavailable or
    /// returns something unusable.
    async fn resolve_plan(
        &self,
        scenes: &[SceneBlock],
        voice_override: Option<&str>,
    ) -> AppResult<LongFormAudioPlan> {
        let mut plan = if self.planner.is_configured() {
            match self.planner.draft_plan(scenes).await {
                Ok(plan) if plan.segments.len() == scenes.len() => plan,
                Ok(plan) => {
                    warn!(
                        "Planning collaborator returned {} segment(s) for {} scene(s); using local plan",
                        plan.segments.len(),
                        scenes.len()
                    );
                    self.default_plan(scenes)
                }
                Err(error) => {
                    warn!("Planning collaborator failed; using local plan: {error}");
                    self.default_plan(scenes)
                }
            }
        } else {
            self.default_plan(scenes)
        };

        // Pin plan entries to the parsed scenes; the collaborator may tag
        // emotion and pacing but never renames or rewords a scene.
        for (segment, scene) in plan.segments.iter_mut().zip(scenes.iter()) {
            segment.segment_id = scene.name.clone();
            segment.text = scene.raw_text();
        }
        plan.reconcile_totals();

        if let Some(voice) = voice_override {
            if !voice.trim().is_empty() {
                plan.voice_id = voice.trim().to_string();
            }
        }
        if plan.voice_id.trim().is_empty() {
            return Err(AppError::Validation(
                "No voice_id available: provide one in the request or configure a default voice."
                    .to_string(),
            ));
        }

        // Explicit pauses and crossfade fight each other at scene joins;
        // pauses win.
        if plan.any_explicit_pause() && plan.stitching_instructions.crossfade_ms != 0 {
            plan.stitching_instructions.crossfade_ms = 0;
            info!("Disabled crossfade to honour explicit scene pauses");
        }

        Ok(plan)
    }

    fn default_plan(&self, scenes: &[SceneBlock]) -> LongFormAudioPlan {
        let segments: Vec<PlanSegment> = scenes
            .iter()
            .map(|scene| {
                let text = scene.raw_text();
                let narrated = strip_pause_markers(&text);
                let character_count = narrated.chars().count();
                PlanSegment {
                    segment_id: scene.name.clone(),
                    text,
                    emotion: None,
                    character_count,
                    estimated_duration_seconds: character_count as f64 / ESTIMATED_CHARS_PER_SECOND,
                    pause_after_seconds: 0.0,
                    enforce_comma_pause: true,
                    title: None,
                }
            })
            .collect();

        let mut plan = LongFormAudioPlan {
            voice_id: self.settings.default_voice_id.clone(),
            segments,
            total_segments: 0,
            total_estimated_duration_seconds: 0.0,
            stitching_instructions: StitchingInstructions::default(),
        };
        plan.reconcile_totals();
        plan
    }

    /// SYNTHESIZING → MEASURING → [CORRECTING] → ASSEMBLING for one scene.
    async fn process_scene(
        &self,
        scene: &SceneBlock,
        plan_segment: &PlanSegment,
        voice_id: &str,
        extension: &str,
    ) -> AppResult<SceneOutcome> {
        let raw_text = scene.raw_text();
        if raw_text.is_empty() {
            return Err(AppError::Validation(format!(
                "Scene '{}' does not contain narratable text.",
                scene.name
            )));
        }

        let fallback_plan = fallback_sentence_plan(&raw_text)?;
        let (mut final_plan, mut plan_source) =
            self.segment_scene(&scene.name, &raw_text, fallback_plan).await;

        // Flatten units into renderable clauses, remembering which clause
        // carries each unit's trailing pause.
        let mut clause_specs: Vec<ClauseRenderSpec> = Vec::new();
        let mut unit_last_clause: Vec<Option<usize>> = Vec::new();
        for unit in &final_plan {
            let specs = clause_specs_for_segment(unit, plan_segment.enforce_comma_pause);
            if specs.is_empty() {
                unit_last_clause.push(None);
                continue;
            }
            clause_specs.extend(specs);
            unit_last_clause.push(Some(clause_specs.len() - 1));
        }
        if clause_specs.is_empty() {
            return Err(AppError::Validation(format!(
                "No narratable clauses generated for scene '{}'.",
                scene.name
            )));
        }

        // SYNTHESIZING: one call per spoken clause, cached on disk so a
        // correction pass can reassemble without re-synthesizing.
        let workspace = tempfile::Builder::new()
            .prefix("narravox_clause_")
            .tempdir()?;
        let mut clause_audio: Vec<ClauseAudio> = Vec::with_capacity(clause_specs.len());
        for (clause_index, spec) in clause_specs.iter().enumerate() {
            match &spec.text {
                Some(text) => {
                    let audio = self.synthesizer.synthesize(text, voice_id).await?;
                    let path = workspace
                        .path()
                        .join(format!("clause_{clause_index:03}.{extension}"));
                    std::fs::write(&path, &audio)?;
                    let trailing_seconds = match decode::decode_bytes(&audio, Some(extension)) {
                        Ok(decoded) => silence::trailing_silence_seconds(&decoded),
                        Err(error) => {
                            warn!(
                                "Could not measure trailing silence for clause {clause_index} of '{}': {error}",
                                scene.name
                            );
                            0.0
                        }
                    };
                    clause_audio.push(ClauseAudio {
                        path: Some(path),
                        trailing_seconds,
                    });
                }
                None => clause_audio.push(ClauseAudio {
                    path: None,
                    trailing_seconds: 0.0,
                }),
            }
        }

        // ASSEMBLING (first pass).
        let file_name = format!(
            "{FILE_PREFIX}_{}__{}.{extension}",
            sanitize_component(&scene.name, "scene"),
            short_suffix()
        );
        let scene_path = self.settings.output_dir.join(&file_name);
        let observed = self
            .assemble_clause_sequence(
                &clause_specs,
                &clause_audio,
                workspace.path(),
                extension,
                &scene_path,
                &scene.name,
            )
            .await?;
        let mut scene_bytes = std::fs::read(&scene_path)?;

        // MEASURING: transcription + VAD over the assembled scene.
        let (spoken_units, spoken_indices) = spoken_view(&clause_specs);
        let mut analysis =
            analyze_scene_audio(self.transcriber.as_ref(), &scene_bytes, &spoken_units).await;
        let mut analysis_opt = (!analysis.is_empty()).then(|| analysis.clone());

        // CORRECTING: a single pass, only with alignment data in hand.
        let metrics =
            build_clause_metrics(&clause_specs, &observed, analysis_opt.as_ref(), &spoken_indices);
        if needs_splice_review(&metrics) && analysis_opt.is_some() && self.planner.is_configured() {
            let payload =
                build_splice_payload(&scene.name, &metrics, analysis_opt.as_ref(), &scene_bytes);
            let adjustments = match self.planner.propose_pause_adjustments(&payload).await {
                Ok(adjustments) => adjustments,
                Err(error) => {
                    warn!("Splice collaborator failed for '{}': {error}", scene.name);
                    Vec::new()
                }
            };

            let (updated_specs, changed) = apply_pause_adjustments(&clause_specs, &adjustments);
            if changed {
                info!(
                    "Applying {} pause correction(s) to scene '{}'",
                    adjustments.len(),
                    scene.name
                );
                clause_specs = updated_specs;
                self.assemble_clause_sequence(
                    &clause_specs,
                    &clause_audio,
                    workspace.path(),
                    extension,
                    &scene_path,
                    &scene.name,
                )
                .await?;
                scene_bytes = std::fs::read(&scene_path)?;

                let (spoken_units, _) = spoken_view(&clause_specs);
                analysis =
                    analyze_scene_audio(self.transcriber.as_ref(), &scene_bytes, &spoken_units)
                        .await;
                analysis_opt = (!analysis.is_empty()).then(|| analysis.clone());

                // Fold corrected trailing pauses back into the unit plan.
                let corrected: Vec<SegmentPausePlan> = final_plan
                    .iter()
                    .zip(unit_last_clause.iter())
                    .map(|(unit, last_clause)| SegmentPausePlan {
                        text: unit.text.clone(),
                        pause_after_seconds: last_clause
                            .and_then(|idx| clause_specs.get(idx))
                            .map(|spec| spec.pause_seconds)
                            .unwrap_or(unit.pause_after_seconds),
                    })
                    .collect();
                final_plan = corrected;
                plan_source = "corrected";
            }
        }

        Ok(SceneOutcome {
            summary: SceneProcessingSummary {
                scene_name: scene.name.clone(),
                segments: final_plan,
                plan_source: plan_source.to_string(),
                audio_file: format!("/generated_audio/{file_name}"),
                timing_analysis: analysis_opt,
            },
            file_name,
            path: scene_path,
        })
    }

    /// Ask the clause collaborator for a refined segmentation; any failure
    /// or content drift keeps the fallback.
    async fn segment_scene(
        &self,
        scene_name: &str,
        scene_text: &str,
        fallback: Vec<SegmentPausePlan>,
    ) -> (Vec<SegmentPausePlan>, &'static str) {
        if !self.planner.is_configured() {
            return (fallback, "fallback");
        }

        let candidate = match self
            .planner
            .refine_segments(scene_name, scene_text, &fallback)
            .await
        {
            Ok(candidate) => candidate,
            Err(error) => {
                warn!("Segmentation collaborator failed for '{scene_name}': {error}");
                return (fallback, "fallback");
            }
        };
        if candidate.is_empty() {
            return (fallback, "fallback");
        }

        let accepted = validate_agent_plan(fallback.clone(), candidate, scene_name);
        if accepted == fallback {
            (accepted, "fallback")
        } else {
            (accepted, "agent")
        }
    }

    /// Lay the clause files out in order, generating silence clips where a
    /// clause's own trailing silence falls short of its target pause, then
    /// concatenate into the scene file. Returns the observed pause per
    /// clause.
    async fn assemble_clause_sequence(
        &self,
        specs: &[ClauseRenderSpec],
        clause_audio: &[ClauseAudio],
        workspace: &std::path::Path,
        extension: &str,
        output: &std::path::Path,
        scene_name: &str,
    ) -> AppResult<Vec<f64>> {
        let mut sequence: Vec<PathBuf> = Vec::new();
        let mut observed: Vec<f64> = Vec::with_capacity(specs.len());

        for (index, spec) in specs.iter().enumerate() {
            let audio = &clause_audio[index];
            let desired = spec.pause_seconds.max(0.0);

            // Shortfalls within the tolerance are left as-is; the clip's
            // own trailing silence already serves as the pause.
            let inserted = match &audio.path {
                Some(path) => {
                    sequence.push(path.clone());
                    let shortfall = desired - audio.trailing_seconds;
                    if shortfall > INSERTION_TOLERANCE_SECONDS {
                        observed.push(desired);
                        shortfall
                    } else {
                        observed.push(audio.trailing_seconds);
                        0.0
                    }
                }
                None => {
                    observed.push(desired);
                    desired
                }
            };

            if inserted > 0.0 {
                let silence_path =
                    workspace.join(format!("pause_{index:03}_{}.{extension}", short_suffix()));
                create_silence_clip(inserted, &silence_path, extension).await?;
                sequence.push(silence_path);
            }
        }

        if sequence.is_empty() {
            return Err(AppError::Validation(format!(
                "No audio produced for scene '{scene_name}'."
            )));
        }

        concat_audio_files(&sequence, output, extension, 0.0).await?;
        Ok(observed)
    }

    async fn write_manifest(
        &self,
        plan: &LongFormAudioPlan,
        segments: Vec<ManifestSegment>,
        combined_name: &str,
    ) -> AppResult<String> {
        let manifest = LongformManifest {
            generated_at: Utc::now().to_rfc3339(),
            voice_id: plan.voice_id.clone(),
            total_segments: plan.total_segments,
            total_estimated_duration_seconds: plan.total_estimated_duration_seconds,
            segments,
            combined: AudioFileRef {
                file_name: combined_name.to_string(),
                audio_file: format!("/generated_audio/{combined_name}"),
            },
            stitching_instructions: plan.stitching_instructions.clone(),
        };

        let manifest_name = format!("{MANIFEST_PREFIX}_{}.json", short_suffix());
        let manifest_path = self.settings.output_dir.join(&manifest_name);
        let rendered = serde_json::to_string_pretty(&manifest)?;
        tokio::fs::write(&manifest_path, rendered).await?;
        Ok(manifest_name)
    }
}

struct SceneOutcome {
    summary: SceneProcessingSummary,
    file_name: String,
    path: PathBuf,
}

/// Spoken clauses as unit plans for the analyzer, plus a map from analyzer
/// position back to clause index.
fn spoken_view(specs: &[ClauseRenderSpec]) -> (Vec<SegmentPausePlan>, Vec<usize>) {
    let mut units = Vec::new();
    let mut indices = Vec::new();
    for (index, spec) in specs.iter().enumerate() {
        if let Some(text) = &spec.text {
            units.push(SegmentPausePlan {
                text: text.clone(),
                pause_after_seconds: spec.pause_seconds,
            });
            indices.push(index);
        }
    }
    (units, indices)
}

fn annotate_scene_error(error: AppError, scene_name: &str) -> AppError {
    match error {
        AppError::Validation(detail) => AppError::Validation(format!("[{scene_name}] {detail}")),
        AppError::Upstream { status, detail } => AppError::Upstream {
            status,
            detail: format!("[{scene_name}] {detail}"),
        },
        AppError::AudioProcessing(detail) => {
            AppError::AudioProcessing(format!("[{scene_name}] {detail}"))
        }
        AppError::Timeout(detail) => AppError::Timeout(format!("[{scene_name}] {detail}")),
        other => other,
    }
}
