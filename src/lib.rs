/*!
 * # narravox
 *
 * Long-form narration synthesis service. Takes a multi-scene script,
 * decides sentence and clause boundaries with target pauses, synthesizes
 * each unit through an external TTS service, measures the silence the
 * audio actually contains, corrects pacing from measured feedback, and
 * stitches everything into per-scene files plus one combined narration
 * file.
 *
 * ## Architecture
 *
 * - `api`: thin axum routing layer (multipart response, static downloads)
 * - `config`: environment-driven settings
 * - `models`: scenes, segmentation plans, timing analysis, synthesis plan
 * - `services::script`: scene-header parsing
 * - `services::segmentation`: sentence/clause plans and plan validation
 * - `services::synthesis`: external TTS client
 * - `services::agents`: planning / re-segmentation / splice collaborators
 * - `services::transcription`: timestamped transcription client
 * - `services::audio`: decoding, silence measurement, VAD, ffmpeg assembly
 * - `services::analysis`: scene timing analysis
 * - `services::splice`: pause deviation metrics and corrections
 * - `services::longform`: the orchestrator
 * - `errors`: application error types
 */

pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Settings;
pub use errors::{AppError, AppResult};
pub use services::longform::LongformPipeline;
