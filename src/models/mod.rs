// Data model for the long-form narration pipeline

pub mod longform;
pub mod plan;

pub use longform::{
    LongformScenesRequest, LongformScenesResponse, PauseAdjustment, PauseAdjustmentResponse,
    SceneBlock, SceneProcessingSummary, SceneTimingAnalysis, SegmentPausePlan,
    SegmentTimingReport, SilenceWindow, TranscriptSegment,
};
pub use plan::{ClauseRenderSpec, LongFormAudioPlan, PlanSegment, StitchingInstructions};
