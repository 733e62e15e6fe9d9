use std::sync::Arc;

use log::info;

use narravox::api::{self, AppState};
use narravox::config::Settings;
use narravox::services::agents::OpenAiPlanner;
use narravox::services::longform::LongformPipeline;
use narravox::services::synthesis::ElevenLabsSynthesizer;
use narravox::services::transcription::WhisperTranscriber;
use narravox::utils::logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init_logger();

    let settings = Settings::from_env();
    std::fs::create_dir_all(&settings.output_dir)?;

    if !settings.has_synthesis_credentials() {
        log::warn!("ELEVENLABS_API_KEY is not set; synthesis requests will be rejected");
    }
    if !settings.has_agent_credentials() {
        log::warn!(
            "OPENAI_API_KEY is not set; planning, refinement and measurement run in fallback mode"
        );
    }

    let synthesizer = Arc::new(ElevenLabsSynthesizer::new(&settings));
    let planner = Arc::new(OpenAiPlanner::new(&settings));
    let transcriber = Arc::new(WhisperTranscriber::new(&settings));
    let pipeline = Arc::new(LongformPipeline::new(
        settings.clone(),
        synthesizer,
        planner,
        transcriber,
    ));

    let state = AppState {
        settings: settings.clone(),
        pipeline,
    };
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!("narravox listening on {}", settings.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
