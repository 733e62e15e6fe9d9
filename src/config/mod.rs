// Configuration module
// Centralized management of application configuration

use std::path::PathBuf;

/// Runtime settings, read once at startup from the environment.
///
/// Missing credentials are not a startup error: the pipeline degrades to
/// its deterministic fallbacks when a collaborator key is absent.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Key for the language-model and transcription collaborators.
    pub openai_api_key: String,
    /// Key for the speech-synthesis collaborator.
    pub elevenlabs_api_key: String,
    /// Synthesis endpoint URL.
    pub elevenlabs_url: String,
    /// Voice used when the planning collaborator is unavailable and the
    /// request carries no override.
    pub default_voice_id: String,
    /// Directory where generated audio and manifests are written.
    pub output_dir: PathBuf,
    /// Bind address for the HTTP server.
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            elevenlabs_api_key: String::new(),
            elevenlabs_url: "https://api.elevenlabs.io/v1/text-to-dialogue".to_string(),
            default_voice_id: String::new(),
            output_dir: PathBuf::from("generated_audio"),
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        Self {
            openai_api_key: env_or("OPENAI_API_KEY", &defaults.openai_api_key),
            elevenlabs_api_key: env_or("ELEVENLABS_API_KEY", &defaults.elevenlabs_api_key),
            elevenlabs_url: env_or("ELEVENLABS_URL", &defaults.elevenlabs_url),
            default_voice_id: env_or("NARRAVOX_DEFAULT_VOICE", &defaults.default_voice_id),
            output_dir: PathBuf::from(env_or(
                "NARRAVOX_OUTPUT_DIR",
                defaults.output_dir.to_str().unwrap_or("generated_audio"),
            )),
            bind_addr: env_or("NARRAVOX_BIND_ADDR", &defaults.bind_addr),
        }
    }

    pub fn has_agent_credentials(&self) -> bool {
        !self.openai_api_key.trim().is_empty()
    }

    pub fn has_synthesis_credentials(&self) -> bool {
        !self.elevenlabs_api_key.trim().is_empty()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
