use std::sync::Arc;

use tracing::info;

use crate::config::ServerConfig;
use crate::core::pipeline::TranscriptionPipeline;
use crate::core::resolver::HttpResolver;
use crate::core::stt::WhisperTranscriber;

/// Application state shared by every request.
pub struct AppState {
    pub config: ServerConfig,
    pub pipeline: Arc<TranscriptionPipeline>,
}

impl AppState {
    /// Build the state with the HTTP resolver and the configured Whisper provider.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let resolver = HttpResolver::new(config.resolver_config())?;
        let transcriber = WhisperTranscriber::new(config.whisper_config()?)?;
        let pipeline =
            TranscriptionPipeline::new(config.pipeline.clone(), Arc::new(resolver), Arc::new(transcriber))?;

        info!(
            provider = pipeline.provider_info(),
            resolver_configured = config.resolver_url.is_some(),
            "Transcription pipeline ready"
        );

        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Build the state around an already constructed pipeline.
    pub fn with_pipeline(config: ServerConfig, pipeline: TranscriptionPipeline) -> Arc<Self> {
        Arc::new(Self {
            config,
            pipeline: Arc::new(pipeline),
        })
    }
}
