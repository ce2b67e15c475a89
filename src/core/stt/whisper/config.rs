//! Configuration types for OpenAI-compatible Whisper transcription APIs.
//!
//! Both Groq and OpenAI expose the same multipart
//! `/audio/transcriptions` endpoint; they differ in base URL, default model
//! and upload limits.
//!
//! | Provider | Default model | Upload limit |
//! |----------|---------------|--------------|
//! | Groq     | `whisper-large-v3-turbo` | 25MB (free tier) |
//! | OpenAI   | `whisper-1` | 25MB |

use serde::{Deserialize, Serialize};

use super::super::STTProvider;

// =============================================================================
// Constants
// =============================================================================

/// Groq API URL for audio transcriptions.
pub const GROQ_STT_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";

/// OpenAI API URL for audio transcriptions.
pub const OPENAI_STT_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Default maximum upload size in bytes (25MB).
pub const DEFAULT_MAX_FILE_SIZE: usize = 25 * 1024 * 1024;

/// Maximum prompt length in characters we forward (roughly 224 tokens).
pub const MAX_PROMPT_CHARS: usize = 896;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default number of attempts for transient errors.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

// =============================================================================
// Timestamp Granularities
// =============================================================================

/// Timestamp granularity options for the `verbose_json` format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampGranularity {
    /// Word-level timestamps (adds latency)
    Word,
    /// Segment-level timestamps
    Segment,
}

impl TimestampGranularity {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::Segment => "segment",
        }
    }
}

// =============================================================================
// Whisper Configuration
// =============================================================================

/// Configuration for [`super::WhisperTranscriber`].
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Which hosted API to talk to
    pub provider: STTProvider,

    /// Bearer API key
    pub api_key: String,

    /// Model identifier; empty means the provider default
    pub model: String,

    /// ISO-639-1 language hint
    pub language: Option<String>,

    /// Prompt to guide style / vocabulary
    pub prompt: Option<String>,

    /// Sampling temperature (0.0 - 1.0)
    pub temperature: Option<f32>,

    /// Endpoint override (self-hosted gateways, tests)
    pub api_url: Option<String>,

    /// Requested timestamp granularities
    pub timestamp_granularities: Vec<TimestampGranularity>,

    /// Uploads above this size are refused before any network call
    pub max_file_size_bytes: usize,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Total attempts for transient failures (429, 5xx, network)
    pub max_attempts: u32,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            provider: STTProvider::Groq,
            api_key: String::new(),
            model: String::new(),
            language: None,
            prompt: None,
            temperature: None,
            api_url: None,
            timestamp_granularities: vec![
                TimestampGranularity::Segment,
                TimestampGranularity::Word,
            ],
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl WhisperConfig {
    /// Endpoint to POST audio to.
    pub fn api_url(&self) -> &str {
        if let Some(url) = self.api_url.as_deref() {
            return url;
        }
        match self.provider {
            STTProvider::Groq => GROQ_STT_URL,
            STTProvider::OpenAI => OPENAI_STT_URL,
        }
    }

    /// Model to request.
    pub fn model(&self) -> &str {
        if !self.model.is_empty() {
            return &self.model;
        }
        match self.provider {
            STTProvider::Groq => "whisper-large-v3-turbo",
            STTProvider::OpenAI => "whisper-1",
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.trim().is_empty() {
            return Err(format!("API key is required for {} STT", self.provider));
        }

        if let Some(temp) = self.temperature
            && !(0.0..=1.0).contains(&temp)
        {
            return Err(format!(
                "Temperature must be between 0.0 and 1.0, got {temp}"
            ));
        }

        if let Some(ref prompt) = self.prompt
            && prompt.len() > MAX_PROMPT_CHARS
        {
            return Err(format!(
                "Prompt is too long ({} characters, max {MAX_PROMPT_CHARS})",
                prompt.len()
            ));
        }

        if let Some(ref url) = self.api_url {
            url::Url::parse(url).map_err(|e| format!("Invalid STT API URL '{url}': {e}"))?;
        }

        if self.max_file_size_bytes == 0 {
            return Err("max_file_size_bytes must be positive".to_string());
        }

        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }

        Ok(())
    }
}
