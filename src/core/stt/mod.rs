mod base;
pub mod whisper;

// Re-export public types and traits
pub use base::{MediaHint, STTError, Transcriber};
pub use whisper::{WhisperConfig, WhisperTranscriber};

/// Supported STT providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum STTProvider {
    /// Groq Whisper STT REST API (ultra-fast)
    #[default]
    Groq,
    /// OpenAI Whisper STT REST API
    OpenAI,
}

impl std::fmt::Display for STTProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            STTProvider::Groq => write!(f, "groq"),
            STTProvider::OpenAI => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for STTProvider {
    type Err = STTError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(STTProvider::Groq),
            "openai" => Ok(STTProvider::OpenAI),
            _ => Err(STTError::ConfigurationError(format!(
                "Unsupported STT provider: {s}. Supported providers: groq, openai"
            ))),
        }
    }
}

/// Names of all supported providers
pub fn get_supported_stt_providers() -> Vec<&'static str> {
    vec!["groq", "openai"]
}
