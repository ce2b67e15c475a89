//! Boundary contract between the pipeline and a transcription engine.
//!
//! The pipeline hands a raw byte buffer (a whole file or one byte-range chunk)
//! to a [`Transcriber`] and gets back a [`ChunkTranscript`] whose timestamps are
//! local to that buffer. Implementations own any retry policy; the pipeline
//! treats each call as atomic and never retries it.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::core::types::ChunkTranscript;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to a transcription engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum STTError {
    /// Invalid or incomplete provider configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The engine rejected our credentials
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Transport-level failure (connect, timeout, broken body)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The engine answered with an error status
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// The engine could not process the audio we sent
    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),

    /// The engine answered 2xx but the payload is unusable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

// =============================================================================
// Transcriber Trait
// =============================================================================

/// Describes the buffer being transcribed so the engine can pick a decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHint {
    /// File name sent with the upload (the extension matters to most engines)
    pub file_name: String,
    /// MIME type sent with the upload
    pub mime_type: String,
}

impl MediaHint {
    /// Build a hint from an optional declared content type and a URL.
    ///
    /// The extension of the URL path wins when it is a known media extension;
    /// otherwise the content type is mapped back to an extension, falling back
    /// to `mp3`.
    pub fn from_source(url: &str, content_type: Option<&str>) -> Self {
        let from_url = crate::core::resolver::media_extension(url);
        let mime = content_type
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty());

        let extension = from_url
            .or_else(|| mime.as_deref().and_then(extension_for_mime))
            .unwrap_or("mp3");

        Self {
            file_name: format!("audio.{extension}"),
            mime_type: mime.unwrap_or_else(|| mime_for_extension(extension).to_string()),
        }
    }
}

impl Default for MediaHint {
    fn default() -> Self {
        Self {
            file_name: "audio.mp3".to_string(),
            mime_type: "audio/mpeg".to_string(),
        }
    }
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    Some(match mime {
        "audio/mpeg" | "audio/mp3" | "audio/mpga" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => "m4a",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/ogg" | "application/ogg" | "audio/opus" => "ogg",
        "audio/webm" | "video/webm" => "webm",
        "video/mp4" => "mp4",
        "video/mpeg" => "mpeg",
        _ => return None,
    })
}

fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "mp3" | "mpga" | "mpeg" => "audio/mpeg",
        "m4a" | "m4b" | "aac" => "audio/mp4",
        "mp4" => "video/mp4",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}

/// A speech-to-text engine that transcribes one buffer at a time.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio` and return segments, words and duration in the
    /// buffer's own time base (starting at 0).
    ///
    /// Implementations must validate the engine output before returning it
    /// (see [`ChunkTranscript::validate`]).
    async fn transcribe(&self, audio: Bytes, hint: &MediaHint)
    -> Result<ChunkTranscript, STTError>;

    /// Human-readable provider name, used in logs.
    fn provider_info(&self) -> &'static str;
}
