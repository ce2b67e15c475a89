//! Whisper REST client implementing [`Transcriber`].
//!
//! # Architecture
//!
//! Whisper is a batch API: one multipart upload in, one `verbose_json`
//! document out. Each call is independent, so a single client is shared by
//! every concurrent chunk task of a job.
//!
//! # Rate Limits
//!
//! - 429 responses carry a `Retry-After` header, which is honored
//! - 5xx and network failures are retried with exponential backoff
//! - 4xx other than 429 fail immediately

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::super::base::{MediaHint, STTError, Transcriber};
use super::config::WhisperConfig;
use super::messages::{VerboseTranscriptionResponse, WhisperErrorResponse};
use crate::core::types::ChunkTranscript;

// =============================================================================
// Constants
// =============================================================================

/// Base delay for exponential backoff (milliseconds).
const BASE_RETRY_DELAY_MS: u64 = 500;

/// Upper bound for a server-provided Retry-After (milliseconds).
const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Default connect timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// User-Agent header value for API requests.
const USER_AGENT: &str = concat!("Transcribe-Gateway/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Retry Bookkeeping
// =============================================================================

/// A failed attempt, with what we learned about retrying it.
#[derive(Debug)]
pub(crate) struct RequestFailure {
    pub(crate) error: STTError,
    pub(crate) retryable: bool,
    pub(crate) retry_after_ms: Option<u64>,
}

impl RequestFailure {
    fn fatal(error: STTError) -> Self {
        Self {
            error,
            retryable: false,
            retry_after_ms: None,
        }
    }
}

/// Parse a `Retry-After` header value.
///
/// Accepts integer seconds or duration strings such as `"1s"`, `"500ms"`, `"1m"`.
pub(crate) fn parse_retry_after(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Some(secs * 1000);
    }
    if let Some(ms) = s.strip_suffix("ms") {
        return ms.trim().parse().ok();
    }
    if let Some(secs) = s.strip_suffix('s') {
        return secs.trim().parse::<f64>().ok().map(|v| (v * 1000.0) as u64);
    }
    if let Some(mins) = s.strip_suffix('m') {
        return mins.trim().parse::<u64>().ok().map(|v| v * 60 * 1000);
    }
    None
}

/// Backoff delay before attempt number `attempt` (1-based retry count).
pub(crate) fn backoff_delay_ms(attempt: u32, retry_after_ms: Option<u64>) -> u64 {
    retry_after_ms
        .map(|ms| ms.min(MAX_RETRY_DELAY_MS))
        .unwrap_or_else(|| BASE_RETRY_DELAY_MS * 2u64.pow(attempt.saturating_sub(1)))
}

// =============================================================================
// Whisper Transcriber
// =============================================================================

/// OpenAI-compatible Whisper client (Groq or OpenAI).
pub struct WhisperTranscriber {
    config: WhisperConfig,

    /// HTTP client for API requests (reused for connection pooling).
    http_client: Client,
}

impl WhisperTranscriber {
    /// Create a new client from a validated configuration.
    pub fn new(config: WhisperConfig) -> Result<Self, STTError> {
        config.validate().map_err(STTError::ConfigurationError)?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                STTError::ConfigurationError(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }

    /// Send a single request.
    async fn send_request(
        &self,
        audio: Bytes,
        hint: &MediaHint,
    ) -> Result<VerboseTranscriptionResponse, RequestFailure> {
        let config = &self.config;

        let file_part = Part::stream(audio)
            .file_name(hint.file_name.clone())
            .mime_str(&hint.mime_type)
            .map_err(|e| {
                RequestFailure::fatal(STTError::ConfigurationError(format!(
                    "Invalid MIME type '{}': {e}",
                    hint.mime_type
                )))
            })?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", config.model().to_string())
            .text("response_format", "verbose_json");

        if let Some(ref language) = config.language
            && !language.is_empty()
        {
            form = form.text("language", language.clone());
        }

        if let Some(temp) = config.temperature {
            form = form.text("temperature", temp.to_string());
        }

        if let Some(ref prompt) = config.prompt {
            form = form.text("prompt", prompt.clone());
        }

        for granularity in &config.timestamp_granularities {
            form = form.text(
                "timestamp_granularities[]",
                granularity.as_str().to_string(),
            );
        }

        let response = self
            .http_client
            .post(config.api_url())
            .bearer_auth(&config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RequestFailure {
                error: STTError::NetworkError(format!("Request failed: {e}")),
                retryable: true,
                retry_after_ms: None,
            })?;

        let retry_after_ms = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        if let Some(ref id) = request_id {
            debug!("{} request ID: {}", config.provider, id);
        }

        let status = response.status();
        let response_text = response.text().await.map_err(|e| RequestFailure {
            error: STTError::NetworkError(format!("Failed to read response: {e}")),
            retryable: true,
            retry_after_ms: None,
        })?;

        if !status.is_success() {
            let error_msg = match serde_json::from_str::<WhisperErrorResponse>(&response_text) {
                Ok(parsed) => format!(
                    "{} API error: {} ({})",
                    config.provider, parsed.error.message, parsed.error.error_type
                ),
                Err(_) => format!("{} API error ({}): {}", config.provider, status, response_text),
            };
            let request_id_suffix = request_id
                .as_ref()
                .map(|id| format!(" [request_id: {id}]"))
                .unwrap_or_default();

            let (error, retryable) = match status.as_u16() {
                400 => (
                    STTError::AudioProcessingError(format!("{error_msg}{request_id_suffix}")),
                    false,
                ),
                401 | 403 => (
                    STTError::AuthenticationFailed(format!("{error_msg}{request_id_suffix}")),
                    false,
                ),
                413 => (
                    STTError::AudioProcessingError(format!(
                        "File too large: {error_msg}{request_id_suffix}"
                    )),
                    false,
                ),
                429 => (
                    STTError::ProviderError(format!(
                        "Rate limit exceeded: {error_msg}{request_id_suffix}"
                    )),
                    true,
                ),
                500..=599 => (
                    STTError::ProviderError(format!(
                        "Server error: {error_msg}{request_id_suffix}"
                    )),
                    true,
                ),
                _ => (
                    STTError::ProviderError(format!("{error_msg}{request_id_suffix}")),
                    false,
                ),
            };

            return Err(RequestFailure {
                error,
                retryable,
                retry_after_ms,
            });
        }

        serde_json::from_str::<VerboseTranscriptionResponse>(&response_text).map_err(|e| {
            RequestFailure::fatal(STTError::InvalidResponse(format!(
                "Failed to parse response: {e}"
            )))
        })
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        audio: Bytes,
        hint: &MediaHint,
    ) -> Result<ChunkTranscript, STTError> {
        if audio.is_empty() {
            return Err(STTError::AudioProcessingError(
                "Refusing to transcribe an empty buffer".to_string(),
            ));
        }

        if audio.len() > self.config.max_file_size_bytes {
            return Err(STTError::AudioProcessingError(format!(
                "Audio buffer ({} bytes) exceeds maximum file size ({} bytes)",
                audio.len(),
                self.config.max_file_size_bytes
            )));
        }

        info!(
            "Sending {} bytes to {} Whisper API (model: {})",
            audio.len(),
            self.config.provider,
            self.config.model()
        );

        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            // Bytes clones are reference-counted, not copies
            match self.send_request(audio.clone(), hint).await {
                Ok(response) => {
                    let transcript = response.into_chunk_transcript();
                    transcript.validate()?;
                    debug!(
                        "Transcription complete: {} segments, {} words, duration {:?}",
                        transcript.segments.len(),
                        transcript.words.len(),
                        transcript.duration
                    );
                    return Ok(transcript);
                }
                Err(failure) if failure.retryable && attempt < max_attempts => {
                    let delay = backoff_delay_ms(attempt, failure.retry_after_ms);
                    warn!(
                        "Retryable error on attempt {}/{}: {} (retrying in {}ms)",
                        attempt, max_attempts, failure.error, delay
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    fn provider_info(&self) -> &'static str {
        match self.config.provider {
            crate::core::stt::STTProvider::Groq => "Groq Whisper STT",
            crate::core::stt::STTProvider::OpenAI => "OpenAI Whisper STT",
        }
    }
}
