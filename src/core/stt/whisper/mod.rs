//! OpenAI-compatible Whisper transcription (Groq, OpenAI).
//!
//! This module talks to the `/audio/transcriptions` REST endpoint with
//! `response_format=verbose_json`, which yields segment and word timestamps
//! plus the decoded duration of the uploaded buffer.
//!
//! # Features
//!
//! - Segment and word-level timestamps
//! - Retry with exponential backoff on 429 / 5xx / network errors
//! - Upload size guard before any network call
//! - Output validated before it reaches the merge
//!
//! # Configuration
//!
//! ```bash
//! export STT_PROVIDER=groq
//! export GROQ_API_KEY="gsk_..."
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use transcribe_gateway::core::stt::{MediaHint, Transcriber, STTProvider};
//! use transcribe_gateway::core::stt::whisper::{WhisperConfig, WhisperTranscriber};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stt = WhisperTranscriber::new(WhisperConfig {
//!         provider: STTProvider::Groq,
//!         api_key: std::env::var("GROQ_API_KEY")?,
//!         ..Default::default()
//!     })?;
//!
//!     let audio = std::fs::read("talk.mp3")?;
//!     let transcript = stt.transcribe(audio.into(), &MediaHint::default()).await?;
//!     println!("{} segments", transcript.segments.len());
//!     Ok(())
//! }
//! ```
//!
//! # References
//!
//! - [Groq Speech-to-Text Documentation](https://console.groq.com/docs/speech-to-text)
//! - [OpenAI Audio API Reference](https://platform.openai.com/docs/api-reference/audio)

mod client;
pub mod config;
pub mod messages;


pub use client::WhisperTranscriber;
pub use config::{
    DEFAULT_MAX_FILE_SIZE, DEFAULT_TIMEOUT_SECS, GROQ_STT_URL, OPENAI_STT_URL,
    TimestampGranularity, WhisperConfig,
};
pub use messages::{VerboseTranscriptionResponse, WhisperErrorResponse};
