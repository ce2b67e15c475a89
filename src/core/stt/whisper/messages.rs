//! Message types for Whisper `verbose_json` responses.
//!
//! This module contains serde types for parsing API responses and the
//! conversion into the pipeline's [`ChunkTranscript`].

use serde::{Deserialize, Serialize};

use crate::core::types::{self, ChunkTranscript};

// =============================================================================
// Verbose Transcription Response
// =============================================================================

/// Verbose JSON transcription response with timestamps and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerboseTranscriptionResponse {
    /// The full transcribed text.
    #[serde(default)]
    pub text: String,

    /// Detected language of the audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Total duration of the audio in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Transcription segments with timestamps.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<Segment>,

    /// Word-level timestamps (if requested).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<Word>,

    /// Groq-specific metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_groq: Option<GroqMetadata>,
}

/// Groq-specific metadata in responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqMetadata {
    /// Unique request ID for debugging/tracking.
    pub id: String,
}

/// A transcription segment as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Segment index (0-based).
    #[serde(default)]
    pub id: u32,

    /// Start time in seconds.
    pub start: f64,

    /// End time in seconds.
    pub end: f64,

    /// Transcribed text for this segment.
    pub text: String,

    /// Average log probability (confidence metric).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_logprob: Option<f64>,

    /// Probability that this segment contains no speech.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_speech_prob: Option<f64>,
}

/// Word-level timing information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

impl From<Word> for types::Word {
    fn from(w: Word) -> Self {
        Self {
            word: w.word,
            start: w.start,
            end: w.end,
        }
    }
}

impl VerboseTranscriptionResponse {
    /// Convert into the pipeline's transcript type.
    ///
    /// Top-level words are also attached to the segment whose span contains
    /// their start time. A response that carries text but no segments becomes
    /// a single segment spanning the reported duration.
    pub fn into_chunk_transcript(self) -> ChunkTranscript {
        let words: Vec<types::Word> = self.words.into_iter().map(Into::into).collect();
        let duration = self.duration.filter(|d| *d > 0.0);

        let mut segments: Vec<types::Segment> = self
            .segments
            .into_iter()
            .map(|s| types::Segment::new(s.start, s.end, s.text))
            .collect();

        if segments.is_empty() && !self.text.trim().is_empty() {
            let end = duration
                .or_else(|| words.last().map(|w| w.end))
                .unwrap_or(0.0);
            segments.push(types::Segment::new(0.0, end, self.text.trim()));
        }

        if !words.is_empty() {
            let last = segments.len().saturating_sub(1);
            for (i, segment) in segments.iter_mut().enumerate() {
                let contained: Vec<types::Word> = words
                    .iter()
                    .filter(|w| {
                        w.start >= segment.start
                            && (w.start < segment.end || (i == last && w.start <= segment.end))
                    })
                    .cloned()
                    .collect();
                if !contained.is_empty() {
                    segment.words = Some(contained);
                }
            }
        }

        ChunkTranscript {
            segments,
            words,
            duration,
        }
    }
}

// =============================================================================
// Error Response
// =============================================================================

/// Error response from an OpenAI-compatible API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperErrorResponse {
    /// The error details.
    pub error: WhisperError,
}

/// Error details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperError {
    /// Human-readable error message.
    pub message: String,

    /// Error type classification.
    #[serde(rename = "type", default)]
    pub error_type: String,

    /// Optional error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
