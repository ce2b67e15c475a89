//! Error types for the chunked transcription pipeline.
//!
//! Every variant except [`PipelineError::AuthExpired`] is fatal to the job:
//! the pipeline is fail-fast and never returns a transcript with gaps.
//! Size probing has no error variant; a failed probe is reported
//! through [`crate::core::probe::ProbeOutcome::Unknown`] instead.

use thiserror::Error;

use super::stt::STTError;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised while resolving, fetching, validating or transcribing media.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The resolver service was unreachable or answered with something unusable
    #[error("Resolution failed{}: {message}", status_suffix(.status))]
    Resolution {
        status: Option<u16>,
        message: String,
    },

    /// The origin rejected the download URL as expired or unauthorized.
    ///
    /// Only ever observed inside the fetcher, which re-resolves once and
    /// escalates a second occurrence to [`PipelineError::Fetch`].
    #[error("Download authorization expired (HTTP {status})")]
    AuthExpired { status: u16 },

    /// The origin returned an unusable status or the transfer broke off
    #[error("Fetch failed at byte {offset}{}: {message}", status_suffix(.status))]
    Fetch {
        offset: u64,
        status: Option<u16>,
        message: String,
    },

    /// The payload is not genuine media (empty, markup, error object, wrong type)
    #[error("Validation failed at byte {offset}: {message}")]
    Validation { offset: u64, message: String },

    /// The transcription engine failed or returned unusable data
    #[error("Transcription failed at byte {offset}: {source}")]
    Transcription {
        offset: u64,
        #[source]
        source: STTError,
    },

    /// The reported size would split into more chunks than the job allows
    #[error("Source of {total_size} bytes needs {chunk_count} chunks, limit is {limit}")]
    SourceTooLarge {
        total_size: u64,
        chunk_count: u64,
        limit: usize,
    },

    /// A source or resolved URL is malformed or points somewhere we refuse to fetch
    #[error("Invalid media reference: {0}")]
    InvalidReference(String),
}

impl PipelineError {
    /// Shorthand for a resolver failure.
    pub fn resolution(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Resolution {
            status,
            message: message.into(),
        }
    }

    /// Shorthand for a fetch failure at `offset`.
    pub fn fetch(offset: u64, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Fetch {
            offset,
            status,
            message: message.into(),
        }
    }

    /// Shorthand for a validation failure at `offset`.
    pub fn validation(offset: u64, message: impl Into<String>) -> Self {
        Self::Validation {
            offset,
            message: message.into(),
        }
    }

    /// Stable, machine-friendly name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution { .. } => "resolution_error",
            Self::AuthExpired { .. } => "auth_expired",
            Self::Fetch { .. } => "fetch_error",
            Self::Validation { .. } => "validation_error",
            Self::Transcription { .. } => "transcription_error",
            Self::SourceTooLarge { .. } => "source_too_large",
            Self::InvalidReference(_) => "invalid_reference",
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|s| format!(" (HTTP {s})"))
        .unwrap_or_default()
}
